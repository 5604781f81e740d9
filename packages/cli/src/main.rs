use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use std::{fs, io};

use clap::{Parser, Subcommand};
use skyrun_namespace::{load_dir, merge_json, Entry, LoadError};
use skyrun_runtime::{MemoryResolver, Process, Runtime, RuntimeConfig, RuntimeError, SessionStatus};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

const CHART_URI: &str = "mem://chart";

/// skyrun - run the apps of a chart
#[derive(Parser, Debug)]
#[command(name = "skyrun")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open a chart directory and run its apps until interrupted
    Run {
        /// Directory holding the chart (`apps/<name>/routines/*.lua`, ...)
        chart_dir: PathBuf,

        /// JSON file with runtime configuration
        #[arg(long)]
        config: Option<PathBuf>,

        /// JSON file merged into the chart root before opening
        #[arg(long)]
        seed: Option<PathBuf>,

        /// Extra directory importable as mem://<name>
        #[arg(long = "mount", value_name = "NAME=DIR", value_parser = parse_mount)]
        mounts: Vec<(String, PathBuf)>,

        /// Stop after this many seconds instead of waiting for Ctrl-C
        #[arg(long)]
        duration_secs: Option<u64>,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("seed document {0} must be a JSON object")]
    SeedNotObject(PathBuf),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("session failed to open: {0}")]
    Session(String),
}

fn parse_mount(s: &str) -> Result<(String, PathBuf), String> {
    match s.split_once('=') {
        Some((name, dir)) if !name.is_empty() && !dir.is_empty() => {
            Ok((name.to_string(), PathBuf::from(dir)))
        }
        _ => Err(format!("expected NAME=DIR, got {:?}", s)),
    }
}

fn read_json(path: &Path) -> Result<serde_json::Value, CliError> {
    let text = fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CliError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn load_config(path: Option<&Path>) -> Result<RuntimeConfig, CliError> {
    let Some(path) = path else {
        return Ok(RuntimeConfig::default());
    };
    let value = read_json(path)?;
    serde_json::from_value(value).map_err(|source| CliError::Json {
        path: path.to_path_buf(),
        source,
    })
}

async fn run(
    chart_dir: PathBuf,
    config: Option<PathBuf>,
    seed: Option<PathBuf>,
    mounts: Vec<(String, PathBuf)>,
    duration_secs: Option<u64>,
) -> Result<(), CliError> {
    let config = load_config(config.as_deref())?;

    tracing::info!(dir = %chart_dir.display(), "loading chart");
    let chart = load_dir(&chart_dir)?;
    if let Some(seed) = seed {
        if !merge_json(chart.as_ref(), &read_json(&seed)?) {
            return Err(CliError::SeedNotObject(seed));
        }
    }

    let resolver = Arc::new(MemoryResolver::new());
    resolver.register(CHART_URI, Entry::Folder(chart));
    for (name, dir) in mounts {
        let uri = format!("mem://{}", name);
        tracing::info!(uri = %uri, dir = %dir.display(), "mounting directory");
        resolver.register(&uri, Entry::Folder(load_dir(&dir)?));
    }

    let runtime = Runtime::new(config, resolver)?;
    let session = runtime.open_session(CHART_URI);
    if let SessionStatus::Failed(reason) = session.wait_open().await {
        return Err(CliError::Session(reason));
    }

    match duration_secs {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "couldn't listen for Ctrl-C, stopping now");
            }
        }
    }

    let processes: Vec<Arc<Process>> = session.apps().iter().flat_map(|app| app.processes()).collect();
    tracing::info!("stopping all apps");
    session.stop_all().await;

    for process in processes {
        println!(
            "{} {} {} {} {}",
            process.app_name(),
            process.pid(),
            process.status(),
            process.start_time(),
            process.end_time().unwrap_or("-"),
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let result = match args.command {
        Command::Run {
            chart_dir,
            config,
            seed,
            mounts,
            duration_secs,
        } => run(chart_dir, config, seed, mounts, duration_secs).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
