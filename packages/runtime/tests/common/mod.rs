#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use skyrun_namespace::{Entry, Folder, MemFile, MemFolder};
use skyrun_runtime::{App, MemoryResolver, Process, ProcessStatus, Runtime, RuntimeConfig, Session, SessionStatus};

pub const CHART: &str = "mem://chart";
pub const WAIT: Duration = Duration::from_secs(5);

/// A chart holding a single app with the given routines.
pub fn chart(app: &str, routines: &[(&str, &str)]) -> Arc<MemFolder> {
    let routines_dir = Arc::new(MemFolder::new("routines"));
    for (name, source) in routines {
        let file = format!("{}.lua", name);
        let source = MemFile::new(file.clone(), source.to_string());
        routines_dir.put(&file, Some(Entry::File(Arc::new(source))));
    }
    let app_dir = Arc::new(MemFolder::new(app));
    app_dir.put("routines", Some(Entry::Folder(routines_dir)));
    let apps_dir = Arc::new(MemFolder::new("apps"));
    apps_dir.put(app, Some(Entry::Folder(app_dir)));

    let root = Arc::new(MemFolder::new("chart"));
    root.put("apps", Some(Entry::Folder(apps_dir)));
    root
}

pub fn config() -> RuntimeConfig {
    RuntimeConfig {
        drain_log_interval_ms: 50,
        ..RuntimeConfig::default()
    }
}

pub struct Harness {
    pub resolver: Arc<MemoryResolver>,
    pub runtime: Arc<Runtime>,
    pub session: Arc<Session>,
}

impl Harness {
    /// Register `root` as the chart, open a session and wait for it.
    pub async fn open(root: Arc<MemFolder>) -> Harness {
        Self::open_with(root, |_| {}).await
    }

    pub async fn open_with(root: Arc<MemFolder>, setup: impl FnOnce(&MemoryResolver)) -> Harness {
        let resolver = Arc::new(MemoryResolver::new());
        resolver.register(CHART, Entry::Folder(root));
        setup(&resolver);

        let runtime = Runtime::new(config(), resolver.clone()).unwrap();
        let session = runtime.open_session(CHART);
        let status = tokio::time::timeout(WAIT, session.wait_open()).await.unwrap();
        assert_eq!(status, SessionStatus::Open);
        Harness {
            resolver,
            runtime,
            session,
        }
    }

    pub fn app(&self, name: &str) -> Arc<App> {
        self.session.app(name).unwrap()
    }

    /// Stop everything so no routine outlives the test runtime.
    pub async fn shutdown(self) {
        tokio::time::timeout(WAIT, self.session.stop_all()).await.unwrap();
    }
}

/// Run a single-app chart whose launch routine is `source`.
pub async fn run_launch(source: &str) -> (Harness, Arc<App>, ProcessStatus) {
    run_routines(&[("launch", source)]).await
}

pub async fn run_routines(routines: &[(&str, &str)]) -> (Harness, Arc<App>, ProcessStatus) {
    let harness = Harness::open(chart("demo", routines)).await;
    let app = harness.app("demo");
    let launch = app.process("0").unwrap();
    let status = finished(&launch).await;
    (harness, app, status)
}

pub async fn finished(process: &Process) -> ProcessStatus {
    tokio::time::timeout(WAIT, process.wait_terminal()).await.unwrap()
}

pub async fn sleeping(process: &Process) {
    tokio::time::timeout(WAIT, process.wait_for(|s| matches!(s, ProcessStatus::Sleeping { .. })))
        .await
        .unwrap();
}

/// Poll until the app has registered `pid`.
pub async fn process(app: &App, pid: &str) -> Arc<Process> {
    tokio::time::timeout(WAIT, async {
        loop {
            if let Some(p) = app.process(pid) {
                return p;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap()
}

pub fn read(app: &App, path: &str) -> Option<String> {
    app.context().get_string(path).map(|s| s.value)
}

pub fn children(folder: &dyn Folder) -> Vec<String> {
    let mut names = folder.children();
    names.sort();
    names
}
