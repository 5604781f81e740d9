//! Apps: a mounted namespace plus a registry of processes.
//!
//! An app's mount looks like:
//!
//! ```text
//! /state       scratch space, wiped on restart
//! /export      published values, wiped on restart
//! /session     the chart root
//! /source      the app's code, read-only
//! /config      per-app config folder in the chart
//! /persist     per-app persistent folder in the chart
//! /processes   live view of the process registry
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread;

use skyrun_namespace::{Context, Entry, Folder, MemFolder};

use crate::clock;
use crate::process::{self, Process, ProcessParams};
use crate::runtime::Runtime;
use crate::session::Session;
use crate::status::{AppStatus, ProcessStatus};

struct Registry {
    status: AppStatus,
    next_pid: u64,
    processes: BTreeMap<u64, Arc<Process>>,
}

/// One app inside a session.
pub struct App {
    name: String,
    runtime: Arc<Runtime>,
    session: Weak<Session>,
    namespace: Arc<MemFolder>,
    ctx: Context,
    registry: Mutex<Registry>,
    /// Serializes restart and stop.
    lifecycle: tokio::sync::Mutex<()>,
}

impl App {
    /// Build an app over a prepared mount. Adds the `/processes` view.
    pub(crate) fn new(
        runtime: Arc<Runtime>,
        session: Weak<Session>,
        name: impl Into<String>,
        namespace: Arc<MemFolder>,
        ctx_name: impl Into<String>,
    ) -> Arc<Self> {
        let name = name.into();
        let ctx = Context::new(ctx_name, Entry::Folder(namespace.clone()));
        Arc::new_cyclic(|app| {
            let view = ProcessTable { app: app.clone() };
            namespace.put("processes", Some(Entry::Folder(Arc::new(view))));
            App {
                name,
                runtime,
                session,
                namespace,
                ctx,
                registry: Mutex::new(Registry {
                    status: AppStatus::Pending,
                    next_pid: 0,
                    processes: BTreeMap::new(),
                }),
                lifecycle: tokio::sync::Mutex::new(()),
            }
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> AppStatus {
        self.registry().status.clone()
    }

    /// The app's root context; the default base for routine paths.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn namespace(&self) -> &Arc<MemFolder> {
        &self.namespace
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    pub fn session(&self) -> Option<Arc<Session>> {
        self.session.upgrade()
    }

    /// All registered processes in pid order.
    pub fn processes(&self) -> Vec<Arc<Process>> {
        self.registry().processes.values().cloned().collect()
    }

    pub fn process(&self, pid: &str) -> Option<Arc<Process>> {
        let pid: u64 = pid.parse().ok()?;
        self.registry().processes.get(&pid).cloned()
    }

    /// Leave the app unlaunched with `reason`. Stop and restart keep it
    /// that way.
    pub(crate) fn fail(&self, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!(app = %self.name, reason = %reason, "app failed");
        self.registry().status = AppStatus::Failed(reason);
    }

    /// Mark the app ready and start its launch routine.
    pub(crate) fn boot(self: &Arc<Self>) -> Option<Arc<Process>> {
        self.registry().status = AppStatus::Ready;
        self.start_launch()
    }

    /// Spawn a process running `params.routine_name`.
    ///
    /// Returns `None` without spawning while the app is stopping, stopped
    /// or failed. Pids are assigned in spawn order starting at 0. Every
    /// process gets its own thread, so the number of concurrently running
    /// routines is unbounded.
    pub fn start_routine(self: &Arc<Self>, params: ProcessParams) -> Option<Arc<Process>> {
        let process = {
            let mut registry = self.registry();
            if !registry.status.accepts_spawns() {
                tracing::info!(
                    app = %self.name,
                    routine = %params.routine_name,
                    status = %registry.status,
                    "refusing to start routine"
                );
                return None;
            }
            let pid = registry.next_pid;
            registry.next_pid += 1;
            let process = Arc::new(Process::new(self, pid.to_string(), params));
            registry.processes.insert(pid, process.clone());
            process
        };

        let app = Arc::clone(self);
        let worker = process.clone();
        let spawned = thread::Builder::new()
            .name(format!("skyrun-{}-{}", self.name, process.pid()))
            .spawn(move || process::execute(app, worker));
        if let Err(e) = spawned {
            tracing::warn!(app = %self.name, pid = %process.pid(), error = %e, "couldn't start worker thread");
            process.finish(ProcessStatus::Failed(format!("couldn't start worker thread: {}", e)));
        }
        Some(process)
    }

    /// Abort every process, wait for them all to finish, reset the app's
    /// scratch state and start the launch routine again.
    ///
    /// Waits as long as it takes; a routine that never makes another
    /// syscall holds the restart indefinitely.
    pub async fn restart(self: &Arc<Self>) -> Option<Arc<Process>> {
        let _lifecycle = self.lifecycle.lock().await;
        if self.is_failed() {
            tracing::warn!(app = %self.name, "not restarting failed app");
            return None;
        }
        tracing::info!(app = %self.name, "restarting app");
        self.shut_down().await;

        self.registry().status = AppStatus::Ready;
        tracing::info!(app = %self.name, "state has been reset, firing up the app again");
        self.start_launch()
    }

    /// Abort every process, wait for them all to finish and leave the app
    /// stopped. A later [`restart`](Self::restart) starts it again.
    pub async fn stop(self: &Arc<Self>) {
        let _lifecycle = self.lifecycle.lock().await;
        if self.is_failed() {
            return;
        }
        tracing::info!(app = %self.name, "stopping app");
        self.shut_down().await;
        self.registry().status = AppStatus::Stopped;
    }

    fn start_launch(self: &Arc<Self>) -> Option<Arc<Process>> {
        let launch = self.runtime.config().launch_routine.clone();
        self.start_routine(ProcessParams::new(launch))
    }

    async fn shut_down(&self) {
        let live: Vec<Arc<Process>> = {
            let mut registry = self.registry();
            registry.status = AppStatus::Stopping;
            registry
                .processes
                .values()
                .filter(|p| !p.status().is_terminal())
                .cloned()
                .collect()
        };

        let at = clock::precise_now();
        for process in &live {
            process.abort_signal().request(at.clone());
        }
        tracing::info!(app = %self.name, count = live.len(), "aborting processes");
        self.drain(&live).await;

        {
            let mut registry = self.registry();
            registry.processes.clear();
            registry.next_pid = 0;
        }
        self.namespace.put("state", Some(MemFolder::entry("state")));
        self.namespace.put("export", Some(MemFolder::entry("export")));
    }

    async fn drain(&self, processes: &[Arc<Process>]) {
        let interval = self.runtime.config().drain_log_interval();
        loop {
            let remaining = processes.iter().filter(|p| !p.status().is_terminal()).count();
            if remaining == 0 {
                tracing::info!(app = %self.name, "all processes have stopped");
                return;
            }
            tracing::info!(app = %self.name, remaining, "waiting for processes to stop");
            let _ = tokio::time::timeout(interval, async {
                for process in processes {
                    process.wait_terminal().await;
                }
            })
            .await;
        }
    }

    fn is_failed(&self) -> bool {
        matches!(self.registry().status, AppStatus::Failed(_))
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("name", &self.name)
            .field("context", &self.ctx.name())
            .field("status", &self.status())
            .finish()
    }
}

/// `/processes`: one read-only folder per registered pid.
struct ProcessTable {
    app: Weak<App>,
}

impl Folder for ProcessTable {
    fn name(&self) -> String {
        "processes".to_string()
    }

    fn children(&self) -> Vec<String> {
        match self.app.upgrade() {
            Some(app) => app.registry().processes.keys().map(|pid| pid.to_string()).collect(),
            None => Vec::new(),
        }
    }

    fn fetch(&self, name: &str) -> Option<Entry> {
        let process = self.app.upgrade()?.process(name)?;
        Some(Entry::Folder(process))
    }

    fn put(&self, _name: &str, _entry: Option<Entry>) -> bool {
        false
    }
}
