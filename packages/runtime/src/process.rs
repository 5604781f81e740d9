//! Processes: one execution of a routine.
//!
//! A process is created by [`App::start_routine`](crate::App::start_routine)
//! and runs on its own worker thread. Its status is published through a
//! watch channel; once terminal it never changes again.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::{Arc, OnceLock, Weak};

use mlua::{Lua, LuaOptions, StdLib};
use skyrun_namespace::{Entry, Folder, StringEntry};
use tokio::sync::watch;

use crate::abort::AbortSignal;
use crate::app::App;
use crate::bridge::Bridge;
use crate::clock;
use crate::config::RuntimeConfig;
use crate::error::describe;
use crate::status::ProcessStatus;

/// A spawn request.
#[derive(Clone, Default)]
pub struct ProcessParams {
    /// Pid of the spawning process; empty for processes started by the host.
    pub parent_id: String,
    /// Selects `<routine_dir>/<routine_name>.<ext>` in the app's mount.
    pub routine_name: String,
    /// Exposed to the routine as the global `input` table.
    pub input: Option<Arc<dyn Folder>>,
}

impl ProcessParams {
    pub fn new(routine_name: impl Into<String>) -> Self {
        Self {
            routine_name: routine_name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = parent_id.into();
        self
    }

    #[must_use]
    pub fn with_input(mut self, input: Arc<dyn Folder>) -> Self {
        self.input = Some(input);
        self
    }
}

impl fmt::Debug for ProcessParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessParams")
            .field("parent_id", &self.parent_id)
            .field("routine_name", &self.routine_name)
            .field("input", &self.input.as_ref().map(|i| i.children()))
            .finish()
    }
}

/// One running (or finished) execution of a routine.
pub struct Process {
    app: Weak<App>,
    app_name: String,
    params: ProcessParams,
    pid: String,
    start_time: String,
    end_time: OnceLock<String>,
    status: watch::Sender<ProcessStatus>,
    abort: AbortSignal,
}

impl Process {
    pub(crate) fn new(app: &Arc<App>, pid: String, params: ProcessParams) -> Self {
        let (status, _rx) = watch::channel(ProcessStatus::Pending);
        Self {
            app: Arc::downgrade(app),
            app_name: app.name().to_string(),
            params,
            pid,
            start_time: clock::precise_now(),
            end_time: OnceLock::new(),
            status,
            abort: AbortSignal::new(),
        }
    }

    pub fn pid(&self) -> &str {
        &self.pid
    }

    pub fn params(&self) -> &ProcessParams {
        &self.params
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// The owning app, while it is alive.
    pub fn app(&self) -> Option<Arc<App>> {
        self.app.upgrade()
    }

    pub fn status(&self) -> ProcessStatus {
        self.status.borrow().clone()
    }

    pub fn start_time(&self) -> &str {
        &self.start_time
    }

    /// Set once the worker exits, whatever the outcome.
    pub fn end_time(&self) -> Option<&str> {
        self.end_time.get().map(|s| s.as_str())
    }

    pub fn abort_time(&self) -> Option<String> {
        self.abort.requested_at()
    }

    /// Ask the process to abort at its next syscall boundary.
    ///
    /// Returns `false` if an abort was already requested.
    pub fn request_abort(&self) -> bool {
        let requested = self.abort.request(clock::precise_now());
        if requested {
            tracing::info!(app = %self.app_name, pid = %self.pid, "abort requested");
        }
        requested
    }

    /// Watch status changes.
    pub fn subscribe(&self) -> watch::Receiver<ProcessStatus> {
        self.status.subscribe()
    }

    /// Wait until the status satisfies `pred`, returning that status.
    pub async fn wait_for(&self, pred: impl FnMut(&ProcessStatus) -> bool) -> ProcessStatus {
        let mut rx = self.status.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let status = match rx.wait_for(pred).await {
            Ok(status) => status.clone(),
            Err(_) => self.status(),
        };
        status
    }

    /// Wait until the process reaches a terminal status.
    pub async fn wait_terminal(&self) -> ProcessStatus {
        self.wait_for(ProcessStatus::is_terminal).await
    }

    pub(crate) fn abort_signal(&self) -> &AbortSignal {
        &self.abort
    }

    /// Publish a new status. Ignored once the status is terminal.
    pub(crate) fn set_status(&self, next: ProcessStatus) -> bool {
        self.status.send_if_modified(|current| {
            if current.is_terminal() {
                return false;
            }
            *current = next;
            true
        })
    }

    /// Record the end time, then publish the terminal status so observers
    /// woken by it always see an end time.
    pub(crate) fn finish(&self, outcome: ProcessStatus) {
        let _ = self.end_time.set(clock::precise_now());
        self.set_status(outcome);
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("app", &self.app_name)
            .field("pid", &self.pid)
            .field("routine", &self.params.routine_name)
            .field("status", &self.status())
            .finish()
    }
}

/// Processes are observable as read-only folders of strings.
impl Folder for Process {
    fn name(&self) -> String {
        self.pid.clone()
    }

    fn children(&self) -> Vec<String> {
        let mut names: Vec<String> = ["ProcessID", "ParentID", "RoutineName", "Status", "StartTime"]
            .into_iter()
            .map(String::from)
            .collect();
        if self.end_time().is_some() {
            names.push("EndTime".to_string());
        }
        if self.abort.is_requested() {
            names.push("AbortTime".to_string());
        }
        names
    }

    fn fetch(&self, name: &str) -> Option<Entry> {
        let value = match name {
            "ProcessID" => self.pid.clone(),
            "ParentID" => self.params.parent_id.clone(),
            "RoutineName" => self.params.routine_name.clone(),
            "Status" => self.status().to_string(),
            "StartTime" => self.start_time.clone(),
            "EndTime" => self.end_time()?.to_string(),
            "AbortTime" => self.abort_time()?,
            _ => return None,
        };
        Some(Entry::String(StringEntry::new(name, value)))
    }

    fn put(&self, _name: &str, _entry: Option<Entry>) -> bool {
        false
    }
}

/// Execution worker: run `process` to a terminal status.
///
/// Runs on a dedicated thread outside the runtime; suspending syscalls
/// block on the runtime handle.
pub(crate) fn execute(app: Arc<App>, process: Arc<Process>) {
    tracing::info!(
        app = %process.app_name,
        pid = %process.pid,
        routine = %process.params.routine_name,
        parent = %process.params.parent_id,
        "starting routine"
    );

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| evaluate(&app, &process)))
        .unwrap_or_else(|_| ProcessStatus::Terminated("routine worker panicked".to_string()));

    tracing::info!(
        app = %process.app_name,
        pid = %process.pid,
        routine = %process.params.routine_name,
        status = %outcome,
        "routine finished"
    );
    process.finish(outcome);
}

fn evaluate(app: &Arc<App>, process: &Arc<Process>) -> ProcessStatus {
    let config = app.runtime().config();
    let source_path = config.routine_path(&process.params.routine_name);
    let Some(source) = app.context().get_file(&source_path) else {
        return ProcessStatus::Failed(format!("file {} not found", source_path));
    };
    let source = source.read_all();

    let lua = match new_state(config) {
        Ok(lua) => lua,
        Err(e) => {
            return ProcessStatus::Failed(format!(
                "couldn't create script environment: {}",
                describe(&e)
            ))
        }
    };

    let bridge = Rc::new(Bridge::new(app.clone(), process.clone()));
    if let Err(e) = bridge.install(&lua) {
        return ProcessStatus::Failed(format!("couldn't install syscalls: {}", describe(&e)));
    }
    if let Some(input) = &process.params.input {
        if let Err(reason) = bridge.install_input(&lua, input.as_ref()) {
            return ProcessStatus::Failed(reason);
        }
    }

    process.set_status(ProcessStatus::Running);
    let result = lua
        .load(source.to_vec())
        .set_name(format!("={}", source_path))
        .exec();

    if bridge.abort_observed() {
        return ProcessStatus::Aborted;
    }
    match result {
        Ok(()) => ProcessStatus::Completed,
        Err(e) => ProcessStatus::Terminated(describe(&e)),
    }
}

fn new_state(config: &RuntimeConfig) -> mlua::Result<Lua> {
    if config.sandbox_stdlib {
        Lua::new_with(
            StdLib::TABLE | StdLib::STRING | StdLib::MATH | StdLib::UTF8 | StdLib::COROUTINE,
            LuaOptions::new(),
        )
    } else {
        Ok(Lua::new())
    }
}
