//! Lifecycle states for processes, apps and sessions.
//!
//! ```text
//! Pending -> Running <-> {Sleeping, Blocked, Waiting}
//!         \-> Failed          Running -> {Completed | Terminated | Aborted}
//! ```

use std::fmt;

/// State of a process.
///
/// `Display` renders the status strings exposed to observers, e.g.
/// `Sleeping: Since <ts>` or `Terminated: <message>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessStatus {
    /// Spawned, worker not yet evaluating.
    Pending,
    /// Evaluating the routine.
    Running,
    /// Inside `sleep`, since the given timestamp.
    Sleeping { since: String },
    /// Inside `invoke`.
    Blocked { reason: String },
    /// Inside `import`.
    Waiting { reason: String },
    /// The routine returned normally.
    Completed,
    /// The routine raised an error.
    Terminated(String),
    /// The routine could not be started.
    Failed(String),
    /// The routine observed an abort request.
    Aborted,
}

impl ProcessStatus {
    /// Terminal statuses never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProcessStatus::Completed
                | ProcessStatus::Terminated(_)
                | ProcessStatus::Failed(_)
                | ProcessStatus::Aborted
        )
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessStatus::Pending => write!(f, "Pending"),
            ProcessStatus::Running => write!(f, "Running"),
            ProcessStatus::Sleeping { since } => write!(f, "Sleeping: Since {}", since),
            ProcessStatus::Blocked { reason } => write!(f, "Blocked: {}", reason),
            ProcessStatus::Waiting { reason } => write!(f, "Waiting: {}", reason),
            ProcessStatus::Completed => write!(f, "Completed"),
            ProcessStatus::Terminated(message) => write!(f, "Terminated: {}", message),
            ProcessStatus::Failed(reason) => write!(f, "Failed: {}", reason),
            ProcessStatus::Aborted => write!(f, "Aborted"),
        }
    }
}

/// State of an app. Only `Pending` and `Ready` accept new processes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppStatus {
    /// Mount built, launch routine not yet started.
    Pending,
    Ready,
    /// Draining processes for a stop or restart.
    Stopping,
    Stopped,
    /// The app could not be mounted and was never launched.
    Failed(String),
}

impl AppStatus {
    pub fn accepts_spawns(&self) -> bool {
        matches!(self, AppStatus::Pending | AppStatus::Ready)
    }
}

impl fmt::Display for AppStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppStatus::Pending => write!(f, "Pending"),
            AppStatus::Ready => write!(f, "Ready"),
            AppStatus::Stopping => write!(f, "Stopping"),
            AppStatus::Stopped => write!(f, "Stopped"),
            AppStatus::Failed(reason) => write!(f, "Failed: {}", reason),
        }
    }
}

/// State of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    /// The chart is being resolved and apps are being mounted.
    Opening,
    Open,
    Failed(String),
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Opening => write!(f, "Opening"),
            SessionStatus::Open => write!(f, "Open"),
            SessionStatus::Failed(reason) => write!(f, "Failed: {}", reason),
        }
    }
}
