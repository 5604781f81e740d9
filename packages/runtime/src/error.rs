//! Error types for the skyrun runtime.

use thiserror::Error;

/// Errors from setting up the runtime itself.
///
/// Routine failures never surface here: a process reports through its
/// status string only.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The runtime was created outside of a tokio runtime.
    #[error("no tokio runtime available: {0}")]
    NoReactor(#[from] tokio::runtime::TryCurrentError),

    /// The configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Errors raised by syscalls inside a routine.
///
/// Every variant unwinds the whole routine. [`SyscallError::AbortRequested`]
/// is the cancellation sentinel and ends the process `Aborted`; everything
/// else ends it `Terminated`.
#[derive(Debug, Error)]
pub enum SyscallError {
    /// The process was asked to abort.
    #[error("routine aborted at {0}")]
    AbortRequested(String),

    /// A script value has no entry representation.
    #[error("cannot store a value of type {0}")]
    UnsupportedValue(String),

    /// An entry has no script representation.
    #[error("entry {name} is a {kind}, which routines cannot read")]
    UnrepresentableEntry { name: String, kind: &'static str },

    /// A table or folder is nested deeper than the marshaler allows.
    #[error("value nested deeper than {0} levels")]
    TooDeep(usize),

    /// A path argument was neither a string nor a context handle.
    #[error("path argument {position} must be a string, got {type_name}")]
    InvalidPathArgument {
        position: usize,
        type_name: &'static str,
    },

    /// A handle does not belong to this routine.
    #[error("unknown context handle {0}")]
    UnknownHandle(usize),

    /// `store` was given nothing to store.
    #[error("store() can't store nils, use ctx.unlink()")]
    StoreNil,

    /// `mkdirp` could not create the folders.
    #[error("mkdirp() couldn't create folders for path {0}")]
    MkdirpFailed(String),

    /// `mkdirp` created the folders but could not find the result.
    #[error("mkdirp() couldn't find folder at path {0}")]
    MkdirpMissing(String),

    /// `invoke` target does not exist.
    #[error("Tried to invoke function {0} but did not exist")]
    FunctionMissing(String),

    /// `enumerate` root does not exist.
    #[error("enumeration() couldn't find path {0}")]
    EnumerationMissing(String),

    /// A syscall argument had the wrong type.
    #[error("bad argument #{position} to {syscall}: {message}")]
    BadArgument {
        syscall: &'static str,
        position: usize,
        message: String,
    },
}

impl From<SyscallError> for mlua::Error {
    fn from(e: SyscallError) -> Self {
        mlua::Error::external(e)
    }
}

/// The innermost human-readable message of a Lua evaluation error.
///
/// Callback errors wrap the original syscall error together with a
/// traceback; processes report only the cause.
pub(crate) fn describe(err: &mlua::Error) -> String {
    match err {
        mlua::Error::CallbackError { cause, .. } => describe(cause),
        mlua::Error::ExternalError(inner) => inner.to_string(),
        mlua::Error::RuntimeError(message) => message.clone(),
        other => other.to_string(),
    }
}
