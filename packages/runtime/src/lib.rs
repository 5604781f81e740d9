//! # skyrun runtime
//!
//! Runs apps described by a chart. A chart is a namespace with an `/apps`
//! folder; each child of `/apps` is an app whose code lives in
//! `routines/*.lua`. Opening a session mounts every app and starts its
//! `launch` routine.
//!
//! ## Processes
//!
//! Each routine execution is a [`Process`] with a pid unique within its app,
//! a status string and timestamps. Each process runs on its own thread
//! with its own Lua state; nothing is shared between routines except the
//! namespace.
//!
//! Routines reach the outside world only through the `ctx` table:
//!
//! ```lua
//! local n = tonumber(ctx.read("state", "counter")) or 0
//! ctx.store("state", "counter", n + 1)
//! ctx.log("counter is now", n + 1)
//! ctx.sleep(1000)
//! ctx.startRoutine("launch")
//! ```
//!
//! ## Restart
//!
//! [`App::restart`] asks every live process to abort, waits until all of
//! them have finished, wipes `/state` and `/export`, and starts `launch`
//! again with pids counting from 0. Aborts are cooperative: a process
//! notices at its next syscall, and a sleeping process wakes at once.
//!
//! ```text
//!   Runtime ── open_session ──> Session
//!                                 ├── App "irc"   (mount, registry)
//!                                 │     ├── Process 0  launch
//!                                 │     └── Process 1  connect
//!                                 └── App "web"
//! ```

mod abort;
mod app;
mod bridge;
pub mod clock;
mod config;
mod error;
mod handles;
mod marshal;
mod process;
mod resolve;
mod resolver;
mod runtime;
mod session;
mod status;

pub use abort::AbortSignal;
pub use app::App;
pub use bridge::ROUTINE_LOG_TARGET;
pub use config::RuntimeConfig;
pub use error::{Result, RuntimeError, SyscallError};
pub use handles::{ContextHandle, HandleTable};
pub use marshal::Marshaler;
pub use process::{Process, ProcessParams};
pub use resolve::resolve_path;
pub use resolver::{open_wire, MemoryResolver, Resolver};
pub use runtime::Runtime;
pub use session::Session;
pub use status::{AppStatus, ProcessStatus, SessionStatus};
