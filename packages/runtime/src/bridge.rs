//! The syscall bridge: the `ctx` table routines talk to the runtime through.
//!
//! Every syscall first checks whether an abort has been requested and, if
//! so, raises [`SyscallError::AbortRequested`]. Syscalls that suspend
//! (`sleep`, `invoke`, `import`) check again when they resume, so an abort
//! that lands while suspended is noticed before the routine continues.
//!
//! Paths are `[handle,] segment...`; see [`resolve_path`].

use std::cell::Cell;
use std::future::Future;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use mlua::{Lua, MultiValue, Table, Value};
use skyrun_namespace::{mkdirp, Context, Entry, Enumerator, Folder};

use crate::app::App;
use crate::clock;
use crate::error::SyscallError;
use crate::handles::HandleTable;
use crate::marshal::{coerce_integer, coerce_text, Marshaler};
use crate::process::{Process, ProcessParams};
use crate::resolve::resolve_path;
use crate::resolver::open_wire;
use crate::status::ProcessStatus;

/// Log target for `ctx.log` lines.
pub const ROUTINE_LOG_TARGET: &str = "skyrun::routine";

type Syscall = fn(&Bridge, &Lua, Vec<Value>) -> mlua::Result<MultiValue>;

/// Per-process syscall state. Lives on the worker thread only.
pub(crate) struct Bridge {
    app: Arc<App>,
    process: Arc<Process>,
    handles: HandleTable,
    abort_observed: Cell<bool>,
}

impl Bridge {
    pub(crate) fn new(app: Arc<App>, process: Arc<Process>) -> Self {
        Self {
            app,
            process,
            handles: HandleTable::new(),
            abort_observed: Cell::new(false),
        }
    }

    /// Whether the routine was ever told it is being aborted.
    ///
    /// Once observed, the process ends `Aborted` even if the routine caught
    /// the error and finished normally.
    pub(crate) fn abort_observed(&self) -> bool {
        self.abort_observed.get()
    }

    /// Install the global `ctx` table into `lua`.
    pub(crate) fn install(self: &Rc<Self>, lua: &Lua) -> mlua::Result<()> {
        let ctx = lua.create_table()?;
        let syscalls: [(&'static str, Syscall); 13] = [
            ("startRoutine", Self::start_routine),
            ("mkdirp", Self::mkdirp),
            ("import", Self::import),
            ("read", Self::read),
            ("readDir", Self::read_dir),
            ("store", Self::store),
            ("unlink", Self::unlink),
            ("invoke", Self::invoke),
            ("enumerate", Self::enumerate),
            ("log", Self::log),
            ("sleep", Self::sleep),
            ("timestamp", Self::timestamp),
            ("splitString", Self::split_string),
        ];
        for (name, op) in syscalls {
            self.register(lua, &ctx, name, op)?;
        }
        lua.globals().set("ctx", ctx)
    }

    /// Expose the process input as the global `input` table.
    ///
    /// Each child is converted on its own so a bad entry can be named.
    pub(crate) fn install_input(&self, lua: &Lua, input: &dyn Folder) -> Result<(), String> {
        let marshaler = self.marshaler();
        let unrecognized = |key: &str| format!("input entry {} wasn't a recognizable type", key);

        let table = lua.create_table().map_err(|_| unrecognized("input"))?;
        for key in input.children() {
            let value = marshaler
                .to_lua(lua, input.fetch(&key).as_ref())
                .map_err(|_| unrecognized(&key))?;
            table.set(key.as_str(), value).map_err(|_| unrecognized(&key))?;
        }
        lua.globals()
            .set("input", table)
            .map_err(|_| unrecognized("input"))
    }

    fn register(self: &Rc<Self>, lua: &Lua, table: &Table, name: &'static str, op: Syscall) -> mlua::Result<()> {
        let bridge = Rc::clone(self);
        let function = lua.create_function(move |lua, args: MultiValue| {
            bridge.check_health()?;
            tracing::trace!(app = %bridge.app.name(), pid = %bridge.process.pid(), syscall = name, "syscall");
            op(&bridge, lua, args.into_iter().collect())
        })?;
        table.set(name, function)
    }

    fn check_health(&self) -> Result<(), SyscallError> {
        match self.process.abort_time() {
            Some(at) => {
                self.abort_observed.set(true);
                Err(SyscallError::AbortRequested(at))
            }
            None => Ok(()),
        }
    }

    fn marshaler(&self) -> Marshaler<'_> {
        Marshaler::new(&self.handles, self.app.runtime().config().max_marshal_depth)
    }

    fn resolve(&self, args: &[Value]) -> mlua::Result<(Context, String)> {
        resolve_path(args, &self.handles, self.app.context())
    }

    /// Suspend the routine on `fut` with `status` published, then resume.
    fn suspend<F: Future>(&self, status: ProcessStatus, fut: F) -> Result<F::Output, SyscallError> {
        self.process.set_status(status);
        let output = self.app.runtime().handle().block_on(fut);
        self.process.set_status(ProcessStatus::Running);
        self.check_health()?;
        Ok(output)
    }

    fn start_routine(&self, _lua: &Lua, args: Vec<Value>) -> mlua::Result<MultiValue> {
        let routine_name = string_arg(&args, 0, "startRoutine")?;
        // Only a table becomes input; anything else is ignored.
        let input = match args.get(1) {
            Some(value @ Value::Table(_)) => match self.marshaler().to_entry(value)? {
                Some(Entry::Folder(folder)) => Some(folder),
                _ => None,
            },
            _ => None,
        };

        let mut params = ProcessParams::new(routine_name).with_parent(self.process.pid());
        params.input = input;
        if self.app.start_routine(params).is_none() {
            tracing::debug!(app = %self.app.name(), pid = %self.process.pid(), "spawn refused");
        }
        Ok(MultiValue::new())
    }

    fn mkdirp(&self, lua: &Lua, args: Vec<Value>) -> mlua::Result<MultiValue> {
        let (ctx, path) = self.resolve(&args)?;
        if !mkdirp(&ctx, &path) {
            return Err(SyscallError::MkdirpFailed(path).into());
        }
        let name = format!("{}{}", ctx.name(), path);
        let Some(sub) = ctx.subcontext(&path, name) else {
            return Err(SyscallError::MkdirpMissing(path).into());
        };
        one(self.handles.push(lua, sub)?)
    }

    fn import(&self, lua: &Lua, args: Vec<Value>) -> mlua::Result<MultiValue> {
        let uri = string_arg(&args, 0, "import")?;
        let resolver = Arc::clone(self.app.runtime().resolver());
        let imported = self.suspend(
            ProcessStatus::Waiting {
                reason: format!("Dialing {}", uri),
            },
            async { open_wire(resolver.as_ref(), &uri).await },
        )?;
        match imported {
            Some(ctx) => one(self.handles.push(lua, ctx)?),
            None => {
                tracing::warn!(app = %self.app.name(), pid = %self.process.pid(), uri = %uri, "import failed");
                one(Value::Nil)
            }
        }
    }

    fn read(&self, lua: &Lua, args: Vec<Value>) -> mlua::Result<MultiValue> {
        let (ctx, path) = self.resolve(&args)?;
        let value = ctx.get_string(&path).map(|s| s.value).unwrap_or_default();
        one(Value::String(lua.create_string(&value)?))
    }

    fn read_dir(&self, lua: &Lua, args: Vec<Value>) -> mlua::Result<MultiValue> {
        let (ctx, path) = self.resolve(&args)?;
        match ctx.get_folder(&path) {
            Some(folder) => one(self.marshaler().to_lua(lua, Some(&Entry::Folder(folder)))?),
            None => one(Value::Table(lua.create_table()?)),
        }
    }

    fn store(&self, _lua: &Lua, mut args: Vec<Value>) -> mlua::Result<MultiValue> {
        let value = args.pop().unwrap_or(Value::Nil);
        let Some(entry) = self.marshaler().to_entry(&value)? else {
            return Err(SyscallError::StoreNil.into());
        };
        let (ctx, path) = self.resolve(&args)?;
        one(Value::Boolean(ctx.put(&path, Some(entry))))
    }

    fn unlink(&self, _lua: &Lua, args: Vec<Value>) -> mlua::Result<MultiValue> {
        let (ctx, path) = self.resolve(&args)?;
        one(Value::Boolean(ctx.put(&path, None)))
    }

    fn invoke(&self, lua: &Lua, mut args: Vec<Value>) -> mlua::Result<MultiValue> {
        let input = args.pop().unwrap_or(Value::Nil);
        let input = self.marshaler().to_entry(&input)?;
        let (ctx, path) = self.resolve(&args)?;

        let target = format!("{}{}", ctx.name(), path);
        let Some(function) = ctx.get_function(&format!("{}/invoke", path)) else {
            return Err(SyscallError::FunctionMissing(target).into());
        };

        let caller = self.app.context().clone();
        let output = self.suspend(
            ProcessStatus::Blocked {
                reason: format!("Invoking {} since {}", target, clock::precise_now()),
            },
            async move { function.invoke(&caller, input).await },
        )?;

        match output {
            None => one(Value::Nil),
            Some(Entry::String(s)) => one(Value::String(lua.create_string(&s.value)?)),
            Some(other) => one(self.handles.push(lua, Context::new("output:/", other))?),
        }
    }

    fn enumerate(&self, lua: &Lua, args: Vec<Value>) -> mlua::Result<MultiValue> {
        let (ctx, path) = self.resolve(&args)?;
        let Some(root) = ctx.get(&path) else {
            return Err(SyscallError::EnumerationMissing(format!("{}{}", ctx.name(), path)).into());
        };

        let results = lua.create_table()?;
        for (i, row) in Enumerator::new(root, 1).run().into_iter().skip(1).enumerate() {
            let item = lua.create_table()?;
            item.set("name", row.base_name())?;
            item.set("path", row.name.as_str())?;
            item.set("type", row.kind.as_str())?;
            item.set("stringValue", row.string_value.as_str())?;
            results.set(i + 1, item)?;
        }
        one(Value::Table(results))
    }

    fn log(&self, _lua: &Lua, args: Vec<Value>) -> mlua::Result<MultiValue> {
        let marshaler = self.marshaler();
        let line = args
            .iter()
            .map(|v| marshaler.display(v))
            .collect::<Vec<_>>()
            .join(" ");
        tracing::info!(
            target: ROUTINE_LOG_TARGET,
            app = %self.app.name(),
            pid = %self.process.pid(),
            routine = %self.process.params().routine_name,
            "{}",
            line
        );
        Ok(MultiValue::new())
    }

    fn sleep(&self, _lua: &Lua, args: Vec<Value>) -> mlua::Result<MultiValue> {
        let ms = match args.first() {
            Some(value) => coerce_integer(value).ok_or_else(|| {
                bad_argument("sleep", 1, format!("integer expected, got {}", value.type_name()))
            })?,
            None => return Err(bad_argument("sleep", 1, "integer expected, got no value")),
        };
        let duration = Duration::from_millis(ms.max(0) as u64);
        let abort = self.process.abort_signal();

        self.suspend(
            ProcessStatus::Sleeping {
                since: clock::precise_now(),
            },
            async {
                tokio::select! {
                    _ = tokio::time::sleep(duration) => {}
                    _ = abort.requested() => {}
                }
            },
        )?;
        Ok(MultiValue::new())
    }

    fn timestamp(&self, lua: &Lua, _args: Vec<Value>) -> mlua::Result<MultiValue> {
        one(Value::String(lua.create_string(clock::routine_timestamp())?))
    }

    fn split_string(&self, lua: &Lua, args: Vec<Value>) -> mlua::Result<MultiValue> {
        let text = string_arg(&args, 0, "splitString")?;
        let separator = string_arg(&args, 1, "splitString")?;
        let parts: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            text.split(separator.as_str()).map(String::from).collect()
        };
        one(Value::Table(lua.create_sequence_from(parts)?))
    }
}

fn one(value: Value) -> mlua::Result<MultiValue> {
    Ok(MultiValue::from_vec(vec![value]))
}

fn bad_argument(syscall: &'static str, position: usize, message: impl Into<String>) -> mlua::Error {
    SyscallError::BadArgument {
        syscall,
        position,
        message: message.into(),
    }
    .into()
}

/// A string argument. Numbers are accepted as their text, like path
/// segments are.
fn string_arg(args: &[Value], index: usize, syscall: &'static str) -> mlua::Result<String> {
    match args.get(index) {
        Some(value) => coerce_text(value).ok_or_else(|| {
            bad_argument(
                syscall,
                index + 1,
                format!("string expected, got {}", value.type_name()),
            )
        }),
        None => Err(bad_argument(syscall, index + 1, "string expected, got no value")),
    }
}
