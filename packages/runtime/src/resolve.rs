//! Turning syscall arguments into a `(Context, path)` pair.

use mlua::Value;
use skyrun_namespace::Context;

use crate::error::SyscallError;
use crate::handles::HandleTable;
use crate::marshal::coerce_text;

/// Resolve `[handle,] segment...` into a base context and a path.
///
/// A leading context handle becomes the base; otherwise `default` is.
/// Remaining arguments are joined with `/` behind a leading `/`; no
/// segments yields the empty path, naming the base itself. Numbers are
/// accepted as segments the way Lua's own string coercion accepts them.
pub fn resolve_path(
    args: &[Value],
    handles: &HandleTable,
    default: &Context,
) -> mlua::Result<(Context, String)> {
    let (ctx, rest) = match args.split_first() {
        Some((first, rest)) => match handles.lookup(first) {
            Some(ctx) => (ctx?, rest),
            None => (default.clone(), args),
        },
        None => (default.clone(), args),
    };

    let offset = args.len() - rest.len();
    let mut segments = Vec::with_capacity(rest.len());
    for (i, arg) in rest.iter().enumerate() {
        let Some(segment) = coerce_text(arg) else {
            return Err(SyscallError::InvalidPathArgument {
                position: offset + i + 1,
                type_name: arg.type_name(),
            }
            .into());
        };
        segments.push(segment);
    }

    let path = if segments.is_empty() {
        String::new()
    } else {
        format!("/{}", segments.join("/"))
    };
    Ok((ctx, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlua::Lua;
    use skyrun_namespace::MemFolder;

    fn strings(lua: &Lua, parts: &[&str]) -> Vec<Value> {
        parts
            .iter()
            .map(|p| Value::String(lua.create_string(p).unwrap()))
            .collect()
    }

    #[test]
    fn defaults_to_app_context() {
        let lua = Lua::new();
        let handles = HandleTable::new();
        let app = Context::new("app:/demo", MemFolder::entry("demo"));

        let (ctx, path) = resolve_path(&strings(&lua, &["state", "counter"]), &handles, &app).unwrap();
        assert_eq!(ctx.name(), "app:/demo");
        assert_eq!(path, "/state/counter");
    }

    #[test]
    fn leading_handle_is_consumed() {
        let lua = Lua::new();
        let handles = HandleTable::new();
        let app = Context::new("app:/demo", MemFolder::entry("demo"));
        let handle = handles
            .push(&lua, Context::new("mem://other", MemFolder::entry("other")))
            .unwrap();

        let mut args = vec![handle];
        args.extend(strings(&lua, &["x"]));
        let (ctx, path) = resolve_path(&args, &handles, &app).unwrap();
        assert_eq!(ctx.name(), "mem://other");
        assert_eq!(path, "/x");
    }

    #[test]
    fn no_segments_is_empty_path() {
        let handles = HandleTable::new();
        let app = Context::new("app:/demo", MemFolder::entry("demo"));
        let (_, path) = resolve_path(&[], &handles, &app).unwrap();
        assert_eq!(path, "");
    }

    #[test]
    fn numbers_are_segments() {
        let lua = Lua::new();
        let handles = HandleTable::new();
        let app = Context::new("app:/demo", MemFolder::entry("demo"));
        let mut args = strings(&lua, &["processes"]);
        args.push(Value::Integer(0));
        let (_, path) = resolve_path(&args, &handles, &app).unwrap();
        assert_eq!(path, "/processes/0");
    }

    #[test]
    fn tables_are_rejected() {
        let lua = Lua::new();
        let handles = HandleTable::new();
        let app = Context::new("app:/demo", MemFolder::entry("demo"));
        let mut args = strings(&lua, &["state"]);
        args.push(Value::Table(lua.create_table().unwrap()));
        let err = resolve_path(&args, &handles, &app).unwrap_err();
        assert!(crate::error::describe(&err).contains("path argument 2"));
    }
}
