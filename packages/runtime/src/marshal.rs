//! Conversion between Lua values and namespace entries.
//!
//! Lua to entry:
//!
//! | Lua value | entry |
//! |---|---|
//! | nil | absent |
//! | string | String tagged `string` |
//! | number | String tagged `number`, canonical decimal text |
//! | boolean | String tagged `boolean`, `yes`/`no` |
//! | table | Folder, nil slots omitted |
//! | context handle | the entry at the context's root, by reference |
//!
//! Entry to Lua: strings become strings (the tag is dropped), folders
//! become tables keyed by child name. Tags are write-only, so a stored
//! `42` reads back as the string `"42"`.

use std::sync::Arc;

use mlua::{Lua, Table, Value};
use skyrun_namespace::{canonical_number, Entry, Folder, MemFolder, StringEntry};

use crate::error::SyscallError;
use crate::handles::HandleTable;

/// Name given to folders built from top-level tables.
const TABLE_FOLDER_NAME: &str = "input";

/// Converts values for one routine.
pub struct Marshaler<'a> {
    handles: &'a HandleTable,
    max_depth: usize,
}

impl<'a> Marshaler<'a> {
    pub fn new(handles: &'a HandleTable, max_depth: usize) -> Self {
        Self { handles, max_depth }
    }

    /// Convert a Lua value into an entry. `nil` converts to `None`.
    pub fn to_entry(&self, value: &Value) -> mlua::Result<Option<Entry>> {
        self.value_to_entry(TABLE_FOLDER_NAME, value, 0)
    }

    /// Convert an entry (or absence) into a Lua value.
    pub fn to_lua(&self, lua: &Lua, entry: Option<&Entry>) -> mlua::Result<Value> {
        self.entry_to_lua(lua, entry, 0)
    }

    fn value_to_entry(&self, name: &str, value: &Value, depth: usize) -> mlua::Result<Option<Entry>> {
        let tagged = match value {
            Value::Nil => return Ok(None),
            Value::String(s) => StringEntry::text(lua_text(s)),
            Value::Integer(i) => StringEntry::integer(*i),
            Value::Number(n) => StringEntry::number(*n),
            Value::Boolean(b) => StringEntry::boolean(*b),
            Value::Table(table) => return self.table_to_folder(name, table, depth).map(Some),
            Value::UserData(_) => {
                return match self.handles.lookup(value) {
                    Some(ctx) => {
                        let ctx = ctx?;
                        tracing::debug!(context = ctx.name(), "routine passed a context by reference");
                        Ok(ctx.get("."))
                    }
                    None => Err(SyscallError::UnsupportedValue(value.type_name().to_string()).into()),
                };
            }
            other => return Err(SyscallError::UnsupportedValue(other.type_name().to_string()).into()),
        };
        Ok(Some(Entry::String(tagged)))
    }

    fn table_to_folder(&self, name: &str, table: &Table, depth: usize) -> mlua::Result<Entry> {
        if depth >= self.max_depth {
            return Err(SyscallError::TooDeep(self.max_depth).into());
        }
        let folder = MemFolder::new(name);
        for pair in table.clone().pairs::<Value, Value>() {
            let (key, value) = pair?;
            let Some(key) = coerce_text(&key) else {
                return Err(SyscallError::UnsupportedValue(format!(
                    "{} (as table key)",
                    key.type_name()
                ))
                .into());
            };
            if let Some(child) = self.value_to_entry(&key, &value, depth + 1)? {
                folder.put(&key, Some(child));
            }
        }
        Ok(Entry::Folder(Arc::new(folder)))
    }

    fn entry_to_lua(&self, lua: &Lua, entry: Option<&Entry>, depth: usize) -> mlua::Result<Value> {
        match entry {
            None => Ok(Value::Nil),
            Some(Entry::String(s)) => Ok(Value::String(lua.create_string(&s.value)?)),
            Some(Entry::Folder(folder)) => {
                if depth >= self.max_depth {
                    return Err(SyscallError::TooDeep(self.max_depth).into());
                }
                self.folder_to_table(lua, folder.as_ref(), depth).map(Value::Table)
            }
            Some(other) => Err(SyscallError::UnrepresentableEntry {
                name: other.name(),
                kind: other.kind(),
            }
            .into()),
        }
    }

    fn folder_to_table(&self, lua: &Lua, folder: &dyn Folder, depth: usize) -> mlua::Result<Table> {
        let table = lua.create_table()?;
        for key in folder.children() {
            // Keyed by child name, not entry name: tagged strings carry
            // their tag as their name.
            let value = self.entry_to_lua(lua, folder.fetch(&key).as_ref(), depth + 1)?;
            table.set(key, value)?;
        }
        Ok(table)
    }

    /// Render a value for `ctx.log`.
    ///
    /// Strings and numbers print as text, context handles print as their
    /// context name, and everything else prints as a type tag.
    pub fn display(&self, value: &Value) -> String {
        if let Some(text) = coerce_text(value) {
            return text;
        }
        match self.handles.lookup(value) {
            Some(Ok(ctx)) => ctx.name().to_string(),
            _ => format!("[lua {}]", value.type_name()),
        }
    }
}

/// Lua strings are byte strings; non-UTF-8 bytes are replaced.
pub(crate) fn lua_text(s: &mlua::String) -> String {
    s.to_string_lossy().into()
}

/// Text of a string or number argument. Numbers use their canonical
/// decimal form, so `2.0` and `2` name the same thing.
pub(crate) fn coerce_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(lua_text(s)),
        Value::Integer(i) => Some(i.to_string()),
        Value::Number(n) => Some(canonical_number(*n)),
        _ => None,
    }
}

/// An integral number, or a string holding one.
pub(crate) fn coerce_integer(value: &Value) -> Option<i64> {
    let integral = |n: f64| (n.fract() == 0.0 && n.is_finite()).then_some(n as i64);
    match value {
        Value::Integer(i) => Some(*i),
        Value::Number(n) => integral(*n),
        Value::String(s) => {
            let text = lua_text(s);
            let text = text.trim();
            text.parse::<i64>()
                .ok()
                .or_else(|| text.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyrun_namespace::{Context, LinkEntry};

    fn setup() -> (Lua, HandleTable) {
        (Lua::new(), HandleTable::new())
    }

    fn eval(lua: &Lua, src: &str) -> Value {
        lua.load(src).eval().unwrap()
    }

    #[test]
    fn scalars_become_tagged_strings() {
        let (lua, handles) = setup();
        let m = Marshaler::new(&handles, 8);

        let s = m.to_entry(&eval(&lua, "'hi'")).unwrap().unwrap();
        assert_eq!(s.as_string().unwrap(), &StringEntry::text("hi"));

        let n = m.to_entry(&eval(&lua, "42")).unwrap().unwrap();
        assert_eq!(n.as_string().unwrap(), &StringEntry::integer(42));

        let f = m.to_entry(&eval(&lua, "42.0")).unwrap().unwrap();
        assert_eq!(f.as_string().unwrap().value, "42");

        let b = m.to_entry(&eval(&lua, "false")).unwrap().unwrap();
        assert_eq!(b.as_string().unwrap(), &StringEntry::boolean(false));

        assert!(m.to_entry(&Value::Nil).unwrap().is_none());
    }

    #[test]
    fn tables_become_folders_without_nil_slots() {
        let (lua, handles) = setup();
        let m = Marshaler::new(&handles, 8);

        let entry = m
            .to_entry(&eval(&lua, "{ nick = 'sky', port = 6667, nested = { on = true }, gone = nil, 'first' }"))
            .unwrap()
            .unwrap();
        let ctx = Context::new("t:/", entry);
        assert_eq!(ctx.get_string("nick").unwrap().value, "sky");
        assert_eq!(ctx.get_string("port").unwrap().value, "6667");
        assert_eq!(ctx.get_string("nested/on").unwrap().value, "yes");
        assert_eq!(ctx.get_string("1").unwrap().value, "first");
        assert!(ctx.get("gone").is_none());
    }

    #[test]
    fn functions_are_unsupported() {
        let (lua, handles) = setup();
        let m = Marshaler::new(&handles, 8);
        let err = m.to_entry(&eval(&lua, "function() end")).unwrap_err();
        assert!(crate::error::describe(&err).contains("function"));
    }

    #[test]
    fn self_referencing_tables_hit_the_depth_limit() {
        let (lua, handles) = setup();
        let m = Marshaler::new(&handles, 4);
        let err = m.to_entry(&eval(&lua, "local t = {}; t.me = t; return t")).unwrap_err();
        assert!(crate::error::describe(&err).contains("deeper than 4"));
    }

    #[test]
    fn handles_pass_by_reference() {
        let (lua, handles) = setup();
        let folder = Arc::new(MemFolder::new("shared"));
        let value = handles
            .push(&lua, Context::new("mem://shared", Entry::Folder(folder.clone())))
            .unwrap();

        let m = Marshaler::new(&handles, 8);
        let entry = m.to_entry(&value).unwrap().unwrap();
        let Entry::Folder(got) = entry else {
            panic!("expected folder");
        };
        got.put("x", Some(Entry::string("x", "1")));
        assert!(folder.fetch("x").is_some());
    }

    #[test]
    fn entries_become_lua_values() {
        let (lua, handles) = setup();
        let m = Marshaler::new(&handles, 8);

        let folder = Arc::new(MemFolder::new("dir"));
        folder.put("a", Some(Entry::String(StringEntry::integer(1))));
        folder.put("sub", Some(MemFolder::entry("sub")));
        let value = m.to_lua(&lua, Some(&Entry::Folder(folder))).unwrap();

        let Value::Table(table) = value else {
            panic!("expected table");
        };
        assert_eq!(table.get::<String>("a").unwrap(), "1");
        assert!(matches!(table.get::<Value>("sub").unwrap(), Value::Table(_)));
        assert!(matches!(m.to_lua(&lua, None).unwrap(), Value::Nil));
    }

    #[test]
    fn links_are_unrepresentable() {
        let (lua, handles) = setup();
        let m = Marshaler::new(&handles, 8);
        let err = m
            .to_lua(&lua, Some(&Entry::Link(LinkEntry::new("l", "/x"))))
            .unwrap_err();
        assert!(crate::error::describe(&err).contains("Link"));
    }

    #[test]
    fn numeric_arguments_coerce() {
        let (lua, _) = setup();
        assert_eq!(coerce_text(&eval(&lua, "12")).as_deref(), Some("12"));
        assert_eq!(coerce_text(&eval(&lua, "2.0")).as_deref(), Some("2"));
        assert_eq!(coerce_text(&Value::Boolean(true)), None);

        assert_eq!(coerce_integer(&eval(&lua, "'250'")), Some(250));
        assert_eq!(coerce_integer(&eval(&lua, "' 10.0 '")), Some(10));
        assert_eq!(coerce_integer(&eval(&lua, "3.0")), Some(3));
        assert_eq!(coerce_integer(&eval(&lua, "3.5")), None);
        assert_eq!(coerce_integer(&eval(&lua, "'soon'")), None);
        assert_eq!(coerce_integer(&Value::Nil), None);
    }

    #[test]
    fn display_for_log() {
        let (lua, handles) = setup();
        let handle = handles
            .push(&lua, Context::new("mem://named", MemFolder::entry("x")))
            .unwrap();
        let m = Marshaler::new(&handles, 8);
        assert_eq!(m.display(&eval(&lua, "'text'")), "text");
        assert_eq!(m.display(&eval(&lua, "7")), "7");
        assert_eq!(m.display(&eval(&lua, "2.5")), "2.5");
        assert_eq!(m.display(&handle), "mem://named");
        assert_eq!(m.display(&eval(&lua, "{}")), "[lua table]");
        assert_eq!(m.display(&Value::Boolean(true)), "[lua boolean]");
    }
}
