//! Context handles passed through Lua by reference.
//!
//! Lua never holds a `Context` directly. It holds a small userdata carrying
//! an index into the routine's handle table, and the table owns the
//! contexts. A handle is only meaningful inside the routine that created it.

use std::cell::RefCell;

use mlua::{AnyUserData, Lua, UserData, Value};
use skyrun_namespace::Context;

use crate::error::SyscallError;

/// Index of a context in a routine's [`HandleTable`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContextHandle(usize);

impl UserData for ContextHandle {}

/// Arena of contexts owned by one routine's bridge.
///
/// Handles are never freed while the routine runs; a routine's handle
/// count is bounded by the syscalls it makes.
#[derive(Default)]
pub struct HandleTable {
    contexts: RefCell<Vec<Context>>,
}

impl HandleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, ctx: Context) -> ContextHandle {
        let mut contexts = self.contexts.borrow_mut();
        contexts.push(ctx);
        ContextHandle(contexts.len() - 1)
    }

    pub fn get(&self, handle: ContextHandle) -> Option<Context> {
        self.contexts.borrow().get(handle.0).cloned()
    }

    /// Register `ctx` and wrap its handle as a Lua value.
    pub fn push(&self, lua: &Lua, ctx: Context) -> mlua::Result<Value> {
        let handle = self.insert(ctx);
        Ok(Value::UserData(lua.create_userdata(handle)?))
    }

    /// The context behind `value`, if `value` is a context handle.
    ///
    /// Returns `None` for every non-handle value, including other userdata.
    pub fn lookup(&self, value: &Value) -> Option<Result<Context, SyscallError>> {
        let Value::UserData(ud) = value else {
            return None;
        };
        let handle = handle_of(ud)?;
        Some(self.get(handle).ok_or(SyscallError::UnknownHandle(handle.0)))
    }
}

fn handle_of(ud: &AnyUserData) -> Option<ContextHandle> {
    ud.borrow::<ContextHandle>().ok().map(|h| *h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyrun_namespace::MemFolder;

    #[test]
    fn handles_index_contexts() {
        let table = HandleTable::new();
        let a = table.insert(Context::new("a:/", MemFolder::entry("a")));
        let b = table.insert(Context::new("b:/", MemFolder::entry("b")));
        assert_ne!(a, b);
        assert_eq!(table.get(b).unwrap().name(), "b:/");
        assert_eq!(table.get(a).unwrap().name(), "a:/");
        assert!(table.get(ContextHandle(2)).is_none());
    }

    #[test]
    fn lookup_through_lua_values() {
        let lua = Lua::new();
        let table = HandleTable::new();
        let value = table
            .push(&lua, Context::new("mem://x", MemFolder::entry("x")))
            .unwrap();

        let ctx = table.lookup(&value).unwrap().unwrap();
        assert_eq!(ctx.name(), "mem://x");

        assert!(table.lookup(&Value::Nil).is_none());
        assert!(table.lookup(&Value::Integer(1)).is_none());
    }

    #[test]
    fn foreign_handles_are_rejected() {
        let lua = Lua::new();
        let theirs = HandleTable::new();
        theirs.insert(Context::new("a:/", MemFolder::entry("a")));
        let value = theirs
            .push(&lua, Context::new("b:/", MemFolder::entry("b")))
            .unwrap();

        let ours = HandleTable::new();
        assert!(matches!(
            ours.lookup(&value),
            Some(Err(SyscallError::UnknownHandle(1)))
        ));
    }
}
