//! In-memory entries.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use bytes::Bytes;

use crate::entry::{Entry, File, Folder, Function};
use crate::Context;

/// A thread-safe, in-memory folder.
///
/// Children are kept in a `BTreeMap`, so `children()` happens to be sorted,
/// but callers must not rely on that.
pub struct MemFolder {
    name: String,
    children: RwLock<BTreeMap<String, Entry>>,
}

impl MemFolder {
    /// Create an empty folder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: RwLock::new(BTreeMap::new()),
        }
    }

    /// Create a folder pre-populated with children keyed by their own names.
    pub fn with_children(name: impl Into<String>, children: impl IntoIterator<Item = Entry>) -> Self {
        let folder = Self::new(name);
        for child in children {
            folder.put(&child.name(), Some(child));
        }
        folder
    }

    /// Create an empty folder already wrapped as a shared entry.
    pub fn entry(name: impl Into<String>) -> Entry {
        Entry::Folder(Arc::new(Self::new(name)))
    }
}

impl Folder for MemFolder {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn children(&self) -> Vec<String> {
        self.children
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    fn fetch(&self, name: &str) -> Option<Entry> {
        self.children
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    fn put(&self, name: &str, entry: Option<Entry>) -> bool {
        if name.is_empty() {
            return false;
        }
        let mut children = self
            .children
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match entry {
            Some(entry) => {
                children.insert(name.to_string(), entry);
            }
            None => {
                children.remove(name);
            }
        }
        true
    }
}

impl fmt::Debug for MemFolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemFolder")
            .field("name", &self.name)
            .field("children", &self.children())
            .finish()
    }
}

/// A folder view that rejects every write.
///
/// Reads pass through to the wrapped folder, and child folders are wrapped
/// too, so the whole subtree is read-only through this view.
pub struct ReadOnlyFolder {
    inner: Arc<dyn Folder>,
}

impl ReadOnlyFolder {
    pub fn new(inner: Arc<dyn Folder>) -> Self {
        Self { inner }
    }
}

impl Folder for ReadOnlyFolder {
    fn name(&self) -> String {
        self.inner.name()
    }

    fn children(&self) -> Vec<String> {
        self.inner.children()
    }

    fn fetch(&self, name: &str) -> Option<Entry> {
        match self.inner.fetch(name)? {
            Entry::Folder(child) => Some(Entry::Folder(Arc::new(ReadOnlyFolder::new(child)))),
            other => Some(other),
        }
    }

    fn put(&self, name: &str, _entry: Option<Entry>) -> bool {
        tracing::debug!(folder = %self.inner.name(), child = name, "rejected write to read-only folder");
        false
    }
}

/// An in-memory file.
#[derive(Clone, Debug)]
pub struct MemFile {
    name: String,
    data: Bytes,
}

impl MemFile {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

impl File for MemFile {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn read(&self, offset: u64, len: u64) -> Bytes {
        let total = self.data.len();
        let start = usize::try_from(offset).unwrap_or(total).min(total);
        let end = usize::try_from(offset.saturating_add(len))
            .unwrap_or(total)
            .min(total);
        self.data.slice(start..end)
    }
}

/// A function backed by a synchronous closure.
pub struct FnFunction<F> {
    name: String,
    f: F,
}

impl<F> FnFunction<F>
where
    F: Fn(&Context, Option<Entry>) -> Option<Entry> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

#[async_trait]
impl<F> Function for FnFunction<F>
where
    F: Fn(&Context, Option<Entry>) -> Option<Entry> + Send + Sync,
{
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn invoke(&self, caller: &Context, input: Option<Entry>) -> Option<Entry> {
        (self.f)(caller, input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_upserts_and_deletes() {
        let folder = MemFolder::new("root");
        assert!(folder.put("a", Some(Entry::string("a", "1"))));
        assert!(folder.put("a", Some(Entry::string("a", "2"))));
        assert_eq!(folder.fetch("a").unwrap().as_string().unwrap().value, "2");

        assert!(folder.put("a", None));
        assert!(folder.fetch("a").is_none());
        assert!(folder.children().is_empty());
    }

    #[test]
    fn empty_child_name_is_refused() {
        let folder = MemFolder::new("root");
        assert!(!folder.put("", Some(Entry::string("x", "y"))));
    }

    #[test]
    fn with_children_keys_by_name() {
        let folder = MemFolder::with_children(
            "root",
            [Entry::string("a", "1"), MemFolder::entry("sub")],
        );
        let mut names = folder.children();
        names.sort();
        assert_eq!(names, vec!["a", "sub"]);
    }

    #[test]
    fn read_only_folder_rejects_writes_recursively() {
        let inner = Arc::new(MemFolder::new("code"));
        inner.put("routines", Some(MemFolder::entry("routines")));

        let view = ReadOnlyFolder::new(inner.clone());
        assert!(!view.put("x", Some(Entry::string("x", "1"))));
        assert!(inner.fetch("x").is_none());

        let child = view.fetch("routines").unwrap();
        assert!(!child.as_folder().unwrap().put("y", None));
    }

    #[test]
    fn mem_file_reads_ranges() {
        let file = MemFile::new("launch.lua", Bytes::from_static(b"hello world"));
        assert_eq!(file.size(), 11);
        assert_eq!(&file.read(6, 5)[..], b"world");
        assert_eq!(&file.read(6, 100)[..], b"world");
        assert!(file.read(50, 5).is_empty());
        assert_eq!(&file.read_all()[..], b"hello world");
    }

    #[tokio::test]
    async fn fn_function_invokes_closure() {
        let func = FnFunction::new("echo", |_ctx: &Context, input: Option<Entry>| input);
        let ctx = Context::new("test:/", MemFolder::entry("root"));
        let out = func.invoke(&ctx, Some(Entry::string("x", "ping"))).await;
        assert_eq!(out.unwrap().as_string().unwrap().value, "ping");
    }
}
