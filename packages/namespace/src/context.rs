//! Path-resolving contexts over a namespace root.

use std::fmt;
use std::sync::Arc;

use crate::entry::{Entry, File, Folder, Function, StringEntry};
use crate::path::Path;

/// How many links a single lookup may follow before giving up.
const MAX_LINK_HOPS: usize = 16;

/// A named facade over a namespace root.
///
/// Contexts are immutable once built; all traversal is by path string.
/// Every lookup reports absence (or a type mismatch) as `None` rather than
/// an error.
#[derive(Clone)]
pub struct Context {
    name: String,
    root: Entry,
}

impl Context {
    pub fn new(name: impl Into<String>, root: Entry) -> Self {
        Self {
            name: name.into(),
            root,
        }
    }

    /// Human-readable identity, usually the mount URI.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Entry {
        &self.root
    }

    /// Fetch the entry at `path` without following a link at the final
    /// component.
    pub fn get(&self, path: &str) -> Option<Entry> {
        self.resolve(&Path::parse(path), 0)
    }

    pub fn get_string(&self, path: &str) -> Option<StringEntry> {
        match self.get_followed(path)? {
            Entry::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn get_folder(&self, path: &str) -> Option<Arc<dyn Folder>> {
        match self.get_followed(path)? {
            Entry::Folder(f) => Some(f),
            _ => None,
        }
    }

    pub fn get_file(&self, path: &str) -> Option<Arc<dyn File>> {
        match self.get_followed(path)? {
            Entry::File(f) => Some(f),
            _ => None,
        }
    }

    pub fn get_function(&self, path: &str) -> Option<Arc<dyn Function>> {
        match self.get_followed(path)? {
            Entry::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Store `entry` at `path`, or delete the child when `entry` is `None`.
    ///
    /// The parent folder must already exist. Writing the root itself is
    /// refused.
    pub fn put(&self, path: &str, entry: Option<Entry>) -> bool {
        let path = Path::parse(path);
        let Some((parent, name)) = path.split_last() else {
            return false;
        };
        match self.follow(self.resolve(&parent, 0), 0) {
            Some(Entry::Folder(folder)) => folder.put(name, entry),
            _ => false,
        }
    }

    /// A new context rooted at the folder found at `path`.
    pub fn subcontext(&self, path: &str, name: impl Into<String>) -> Option<Context> {
        let folder = self.get_folder(path)?;
        Some(Context::new(name, Entry::Folder(folder)))
    }

    fn get_followed(&self, path: &str) -> Option<Entry> {
        self.follow(self.get(path), 0)
    }

    fn resolve(&self, path: &Path, hops: usize) -> Option<Entry> {
        let mut current = self.root.clone();
        for component in path.iter() {
            let folder = match self.follow(Some(current), hops)? {
                Entry::Folder(folder) => folder,
                _ => return None,
            };
            current = folder.fetch(component)?;
        }
        Some(current)
    }

    fn follow(&self, entry: Option<Entry>, hops: usize) -> Option<Entry> {
        match entry? {
            Entry::Link(link) => {
                if hops >= MAX_LINK_HOPS {
                    tracing::debug!(context = %self.name, target = %link.target, "link hop limit reached");
                    return None;
                }
                let target = self.resolve(&Path::parse(&link.target), hops + 1);
                self.follow(target, hops + 1)
            }
            other => Some(other),
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("name", &self.name)
            .field("root", &self.root)
            .finish()
    }
}
