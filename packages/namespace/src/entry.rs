//! The Entry type - a typed node in the namespace tree.
//!
//! Folders are the only containers. Leaves are strings, files, functions,
//! and links. Absence is always `Option<Entry>::None`, never a variant.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::Context;

/// A typed node in the namespace tree.
///
/// Cloning an `Entry` is cheap: containers and capabilities are shared by
/// reference, so a cloned folder is the same folder.
#[derive(Clone)]
pub enum Entry {
    /// A named string value.
    String(StringEntry),
    /// A mutable container of named children.
    Folder(Arc<dyn Folder>),
    /// A readable blob.
    File(Arc<dyn File>),
    /// An invokable capability.
    Function(Arc<dyn Function>),
    /// A pointer to another absolute path in the same namespace.
    Link(LinkEntry),
}

impl Entry {
    /// Create a plain string entry.
    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Entry::String(StringEntry::new(name, value))
    }

    /// The type name of this entry, as reported by enumeration.
    pub fn kind(&self) -> &'static str {
        match self {
            Entry::String(_) => "String",
            Entry::Folder(_) => "Folder",
            Entry::File(_) => "File",
            Entry::Function(_) => "Function",
            Entry::Link(_) => "Link",
        }
    }

    /// The entry's own name.
    pub fn name(&self) -> String {
        match self {
            Entry::String(s) => s.name.clone(),
            Entry::Folder(f) => f.name(),
            Entry::File(f) => f.name(),
            Entry::Function(f) => f.name(),
            Entry::Link(l) => l.name.clone(),
        }
    }

    pub fn as_string(&self) -> Option<&StringEntry> {
        match self {
            Entry::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_folder(&self) -> Option<&Arc<dyn Folder>> {
        match self {
            Entry::Folder(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_file(&self) -> Option<&Arc<dyn File>> {
        match self {
            Entry::File(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Arc<dyn Function>> {
        match self {
            Entry::Function(f) => Some(f),
            _ => None,
        }
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entry::String(s) => write!(f, "String({:?}={:?})", s.name, s.value),
            Entry::Link(l) => write!(f, "Link({:?} -> {:?})", l.name, l.target),
            other => write!(f, "{}({:?})", other.kind(), other.name()),
        }
    }
}

/// A string leaf.
///
/// Strings written by routines carry a type tag in `name` (`string`,
/// `number`, or `boolean`). The tag is write-only metadata: reading a
/// string back only ever yields `value`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StringEntry {
    pub name: String,
    pub value: String,
}

impl StringEntry {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// A string tagged `"string"`.
    pub fn text(value: impl Into<String>) -> Self {
        Self::new("string", value)
    }

    /// A string tagged `"number"` holding the canonical text of an integer.
    pub fn integer(value: i64) -> Self {
        Self::new("number", value.to_string())
    }

    /// A string tagged `"number"` holding the canonical text of a float.
    pub fn number(value: f64) -> Self {
        Self::new("number", canonical_number(value))
    }

    /// A string tagged `"boolean"`, `"yes"` or `"no"`.
    pub fn boolean(value: bool) -> Self {
        Self::new("boolean", if value { "yes" } else { "no" })
    }

    pub fn get(&self) -> &str {
        &self.value
    }
}

/// Canonical decimal text for a float.
///
/// Integral values that fit in an `f64` mantissa print without a fraction
/// (`42.0` is `"42"`); everything else uses the shortest round-trip form.
pub fn canonical_number(value: f64) -> String {
    const EXACT: f64 = 9_007_199_254_740_992.0; // 2^53
    if value.is_finite() && value.fract() == 0.0 && value.abs() < EXACT {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// A link leaf pointing at an absolute path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkEntry {
    pub name: String,
    pub target: String,
}

impl LinkEntry {
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
        }
    }
}

/// A container of named children.
///
/// Folders are shared across apps and processes, so every method takes
/// `&self`; implementations provide their own interior synchronization.
pub trait Folder: Send + Sync {
    fn name(&self) -> String;

    /// Names of all children. Order is not guaranteed.
    fn children(&self) -> Vec<String>;

    /// Fetch a child by name.
    fn fetch(&self, name: &str) -> Option<Entry>;

    /// Upsert a child, or delete it when `entry` is `None`.
    ///
    /// Returns `false` when the folder refuses the change.
    fn put(&self, name: &str, entry: Option<Entry>) -> bool;
}

/// A readable blob.
pub trait File: Send + Sync {
    fn name(&self) -> String;

    fn size(&self) -> u64;

    /// Read up to `len` bytes starting at `offset`.
    fn read(&self, offset: u64, len: u64) -> Bytes;

    /// Read the whole file.
    fn read_all(&self) -> Bytes {
        self.read(0, self.size())
    }
}

/// An invokable capability.
///
/// Invocation may suspend for an arbitrary amount of time; callers treat it
/// as opaque.
#[async_trait]
pub trait Function: Send + Sync {
    fn name(&self) -> String;

    async fn invoke(&self, caller: &Context, input: Option<Entry>) -> Option<Entry>;
}
