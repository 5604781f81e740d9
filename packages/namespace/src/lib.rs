//! skyrun namespace: the typed tree routines read and write.
//!
//! A namespace is a tree of [`Entry`] values:
//! - `Folder`: mutable container of named children
//! - `String`: a tagged string leaf
//! - `File`: a readable blob (routine source lives in files)
//! - `Function`: an invokable capability
//! - `Link`: a pointer to another absolute path
//!
//! All access goes through a [`Context`], a named facade that resolves
//! slash-delimited paths and reports absence as `None` instead of failing.
//!
//! # Example
//!
//! ```rust
//! use skyrun_namespace::{mkdirp, Context, Entry, MemFolder};
//!
//! let ctx = Context::new("mem://chart", MemFolder::entry("chart"));
//! assert!(mkdirp(&ctx, "/config/demo"));
//! assert!(ctx.put("/config/demo/nick", Some(Entry::string("string", "sky"))));
//! assert_eq!(ctx.get_string("/config/demo/nick").unwrap().value, "sky");
//! ```

mod context;
mod entry;
mod enumerate;
mod load;
mod memory;
mod path;
mod toolbox;

pub use context::Context;
pub use entry::{canonical_number, Entry, File, Folder, Function, LinkEntry, StringEntry};
pub use enumerate::{EnumEntry, Enumerator};
pub use load::{from_json, load_dir, merge_json, LoadError};
pub use memory::{FnFunction, MemFile, MemFolder, ReadOnlyFolder};
pub use path::Path;
pub use toolbox::mkdirp;

// Re-exported so implementors of `File` don't need a direct dependency.
pub use bytes::Bytes;
