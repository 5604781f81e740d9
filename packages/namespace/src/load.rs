//! Building in-memory trees from the host: directories and JSON documents.

use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;
use std::{fs, io};

use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::entry::{Entry, Folder, StringEntry};
use crate::memory::{MemFile, MemFolder};
use crate::Context;

/// Errors from loading host data into a namespace.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The root path is missing or is not a directory.
    #[error("invalid root directory {path}: {source}")]
    RootInvalid {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Walking the directory tree failed.
    #[error("failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),

    /// A file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Load a directory tree into memory.
///
/// Directories become [`MemFolder`]s and regular files become [`MemFile`]s
/// holding the file contents. Other file types are skipped.
pub fn load_dir(root: impl AsRef<FsPath>) -> Result<Arc<MemFolder>, LoadError> {
    let root = root.as_ref();
    let attr = fs::metadata(root).map_err(|source| LoadError::RootInvalid {
        path: root.to_path_buf(),
        source,
    })?;
    if !attr.is_dir() {
        return Err(LoadError::RootInvalid {
            path: root.to_path_buf(),
            source: io::Error::other("root path must be a directory"),
        });
    }

    let name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let folder = Arc::new(MemFolder::new(name));
    let ctx = Context::new("load:/", Entry::Folder(folder.clone()));

    // Sorted so parents are always visited before their children.
    for entry in walkdir::WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let store_path: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        let store_path = store_path.join("/");
        let file_name = entry.file_name().to_string_lossy().into_owned();

        let file_type = entry.file_type();
        if file_type.is_dir() {
            tracing::debug!(path = %store_path, "loading folder");
            ctx.put(&store_path, Some(MemFolder::entry(file_name)));
        } else if file_type.is_file() {
            tracing::debug!(path = %store_path, "loading file");
            let data = fs::read(entry.path()).map_err(|source| LoadError::Read {
                path: entry.path().to_path_buf(),
                source,
            })?;
            ctx.put(
                &store_path,
                Some(Entry::File(Arc::new(MemFile::new(file_name, data)))),
            );
        }
    }

    Ok(folder)
}

/// Convert a JSON document into an entry.
///
/// Objects and arrays become folders (arrays keyed by index), strings,
/// numbers and booleans become tagged strings, and `null` is absence.
pub fn from_json(name: &str, value: &JsonValue) -> Option<Entry> {
    match value {
        JsonValue::Null => None,
        JsonValue::Bool(b) => Some(Entry::String(StringEntry {
            name: name.to_string(),
            ..StringEntry::boolean(*b)
        })),
        JsonValue::Number(n) => {
            let tagged = match n.as_i64() {
                Some(i) => StringEntry::integer(i),
                None => StringEntry::number(n.as_f64().unwrap_or(f64::NAN)),
            };
            Some(Entry::String(StringEntry {
                name: name.to_string(),
                ..tagged
            }))
        }
        JsonValue::String(s) => Some(Entry::string(name, s.as_str())),
        JsonValue::Array(items) => {
            let folder = MemFolder::new(name);
            for (i, item) in items.iter().enumerate() {
                let key = i.to_string();
                if let Some(child) = from_json(&key, item) {
                    folder.put(&key, Some(child));
                }
            }
            Some(Entry::Folder(Arc::new(folder)))
        }
        JsonValue::Object(map) => {
            let folder = MemFolder::new(name);
            for (key, item) in map {
                if let Some(child) = from_json(key, item) {
                    folder.put(key, Some(child));
                }
            }
            Some(Entry::Folder(Arc::new(folder)))
        }
    }
}

/// Merge a JSON object into an existing folder.
///
/// Nested objects merge into existing child folders; every other value
/// replaces the child. `null` deletes the child. Non-object documents are
/// ignored and reported as `false`.
pub fn merge_json(folder: &dyn Folder, value: &JsonValue) -> bool {
    let JsonValue::Object(map) = value else {
        return false;
    };
    for (key, item) in map {
        match (folder.fetch(key), item) {
            (Some(Entry::Folder(existing)), JsonValue::Object(_)) => {
                merge_json(existing.as_ref(), item);
            }
            _ => {
                folder.put(key, from_json(key, item));
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn loads_directory_tree() {
        let dir = tempfile::tempdir().unwrap();
        let routines = dir.path().join("apps/demo/routines");
        fs::create_dir_all(&routines).unwrap();
        fs::write(routines.join("launch.lua"), "ctx.log('hi')").unwrap();
        fs::create_dir_all(dir.path().join("config")).unwrap();

        let root = load_dir(dir.path()).unwrap();
        let ctx = Context::new("test:/", Entry::Folder(root));

        let file = ctx.get_file("/apps/demo/routines/launch.lua").unwrap();
        assert_eq!(&file.read_all()[..], b"ctx.log('hi')");
        assert!(ctx.get_folder("/config").is_some());
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_dir(dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, LoadError::RootInvalid { .. }));
    }

    #[test]
    fn file_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain.txt");
        fs::write(&file, "x").unwrap();
        assert!(load_dir(&file).is_err());
    }

    #[test]
    fn json_converts_with_tags() {
        let entry = from_json(
            "seed",
            &json!({"nick": "sky", "port": 6667, "tls": true, "ratio": 0.5, "gone": null, "list": ["a"]}),
        )
        .unwrap();
        let ctx = Context::new("test:/", entry);

        let port = ctx.get_string("port").unwrap();
        assert_eq!(port.value, "6667");
        assert_eq!(port.name, "port");
        assert_eq!(ctx.get_string("tls").unwrap().value, "yes");
        assert_eq!(ctx.get_string("ratio").unwrap().value, "0.5");
        assert!(ctx.get("gone").is_none());
        assert_eq!(ctx.get_string("list/0").unwrap().value, "a");
    }

    #[test]
    fn merge_keeps_existing_folders() {
        let root = MemFolder::new("root");
        let config = Arc::new(MemFolder::new("config"));
        config.put("keep", Some(Entry::string("keep", "1")));
        root.put("config", Some(Entry::Folder(config.clone())));

        assert!(merge_json(&root, &json!({"config": {"added": "2"}, "top": "3"})));
        assert!(config.fetch("keep").is_some());
        assert!(config.fetch("added").is_some());
        assert!(root.fetch("top").is_some());
        assert!(!merge_json(&root, &json!("scalar")));
    }
}
