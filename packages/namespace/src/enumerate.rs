//! Depth-bounded tree listings.

use crate::entry::Entry;

/// One row of an enumeration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumEntry {
    /// Slash-joined path relative to the enumeration root; empty for the
    /// root itself.
    pub name: String,
    /// Entry type name (`String`, `Folder`, ...).
    pub kind: String,
    /// The string value for String entries, empty otherwise.
    pub string_value: String,
}

impl EnumEntry {
    /// Final path component of `name`.
    pub fn base_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or_default()
    }
}

/// Walks an entry tree depth-first up to `max_depth` levels below the root.
pub struct Enumerator {
    root: Entry,
    max_depth: usize,
}

impl Enumerator {
    pub fn new(root: Entry, max_depth: usize) -> Self {
        Self { root, max_depth }
    }

    /// Run to completion. The root is always the first row; children are
    /// visited in sorted name order.
    pub fn run(&self) -> Vec<EnumEntry> {
        let mut out = Vec::new();
        Self::visit(&self.root, String::new(), 0, self.max_depth, &mut out);
        out
    }

    fn visit(entry: &Entry, name: String, depth: usize, max_depth: usize, out: &mut Vec<EnumEntry>) {
        let string_value = match entry {
            Entry::String(s) => s.value.clone(),
            _ => String::new(),
        };
        out.push(EnumEntry {
            name: name.clone(),
            kind: entry.kind().to_string(),
            string_value,
        });

        if depth >= max_depth {
            return;
        }
        let Entry::Folder(folder) = entry else {
            return;
        };

        let mut children = folder.children();
        children.sort();
        for child_name in children {
            if let Some(child) = folder.fetch(&child_name) {
                let child_path = if name.is_empty() {
                    child_name
                } else {
                    format!("{}/{}", name, child_name)
                };
                Self::visit(&child, child_path, depth + 1, max_depth, out);
            }
        }
    }
}
