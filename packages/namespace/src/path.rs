//! Slash-delimited namespace paths.

use std::fmt;

/// A normalized path into a namespace tree.
///
/// Unlike store paths elsewhere, namespace names are arbitrary text (app
/// names such as `irc-app`, pids such as `0`), so components are not
/// validated. Parsing only normalizes:
///
/// - Components are separated by `/`
/// - Empty components are ignored (normalizes `//`, leading and trailing `/`)
/// - `.` components are ignored, so `"."` and `""` both name the root
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Path {
    pub components: Vec<String>,
}

impl Path {
    /// Parse a path string.
    ///
    /// ```rust
    /// use skyrun_namespace::Path;
    ///
    /// let path = Path::parse("/apps/demo/");
    /// assert_eq!(path.len(), 2);
    /// assert_eq!(Path::parse("."), Path::parse(""));
    /// ```
    pub fn parse(s: &str) -> Self {
        let components = s
            .split('/')
            .filter(|c| !c.is_empty() && *c != ".")
            .map(|c| c.to_string())
            .collect();
        Path { components }
    }

    /// Check if this path is empty (names the root itself).
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Get the number of components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Iterate over components.
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.components.iter()
    }

    /// Join this path with another.
    #[must_use]
    pub fn join(&self, other: &Path) -> Path {
        let mut components = self.components.clone();
        components.extend(other.components.iter().cloned());
        Path { components }
    }

    /// Append a single child name.
    #[must_use]
    pub fn child(&self, name: &str) -> Path {
        self.join(&Path::parse(name))
    }

    /// Split into the parent path and the final component.
    ///
    /// Returns `None` for the root path.
    pub fn split_last(&self) -> Option<(Path, &str)> {
        let (last, parent) = self.components.split_last()?;
        Some((
            Path {
                components: parent.to_vec(),
            },
            last.as_str(),
        ))
    }

    /// The final component, if any.
    pub fn last(&self) -> Option<&str> {
        self.components.last().map(|s| s.as_str())
    }
}

impl fmt::Display for Path {
    /// Paths display absolute (`/a/b`), the root displays as the empty string.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for component in &self.components {
            write!(f, "/{}", component)?;
        }
        Ok(())
    }
}

impl From<&str> for Path {
    fn from(s: &str) -> Self {
        Path::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_basic_paths() {
        assert_eq!(Path::parse("").len(), 0);
        assert_eq!(Path::parse("foo").len(), 1);
        assert_eq!(Path::parse("foo/bar").len(), 2);
        assert_eq!(Path::parse("/foo/bar/baz").len(), 3);
    }

    #[test]
    fn normalize_slashes_and_dots() {
        assert_eq!(Path::parse("foo/bar/"), Path::parse("foo/bar"));
        assert_eq!(Path::parse("foo//bar"), Path::parse("foo/bar"));
        assert_eq!(Path::parse("./foo/./bar"), Path::parse("foo/bar"));
        assert!(Path::parse(".").is_empty());
    }

    #[test]
    fn arbitrary_names_allowed() {
        let p = Path::parse("config/irc-app/nick name");
        assert_eq!(p.len(), 3);
        assert_eq!(p.last(), Some("nick name"));
    }

    #[test]
    fn split_last_works() {
        let p = Path::parse("a/b/c");
        let (parent, last) = p.split_last().unwrap();
        assert_eq!(parent, Path::parse("a/b"));
        assert_eq!(last, "c");
        assert!(Path::parse("").split_last().is_none());
    }

    #[test]
    fn display_is_absolute() {
        assert_eq!(Path::parse("state/counter").to_string(), "/state/counter");
        assert_eq!(Path::parse("").to_string(), "");
    }
}
