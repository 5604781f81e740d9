//! Small helpers over contexts.

use std::sync::Arc;

use crate::entry::Entry;
use crate::memory::MemFolder;
use crate::path::Path;
use crate::Context;

/// Ensure every folder along `path` exists, creating missing ones.
///
/// Returns `false` if a component exists but is not a folder, or a parent
/// refuses the write. Existing folders are left untouched.
pub fn mkdirp(ctx: &Context, path: &str) -> bool {
    let mut current = Path::default();
    for component in Path::parse(path).iter() {
        current = current.child(component);
        let at = current.to_string();
        match ctx.get(&at) {
            Some(_) if ctx.get_folder(&at).is_some() => continue,
            Some(existing) => {
                tracing::debug!(path = %at, kind = existing.kind(), "mkdirp blocked by non-folder");
                return false;
            }
            None => {
                let folder = Entry::Folder(Arc::new(MemFolder::new(component.as_str())));
                if !ctx.put(&at, Some(folder)) {
                    return false;
                }
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> Context {
        Context::new("test:/", MemFolder::entry("root"))
    }

    #[test]
    fn creates_missing_folders() {
        let ctx = ctx();
        assert!(mkdirp(&ctx, "/a/b/c"));
        assert!(ctx.get_folder("/a").is_some());
        assert!(ctx.get_folder("/a/b/c").is_some());
    }

    #[test]
    fn existing_content_is_kept() {
        let ctx = ctx();
        assert!(mkdirp(&ctx, "/a/b"));
        ctx.put("/a/b/keep", Some(Entry::string("keep", "me")));
        assert!(mkdirp(&ctx, "/a/b"));
        assert_eq!(ctx.get_string("/a/b/keep").unwrap().value, "me");
    }

    #[test]
    fn fails_through_non_folder() {
        let ctx = ctx();
        ctx.put("/a", Some(Entry::string("a", "leaf")));
        assert!(!mkdirp(&ctx, "/a/b"));
    }

    #[test]
    fn empty_path_is_trivially_ok() {
        assert!(mkdirp(&ctx(), ""));
    }
}
