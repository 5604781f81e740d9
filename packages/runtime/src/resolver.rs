//! Resolving external namespace URIs.
//!
//! How a URI is dialed is the host's business; the runtime only needs
//! something that turns a URI into a namespace root or fails.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use skyrun_namespace::{Context, Entry};
use url::Url;

/// Turns a URI into a namespace root.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Open the namespace named by `uri`, or `None` if it can't be reached.
    async fn open(&self, uri: &str) -> Option<Entry>;
}

/// A resolver over roots registered in memory, keyed by URI.
#[derive(Default)]
pub struct MemoryResolver {
    roots: RwLock<BTreeMap<String, Entry>>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `root` reachable at `uri`, replacing any previous root.
    pub fn register(&self, uri: impl AsRef<str>, root: Entry) {
        self.roots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(normalize(uri.as_ref()), root);
    }
}

#[async_trait]
impl Resolver for MemoryResolver {
    async fn open(&self, uri: &str) -> Option<Entry> {
        self.roots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&normalize(uri))
            .cloned()
    }
}

fn normalize(uri: &str) -> String {
    uri.trim_end_matches('/').to_string()
}

/// Open a wire URI of the form `scheme://host[:port]/path`.
///
/// The `scheme://host` part is opened through the resolver and the path is
/// looked up as a folder inside it. The returned context is named by the
/// full wire URI.
pub async fn open_wire(resolver: &dyn Resolver, wire_uri: &str) -> Option<Context> {
    let uri = match Url::parse(wire_uri) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::warn!(uri = wire_uri, error = %e, "wire URI parsing failed");
            return None;
        }
    };

    let mut base = format!("{}://{}", uri.scheme(), uri.host_str().unwrap_or_default());
    if let Some(port) = uri.port() {
        base.push_str(&format!(":{}", port));
    }

    tracing::info!(scheme = uri.scheme(), base = %base, "importing namespace");
    let Some(root) = resolver.open(&base).await else {
        tracing::warn!(base = %base, "resolver could not open namespace");
        return None;
    };

    let folder = Context::new(base, root).get_folder(uri.path())?;
    Some(Context::new(wire_uri, Entry::Folder(folder)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyrun_namespace::{Folder, MemFolder};
    use std::sync::Arc;

    fn resolver() -> MemoryResolver {
        let root = Arc::new(MemFolder::new("remote"));
        let pub_dir = Arc::new(MemFolder::new("pub"));
        pub_dir.put("motd", Some(Entry::string("motd", "hello")));
        root.put("pub", Some(Entry::Folder(pub_dir)));

        let resolver = MemoryResolver::new();
        resolver.register("mem://remote/", Entry::Folder(root));
        resolver
    }

    #[tokio::test]
    async fn open_is_keyed_by_normalized_uri() {
        let resolver = resolver();
        assert!(resolver.open("mem://remote").await.is_some());
        assert!(resolver.open("mem://remote/").await.is_some());
        assert!(resolver.open("mem://nowhere").await.is_none());
    }

    #[tokio::test]
    async fn wire_opens_path_inside_namespace() {
        let resolver = resolver();
        let ctx = open_wire(&resolver, "mem://remote/pub").await.unwrap();
        assert_eq!(ctx.name(), "mem://remote/pub");
        assert_eq!(ctx.get_string("motd").unwrap().value, "hello");

        let whole = open_wire(&resolver, "mem://remote").await.unwrap();
        assert!(whole.get_folder("pub").is_some());
    }

    #[tokio::test]
    async fn wire_failures_are_none() {
        let resolver = resolver();
        assert!(open_wire(&resolver, "not a uri").await.is_none());
        assert!(open_wire(&resolver, "mem://missing/pub").await.is_none());
        assert!(open_wire(&resolver, "mem://remote/pub/motd").await.is_none());
    }
}
