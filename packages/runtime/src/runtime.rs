//! The runtime: configuration, a resolver and the tokio runtime everything
//! runs on.

use std::fmt;
use std::sync::Arc;

use tokio::runtime::Handle;

use crate::config::RuntimeConfig;
use crate::error::Result;
use crate::resolver::Resolver;
use crate::session::Session;

/// Entry point for opening sessions.
///
/// # Example
///
/// ```ignore
/// let resolver = Arc::new(MemoryResolver::new());
/// resolver.register("mem://chart", chart_root);
///
/// let runtime = Runtime::new(RuntimeConfig::default(), resolver)?;
/// let session = runtime.open_session("mem://chart");
/// session.wait_open().await;
/// ```
pub struct Runtime {
    config: RuntimeConfig,
    resolver: Arc<dyn Resolver>,
    handle: Handle,
}

impl Runtime {
    /// Create a runtime on the current tokio runtime.
    ///
    /// Fails if the configuration is invalid or if called outside a tokio
    /// runtime. Routines block on it while suspended.
    pub fn new(config: RuntimeConfig, resolver: Arc<dyn Resolver>) -> Result<Arc<Self>> {
        config.validate()?;
        let handle = Handle::try_current()?;
        tracing::debug!(?config, "runtime created");
        Ok(Arc::new(Self {
            config,
            resolver,
            handle,
        }))
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn resolver(&self) -> &Arc<dyn Resolver> {
        &self.resolver
    }

    pub(crate) fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Open the chart at `chart_url`.
    ///
    /// Returns at once; the chart is resolved and its apps launched in the
    /// background.
    pub fn open_session(self: &Arc<Self>, chart_url: &str) -> Arc<Session> {
        Session::open(Arc::clone(self), chart_url)
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime").field("config", &self.config).finish()
    }
}
