//! Sessions: one opened chart and the apps it describes.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use skyrun_namespace::{mkdirp, Context, Entry, Folder, MemFolder, ReadOnlyFolder};
use tokio::sync::watch;

use crate::app::App;
use crate::runtime::Runtime;
use crate::status::SessionStatus;

/// An opened chart.
///
/// Returned immediately by [`Runtime::open_session`]; the chart is opened
/// and its apps launched in the background. Use [`Session::wait_open`] to
/// wait for that to finish.
pub struct Session {
    runtime: Arc<Runtime>,
    chart_url: String,
    ctx: OnceLock<Context>,
    apps: RwLock<BTreeMap<String, Arc<App>>>,
    status: watch::Sender<SessionStatus>,
}

impl Session {
    pub(crate) fn open(runtime: Arc<Runtime>, chart_url: impl Into<String>) -> Arc<Self> {
        let (status, _rx) = watch::channel(SessionStatus::Opening);
        let session = Arc::new(Session {
            runtime: runtime.clone(),
            chart_url: chart_url.into(),
            ctx: OnceLock::new(),
            apps: RwLock::new(BTreeMap::new()),
            status,
        });

        let bootstrap = session.clone();
        runtime.handle().spawn(async move { bootstrap.bootstrap().await });
        tracing::info!(chart = %session.chart_url, "returning session");
        session
    }

    pub fn chart_url(&self) -> &str {
        &self.chart_url
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// Wait until the session has finished opening, successfully or not.
    pub async fn wait_open(&self) -> SessionStatus {
        let mut rx = self.status.subscribe();
        let status = match rx.wait_for(|s| *s != SessionStatus::Opening).await {
            Ok(status) => status.clone(),
            Err(_) => self.status(),
        };
        status
    }

    /// The chart context, once the chart is open.
    pub fn context(&self) -> Option<&Context> {
        self.ctx.get()
    }

    pub fn app(&self, name: &str) -> Option<Arc<App>> {
        self.apps
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// All apps in name order.
    pub fn apps(&self) -> Vec<Arc<App>> {
        self.apps
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Stop every app.
    pub async fn stop_all(&self) {
        for app in self.apps() {
            app.stop().await;
        }
    }

    async fn bootstrap(self: Arc<Self>) {
        tracing::info!(chart = %self.chart_url, "opening chart");
        let Some(root) = self.runtime.resolver().open(&self.chart_url).await else {
            tracing::warn!(chart = %self.chart_url, "couldn't open chart");
            self.status
                .send_replace(SessionStatus::Failed(format!("couldn't open chart {}", self.chart_url)));
            return;
        };

        let ctx = Context::new(self.chart_url.clone(), root.clone());
        let _ = self.ctx.set(ctx.clone());

        match ctx.get_folder("/apps") {
            Some(apps) => {
                let mut names = apps.children();
                names.sort();
                for name in names {
                    self.launch_app(&ctx, &root, &name);
                }
            }
            None => tracing::warn!(chart = %self.chart_url, "chart has no /apps folder"),
        }

        self.status.send_replace(SessionStatus::Open);
        tracing::info!(chart = %self.chart_url, apps = self.apps().len(), "session open");
    }

    /// Build the app's mount, register it and start its launch routine.
    ///
    /// An app whose source is not a folder is registered as failed and
    /// never launched; its siblings are unaffected.
    fn launch_app(self: &Arc<Self>, ctx: &Context, root: &Entry, name: &str) {
        tracing::info!(chart = %self.chart_url, app = name, "launching app");
        let mount = Arc::new(MemFolder::with_children(
            name,
            [MemFolder::entry("state"), MemFolder::entry("export")],
        ));
        mount.put("session", Some(root.clone()));

        let source = ctx.get_folder(&format!("/apps/{}", name));
        if let Some(code) = &source {
            mount.put("source", Some(Entry::Folder(Arc::new(ReadOnlyFolder::new(code.clone())))));
        }
        for area in ["config", "persist"] {
            if let Some(folder) = app_folder(ctx, area, name) {
                mount.put(area, Some(Entry::Folder(folder)));
            }
        }

        let app = App::new(
            self.runtime.clone(),
            Arc::downgrade(self),
            name,
            mount,
            format!("{}/~{}", self.chart_url, name),
        );
        self.apps
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), app.clone());
        if source.is_some() {
            app.boot();
        } else {
            app.fail(format!("app source /apps/{} is not a folder", name));
        }
    }
}

/// `/<area>/<app>` in the chart, created if missing.
fn app_folder(ctx: &Context, area: &str, app: &str) -> Option<Arc<dyn Folder>> {
    let path = format!("/{}/{}", area, app);
    if let Some(folder) = ctx.get_folder(&path) {
        return Some(folder);
    }
    tracing::info!(app, path = %path, "creating app folder");
    if !mkdirp(ctx, &path) {
        tracing::warn!(app, path = %path, "couldn't create app folder");
        return None;
    }
    ctx.get_folder(&path)
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("chart_url", &self.chart_url)
            .field("status", &self.status())
            .finish()
    }
}
