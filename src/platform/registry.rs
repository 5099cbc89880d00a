use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use url::Url;

use super::{AppWindow, Bounds, ForegroundShell};
use crate::core::compose::{ComposeError, CompositionReport, CompositionTarget, PageComposer};
use crate::core::dom::{Document, NodeId};
use crate::core::events::{Event, EventSystem};
use crate::core::network::{Fetcher, RuntimeUrls};
use crate::core::script::{NetworkResourceHost, ResourceHost, ScriptEvaluator, TracingEvaluator};
use crate::EngineConfig;

#[derive(Error, Debug)]
pub enum WindowError {
    #[error("create called multiple times; only one window is supported")]
    AlreadyCreated,
    #[error("Compose error: {0}")]
    Compose(#[from] ComposeError),
}

/// Which page is asking for the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContextKind {
    Foreground,
    Background,
}

/// Options accepted by `create`. There is only ever one window, so it takes
/// no id. Requested bounds are passed to `AppWindow::set_bounds`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateOptions {
    pub bounds: Option<Bounds>,
}

/// Owns the single window slot and drives page creation into it.
pub struct WindowRegistry {
    config: EngineConfig,
    document: Arc<Document>,
    anchor: Option<NodeId>,
    urls: Arc<RuntimeUrls>,
    fetcher: Arc<dyn Fetcher>,
    host: Arc<dyn ResourceHost>,
    shell: Arc<dyn ForegroundShell>,
    events: Arc<EventSystem>,
    slot: RwLock<Option<Arc<AppWindow>>>,
    last_report: RwLock<Option<CompositionReport>>,
}

impl WindowRegistry {
    /// Uses a `NetworkResourceHost` over `fetcher` with a logging evaluator.
    pub fn new(
        config: EngineConfig,
        document: Arc<Document>,
        fetcher: Arc<dyn Fetcher>,
        shell: Arc<dyn ForegroundShell>,
    ) -> Self {
        Self::with_evaluator(config, document, fetcher, shell, Arc::new(TracingEvaluator))
    }

    pub fn with_evaluator(
        config: EngineConfig,
        document: Arc<Document>,
        fetcher: Arc<dyn Fetcher>,
        shell: Arc<dyn ForegroundShell>,
        evaluator: Arc<dyn ScriptEvaluator>,
    ) -> Self {
        let urls = Arc::new(RuntimeUrls::new(
            &config.app_scheme,
            &config.app_id,
            &config.asset_base_url,
        ));
        if !urls.is_app_url(&config.background_url) {
            urls.observe_page_started(&config.background_url);
        }
        let host: Arc<dyn ResourceHost> = Arc::new(NetworkResourceHost::new(
            fetcher.clone(),
            evaluator,
            urls.clone(),
        ));
        Self {
            config,
            document,
            anchor: None,
            urls,
            fetcher,
            host,
            shell,
            events: Arc::new(EventSystem::new()),
            slot: RwLock::new(None),
            last_report: RwLock::new(None),
        }
    }

    /// Body content of the created page goes right after `anchor`.
    pub fn with_anchor(mut self, anchor: NodeId) -> Self {
        self.anchor = Some(anchor);
        self
    }

    pub fn with_host(mut self, host: Arc<dyn ResourceHost>) -> Self {
        self.host = host;
        self
    }

    pub fn events(&self) -> &Arc<EventSystem> {
        &self.events
    }

    pub fn urls(&self) -> &Arc<RuntimeUrls> {
        &self.urls
    }

    /// Report of the composition run by `create`, once it finished.
    pub fn last_report(&self) -> Option<CompositionReport> {
        self.last_report.read().clone()
    }

    /// Loads `url` into the window and composes it into the live document.
    ///
    /// `callback` sees the window before any content is inserted. The
    /// returned window is shown and its ready gate released.
    pub async fn create<F>(
        &self,
        url: &str,
        options: CreateOptions,
        callback: F,
    ) -> Result<Arc<AppWindow>, WindowError>
    where
        F: FnOnce(&Arc<AppWindow>),
    {
        let window = {
            let mut slot = self.slot.write();
            if slot.is_some() {
                tracing::error!("create called multiple times. This is unsupported.");
                return Err(WindowError::AlreadyCreated);
            }
            let window = Arc::new(AppWindow::new(
                self.document.clone(),
                self.shell.clone(),
                self.events.clone(),
            ));
            *slot = Some(window.clone());
            window
        };
        if let Some(bounds) = options.bounds {
            window.set_bounds(bounds);
        }

        let resolved = self.resolve(url);
        let content = match self.fetcher.fetch_text(&self.urls.remap(&resolved)).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("failed to load {}: {}", resolved, e);
                String::new()
            }
        };
        let content = if content.is_empty() {
            self.config.load_failure_text.clone()
        } else {
            content
        };

        self.document.set_url(&resolved);
        callback(&window);

        let mut target = CompositionTarget::new(self.document.clone());
        target.anchor = self.anchor;
        let composer = PageComposer::new(target, &self.config, &self.urls, self.host.clone());
        let report = composer
            .compose(&content, |_| {
                window.ready_gate().release();
                window.show();
            })
            .await?;

        *self.last_report.write() = Some(report);
        self.events.dispatch(Event::PageComposed { url: resolved });
        Ok(window)
    }

    /// Resolves like an anchor `href` in the background page.
    fn resolve(&self, url: &str) -> String {
        let joined = Url::parse(&self.config.background_url).and_then(|base| base.join(url));
        match joined {
            Ok(resolved) => resolved.to_string(),
            Err(e) => {
                tracing::warn!("could not resolve {} against {}: {}", url, self.config.background_url, e);
                url.to_string()
            }
        }
    }

    /// The window, but only for the page that hosts it.
    pub fn current(&self, context: ContextKind) -> Option<Arc<AppWindow>> {
        match context {
            ContextKind::Foreground => self.slot.read().clone(),
            ContextKind::Background => None,
        }
    }

    pub fn get_all(&self) -> Vec<Arc<AppWindow>> {
        self.slot.read().iter().cloned().collect()
    }
}
