//! App window page composition engine (single-thread async friendly)
//!
//! Loads an HTML document into an already running host page and replays its
//! scripts and imports in the order a real parse would have run them.
//!
//! Notes for the runtime/host crate:
//!  - Run the engine on a single-thread Tokio runtime:
//!    `#[tokio::main(flavor = "current_thread")] async fn main() { /* ... */ }`
//!    or inside a `tokio::task::LocalSet`.
//!  - Resource hosts are not required to be `Send`, so composition futures
//!    are not `Send` either.

use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;

use futures::FutureExt;
use parking_lot::RwLock;

pub mod core;
pub mod platform;

pub use crate::core::compose::{
    ComposeError, CompositionReport, CompositionTarget, Diagnostic, PageComposer,
};
pub use crate::core::dom::{Document, DocumentError, NodeId, ReadyGate};
pub use crate::core::events::{Event, EventSystem};
pub use crate::core::network::{FetchEngine, Fetcher, NetworkConfig, NetworkError, RuntimeUrls};
pub use crate::core::script::{
    LoadOutcome, NetworkResourceHost, ResourceHost, ScriptEvaluator, ScriptSequencer,
    SequenceReport, TracingEvaluator,
};
pub use crate::platform::{
    AppWindow, Bounds, ContextKind, CreateOptions, ForegroundShell, HeadlessShell, PlatformError,
    Visibility, WindowError, WindowRegistry,
};

type ErrorCallback = Arc<dyn Fn(&EngineError) + Send + Sync>;

#[derive(Error, Debug, Clone)]
pub enum EngineError {
    #[error("Document error: {0}")]
    Document(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Composition error: {0}")]
    Compose(String),
    #[error("Window error: {0}")]
    Window(String),
    #[error("Platform error: {0}")]
    Platform(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<DocumentError> for EngineError {
    fn from(e: DocumentError) -> Self {
        EngineError::Document(e.to_string())
    }
}
impl From<NetworkError> for EngineError {
    fn from(e: NetworkError) -> Self {
        EngineError::Network(e.to_string())
    }
}
impl From<ComposeError> for EngineError {
    fn from(e: ComposeError) -> Self {
        EngineError::Compose(e.to_string())
    }
}
impl From<WindowError> for EngineError {
    fn from(e: WindowError) -> Self {
        EngineError::Window(e.to_string())
    }
}
impl From<PlatformError> for EngineError {
    fn from(e: PlatformError) -> Self {
        EngineError::Platform(e.to_string())
    }
}
impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Tag import links are renamed to until the sequencer re-creates them.
    pub placeholder_tag: String,
    /// Host loads `<link rel=import>` itself; when false imports are left alone.
    pub native_imports: bool,
    /// Package path of the stylesheet injected first into every head.
    pub stylesheet_path: String,
    pub app_scheme: String,
    pub app_id: String,
    /// Real location of the app package.
    pub asset_base_url: String,
    /// URL of the background page; window URLs resolve against it.
    pub background_url: String,
    /// `None` waits for every load forever.
    pub settle_timeout_ms: Option<u64>,
    pub request_timeout_ms: u64,
    pub user_agent: String,
    /// Content composed when the page itself cannot be fetched.
    pub load_failure_text: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            placeholder_tag: "x-txpspgbc".to_string(),
            native_imports: true,
            stylesheet_path: "plugins/cordova-plugin-chrome-apps-bootstrap/chromeappstyles.css"
                .to_string(),
            app_scheme: "chrome-extension".to_string(),
            app_id: "app".to_string(),
            asset_base_url: "file:///android_asset/www".to_string(),
            background_url: "chrome-extension://app/background.html".to_string(),
            settle_timeout_ms: None,
            request_timeout_ms: 30000,
            user_agent: "AppWindowEngine/0.1".to_string(),
            load_failure_text: "Page load failed.".to_string(),
        }
    }
}

impl EngineConfig {
    /// Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        if config.placeholder_tag.is_empty()
            || !config
                .placeholder_tag
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-')
        {
            return Err(EngineError::Config(format!(
                "invalid placeholder tag {:?}",
                config.placeholder_tag
            )));
        }
        Ok(config)
    }

    pub fn network_config(&self) -> NetworkConfig {
        NetworkConfig {
            request_timeout_ms: self.request_timeout_ms,
            user_agent: self.user_agent.clone(),
            ..NetworkConfig::default()
        }
    }
}

/// Host page plus window registry, wired to the network.
pub struct AppEngine {
    config: EngineConfig,
    document: Arc<Document>,
    registry: WindowRegistry,
    error_handler: RwLock<Option<ErrorCallback>>,
}

impl AppEngine {
    pub fn new(config: EngineConfig, shell: Arc<dyn ForegroundShell>) -> Result<Self> {
        let fetcher: Arc<dyn Fetcher> = Arc::new(FetchEngine::new(&config.network_config())?);
        Ok(Self::with_fetcher(config, shell, fetcher))
    }

    pub fn with_fetcher(
        config: EngineConfig,
        shell: Arc<dyn ForegroundShell>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        let document = Arc::new(Document::new_html());
        let registry = WindowRegistry::new(config.clone(), document.clone(), fetcher, shell);
        Self {
            config,
            document,
            registry,
            error_handler: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn document(&self) -> &Arc<Document> {
        &self.document
    }

    pub fn registry(&self) -> &WindowRegistry {
        &self.registry
    }

    /// Install a custom error handler (log, UI toast, telemetry).
    pub fn set_error_handler<F>(&self, cb: Option<F>)
    where
        F: Fn(&EngineError) + Send + Sync + 'static,
    {
        *self.error_handler.write() = cb.map(|f| Arc::new(f) as ErrorCallback);
    }

    /// Creates the app window for `url` and composes it into the host page.
    pub async fn create_window(&self, url: &str) -> Result<Arc<AppWindow>> {
        self.run_safe(async {
            let window = self
                .registry
                .create(url, Default::default(), |window| {
                    tracing::debug!("window created for {:?}", window.content().url());
                })
                .await?;
            Ok::<_, EngineError>(window)
        })
        .await
    }

    /// Catches panics and routes every error through the handler.
    async fn run_safe<F, T>(&self, fut: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        let outcome = match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => {
                let msg = if let Some(s) = panic.downcast_ref::<&str>() {
                    (*s).to_string()
                } else if let Some(s) = panic.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "unknown panic".to_string()
                };
                Err(EngineError::Platform(format!("panic caught: {msg}")))
            }
        };
        if let Err(ref err) = outcome {
            self.handle_error(err);
        }
        outcome
    }

    fn handle_error(&self, err: &EngineError) {
        let handler = self.error_handler.read().clone();
        match handler {
            Some(cb) => cb(err),
            None => tracing::error!("{}", err),
        }
    }
}
