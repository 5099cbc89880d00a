pub mod fetch;
pub mod urls;

pub use fetch::{FetchEngine, FetchResponse};
pub use urls::RuntimeUrls;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Request failed: {0}")]
    RequestFailed(String),
    #[error("HTTP status {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("Timeout: {0}")]
    Timeout(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("Malformed data URL: {0}")]
    DataUrl(String),
    #[error("Unsupported scheme: {0}")]
    UnsupportedScheme(String),
}

pub type Result<T> = std::result::Result<T, NetworkError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub request_timeout_ms: u64,
    pub user_agent: String,
    pub enable_gzip: bool,
    pub cache_ttl_s: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30000,
            user_agent: "AppWindowEngine/0.1".to_string(),
            enable_gzip: true,
            cache_ttl_s: 300,
        }
    }
}

/// Retrieves a resource as text. Implemented by `FetchEngine` for real
/// network and file access and by in-memory fakes in tests.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_text(&self, url: &str) -> Result<String>;
}
