use async_trait::async_trait;
use base64::Engine;
use percent_encoding::percent_decode_str;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::time::timeout;
use url::Url;

use super::{Fetcher, NetworkConfig, NetworkError, Result};

#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub url: String,
    pub redirected: bool,
}

impl FetchResponse {
    fn local(url: &Url, content_type: String, body: Vec<u8>) -> Self {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), content_type);
        Self {
            status: 200,
            headers,
            body,
            url: url.to_string(),
            redirected: false,
        }
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Loads `http(s)`, `file` and `data` URLs.
pub struct FetchEngine {
    client: Client,
    cache: ResponseCache,
    request_timeout: Duration,
}

impl FetchEngine {
    pub fn new(config: &NetworkConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .user_agent(&config.user_agent)
            .gzip(config.enable_gzip)
            .build()
            .map_err(|e| NetworkError::RequestFailed(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            cache: ResponseCache::new(Duration::from_secs(config.cache_ttl_s)),
            request_timeout: Duration::from_millis(config.request_timeout_ms),
        })
    }

    pub async fn fetch(&self, url: &str) -> Result<FetchResponse> {
        let parsed = Url::parse(url).map_err(|e| NetworkError::InvalidUrl(format!("{url}: {e}")))?;

        match parsed.scheme() {
            "data" => {
                let (mime, body) = parse_data_url(&url["data:".len()..])?;
                Ok(FetchResponse::local(&parsed, mime, body))
            }
            "file" => self.load_file(&parsed).await,
            "http" | "https" => {
                if let Some(cached) = self.cache.get(&parsed).await {
                    tracing::trace!("cache hit for {}", parsed);
                    return Ok(cached);
                }
                let response = self.execute_request(&parsed).await?;
                self.cache.store(&parsed, &response).await;
                Ok(response)
            }
            other => Err(NetworkError::UnsupportedScheme(other.to_string())),
        }
    }

    async fn load_file(&self, url: &Url) -> Result<FetchResponse> {
        let path = url
            .to_file_path()
            .map_err(|_| NetworkError::InvalidUrl(format!("not a local path: {url}")))?;
        let body = tokio::fs::read(&path)
            .await
            .map_err(|e| NetworkError::Io(format!("{}: {e}", path.display())))?;
        let content_type = guess_content_type(url.path()).to_string();
        Ok(FetchResponse::local(url, content_type, body))
    }

    async fn execute_request(&self, url: &Url) -> Result<FetchResponse> {
        let response = timeout(self.request_timeout, self.client.get(url.as_str()).send())
            .await
            .map_err(|_| NetworkError::Timeout(url.to_string()))?
            .map_err(|e| NetworkError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
            .collect();
        let final_url = response.url().clone();
        let redirected = final_url != *url;

        let body = response
            .bytes()
            .await
            .map_err(|e| NetworkError::RequestFailed(e.to_string()))?
            .to_vec();

        Ok(FetchResponse {
            status: status.as_u16(),
            headers,
            body,
            url: final_url.to_string(),
            redirected,
        })
    }
}

#[async_trait]
impl Fetcher for FetchEngine {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        Ok(self.fetch(url).await?.text())
    }
}

fn guess_content_type(path: &str) -> &'static str {
    let ext = path.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    match ext.as_str() {
        "html" | "htm" => "text/html",
        "js" => "text/javascript",
        "css" => "text/css",
        "json" => "application/json",
        "dart" => "application/dart",
        _ => "application/octet-stream",
    }
}

/// Parses the part after `data:`. Returns (mime, bytes).
pub(crate) fn parse_data_url(rest: &str) -> Result<(String, Vec<u8>)> {
    // RFC 2397: data:[<mediatype>][;base64],<data>
    let idx = rest
        .find(',')
        .ok_or_else(|| NetworkError::DataUrl("missing comma".to_string()))?;
    let (meta, payload) = rest.split_at(idx);
    let payload = &payload[1..];

    let mut mime = "text/plain;charset=US-ASCII".to_string();
    let mut base64_flag = false;
    for part in meta.split(';') {
        if part.eq_ignore_ascii_case("base64") {
            base64_flag = true;
        } else if !part.is_empty() {
            mime = part.to_string();
        }
    }

    let bytes = if base64_flag {
        base64::engine::general_purpose::STANDARD
            .decode(payload)
            .map_err(|_| NetworkError::DataUrl("invalid base64 payload".to_string()))?
    } else {
        percent_decode_str(payload).collect::<Vec<u8>>()
    };

    Ok((mime, bytes))
}

struct ResponseCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
    ttl: Duration,
}

struct CacheEntry {
    response: FetchResponse,
    expires: Instant,
}

impl ResponseCache {
    fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    async fn get(&self, url: &Url) -> Option<FetchResponse> {
        let entries = self.entries.read().await;
        entries
            .get(url.as_str())
            .filter(|entry| entry.expires > Instant::now())
            .map(|entry| entry.response.clone())
    }

    async fn store(&self, url: &Url, response: &FetchResponse) {
        if self.ttl.is_zero() {
            return;
        }
        self.entries.write().await.insert(
            url.to_string(),
            CacheEntry {
                response: response.clone(),
                expires: Instant::now() + self.ttl,
            },
        );
    }
}
