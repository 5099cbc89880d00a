use parking_lot::RwLock;
use url::Url;

/// Path that pages load to learn whether content has finished loading.
const CONTENT_LOADED_PATH: &str = "/chrome-content-loaded";

/// Script served for `CONTENT_LOADED_PATH`: pins `document.readyState` to
/// `'loading'` so libraries waiting on the host page keep waiting.
const CONTENT_LOADED_SCRIPT: &str = "data:text/javascript,Object.defineProperty%28document%2C%20%27readyState%27%2C%20%7Bget%3A%20function%28%29%20%7B%20return%20%27loading%27%7D%2C%20configurable%3A%20true%20%7D%29%3B";

/// Builds and resolves app-scheme URLs (`chrome-extension://<id>/...`).
#[derive(Debug)]
pub struct RuntimeUrls {
    scheme: String,
    app_id: String,
    base: RwLock<Option<String>>,
    default_base: String,
}

impl RuntimeUrls {
    pub fn new(scheme: &str, app_id: &str, default_base: &str) -> Self {
        Self {
            scheme: scheme.to_string(),
            app_id: app_id.to_string(),
            base: RwLock::new(None),
            default_base: default_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Absolute app URL for a package-relative path.
    pub fn get_url(&self, path: &str) -> String {
        format!(
            "{}://{}/{}",
            self.scheme,
            self.app_id,
            path.trim_start_matches('/')
        )
    }

    pub fn is_app_url(&self, url: &str) -> bool {
        url.len() > self.scheme.len()
            && url.as_bytes()[self.scheme.len()] == b':'
            && url[..self.scheme.len()].eq_ignore_ascii_case(&self.scheme)
    }

    /// Learns the real package location from the first page that starts
    /// loading: everything from `/plugins/` on is dropped.
    pub fn observe_page_started(&self, page_url: &str) {
        let mut base = self.base.write();
        if base.is_some() {
            return;
        }
        let derived = match page_url.find("/plugins/") {
            Some(pos) => &page_url[..pos],
            None => page_url,
        };
        tracing::debug!("runtime base location set to {}", derived);
        *base = Some(derived.to_string());
    }

    pub fn base(&self) -> String {
        self.base
            .read()
            .clone()
            .unwrap_or_else(|| self.default_base.clone())
    }

    /// Maps an app-scheme URL onto a location that can actually be loaded.
    /// URLs with any other scheme are returned unchanged.
    pub fn remap(&self, url: &str) -> String {
        if !self.is_app_url(url) {
            return url.to_string();
        }
        let path = match Url::parse(url) {
            Ok(parsed) => parsed.path().to_string(),
            Err(e) => {
                tracing::debug!("leaving unparsable app url {} untouched: {}", url, e);
                return url.to_string();
            }
        };
        if path == CONTENT_LOADED_PATH {
            return CONTENT_LOADED_SCRIPT.to_string();
        }
        format!("{}{}", self.base(), path)
    }

    pub fn should_allow_request(&self, url: &str) -> bool {
        self.is_app_url(url)
    }

    /// Iframes navigate to app URLs too.
    pub fn should_allow_navigation(&self, url: &str) -> bool {
        self.is_app_url(url)
    }
}
