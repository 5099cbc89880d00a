use app_window_engine::core::dom::{DocumentReadyState, NodeId};
use app_window_engine::{
    AppEngine, AppWindow, Bounds, ContextKind, CreateOptions, Diagnostic, Document, EngineConfig,
    EngineError, Event, Fetcher, HeadlessShell, NetworkError, ScriptEvaluator, Visibility,
    WindowError, WindowRegistry,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const ASSETS: &str = "file:///android_asset/www";

const INDEX: &str = r#"<!DOCTYPE html>
<html>
<head>
  <script src="js/app.js"></script>
</head>
<body class="main">
  <h1>Hello</h1>
  <script>start()</script>
</body>
</html>"#;

/// Serves pages from memory. Unknown URLs fail; every request is recorded.
#[derive(Default)]
struct MemoryFetcher {
    pages: HashMap<String, String>,
    delay_ms: u64,
    requests: Mutex<Vec<String>>,
}

impl MemoryFetcher {
    fn with_pages<K: AsRef<str>>(pages: &[(K, &str)]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|(url, body)| (url.as_ref().to_string(), body.to_string()))
                .collect(),
            ..Default::default()
        }
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Fetcher for MemoryFetcher {
    async fn fetch_text(&self, url: &str) -> std::result::Result<String, NetworkError> {
        self.requests.lock().push(url.to_string());
        tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| NetworkError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}

#[derive(Default)]
struct RecordingEvaluator {
    seen: Mutex<Vec<String>>,
}

impl ScriptEvaluator for RecordingEvaluator {
    fn evaluate(&self, _node: NodeId, source_url: Option<&str>, source: &str) {
        let entry = match source_url {
            Some(url) => url.to_string(),
            None => format!("inline:{source}"),
        };
        self.seen.lock().push(entry);
    }
}

struct Harness {
    registry: WindowRegistry,
    document: Arc<Document>,
    shell: Arc<HeadlessShell>,
    fetcher: Arc<MemoryFetcher>,
    evaluator: Arc<RecordingEvaluator>,
}

impl Harness {
    fn new(fetcher: MemoryFetcher) -> Self {
        Self::with_shell(fetcher, HeadlessShell::new())
    }

    fn with_shell(fetcher: MemoryFetcher, shell: HeadlessShell) -> Self {
        let document = Arc::new(Document::new_html());
        let shell = Arc::new(shell);
        let fetcher = Arc::new(fetcher);
        let evaluator = Arc::new(RecordingEvaluator::default());
        let registry = WindowRegistry::with_evaluator(
            EngineConfig::default(),
            document.clone(),
            fetcher.clone(),
            shell.clone(),
            evaluator.clone(),
        );
        Self {
            registry,
            document,
            shell,
            fetcher,
            evaluator,
        }
    }

    fn standard() -> Self {
        Self::new(Self::standard_fetcher())
    }

    fn standard_fetcher() -> MemoryFetcher {
        MemoryFetcher::with_pages(&[
            (format!("{ASSETS}/index.html"), INDEX),
            (format!("{ASSETS}/js/app.js"), "window.app = {};"),
        ])
    }

    fn body(&self) -> NodeId {
        self.document.body().unwrap()
    }
}

#[tokio::test]
async fn test_create_composes_page_and_shows_window() {
    let h = Harness::standard();
    let callback_runs = AtomicUsize::new(0);

    let window = h
        .registry
        .create("index.html", CreateOptions::default(), |window| {
            callback_runs.fetch_add(1, Ordering::SeqCst);
            assert_eq!(
                window.content().url().as_deref(),
                Some("chrome-extension://app/index.html")
            );
            assert!(!window.ready_gate().is_released());
            assert!(window.content().children(window.content().body().unwrap()).is_empty());
        })
        .await
        .unwrap();

    assert_eq!(callback_runs.load(Ordering::SeqCst), 1);
    assert!(window.ready_gate().is_released());
    assert_eq!(h.document.ready_state(), DocumentReadyState::Complete);
    assert_eq!(h.shell.visibility(), Visibility::Foreground);
    assert_eq!(h.document.attribute(h.body(), "class").as_deref(), Some("main"));
    assert_eq!(
        *h.evaluator.seen.lock(),
        vec![
            "chrome-extension://app/js/app.js".to_string(),
            "inline:start()".to_string()
        ]
    );
    assert_eq!(
        h.fetcher.requests(),
        vec![
            format!("{ASSETS}/index.html"),
            format!("{ASSETS}/js/app.js")
        ]
    );
}

#[tokio::test]
async fn test_second_create_is_rejected() {
    let h = Harness::standard();
    let first = h
        .registry
        .create("index.html", CreateOptions::default(), |_| {})
        .await
        .unwrap();

    let called = AtomicUsize::new(0);
    let second = h
        .registry
        .create("other.html", CreateOptions::default(), |_| {
            called.fetch_add(1, Ordering::SeqCst);
        })
        .await;

    assert!(matches!(second, Err(WindowError::AlreadyCreated)));
    assert_eq!(called.load(Ordering::SeqCst), 0);
    assert_eq!(h.fetcher.requests().len(), 2);
    let all = h.registry.get_all();
    assert_eq!(all.len(), 1);
    assert!(Arc::ptr_eq(&all[0], &first));
}

#[tokio::test]
async fn test_current_depends_on_context() {
    let h = Harness::standard();
    assert!(h.registry.current(ContextKind::Foreground).is_none());
    assert!(h.registry.get_all().is_empty());

    let window = h
        .registry
        .create("index.html", CreateOptions::default(), |_| {})
        .await
        .unwrap();

    let current = h.registry.current(ContextKind::Foreground).unwrap();
    assert!(Arc::ptr_eq(&current, &window));
    assert!(h.registry.current(ContextKind::Background).is_none());
    assert_eq!(window.id(), "");
}

#[tokio::test]
async fn test_failed_fetch_composes_failure_text() {
    let h = Harness::new(MemoryFetcher::default());
    let window = h
        .registry
        .create("missing.html", CreateOptions::default(), |_| {})
        .await
        .unwrap();

    assert_eq!(h.document.text_content(h.body()), "Page load failed.");
    assert!(window.ready_gate().is_released());
    let report = h.registry.last_report().unwrap();
    assert_eq!(
        report.diagnostics,
        vec![Diagnostic::MissingHtmlTag, Diagnostic::MissingBodyTag]
    );
}

#[tokio::test]
async fn test_empty_response_counts_as_failure() {
    let h = Harness::new(MemoryFetcher::with_pages(&[(format!("{ASSETS}/blank.html"), "")]));
    h.registry
        .create("blank.html", CreateOptions::default(), |_| {})
        .await
        .unwrap();
    assert_eq!(h.document.text_content(h.body()), "Page load failed.");
}

#[tokio::test]
async fn test_absolute_urls_are_fetched_unchanged() {
    let page = "https://example.test/app/page.html";
    let h = Harness::new(MemoryFetcher::with_pages(&[(page, "<html><body><p>remote</p></body></html>")]));
    let window = h
        .registry
        .create(page, CreateOptions::default(), |_| {})
        .await
        .unwrap();

    assert_eq!(window.content().url().as_deref(), Some(page));
    assert_eq!(h.fetcher.requests(), vec![page.to_string()]);
    assert_eq!(h.document.text_content(h.body()), "remote");
}

#[tokio::test]
async fn test_page_composed_event_is_dispatched() {
    let h = Harness::standard();
    let heard = Arc::new(AtomicUsize::new(0));
    let counter = heard.clone();
    h.registry.events().add_listener("pagecomposed", move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    h.registry
        .create("index.html", CreateOptions::default(), |_| {})
        .await
        .unwrap();

    assert_eq!(heard.load(Ordering::SeqCst), 1);
    assert_eq!(
        h.registry.events().drain(),
        vec![Event::PageComposed {
            url: "chrome-extension://app/index.html".to_string()
        }]
    );
}

#[tokio::test]
async fn test_bounds_are_always_zero() {
    let h = Harness::standard();
    let options = CreateOptions {
        bounds: Some(Bounds {
            left: 10,
            top: 20,
            width: 640,
            height: 480,
        }),
    };
    let window = h
        .registry
        .create("index.html", options, |_| {})
        .await
        .unwrap();

    window.resize_to(800, 600);
    assert_eq!(window.get_bounds(), Bounds::default());
    assert_eq!(window.id(), "");
}

#[test]
fn test_create_options_ignore_unknown_id() {
    let options: CreateOptions =
        serde_json::from_str(r#"{"id": "main", "bounds": {"left": 1, "top": 2, "width": 3, "height": 4}}"#)
            .unwrap();
    assert_eq!(
        options.bounds,
        Some(Bounds {
            left: 1,
            top: 2,
            width: 3,
            height: 4
        })
    );
    assert!(serde_json::from_str::<CreateOptions>("{}").unwrap().bounds.is_none());
}

#[tokio::test]
async fn test_shell_without_foreground_still_composes() {
    let h = Harness::with_shell(Harness::standard_fetcher(), HeadlessShell::without_foreground());
    let window = h
        .registry
        .create("index.html", CreateOptions::default(), |_| {})
        .await
        .unwrap();

    assert!(window.ready_gate().is_released());
    assert_eq!(h.shell.visibility(), Visibility::Background);

    window.hide();
    assert_eq!(h.shell.visibility(), Visibility::Background);
}

#[tokio::test(start_paused = true)]
async fn test_ready_gate_waiters_resume_after_composition() {
    let mut fetcher = Harness::standard_fetcher();
    fetcher.delay_ms = 200;
    let h = Harness::new(fetcher);

    let (window_tx, window_rx) = tokio::sync::oneshot::channel();
    let create = h.registry.create("index.html", CreateOptions::default(), |window| {
        let _ = window_tx.send(window.clone());
    });
    let waiter = async {
        let window: Arc<AppWindow> = window_rx.await.unwrap();
        window.ready_gate().wait().await;
        h.document.text_content(h.body())
    };

    let (created, body_text) = tokio::join!(create, waiter);
    created.unwrap();
    assert!(body_text.contains("Hello"));
}

#[tokio::test]
async fn test_engine_routes_errors_to_handler() {
    let engine = AppEngine::with_fetcher(
        EngineConfig::default(),
        Arc::new(HeadlessShell::new()),
        Arc::new(Harness::standard_fetcher()),
    );
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = errors.clone();
    engine.set_error_handler(Some(move |e: &EngineError| sink.lock().push(e.to_string())));

    let window = engine.create_window("index.html").await.unwrap();
    assert!(window.ready_gate().is_released());
    assert!(errors.lock().is_empty());

    let second = engine.create_window("index.html").await;
    assert!(matches!(second, Err(EngineError::Window(_))));
    assert_eq!(errors.lock().len(), 1);
    assert!(errors.lock()[0].contains("only one window"));
}
