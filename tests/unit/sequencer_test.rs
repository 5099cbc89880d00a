use app_window_engine::core::dom::{AdjacentPosition, Document, InlineScript, NodeId};
use app_window_engine::core::network::{Fetcher, NetworkError, RuntimeUrls};
use app_window_engine::core::script::*;
use async_trait::async_trait;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::cell::Cell;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const PLACEHOLDER: &str = "x-txpspgbc";

fn file_name(url: &str) -> String {
    url.rsplit('/').next().unwrap_or(url).to_string()
}

/// Host that records what it was asked to do. Loads sleep for a per-file
/// delay; files starting with `fail` fail.
#[derive(Default)]
struct ScriptedHost {
    delays: HashMap<String, u64>,
    log: Mutex<Vec<String>>,
}

impl ScriptedHost {
    fn with_delays(delays: &[(&str, u64)]) -> Self {
        Self {
            delays: delays.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            log: Mutex::new(Vec::new()),
        }
    }

    fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }
}

#[async_trait(?Send)]
impl ResourceHost for ScriptedHost {
    fn execute_inline(&self, script: &InlineScript) {
        self.log.lock().push(format!("inline {}", script.content));
    }

    async fn load(&self, request: ResourceRequest) -> LoadOutcome {
        let name = request.url.as_deref().map(file_name).unwrap_or_default();
        let delay = self.delays.get(&name).copied().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        let verb = match request.kind {
            ResourceKind::Script => "load",
            ResourceKind::Link => "link",
        };
        self.log.lock().push(format!("{verb} {name}"));
        if name.starts_with("fail") {
            LoadOutcome::Failed("404".to_string())
        } else {
            LoadOutcome::Loaded
        }
    }
}

fn page(markup: &str) -> (Document, NodeId) {
    let doc = Document::new_html();
    doc.set_url("https://app.test/index.html");
    let body = doc.body().unwrap();
    doc.insert_adjacent_html(body, AdjacentPosition::BeforeEnd, markup)
        .unwrap();
    (doc, body)
}

#[tokio::test(start_paused = true)]
async fn test_inline_waits_for_slow_external() {
    let (doc, body) = page(r#"<script src="slow.js"></script><script>after()</script>"#);
    let host = Arc::new(ScriptedHost::with_delays(&[("slow.js", 500)]));
    let sequencer = ScriptSequencer::new(host.clone(), PLACEHOLDER);

    let start = tokio::time::Instant::now();
    let (report, midway) = tokio::join!(sequencer.run(&doc, body), async {
        tokio::time::sleep(Duration::from_millis(250)).await;
        host.log()
    });

    assert!(midway.is_empty(), "ran before slow.js settled: {midway:?}");
    assert!(start.elapsed() >= Duration::from_millis(500));
    assert_eq!(host.log(), vec!["load slow.js", "inline after()"]);
    assert_eq!(report.failed, 0);
    assert_eq!(report.non_empty_batches(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_external_does_not_block_later_batches() {
    let (doc, body) = page(r#"<script src="fail.js"></script><script>still()</script>"#);
    let host = Arc::new(ScriptedHost::default());
    let report = ScriptSequencer::new(host.clone(), PLACEHOLDER)
        .run(&doc, body)
        .await;

    assert_eq!(host.log(), vec!["load fail.js", "inline still()"]);
    assert_eq!(report.failed, 1);
    assert_eq!(
        report.batches[0].members[0].outcome,
        LoadOutcome::Failed("404".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn test_mixed_sequence_runs_batch_by_batch() {
    let markup = concat!(
        r#"<script src="a.js"></script>"#,
        r#"<script src="b.js"></script>"#,
        "<script>one</script>",
        r#"<script src="c.js"></script>"#,
        "<script>two</script>",
        "<script>three</script>",
    );
    let (doc, body) = page(markup);
    let host = Arc::new(ScriptedHost::with_delays(&[("a.js", 20), ("b.js", 10), ("c.js", 5)]));
    let report = ScriptSequencer::new(host.clone(), PLACEHOLDER)
        .run(&doc, body)
        .await;

    // Within a batch loads settle by completion; batches never overlap.
    assert_eq!(
        host.log(),
        vec![
            "load b.js",
            "load a.js",
            "inline one",
            "load c.js",
            "inline two",
            "inline three",
        ]
    );
    assert_eq!(report.batches.len(), 7);
    assert_eq!(report.non_empty_batches(), 5);
    let sizes: Vec<usize> = report.batches.iter().map(|b| b.members.len()).collect();
    assert_eq!(sizes, vec![2, 1, 1, 1, 0, 1, 0]);
}

#[tokio::test(start_paused = true)]
async fn test_run_then_reports_after_everything_settled() {
    let (doc, body) = page(r#"<script src="late.js"></script><script>x</script>"#);
    let host = Arc::new(ScriptedHost::with_delays(&[("late.js", 100)]));
    let calls = Cell::new(0);

    let report = ScriptSequencer::new(host.clone(), PLACEHOLDER)
        .run_then(&doc, body, |report| {
            calls.set(calls.get() + 1);
            assert_eq!(host.log().len(), 2);
            assert_eq!(report.replacements().len(), 2);
        })
        .await;

    assert_eq!(calls.get(), 1);
    assert_eq!(report.failed, 0);
}

#[tokio::test(start_paused = true)]
async fn test_run_then_fires_for_empty_container() {
    let (doc, body) = page("<p>no scripts here</p>");
    let host = Arc::new(ScriptedHost::default());
    let fired = Cell::new(false);

    let report = ScriptSequencer::new(host.clone(), PLACEHOLDER)
        .run_then(&doc, body, |_| fired.set(true))
        .await;

    assert!(fired.get());
    assert_eq!(report.batches.len(), 1);
    assert_eq!(report.non_empty_batches(), 0);
    assert!(host.log().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_settle_timeout_marks_hung_load_failed() {
    let (doc, body) = page(r#"<script src="hang.js"></script><script>next()</script>"#);
    let host = Arc::new(ScriptedHost::with_delays(&[("hang.js", 3_600_000)]));
    let report = ScriptSequencer::new(host.clone(), PLACEHOLDER)
        .with_settle_timeout(Some(Duration::from_millis(100)))
        .run(&doc, body)
        .await;

    assert_eq!(host.log(), vec!["inline next()"]);
    assert_eq!(report.failed, 1);
    assert_eq!(
        report.batches[0].members[0].outcome,
        LoadOutcome::Failed("timed out".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn test_unsupported_types_are_skipped_in_place() {
    let (doc, body) = page(concat!(
        r#"<script type="text/template"><b>tpl</b></script>"#,
        r#"<script type="TEXT/JavaScript;version=1.8">legacy()</script>"#,
    ));
    let template = doc.children(body)[0];
    let host = Arc::new(ScriptedHost::default());
    let report = ScriptSequencer::new(host.clone(), PLACEHOLDER)
        .run(&doc, body)
        .await;

    assert_eq!(report.skipped, 1);
    assert_eq!(host.log(), vec!["inline legacy()"]);
    assert!(doc.is_connected(template));
}

#[tokio::test(start_paused = true)]
async fn test_external_replacement_is_ordered_and_started() {
    let (doc, body) = page(r#"<script async src="lib.js" data-main="app"></script>"#);
    let original = doc.children(body)[0];
    let host = Arc::new(ScriptedHost::default());
    let report = ScriptSequencer::new(host.clone(), PLACEHOLDER)
        .run(&doc, body)
        .await;

    let replacement = report.replacements()[0];
    assert_ne!(replacement, original);
    assert!(!doc.contains(original));
    assert_eq!(doc.children(body), vec![replacement]);
    assert_eq!(doc.attribute(replacement, "data-main").as_deref(), Some("app"));
    assert!(!doc.has_attribute(replacement, "async"));

    let state = doc.script_state(replacement).unwrap();
    assert!(state.already_started);
    assert!(!state.force_async);
}

#[tokio::test(start_paused = true)]
async fn test_originals_are_freed_after_replacement() {
    let (doc, body) = page(&format!(
        r#"<script src="a.js"></script><script>inline()</script><{PLACEHOLDER} href="w.html"></{PLACEHOLDER}><p>kept</p>"#
    ));
    let originals = doc.children(body);
    let before = doc.node_count();

    let report = ScriptSequencer::new(Arc::new(ScriptedHost::default()), PLACEHOLDER)
        .run(&doc, body)
        .await;

    assert_eq!(doc.node_count(), before);
    assert_eq!(report.replacements().len(), 3);
    assert!(originals[..3].iter().all(|&id| !doc.contains(id)));
    assert!(doc.is_connected(originals[3]));
    assert_eq!(doc.text_content(report.replacements()[1]), "inline()");
}

#[tokio::test(start_paused = true)]
async fn test_placeholder_becomes_link() {
    let (doc, body) = page(&format!(
        r#"<{PLACEHOLDER} rel="import" href="widgets.html"></{PLACEHOLDER}><script>use()</script>"#
    ));
    let host = Arc::new(ScriptedHost::with_delays(&[("widgets.html", 50)]));
    let report = ScriptSequencer::new(host.clone(), PLACEHOLDER)
        .run(&doc, body)
        .await;

    assert_eq!(host.log(), vec!["link widgets.html", "inline use()"]);
    let link = report.replacements()[0];
    assert_eq!(doc.tag_name(link).as_deref(), Some("link"));
    assert_eq!(doc.attribute(link, "rel").as_deref(), Some("import"));
    assert_eq!(doc.attribute(link, "href").as_deref(), Some("widgets.html"));
}

struct FakeFetcher {
    delays: HashMap<String, u64>,
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, NetworkError> {
        let name = file_name(url);
        let delay = self.delays.get(&name).copied().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        if name.starts_with("fail") {
            return Err(NetworkError::Status {
                url: url.to_string(),
                status: 404,
            });
        }
        Ok(format!("/* {name} */"))
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

#[tokio::test(start_paused = true)]
async fn test_network_host_executes_in_insertion_order() {
    let doc = Document::new_html();
    doc.set_url("chrome-extension://app/index.html");
    let body = doc.body().unwrap();
    doc.insert_adjacent_html(
        body,
        AdjacentPosition::BeforeEnd,
        concat!(
            r#"<script src="first.js"></script>"#,
            r#"<script src="fail.js"></script>"#,
            r#"<script src="second.js"></script>"#,
            "<script>done()</script>",
        ),
    )
    .unwrap();

    let fetcher = Arc::new(FakeFetcher {
        delays: [("first.js".to_string(), 300), ("second.js".to_string(), 10)]
            .into_iter()
            .collect(),
    });
    let evaluator = Arc::new(RecordingEvaluator::default());
    let urls = Arc::new(RuntimeUrls::new("chrome-extension", "app", "file:///android_asset/www"));
    let host = Arc::new(NetworkResourceHost::new(fetcher, evaluator.clone(), urls));

    let report = ScriptSequencer::new(host, PLACEHOLDER).run(&doc, body).await;

    assert_eq!(
        *evaluator.seen.lock(),
        vec![
            "chrome-extension://app/first.js".to_string(),
            "chrome-extension://app/second.js".to_string(),
            "inline:done()".to_string(),
        ]
    );
    assert_eq!(report.failed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_timed_out_script_does_not_block_later_scripts() {
    let doc = Document::new_html();
    doc.set_url("chrome-extension://app/index.html");
    let body = doc.body().unwrap();
    doc.insert_adjacent_html(
        body,
        AdjacentPosition::BeforeEnd,
        concat!(
            r#"<script src="hang.js"></script>"#,
            "<script>mid()</script>",
            r#"<script src="later.js"></script>"#,
        ),
    )
    .unwrap();

    let fetcher = Arc::new(FakeFetcher {
        delays: [("hang.js".to_string(), 3_600_000)].into_iter().collect(),
    });
    let evaluator = Arc::new(RecordingEvaluator::default());
    let urls = Arc::new(RuntimeUrls::new("chrome-extension", "app", "file:///android_asset/www"));
    let host = Arc::new(NetworkResourceHost::new(fetcher, evaluator.clone(), urls));

    let report = ScriptSequencer::new(host, PLACEHOLDER)
        .with_settle_timeout(Some(Duration::from_millis(100)))
        .run(&doc, body)
        .await;

    assert_eq!(
        *evaluator.seen.lock(),
        vec![
            "inline:mid()".to_string(),
            "chrome-extension://app/later.js".to_string(),
        ]
    );
    let outcomes: Vec<LoadOutcome> = report
        .batches
        .iter()
        .flat_map(|b| b.members.iter().map(|m| m.outcome.clone()))
        .collect();
    assert_eq!(
        outcomes,
        vec![
            LoadOutcome::Failed("timed out".to_string()),
            LoadOutcome::Loaded,
            LoadOutcome::Loaded,
        ]
    );
    assert_eq!(report.failed, 1);
}
