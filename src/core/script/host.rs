use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Notify;

use crate::core::dom::{InlineScript, NodeId};
use crate::core::network::{Fetcher, RuntimeUrls};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Script,
    Link,
}

/// A freshly inserted element that loads something.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequest {
    pub node: NodeId,
    pub kind: ResourceKind,
    /// Absolute URL, or `None` when the element had no `src`/`href`.
    pub url: Option<String>,
    pub attributes: Vec<(String, String)>,
    /// External script that must execute in insertion order.
    pub ordered: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    Failed(String),
}

impl LoadOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadOutcome::Loaded)
    }
}

/// Whatever reacts to script and link elements entering the document.
#[async_trait(?Send)]
pub trait ResourceHost {
    /// Called synchronously, in insertion order, as each loading element is
    /// spliced in. Hosts use it to fix the execution order of ordered scripts
    /// before any fetch starts.
    fn prepare(&self, _request: &ResourceRequest) {}

    fn execute_inline(&self, script: &InlineScript);

    /// Resolves once the element has loaded (and, for scripts, executed) or failed.
    async fn load(&self, request: ResourceRequest) -> LoadOutcome;
}

/// Runs script source. There is no JavaScript engine in this crate.
pub trait ScriptEvaluator: Send + Sync {
    fn evaluate(&self, node: NodeId, source_url: Option<&str>, source: &str);
}

/// Logs each evaluation instead of running it.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEvaluator;

impl ScriptEvaluator for TracingEvaluator {
    fn evaluate(&self, node: NodeId, source_url: Option<&str>, source: &str) {
        tracing::info!(
            node = node.0,
            url = source_url.unwrap_or("<inline>"),
            bytes = source.len(),
            "evaluating script"
        );
    }
}

/// Fetched bodies waiting for their turn. `None` marks a failed fetch.
#[derive(Default)]
struct OrderedQueue {
    pending: VecDeque<NodeId>,
    ready: HashMap<NodeId, Option<(String, String)>>,
    settled: HashSet<NodeId>,
    abandoned: HashSet<NodeId>,
}

/// Holds a node's place in the ordered queue. If the load is dropped before
/// it settles (a settle timeout, say) the slot is released as a skipped
/// script so later scripts are not held behind it.
struct OrderedSlot<'a> {
    host: &'a NetworkResourceHost,
    node: NodeId,
    settled: bool,
}

impl Drop for OrderedSlot<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let waiting = {
            let mut queue = self.host.queue.lock();
            if queue.pending.contains(&self.node) {
                queue.ready.insert(self.node, None);
                queue.abandoned.insert(self.node);
                true
            } else {
                queue.settled.remove(&self.node);
                false
            }
        };
        if waiting {
            tracing::debug!("ordered script {:?} abandoned before its turn", self.node);
            self.host.drain_ready();
        }
    }
}

/// Default host: fetches through a `Fetcher` and hands sources to a
/// `ScriptEvaluator`.
pub struct NetworkResourceHost {
    fetcher: Arc<dyn Fetcher>,
    evaluator: Arc<dyn ScriptEvaluator>,
    urls: Arc<RuntimeUrls>,
    queue: Mutex<OrderedQueue>,
    progress: Notify,
}

impl NetworkResourceHost {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        evaluator: Arc<dyn ScriptEvaluator>,
        urls: Arc<RuntimeUrls>,
    ) -> Self {
        Self {
            fetcher,
            evaluator,
            urls,
            queue: Mutex::new(OrderedQueue::default()),
            progress: Notify::new(),
        }
    }

    async fn fetch(&self, url: &str) -> Result<String, String> {
        let target = self.urls.remap(url);
        if target != url {
            tracing::trace!("remapped {} -> {}", url, target);
        }
        self.fetcher
            .fetch_text(&target)
            .await
            .map_err(|e| e.to_string())
    }

    /// Executes every ready script at the head of the queue.
    fn drain_ready(&self) {
        loop {
            let next = {
                let mut queue = self.queue.lock();
                let Some(&front) = queue.pending.front() else {
                    break;
                };
                let Some(entry) = queue.ready.remove(&front) else {
                    break;
                };
                queue.pending.pop_front();
                (front, entry)
            };
            let (node, entry) = next;
            // Evaluate outside the lock; the evaluator may be slow.
            if let Some((url, source)) = entry {
                self.evaluator.evaluate(node, Some(&url), &source);
            }
            let mut queue = self.queue.lock();
            if !queue.abandoned.remove(&node) {
                queue.settled.insert(node);
            }
        }
        self.progress.notify_waiters();
    }

    async fn load_ordered(&self, node: NodeId, url: String) -> LoadOutcome {
        let mut slot = OrderedSlot {
            host: self,
            node,
            settled: false,
        };
        let result = self.fetch(&url).await;
        let outcome = match &result {
            Ok(_) => LoadOutcome::Loaded,
            Err(reason) => LoadOutcome::Failed(reason.clone()),
        };
        {
            let mut queue = self.queue.lock();
            if !queue.pending.contains(&node) {
                // Not prepared; run as soon as fetched.
                drop(queue);
                slot.settled = true;
                if let Ok(source) = &result {
                    self.evaluator.evaluate(node, Some(&url), source);
                }
                return outcome;
            }
            queue.ready.insert(node, result.ok().map(|source| (url, source)));
        }
        self.drain_ready();

        loop {
            let notified = self.progress.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.queue.lock().settled.remove(&node) {
                slot.settled = true;
                return outcome;
            }
            notified.await;
        }
    }
}

#[async_trait(?Send)]
impl ResourceHost for NetworkResourceHost {
    fn prepare(&self, request: &ResourceRequest) {
        if request.kind == ResourceKind::Script && request.ordered && request.url.is_some() {
            self.queue.lock().pending.push_back(request.node);
        }
    }

    fn execute_inline(&self, script: &InlineScript) {
        self.evaluator.evaluate(script.node, None, &script.content);
    }

    async fn load(&self, request: ResourceRequest) -> LoadOutcome {
        let Some(url) = request.url.clone() else {
            return LoadOutcome::Failed("no source url".to_string());
        };
        match request.kind {
            ResourceKind::Script if request.ordered => self.load_ordered(request.node, url).await,
            ResourceKind::Script => match self.fetch(&url).await {
                Ok(source) => {
                    self.evaluator.evaluate(request.node, Some(&url), &source);
                    LoadOutcome::Loaded
                }
                Err(reason) => LoadOutcome::Failed(reason),
            },
            ResourceKind::Link => match self.fetch(&url).await {
                Ok(_) => LoadOutcome::Loaded,
                Err(reason) => LoadOutcome::Failed(reason),
            },
        }
    }
}
