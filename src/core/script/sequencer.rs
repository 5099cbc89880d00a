use futures::future::{FutureExt, LocalBoxFuture};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Duration;

use super::batch::{classify, partition, CandidateKind, ScriptCandidate};
use super::host::{LoadOutcome, ResourceHost, ResourceKind, ResourceRequest};
use crate::core::compose::attributes::copy_attributes;
use crate::core::dom::{Document, DocumentError, NodeId, ScriptState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberReport {
    pub original: NodeId,
    pub replacement: Option<NodeId>,
    pub outcome: LoadOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub members: Vec<MemberReport>,
}

/// What happened to every element a sequencing run touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceReport {
    /// Every batch the partition produced, empty ones included.
    pub batches: Vec<BatchReport>,
    /// Scripts dropped for having a type outside the allow-list.
    pub skipped: usize,
    pub failed: usize,
}

impl SequenceReport {
    pub fn non_empty_batches(&self) -> usize {
        self.batches.iter().filter(|b| !b.members.is_empty()).count()
    }

    pub fn replacements(&self) -> Vec<NodeId> {
        self.batches
            .iter()
            .flat_map(|b| b.members.iter().filter_map(|m| m.replacement))
            .collect()
    }
}

/// Re-creates the inert scripts and placeholders under a container so they
/// run in document order, batch by batch.
pub struct ScriptSequencer {
    host: Arc<dyn ResourceHost>,
    placeholder_tag: String,
    settle_timeout: Option<Duration>,
}

impl ScriptSequencer {
    pub fn new(host: Arc<dyn ResourceHost>, placeholder_tag: &str) -> Self {
        Self {
            host,
            placeholder_tag: placeholder_tag.to_ascii_lowercase(),
            settle_timeout: None,
        }
    }

    /// Bounds how long a single load may take before it counts as failed.
    pub fn with_settle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.settle_timeout = timeout;
        self
    }

    pub fn placeholder_tag(&self) -> &str {
        &self.placeholder_tag
    }

    /// Runs the sequence and then calls `on_complete` exactly once.
    pub async fn run_then<F>(&self, document: &Document, container: NodeId, on_complete: F) -> SequenceReport
    where
        F: FnOnce(&SequenceReport),
    {
        let report = self.run(document, container).await;
        on_complete(&report);
        report
    }

    pub async fn run(&self, document: &Document, container: NodeId) -> SequenceReport {
        let tags = ["script", self.placeholder_tag.as_str()];
        let candidates: Vec<ScriptCandidate> = document
            .descendants_by_tag(container, &tags)
            .into_iter()
            .map(|node| classify(document, node))
            .collect();

        let mut report = SequenceReport::default();
        for candidate in &candidates {
            if let CandidateKind::Unsupported(script_type) = &candidate.kind {
                tracing::debug!("skipping script {:?} with type {:?}", candidate.node, script_type);
                report.skipped += 1;
            }
        }

        let batches = partition(&candidates);
        let total = batches.len();
        for (index, batch) in batches.iter().enumerate() {
            if batch.is_empty() {
                tracing::trace!("batch {}/{} is empty", index + 1, total);
                report.batches.push(BatchReport::default());
                continue;
            }
            tracing::debug!("running batch {}/{} with {} members", index + 1, total, batch.len());
            let batch_report = self.run_batch(document, batch).await;
            report.failed += batch_report
                .members
                .iter()
                .filter(|m| !m.outcome.is_loaded())
                .count();
            report.batches.push(batch_report);
        }
        report
    }

    async fn run_batch(&self, document: &Document, batch: &[ScriptCandidate]) -> BatchReport {
        let mut members = Vec::with_capacity(batch.len());
        let mut pending: FuturesUnordered<LocalBoxFuture<'_, (usize, LoadOutcome)>> =
            FuturesUnordered::new();

        for candidate in batch {
            let slot = members.len();
            let replacement = match self.recreate(document, candidate) {
                Ok(id) => id,
                Err(e) => {
                    tracing::warn!("could not re-create {:?}: {}", candidate.node, e);
                    members.push(MemberReport {
                        original: candidate.node,
                        replacement: None,
                        outcome: LoadOutcome::Failed(e.to_string()),
                    });
                    continue;
                }
            };
            members.push(MemberReport {
                original: candidate.node,
                replacement: Some(replacement),
                outcome: LoadOutcome::Loaded,
            });

            match candidate.kind {
                CandidateKind::Inline => {
                    if let Some(script) = document.inline_script(replacement) {
                        self.host.execute_inline(&script);
                    }
                    mark_started(document, replacement);
                }
                _ => {
                    let request = self.request_for(document, candidate, replacement);
                    self.host.prepare(&request);
                    mark_started(document, replacement);
                    pending.push(self.settle(slot, request));
                }
            }
        }

        let mut remaining = pending.len();
        while let Some((slot, outcome)) = pending.next().await {
            remaining -= 1;
            if let LoadOutcome::Failed(reason) = &outcome {
                tracing::debug!("load failed for {:?}: {}", members[slot].original, reason);
            }
            tracing::trace!("{} loads outstanding", remaining);
            members[slot].outcome = outcome;
        }

        BatchReport { members }
    }

    fn settle(&self, slot: usize, request: ResourceRequest) -> LocalBoxFuture<'_, (usize, LoadOutcome)> {
        let node = request.node;
        let load = self.host.load(request);
        let timeout = self.settle_timeout;
        async move {
            let outcome = match timeout {
                Some(limit) => match tokio::time::timeout(limit, load).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        tracing::warn!("load of {:?} did not settle within {:?}", node, limit);
                        LoadOutcome::Failed("timed out".to_string())
                    }
                },
                None => load.await,
            };
            (slot, outcome)
        }
        .boxed_local()
    }

    /// Builds the executable twin of `candidate` and splices it in place.
    fn recreate(&self, document: &Document, candidate: &ScriptCandidate) -> Result<NodeId, DocumentError> {
        let original = candidate.node;
        let parent = document.parent(original).ok_or_else(|| {
            DocumentError::InvalidOperation(format!("{original:?} is no longer attached"))
        })?;

        let tag = match candidate.kind {
            CandidateKind::Deferred => "link",
            _ => "script",
        };
        let replacement = document.create_element(tag);
        let spliced = populate(document, candidate, replacement)
            .and_then(|()| document.replace_child(parent, replacement, original));
        if let Err(e) = spliced {
            // Never attached, so this cannot fail.
            let _ = document.drop_subtree(replacement);
            return Err(e);
        }
        // The original is discarded, not kept around detached.
        document.drop_subtree(original)?;
        Ok(replacement)
    }

    fn request_for(&self, document: &Document, candidate: &ScriptCandidate, replacement: NodeId) -> ResourceRequest {
        let (kind, url_attribute) = match candidate.kind {
            CandidateKind::Deferred => (ResourceKind::Link, "href"),
            _ => (ResourceKind::Script, "src"),
        };
        let url = document.attribute(replacement, url_attribute).map(|raw| {
            document
                .resolve_url(&raw)
                .map(|u| u.to_string())
                .unwrap_or(raw)
        });
        ResourceRequest {
            node: replacement,
            kind,
            url,
            attributes: document.attributes(replacement),
            ordered: kind == ResourceKind::Script,
        }
    }
}

/// Copies the original's attributes and source onto its fresh twin.
fn populate(document: &Document, candidate: &ScriptCandidate, replacement: NodeId) -> Result<(), DocumentError> {
    let original = candidate.node;
    copy_attributes(document, original, replacement)?;

    if candidate.kind != CandidateKind::Deferred {
        let text = document.text_content(original);
        if !text.is_empty() {
            document.set_text_content(replacement, &text)?;
        }
    }
    if candidate.kind == CandidateKind::External {
        // Same effect as setting `async = false` on a script element.
        document.set_script_state(
            replacement,
            ScriptState {
                already_started: false,
                force_async: false,
            },
        )?;
        document.remove_attribute(replacement, "async")?;
    }
    Ok(())
}

fn mark_started(document: &Document, node: NodeId) {
    if let Some(mut state) = document.script_state(node) {
        state.already_started = true;
        // Only fails for unknown nodes, and `node` was just created.
        let _ = document.set_script_state(node, state);
    }
}
