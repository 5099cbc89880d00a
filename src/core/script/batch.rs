//! Classification of collected script-like elements and the batching rule.

use crate::core::dom::{Document, NodeId};

/// Script `type` values that get executed. Matching is a case-insensitive
/// substring test, so `text/javascript;version=1.8` is accepted too.
pub const ALLOWED_SCRIPT_TYPES: [&str; 3] =
    ["text/javascript", "application/javascript", "application/dart"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateKind {
    /// `<script>` with no `src`.
    Inline,
    /// `<script src=...>`.
    External,
    /// A neutralised import link that still has to be re-created as `<link>`.
    Deferred,
    /// A script whose `type` is not on the allow-list.
    Unsupported(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptCandidate {
    pub node: NodeId,
    pub kind: CandidateKind,
}

impl ScriptCandidate {
    pub fn new(node: NodeId, kind: CandidateKind) -> Self {
        Self { node, kind }
    }
}

pub type Batch = Vec<ScriptCandidate>;

pub fn is_allowed_script_type(script_type: Option<&str>) -> bool {
    match script_type {
        None => true,
        Some(t) if t.is_empty() => true,
        Some(t) => {
            let lower = t.to_ascii_lowercase();
            ALLOWED_SCRIPT_TYPES.iter().any(|allowed| lower.contains(allowed))
        }
    }
}

/// Classifies one collected element. Anything that is not a `<script>` is
/// treated as a deferred placeholder.
pub fn classify(document: &Document, node: NodeId) -> ScriptCandidate {
    let is_script = document
        .tag_name(node)
        .map(|t| t == "script")
        .unwrap_or(false);
    if !is_script {
        return ScriptCandidate::new(node, CandidateKind::Deferred);
    }
    let script_type = document.attribute(node, "type");
    if !is_allowed_script_type(script_type.as_deref()) {
        return ScriptCandidate::new(
            node,
            CandidateKind::Unsupported(script_type.unwrap_or_default()),
        );
    }
    if document.has_attribute(node, "src") {
        ScriptCandidate::new(node, CandidateKind::External)
    } else {
        ScriptCandidate::new(node, CandidateKind::Inline)
    }
}

/// Splits candidates into ordered batches.
///
/// Starts with one open batch. An inline script closes the open batch, sits
/// alone in its own batch, and opens a fresh one. Everything else joins the
/// open batch. Unsupported candidates are dropped. Empty batches are kept
/// exactly as the rule produces them.
pub fn partition(candidates: &[ScriptCandidate]) -> Vec<Batch> {
    let mut batches: Vec<Batch> = vec![Vec::new()];
    for candidate in candidates {
        match candidate.kind {
            CandidateKind::Unsupported(_) => {}
            CandidateKind::Inline => {
                batches.push(vec![candidate.clone()]);
                batches.push(Vec::new());
            }
            CandidateKind::External | CandidateKind::Deferred => {
                if let Some(open) = batches.last_mut() {
                    open.push(candidate.clone());
                }
            }
        }
    }
    batches
}
