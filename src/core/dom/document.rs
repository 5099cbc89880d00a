use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;
use url::Url;

use super::node::{Node, NodeType, ScriptState};
use super::parser::{self, FragmentNode};

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

pub type Result<T> = std::result::Result<T, DocumentError>;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl NodeId {
    pub fn new() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentReadyState {
    Loading,
    Interactive,
    Complete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: String,
    pub url: Option<String>,
    pub charset: String,
    pub ready_state: DocumentReadyState,
}

impl Default for DocumentMetadata {
    fn default() -> Self {
        Self {
            title: String::new(),
            url: None,
            charset: "UTF-8".to_string(),
            ready_state: DocumentReadyState::Loading,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationType {
    ChildList,
    Attributes,
    CharacterData,
}

#[derive(Debug, Clone)]
pub struct MutationRecord {
    pub mutation_type: MutationType,
    pub target: NodeId,
    pub added_nodes: Vec<NodeId>,
    pub removed_nodes: Vec<NodeId>,
    pub attribute_name: Option<String>,
    pub old_value: Option<String>,
    pub timestamp: std::time::Instant,
}

impl MutationRecord {
    fn new(mutation_type: MutationType, target: NodeId) -> Self {
        Self {
            mutation_type,
            target,
            added_nodes: Vec::new(),
            removed_nodes: Vec::new(),
            attribute_name: None,
            old_value: None,
            timestamp: std::time::Instant::now(),
        }
    }
}

/// Where `insert_adjacent_html` places the parsed nodes relative to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjacentPosition {
    BeforeBegin,
    AfterBegin,
    BeforeEnd,
    AfterEnd,
}

/// Snapshot of an inline script handed to whatever executes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineScript {
    pub node: NodeId,
    pub content: String,
    pub script_type: Option<String>,
}

/// Arena-backed live document.
///
/// Nodes live in a concurrent map keyed by `NodeId`; tree structure is held in
/// each node's `parent`/`children` fields. While mutations are observed,
/// every structural or attribute change appends a `MutationRecord`.
pub struct Document {
    metadata: Arc<RwLock<DocumentMetadata>>,
    root: NodeId,
    nodes: Arc<DashMap<NodeId, Arc<RwLock<Node>>>>,
    mutation_records: Arc<RwLock<Vec<MutationRecord>>>,
    observing: AtomicBool,
    composed: AtomicBool,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("url", &self.metadata.read().url)
            .field("root", &self.root)
            .field("node_count", &self.nodes.len())
            .finish()
    }
}

impl Document {
    /// An empty document with only the `#document` node.
    pub fn new() -> Self {
        let root = NodeId::new();
        let nodes = DashMap::new();
        nodes.insert(root, Arc::new(RwLock::new(Node::new_document(root))));
        Self {
            metadata: Arc::new(RwLock::new(DocumentMetadata::default())),
            root,
            nodes: Arc::new(nodes),
            mutation_records: Arc::new(RwLock::new(Vec::new())),
            observing: AtomicBool::new(false),
            composed: AtomicBool::new(false),
        }
    }

    /// `#document > html > (head, body)`.
    pub fn new_html() -> Self {
        let document = Self::new();
        let html = document.create_element("html");
        let head = document.create_element("head");
        let body = document.create_element("body");
        document.attach(html, head, None);
        document.attach(html, body, None);
        document.attach(document.root, html, None);
        document
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn get_node(&self, id: NodeId) -> Option<Arc<RwLock<Node>>> {
        self.nodes.get(&id).map(|entry| entry.value().clone())
    }

    fn node(&self, id: NodeId) -> Result<Arc<RwLock<Node>>> {
        self.get_node(id).ok_or(DocumentError::NodeNotFound(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn document_element(&self) -> Option<NodeId> {
        self.children(self.root)
            .into_iter()
            .find(|&id| self.is_element(id))
    }

    pub fn head(&self) -> Option<NodeId> {
        self.child_named(self.document_element()?, "head")
    }

    pub fn body(&self) -> Option<NodeId> {
        self.child_named(self.document_element()?, "body")
    }

    fn child_named(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.children(parent).into_iter().find(|&id| {
            self.get_node(id)
                .map(|n| n.read().is_element_named(name))
                .unwrap_or(false)
        })
    }

    fn insert_node(&self, node: Node) -> NodeId {
        let id = node.id;
        self.nodes.insert(id, Arc::new(RwLock::new(node)));
        id
    }

    pub fn create_element(&self, tag_name: &str) -> NodeId {
        self.insert_node(Node::new_element(tag_name, NodeId::new()))
    }

    pub fn create_text(&self, text: &str) -> NodeId {
        self.insert_node(Node::new_text(text.to_string(), NodeId::new()))
    }

    pub fn create_comment(&self, text: &str) -> NodeId {
        self.insert_node(Node::new_comment(text.to_string(), NodeId::new()))
    }

    /// Links `child` under `parent` before `reference` (or last). Both nodes must exist.
    fn attach(&self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        if let Some(parent_node) = self.get_node(parent) {
            let mut parent_node = parent_node.write();
            let index = reference
                .and_then(|r| parent_node.children.iter().position(|&c| c == r))
                .unwrap_or(parent_node.children.len());
            parent_node.children.insert(index, child);
        }
        if let Some(child_node) = self.get_node(child) {
            child_node.write().parent = Some(parent);
        }
    }

    /// Unlinks `child` from whatever parent it has. Returns the old parent.
    fn detach(&self, child: NodeId) -> Option<NodeId> {
        let child_node = self.get_node(child)?;
        let parent = child_node.write().parent.take()?;
        if let Some(parent_node) = self.get_node(parent) {
            parent_node.write().children.retain(|c| *c != child);
        }
        Some(parent)
    }

    fn check_insertion(&self, parent: NodeId, child: NodeId) -> Result<()> {
        self.node(parent)?;
        self.node(child)?;
        if parent == child || self.is_inclusive_ancestor(child, parent) {
            return Err(DocumentError::InvalidOperation(
                "cannot insert a node into its own subtree".to_string(),
            ));
        }
        Ok(())
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, mut node: NodeId) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.parent(node) {
                Some(p) => node = p,
                None => return false,
            }
        }
    }

    pub fn append_child(&self, parent: NodeId, child: NodeId) -> Result<()> {
        self.insert_before(parent, child, None)
    }

    /// Inserts `child` under `parent` before `reference`; `None` appends.
    pub fn insert_before(
        &self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<()> {
        self.check_insertion(parent, child)?;
        if let Some(r) = reference {
            if self.parent(r) != Some(parent) {
                return Err(DocumentError::InvalidOperation(format!(
                    "{r:?} is not a child of {parent:?}"
                )));
            }
        }
        if let Some(old_parent) = self.detach(child) {
            let mut record = MutationRecord::new(MutationType::ChildList, old_parent);
            record.removed_nodes.push(child);
            self.record_mutation(record);
        }
        self.attach(parent, child, reference);

        let mut record = MutationRecord::new(MutationType::ChildList, parent);
        record.added_nodes.push(child);
        self.record_mutation(record);
        Ok(())
    }

    pub fn remove_child(&self, parent: NodeId, child: NodeId) -> Result<()> {
        self.node(parent)?;
        if self.parent(child) != Some(parent) {
            return Err(DocumentError::InvalidOperation(format!(
                "{child:?} is not a child of {parent:?}"
            )));
        }
        self.detach(child);
        let mut record = MutationRecord::new(MutationType::ChildList, parent);
        record.removed_nodes.push(child);
        self.record_mutation(record);
        Ok(())
    }

    /// Puts `new_child` where `old_child` was; `old_child` ends up detached.
    pub fn replace_child(&self, parent: NodeId, new_child: NodeId, old_child: NodeId) -> Result<()> {
        if self.parent(old_child) != Some(parent) {
            return Err(DocumentError::InvalidOperation(format!(
                "{old_child:?} is not a child of {parent:?}"
            )));
        }
        if new_child == old_child {
            return Ok(());
        }
        self.check_insertion(parent, new_child)?;
        self.detach(new_child);
        self.attach(parent, new_child, Some(old_child));
        self.detach(old_child);

        let mut record = MutationRecord::new(MutationType::ChildList, parent);
        record.added_nodes.push(new_child);
        record.removed_nodes.push(old_child);
        self.record_mutation(record);
        Ok(())
    }

    /// Detaches every child of `parent` and returns them in order.
    pub fn remove_all_children(&self, parent: NodeId) -> Result<Vec<NodeId>> {
        let node = self.node(parent)?;
        let removed: SmallVec<[NodeId; 8]> = std::mem::take(&mut node.write().children);
        if removed.is_empty() {
            return Ok(Vec::new());
        }
        for &child in &removed {
            if let Some(child_node) = self.get_node(child) {
                child_node.write().parent = None;
            }
        }
        let removed = removed.into_vec();
        let mut record = MutationRecord::new(MutationType::ChildList, parent);
        record.removed_nodes = removed.clone();
        self.record_mutation(record);
        Ok(removed)
    }

    /// Frees a detached node and all of its descendants from the arena.
    /// Ids held elsewhere stop resolving afterwards.
    pub fn drop_subtree(&self, id: NodeId) -> Result<()> {
        if id == self.root {
            return Err(DocumentError::InvalidOperation(
                "cannot drop the document node".to_string(),
            ));
        }
        if let Some(parent) = self.node(id)?.read().parent {
            return Err(DocumentError::InvalidOperation(format!(
                "{id:?} is still attached to {parent:?}"
            )));
        }
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some((_, node)) = self.nodes.remove(&next) {
                stack.extend(node.read().children.iter().copied());
            }
        }
        Ok(())
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.get_node(id)
            .map(|n| n.read().children.to_vec())
            .unwrap_or_default()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get_node(id).and_then(|n| n.read().parent)
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let index = siblings.iter().position(|&c| c == id)?;
        siblings.get(index + 1).copied()
    }

    /// True when the node is reachable from the document root.
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.contains(id) && self.is_inclusive_ancestor(self.root, id)
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.get_node(id)
            .map(|n| n.read().is_element())
            .unwrap_or(false)
    }

    pub fn node_type(&self, id: NodeId) -> Option<NodeType> {
        self.get_node(id).map(|n| n.read().node_type)
    }

    pub fn tag_name(&self, id: NodeId) -> Option<String> {
        self.get_node(id).map(|n| n.read().tag_name.clone())
    }

    pub fn node_name(&self, id: NodeId) -> Option<String> {
        self.get_node(id).map(|n| n.read().node_name())
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<String> {
        self.get_node(id).and_then(|n| n.read().get_attribute(name))
    }

    pub fn has_attribute(&self, id: NodeId, name: &str) -> bool {
        self.get_node(id)
            .map(|n| n.read().has_attribute(name))
            .unwrap_or(false)
    }

    pub fn set_attribute(&self, id: NodeId, name: &str, value: &str) -> Result<()> {
        let node = self.node(id)?;
        let old_value = {
            let mut node = node.write();
            let old = node.get_attribute(name);
            node.set_attribute(name, value);
            old
        };
        let mut record = MutationRecord::new(MutationType::Attributes, id);
        record.attribute_name = Some(name.to_ascii_lowercase());
        record.old_value = old_value;
        self.record_mutation(record);
        Ok(())
    }

    pub fn remove_attribute(&self, id: NodeId, name: &str) -> Result<Option<String>> {
        let node = self.node(id)?;
        let old_value = node.write().attributes.remove(name);
        if old_value.is_some() {
            let mut record = MutationRecord::new(MutationType::Attributes, id);
            record.attribute_name = Some(name.to_ascii_lowercase());
            record.old_value = old_value.clone();
            self.record_mutation(record);
        }
        Ok(old_value)
    }

    /// Attributes in insertion order.
    pub fn attributes(&self, id: NodeId) -> Vec<(String, String)> {
        self.get_node(id)
            .map(|n| n.read().attributes.to_vec())
            .unwrap_or_default()
    }

    /// Concatenated text of all descendant text nodes, or the node's own data
    /// for text and comment nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        let Some(node) = self.get_node(id) else {
            return String::new();
        };
        let (node_type, own_text, children) = {
            let node = node.read();
            (node.node_type, node.text_content.clone(), node.children.to_vec())
        };
        match node_type {
            NodeType::Text | NodeType::Comment => own_text,
            _ => children
                .into_iter()
                .filter(|&c| self.node_type(c) != Some(NodeType::Comment))
                .map(|c| self.text_content(c))
                .collect(),
        }
    }

    pub fn set_text_content(&self, id: NodeId, text: &str) -> Result<()> {
        let node = self.node(id)?;
        let node_type = node.read().node_type;
        match node_type {
            NodeType::Text | NodeType::Comment => {
                let old = std::mem::replace(&mut node.write().text_content, text.to_string());
                let mut record = MutationRecord::new(MutationType::CharacterData, id);
                record.old_value = Some(old);
                self.record_mutation(record);
                Ok(())
            }
            _ => {
                for old in self.remove_all_children(id)? {
                    self.drop_subtree(old)?;
                }
                if !text.is_empty() {
                    let text_node = self.create_text(text);
                    self.append_child(id, text_node)?;
                }
                Ok(())
            }
        }
    }

    pub fn script_state(&self, id: NodeId) -> Option<ScriptState> {
        self.get_node(id).map(|n| n.read().script)
    }

    pub fn set_script_state(&self, id: NodeId, state: ScriptState) -> Result<()> {
        self.node(id)?.write().script = state;
        Ok(())
    }

    pub fn inline_script(&self, id: NodeId) -> Option<InlineScript> {
        if !self.get_node(id)?.read().is_element_named("script") {
            return None;
        }
        Some(InlineScript {
            node: id,
            content: self.text_content(id),
            script_type: self.attribute(id, "type"),
        })
    }

    /// Descendants of `root` (excluding `root`) whose tag is one of `tags`,
    /// in document order.
    pub fn descendants_by_tag(&self, root: NodeId, tags: &[&str]) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack: Vec<NodeId> = self.children(root).into_iter().rev().collect();
        while let Some(id) = stack.pop() {
            let Some(node) = self.get_node(id) else {
                continue;
            };
            let children = {
                let node = node.read();
                if node.is_element() && tags.iter().any(|t| node.tag_name.eq_ignore_ascii_case(t)) {
                    found.push(id);
                }
                node.children.to_vec()
            };
            stack.extend(children.into_iter().rev());
        }
        found
    }

    /// Parses `markup` and inserts the resulting nodes relative to `target`.
    ///
    /// Scripts created this way are marked already-started and never run on
    /// their own. Returns the top-level inserted nodes in order.
    pub fn insert_adjacent_html(
        &self,
        target: NodeId,
        position: AdjacentPosition,
        markup: &str,
    ) -> Result<Vec<NodeId>> {
        self.node(target)?;
        let (parent, reference) = match position {
            AdjacentPosition::BeforeBegin => (self.require_parent(target)?, Some(target)),
            AdjacentPosition::AfterEnd => (self.require_parent(target)?, self.next_sibling(target)),
            AdjacentPosition::AfterBegin => (target, self.children(target).first().copied()),
            AdjacentPosition::BeforeEnd => (target, None),
        };

        let fragment = parser::parse_fragment(markup);
        let mut inserted = Vec::with_capacity(fragment.len());
        for node in &fragment {
            let id = self.build_fragment_node(node);
            self.insert_before(parent, id, reference)?;
            inserted.push(id);
        }
        tracing::trace!(
            "inserted {} nodes {:?} {:?}",
            inserted.len(),
            position,
            target
        );
        Ok(inserted)
    }

    fn require_parent(&self, target: NodeId) -> Result<NodeId> {
        self.parent(target).ok_or_else(|| {
            DocumentError::InvalidOperation(format!("{target:?} has no parent"))
        })
    }

    /// Materialises a parsed node (and its subtree) as detached nodes.
    pub(crate) fn build_fragment_node(&self, fragment: &FragmentNode) -> NodeId {
        match fragment {
            FragmentNode::Text(text) => self.create_text(text),
            FragmentNode::Comment(text) => self.create_comment(text),
            FragmentNode::Element {
                name,
                attributes,
                children,
            } => {
                let mut node = Node::new_element(name, NodeId::new());
                node.attributes = attributes.iter().cloned().collect();
                if node.is_element_named("script") {
                    node.script.already_started = true;
                }
                let id = self.insert_node(node);
                for child in children {
                    let child_id = self.build_fragment_node(child);
                    self.attach(id, child_id, None);
                }
                id
            }
        }
    }

    /// Serialises the children of `id`.
    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        let raw = self
            .tag_name(id)
            .map(|t| matches!(t.as_str(), "script" | "style"))
            .unwrap_or(false);
        for child in self.children(id) {
            self.serialize_into(child, raw, &mut out);
        }
        out
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.serialize_into(id, false, &mut out);
        out
    }

    fn serialize_into(&self, id: NodeId, raw_text: bool, out: &mut String) {
        let Some(node) = self.get_node(id) else {
            return;
        };
        let node = node.read().clone();
        match node.node_type {
            NodeType::Text if raw_text => out.push_str(&node.text_content),
            NodeType::Text => out.push_str(&escape_text(&node.text_content)),
            NodeType::Comment => {
                out.push_str("<!--");
                out.push_str(&node.text_content);
                out.push_str("-->");
            }
            NodeType::Document => {
                for child in node.children {
                    self.serialize_into(child, false, out);
                }
            }
            NodeType::Element => {
                out.push('<');
                out.push_str(&node.tag_name);
                for (name, value) in node.attributes.entries() {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&escape_attribute(value));
                    out.push('"');
                }
                out.push('>');
                if parser::is_void_element(&node.tag_name) {
                    return;
                }
                let raw = matches!(node.tag_name.as_str(), "script" | "style");
                for child in node.children {
                    self.serialize_into(child, raw, out);
                }
                out.push_str("</");
                out.push_str(&node.tag_name);
                out.push('>');
            }
        }
    }

    /// Indented one-line-per-node summary of the tree, at most `cap` lines.
    pub fn outline(&self, cap: usize) -> Vec<String> {
        let mut out = Vec::new();
        let mut left = cap;
        self.outline_walk(self.root, 0, &mut out, &mut left);
        out
    }

    fn outline_walk(&self, id: NodeId, depth: usize, out: &mut Vec<String>, left: &mut usize) {
        if *left == 0 {
            return;
        }
        let Some(node) = self.get_node(id) else {
            return;
        };
        let node = node.read().clone();
        let indent = "  ".repeat(depth);
        match node.node_type {
            NodeType::Document => {
                *left -= 1;
                out.push(format!("{indent}#document"));
            }
            NodeType::Element => {
                *left -= 1;
                let mut line = format!("{indent}<{}", node.tag_name);
                for key in ["id", "class", "src", "href"] {
                    if let Some(value) = node.attributes.get(key).filter(|v| !v.is_empty()) {
                        line.push_str(&format!(r#" {key}="{value}""#));
                    }
                }
                line.push('>');
                out.push(line);
            }
            NodeType::Text => {
                let t = node.text_content.replace('\n', " ").trim().to_string();
                if !t.is_empty() {
                    *left -= 1;
                    out.push(format!("{indent}\"{}\"", truncate(&t, 40)));
                }
            }
            NodeType::Comment => {
                *left -= 1;
                let t = node.text_content.replace('\n', " ");
                out.push(format!("{indent}<!-- {} -->", truncate(&t, 40)));
            }
        }
        for child in node.children {
            self.outline_walk(child, depth + 1, out, left);
        }
    }

    pub fn url(&self) -> Option<String> {
        self.metadata.read().url.clone()
    }

    /// Replaces the document URL in place (no new history entry).
    pub fn set_url(&self, url: &str) {
        let previous = self.metadata.write().url.replace(url.to_string());
        tracing::debug!("document url replaced: {:?} -> {}", previous, url);
    }

    /// Resolves `href` against the document URL.
    pub fn resolve_url(&self, href: &str) -> Result<Url> {
        let base = self.url();
        let resolved = match base.as_deref().map(Url::parse) {
            Some(Ok(base)) => base.join(href),
            _ => Url::parse(href),
        };
        resolved.map_err(|e| DocumentError::Parse(format!("invalid url '{href}': {e}")))
    }

    pub fn title(&self) -> String {
        self.metadata.read().title.clone()
    }

    pub fn set_title(&self, title: &str) {
        self.metadata.write().title = title.to_string();
    }

    pub fn ready_state(&self) -> DocumentReadyState {
        self.metadata.read().ready_state
    }

    pub fn set_ready_state(&self, state: DocumentReadyState) {
        self.metadata.write().ready_state = state;
    }

    /// Starts or stops collecting mutation records. Off by default; turning
    /// it off discards anything not yet taken.
    pub fn observe_mutations(&self, enabled: bool) {
        self.observing.store(enabled, Ordering::SeqCst);
        if !enabled {
            self.mutation_records.write().clear();
        }
    }

    pub fn is_observing_mutations(&self) -> bool {
        self.observing.load(Ordering::SeqCst)
    }

    fn record_mutation(&self, record: MutationRecord) {
        if self.is_observing_mutations() {
            self.mutation_records.write().push(record);
        }
    }

    /// Claims the document for page composition. Returns `false` if it was
    /// already claimed.
    pub fn begin_composition(&self) -> bool {
        !self.composed.swap(true, Ordering::SeqCst)
    }

    pub fn is_composed(&self) -> bool {
        self.composed.load(Ordering::SeqCst)
    }

    /// Returns and clears the pending mutation records.
    pub fn take_mutation_records(&self) -> Vec<MutationRecord> {
        std::mem::take(&mut *self.mutation_records.write())
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let mut short: String = text.chars().take(max_chars).collect();
        short.push('…');
        short
    } else {
        text.to_string()
    }
}
