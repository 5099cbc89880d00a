use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::document::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeType {
    Element = 1,
    Text = 3,
    Comment = 8,
    Document = 9,
}

impl NodeType {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(NodeType::Element),
            3 => Some(NodeType::Text),
            8 => Some(NodeType::Comment),
            9 => Some(NodeType::Document),
            _ => None,
        }
    }
}

/// Ordered attribute list. Names are stored lower-cased; insertion order is
/// kept so a transplant reproduces the source order exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeMap {
    map: SmallVec<[(String, String); 8]>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self {
            map: SmallVec::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&String> {
        self.map
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    pub fn set(&mut self, name: &str, value: String) {
        if let Some((_, v)) = self
            .map
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            *v = value;
        } else {
            self.map.push((name.to_ascii_lowercase(), value));
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let pos = self
            .map
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(name))?;
        Some(self.map.remove(pos).1)
    }

    pub fn has(&self, name: &str) -> bool {
        self.map.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.map.iter().map(|(k, _)| k)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &String)> {
        self.map.iter().map(|(k, v)| (k, v))
    }

    pub fn to_vec(&self) -> Vec<(String, String)> {
        self.map.to_vec()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

impl FromIterator<(String, String)> for AttributeMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut attrs = AttributeMap::new();
        for (name, value) in iter {
            attrs.set(&name, value);
        }
        attrs
    }
}

/// Execution bookkeeping carried by `<script>` elements.
///
/// Scripts created by raw markup insertion start out `already_started`, which
/// makes them inert: a host never runs them. `force_async` mirrors the
/// scripting flag of the same name and is cleared on replacements so that
/// external scripts execute in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptState {
    pub already_started: bool,
    pub force_async: bool,
}

impl Default for ScriptState {
    fn default() -> Self {
        Self {
            already_started: false,
            force_async: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub node_type: NodeType,
    pub tag_name: String,
    pub text_content: String,
    pub attributes: AttributeMap,
    pub parent: Option<NodeId>,
    pub children: SmallVec<[NodeId; 8]>,
    pub script: ScriptState,
}

impl Node {
    pub fn new_element(tag_name: &str, id: NodeId) -> Self {
        Self {
            id,
            node_type: NodeType::Element,
            tag_name: tag_name.to_ascii_lowercase(),
            text_content: String::new(),
            attributes: AttributeMap::new(),
            parent: None,
            children: SmallVec::new(),
            script: ScriptState::default(),
        }
    }

    pub fn new_text(content: String, id: NodeId) -> Self {
        Self {
            id,
            node_type: NodeType::Text,
            tag_name: "#text".to_string(),
            text_content: content,
            attributes: AttributeMap::new(),
            parent: None,
            children: SmallVec::new(),
            script: ScriptState::default(),
        }
    }

    pub fn new_comment(content: String, id: NodeId) -> Self {
        Self {
            id,
            node_type: NodeType::Comment,
            tag_name: "#comment".to_string(),
            text_content: content,
            attributes: AttributeMap::new(),
            parent: None,
            children: SmallVec::new(),
            script: ScriptState::default(),
        }
    }

    pub fn new_document(id: NodeId) -> Self {
        Self {
            id,
            node_type: NodeType::Document,
            tag_name: "#document".to_string(),
            text_content: String::new(),
            attributes: AttributeMap::new(),
            parent: None,
            children: SmallVec::new(),
            script: ScriptState::default(),
        }
    }

    pub fn set_attribute(&mut self, name: &str, value: &str) {
        self.attributes.set(name, value.to_string());
    }

    pub fn get_attribute(&self, name: &str) -> Option<String> {
        self.attributes.get(name).cloned()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.has(name)
    }

    pub fn get_tag_name(&self) -> &str {
        &self.tag_name
    }

    /// Upper-cased tag name for elements, `#text`/`#comment`/`#document` otherwise.
    pub fn node_name(&self) -> String {
        match self.node_type {
            NodeType::Element => self.tag_name.to_ascii_uppercase(),
            _ => self.tag_name.clone(),
        }
    }

    pub fn is_element(&self) -> bool {
        self.node_type == NodeType::Element
    }

    pub fn is_text(&self) -> bool {
        self.node_type == NodeType::Text
    }

    pub fn is_element_named(&self, name: &str) -> bool {
        self.is_element() && self.tag_name.eq_ignore_ascii_case(name)
    }
}
