//! Tolerant HTML fragment parser used for raw markup insertion.
//!
//! This is not an HTML5 tree builder. It understands comments, start/end
//! tags with attributes, void elements and raw-text elements, and closes
//! whatever is left open at end of input. `<html>`, `<head>` and `<body>`
//! tags are dropped the way a fragment-insertion sanitizer drops them, so a
//! trailing `</body></html>` in composed markup disappears.

const COMMENT_START: &str = "<!--";
const COMMENT_END: &str = "-->";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentNode {
    Element {
        name: String,
        attributes: Vec<(String, String)>,
        children: Vec<FragmentNode>,
    },
    Text(String),
    Comment(String),
}

impl FragmentNode {
    pub fn element_name(&self) -> Option<&str> {
        match self {
            FragmentNode::Element { name, .. } => Some(name),
            _ => None,
        }
    }
}

pub(crate) fn is_void_element(name: &str) -> bool {
    matches!(
        name,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

fn is_raw_text_element(name: &str) -> bool {
    matches!(name, "script" | "style" | "textarea" | "title")
}

fn is_dropped_element(name: &str) -> bool {
    matches!(name, "html" | "head" | "body")
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b':' || b == b'.'
}

fn starts_with_ignore_ascii_case_at(haystack: &[u8], start: usize, needle: &[u8]) -> bool {
    haystack.len() >= start + needle.len()
        && haystack[start..start + needle.len()].eq_ignore_ascii_case(needle)
}

/// Finds `</name` followed by whitespace or `>`; returns (start of close tag, end past `>`).
fn find_close_tag(input: &str, from: usize, name: &str) -> Option<(usize, usize)> {
    let bytes = input.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        let rel = input[i..].find("</")?;
        i += rel;
        let name_start = i + 2;
        if starts_with_ignore_ascii_case_at(bytes, name_start, name.as_bytes()) {
            let after = name_start + name.len();
            if after >= bytes.len() {
                return Some((i, bytes.len()));
            }
            if bytes[after] == b'>' || bytes[after].is_ascii_whitespace() || bytes[after] == b'/' {
                let end = input[after..]
                    .find('>')
                    .map(|p| after + p + 1)
                    .unwrap_or(bytes.len());
                return Some((i, end));
            }
        }
        i += 2;
    }
    None
}

/// Decodes the handful of character references that show up in real pages.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        let Some(semi) = rest[1..].find(';').map(|p| p + 1) else {
            break;
        };
        let entity = &rest[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some('\u{a0}'),
            _ if entity.starts_with("#x") || entity.starts_with("#X") => {
                u32::from_str_radix(&entity[2..], 16)
                    .ok()
                    .and_then(char::from_u32)
            }
            _ if entity.starts_with('#') => entity[1..].parse::<u32>().ok().and_then(char::from_u32),
            _ => None,
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Parses the attribute section of a start tag beginning at `i`.
/// Returns the attributes, whether the tag was self-closing, and the index past `>`.
fn parse_attributes(input: &str, mut i: usize) -> (Vec<(String, String)>, bool, usize) {
    let bytes = input.as_bytes();
    let len = bytes.len();
    let mut attributes: Vec<(String, String)> = Vec::new();
    let mut self_closing = false;

    loop {
        while i < len && (bytes[i].is_ascii_whitespace() || bytes[i] == b'/') {
            if bytes[i] == b'/' {
                self_closing = i + 1 < len && bytes[i + 1] == b'>';
            }
            i += 1;
        }
        if i >= len {
            return (attributes, self_closing, len);
        }
        if bytes[i] == b'>' {
            return (attributes, self_closing, i + 1);
        }
        self_closing = false;

        let name_start = i;
        while i < len
            && !bytes[i].is_ascii_whitespace()
            && bytes[i] != b'='
            && bytes[i] != b'>'
            && !(bytes[i] == b'/' && i + 1 < len && bytes[i + 1] == b'>')
        {
            i += 1;
        }
        let name = input[name_start..i].to_ascii_lowercase();

        while i < len && bytes[i].is_ascii_whitespace() {
            i += 1;
        }

        let mut value = String::new();
        if i < len && bytes[i] == b'=' {
            i += 1;
            while i < len && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            if i < len && (bytes[i] == b'"' || bytes[i] == b'\'') {
                let quote = bytes[i] as char;
                let start = i + 1;
                let end = input[start..]
                    .find(quote)
                    .map(|p| start + p)
                    .unwrap_or(len);
                value = decode_entities(&input[start..end]);
                i = (end + 1).min(len);
            } else {
                let start = i;
                while i < len && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
                    i += 1;
                }
                value = decode_entities(&input[start..i]);
            }
        }

        if !name.is_empty() && !attributes.iter().any(|(k, _)| *k == name) {
            attributes.push((name, value));
        }
    }
}

struct OpenElement {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<FragmentNode>,
}

struct TreeBuilder {
    roots: Vec<FragmentNode>,
    stack: Vec<OpenElement>,
}

impl TreeBuilder {
    fn new() -> Self {
        Self {
            roots: Vec::new(),
            stack: Vec::new(),
        }
    }

    fn push_node(&mut self, node: FragmentNode) {
        match self.stack.last_mut() {
            Some(open) => open.children.push(node),
            None => self.roots.push(node),
        }
    }

    fn push_text(&mut self, text: String) {
        if text.is_empty() {
            return;
        }
        let siblings = match self.stack.last_mut() {
            Some(open) => &mut open.children,
            None => &mut self.roots,
        };
        if let Some(FragmentNode::Text(prev)) = siblings.last_mut() {
            prev.push_str(&text);
        } else {
            siblings.push(FragmentNode::Text(text));
        }
    }

    fn close_top(&mut self) {
        if let Some(open) = self.stack.pop() {
            self.push_node(FragmentNode::Element {
                name: open.name,
                attributes: open.attributes,
                children: open.children,
            });
        }
    }

    fn close_named(&mut self, name: &str) {
        let Some(pos) = self.stack.iter().rposition(|open| open.name == name) else {
            return;
        };
        while self.stack.len() > pos {
            self.close_top();
        }
    }

    fn finish(mut self) -> Vec<FragmentNode> {
        while !self.stack.is_empty() {
            self.close_top();
        }
        self.roots
    }
}

/// Parses `input` as a list of sibling nodes.
pub fn parse_fragment(input: &str) -> Vec<FragmentNode> {
    let bytes = input.as_bytes();
    let len = bytes.len();
    let mut builder = TreeBuilder::new();
    let mut i = 0;

    while i < len {
        if bytes[i] != b'<' {
            let start = i;
            let end = input[i..].find('<').map(|p| i + p).unwrap_or(len);
            builder.push_text(decode_entities(&input[start..end]));
            i = end;
            continue;
        }

        if input[i..].starts_with(COMMENT_START) {
            let body_start = i + COMMENT_START.len();
            match input[body_start..].find(COMMENT_END) {
                Some(end) => {
                    builder.push_node(FragmentNode::Comment(
                        input[body_start..body_start + end].to_string(),
                    ));
                    i = body_start + end + COMMENT_END.len();
                }
                None => {
                    builder.push_node(FragmentNode::Comment(input[body_start..].to_string()));
                    i = len;
                }
            }
            continue;
        }

        // <!doctype ...> and <?...?> are skipped entirely.
        if i + 1 < len && (bytes[i + 1] == b'!' || bytes[i + 1] == b'?') {
            i = input[i..].find('>').map(|p| i + p + 1).unwrap_or(len);
            continue;
        }

        if i + 1 < len && bytes[i + 1] == b'/' {
            let name_start = i + 2;
            let mut j = name_start;
            while j < len && is_name_byte(bytes[j]) {
                j += 1;
            }
            let name = input[name_start..j].to_ascii_lowercase();
            i = input[j..].find('>').map(|p| j + p + 1).unwrap_or(len);
            if !name.is_empty() && !is_dropped_element(&name) {
                builder.close_named(&name);
            }
            continue;
        }

        let name_start = i + 1;
        let mut j = name_start;
        while j < len && is_name_byte(bytes[j]) {
            j += 1;
        }
        if j == name_start || !bytes[name_start].is_ascii_alphabetic() {
            // A lone '<' is text.
            builder.push_text("<".to_string());
            i += 1;
            continue;
        }
        let name = input[name_start..j].to_ascii_lowercase();
        let (attributes, self_closing, after) = parse_attributes(input, j);
        i = after;

        if is_dropped_element(&name) {
            continue;
        }

        if is_raw_text_element(&name) {
            let (text_end, close_end) = find_close_tag(input, i, &name).unwrap_or((len, len));
            let raw = &input[i..text_end];
            let text = if name == "script" || name == "style" {
                raw.to_string()
            } else {
                decode_entities(raw)
            };
            let children = if text.is_empty() {
                Vec::new()
            } else {
                vec![FragmentNode::Text(text)]
            };
            builder.push_node(FragmentNode::Element {
                name,
                attributes,
                children,
            });
            i = close_end;
            continue;
        }

        if is_void_element(&name) || self_closing {
            builder.push_node(FragmentNode::Element {
                name,
                attributes,
                children: Vec::new(),
            });
            continue;
        }

        builder.stack.push(OpenElement {
            name,
            attributes,
            children: Vec::new(),
        });
    }

    builder.finish()
}
