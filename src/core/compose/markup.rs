//! Text-level surgery on a fetched page before any of it reaches the DOM.
//!
//! The patterns are deliberately loose. They tolerate leading comments
//! before `<html>` and `<body>`, but a `<body` that appears inside a
//! comment after other content can still be picked up.

use regex::Regex;
use std::sync::LazyLock;

static IMPORT_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<link(\s[^>]*\brel\s*=[\s'"]*import[\s\S]*?)(?:/?>)(?:\s*</link>)?"#)
        .expect("import link pattern is valid")
});

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:<!--[\s\S]*?--[^>]*?>\s*)*<html\b([\s\S]*?)>")
        .expect("html tag pattern is valid")
});

static BODY_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:<!--[\s\S]*?--[^>]*?>\s*[\s\S]*?)*<body\b([\s\S]*?)>")
        .expect("body tag pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupOptions {
    /// Tag that import links are renamed to so they stay inert until sequenced.
    pub placeholder_tag: String,
    /// Whether the host loads `rel=import` links natively. When it does not,
    /// a polyfill handles imports and they are left alone.
    pub native_imports: bool,
}

impl Default for MarkupOptions {
    fn default() -> Self {
        Self {
            placeholder_tag: "x-txpspgbc".to_string(),
            native_imports: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagnostic {
    MissingHtmlTag,
    MissingBodyTag,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::MissingHtmlTag => write!(f, "Failed to find <html> tag."),
            Diagnostic::MissingBodyTag => write!(f, "Failed to find <body> tag."),
        }
    }
}

/// A page cut into the pieces the composer inserts separately.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitDocument {
    /// Attribute text of `<html ...>`, `None` when the tag is missing.
    pub html_attrs: Option<String>,
    /// Everything up to and including the `<body ...>` tag, after `<html>`.
    pub head_html: String,
    /// Attribute text of `<body ...>`, `None` when the tag is missing.
    pub body_attrs: Option<String>,
    /// Everything after the `<body ...>` tag.
    pub body_html: String,
    pub diagnostics: Vec<Diagnostic>,
}

/// Renames `<link rel=import ...>` (and a trailing `</link>`) to the placeholder tag.
pub fn neutralize_imports(raw: &str, placeholder_tag: &str) -> String {
    let replacement = format!("<{placeholder_tag}${{1}}></{placeholder_tag}>");
    IMPORT_LINK.replace_all(raw, replacement.as_str()).into_owned()
}

pub fn split_document(raw: &str, options: &MarkupOptions) -> SplitDocument {
    let mut split = SplitDocument::default();

    let neutralized;
    let mut content: &str = if options.native_imports {
        neutralized = neutralize_imports(raw, &options.placeholder_tag);
        &neutralized
    } else {
        raw
    };

    match HTML_TAG.captures(content) {
        Some(caps) => {
            split.html_attrs = Some(caps.get(1).map_or("", |m| m.as_str()).to_string());
            let end = caps.get(0).map_or(0, |m| m.end());
            content = &content[end..];
        }
        None => split.diagnostics.push(Diagnostic::MissingHtmlTag),
    }

    let head_end = match BODY_TAG.captures(content) {
        Some(caps) => {
            split.body_attrs = Some(caps.get(1).map_or("", |m| m.as_str()).to_string());
            caps.get(0).map_or(0, |m| m.end())
        }
        None => {
            split.diagnostics.push(Diagnostic::MissingBodyTag);
            0
        }
    };
    split.head_html = content[..head_end].to_string();
    split.body_html = content[head_end..].to_string();
    split
}
