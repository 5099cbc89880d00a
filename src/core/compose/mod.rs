pub mod attributes;
pub mod markup;

pub use attributes::{apply_attributes, copy_attributes};
pub use markup::{neutralize_imports, split_document, Diagnostic, MarkupOptions, SplitDocument};

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::core::dom::{AdjacentPosition, Document, DocumentError, NodeId};
use crate::core::network::RuntimeUrls;
use crate::core::script::{ResourceHost, ScriptSequencer, SequenceReport};
use crate::EngineConfig;

#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("page composition already ran for this target")]
    AlreadyComposed,
    #[error("host document has no <{0}> element")]
    MissingHostElement(&'static str),
    #[error("Document error: {0}")]
    Document(#[from] DocumentError),
}

/// The live page being composed into.
#[derive(Debug, Clone)]
pub struct CompositionTarget {
    pub document: Arc<Document>,
    /// Body content is inserted right after this node while it is attached.
    pub anchor: Option<NodeId>,
}

impl CompositionTarget {
    pub fn new(document: Arc<Document>) -> Self {
        Self {
            document,
            anchor: None,
        }
    }

    pub fn with_anchor(mut self, anchor: NodeId) -> Self {
        self.anchor = Some(anchor);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompositionReport {
    pub diagnostics: Vec<Diagnostic>,
    pub head: SequenceReport,
    pub body: SequenceReport,
}

/// Rewrites a host page so it looks and behaves like the fetched page.
pub struct PageComposer {
    target: CompositionTarget,
    markup: MarkupOptions,
    stylesheet_href: String,
    sequencer: ScriptSequencer,
}

impl PageComposer {
    pub fn new(
        target: CompositionTarget,
        config: &EngineConfig,
        urls: &RuntimeUrls,
        host: Arc<dyn ResourceHost>,
    ) -> Self {
        let sequencer = ScriptSequencer::new(host, &config.placeholder_tag)
            .with_settle_timeout(config.settle_timeout_ms.map(Duration::from_millis));
        Self {
            target,
            markup: MarkupOptions {
                placeholder_tag: config.placeholder_tag.clone(),
                native_imports: config.native_imports,
            },
            stylesheet_href: urls.get_url(&config.stylesheet_path),
            sequencer,
        }
    }

    pub fn document(&self) -> &Arc<Document> {
        &self.target.document
    }

    /// True once any composer has started composing into this target's
    /// document.
    pub fn is_composed(&self) -> bool {
        self.target.document.is_composed()
    }

    /// Replaces the host head, transplants `<html>`/`<body>` attributes,
    /// inserts the body after the anchor, and sequences the scripts of head
    /// then body. `on_ready` runs once, after the last body batch settles.
    pub async fn compose<F>(&self, raw_html: &str, on_ready: F) -> Result<CompositionReport, ComposeError>
    where
        F: FnOnce(&CompositionReport),
    {
        let document = self.target.document.as_ref();
        if !document.begin_composition() {
            tracing::error!("compose called more than once for the same page; ignoring");
            return Err(ComposeError::AlreadyComposed);
        }

        let html = document
            .document_element()
            .ok_or(ComposeError::MissingHostElement("html"))?;
        let head = document
            .head()
            .ok_or(ComposeError::MissingHostElement("head"))?;
        let body = document
            .body()
            .ok_or(ComposeError::MissingHostElement("body"))?;

        for old in document.remove_all_children(head)? {
            document.drop_subtree(old)?;
        }

        let split = split_document(raw_html, &self.markup);
        for diagnostic in &split.diagnostics {
            tracing::warn!("{}", diagnostic);
        }

        if let Some(attrs) = &split.html_attrs {
            apply_attributes(document, attrs, html)?;
        }
        // A missing <body> clears whatever the host body carried.
        apply_attributes(document, split.body_attrs.as_deref().unwrap_or(""), body)?;

        let stylesheet = format!(r#"<link rel="stylesheet" href="{}">"#, self.stylesheet_href);
        document.insert_adjacent_html(head, AdjacentPosition::BeforeEnd, &stylesheet)?;
        document.insert_adjacent_html(head, AdjacentPosition::BeforeEnd, &split.head_html)?;

        let head_report = self.sequencer.run(document, head).await;
        tracing::debug!(
            "head settled: {} batches, {} failed",
            head_report.non_empty_batches(),
            head_report.failed
        );

        match self.target.anchor.filter(|&a| document.is_connected(a)) {
            Some(anchor) => {
                document.insert_adjacent_html(anchor, AdjacentPosition::AfterEnd, &split.body_html)?
            }
            None => document.insert_adjacent_html(body, AdjacentPosition::BeforeEnd, &split.body_html)?,
        };

        let body_report = self.sequencer.run(document, body).await;
        tracing::debug!(
            "body settled: {} batches, {} failed",
            body_report.non_empty_batches(),
            body_report.failed
        );

        let report = CompositionReport {
            diagnostics: split.diagnostics,
            head: head_report,
            body: body_report,
        };
        on_ready(&report);
        Ok(report)
    }
}
