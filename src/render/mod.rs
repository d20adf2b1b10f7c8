//! # Read-only rendering
//!
//! The renderer takes a document as stored, makes it safe to display and
//! turns it into a [`RenderedDocument`]: the prepared tree plus a view of
//! every code block, which may carry a copy button.
mod copy;
mod html;

pub use copy::{Clipboard, ClipboardError, CopyControl, Indicator, COPY_FEEDBACK};
pub use html::Html;

use crate::direction;
use crate::model::{walk, Attrs, Document, Node};
use crate::pipeline::{resolve, resolve_cover};
use derive_new::new;
use tracing::{debug, error};

/// Shown instead of a document that could not be parsed
pub const LOAD_ERROR: &str = "This content could not be loaded.";

/// A rendered code block
#[derive(Debug, Clone)]
pub struct CodeBlockView {
    pub language: Option<String>,
    /// The plain text that the copy button puts on the clipboard
    pub text: String,
    /// Set once a copy button was attached
    pub control: Option<CopyControl>,
}

/// A document ready for display
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    doc: Document,
    code_blocks: Vec<CodeBlockView>,
}

impl RenderedDocument {
    pub fn new(doc: Document) -> Self {
        let mut code_blocks = Vec::new();
        walk::visit(doc.root(), &mut |node| {
            if let Node::CodeBlock(_) = node {
                code_blocks.push(CodeBlockView {
                    language: node.attrs().and_then(Attrs::language).map(str::to_owned),
                    text: node.text_content(),
                    control: None,
                });
            }
        });
        Self { doc, code_blocks }
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn code_blocks(&self) -> &[CodeBlockView] {
        &self.code_blocks
    }
}

/// Turns stored JSON into something that can be shown
#[derive(Debug, Clone, new)]
pub struct Renderer {
    /// Public URL of the image bucket
    storage_base: String,
}

impl Renderer {
    /// Parse a stored document; broken input becomes a placeholder
    pub fn load(&self, json: &str) -> Document {
        match Document::from_json(json) {
            Ok(doc) => doc,
            Err(e) => {
                error!("Could not parse stored document: {}", e);
                Document::placeholder(LOAD_ERROR)
            }
        }
    }

    /// Resolve image keys and tag text direction
    pub fn prepare(&self, doc: Document) -> Document {
        let mut doc = resolve(doc, &self.storage_base);
        let tagged = direction::apply(doc.root_mut());
        debug!("Tagged direction on {} blocks", tagged);
        doc
    }

    /// Load, prepare and attach copy buttons
    pub fn render(&self, json: &str) -> RenderedDocument {
        let doc = self.prepare(self.load(json));
        let mut rendered = RenderedDocument::new(doc);
        rendered.attach_copy_controls();
        rendered
    }

    pub fn cover(&self, src: &str) -> String {
        resolve_cover(src, &self.storage_base)
    }
}
