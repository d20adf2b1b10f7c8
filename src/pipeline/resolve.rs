//! # Image resolution
//!
//! Older posts store bare storage keys as image sources. Before a document
//! is shown those keys are prefixed with the public base path of the
//! bucket. URLs and temporary handles pass through, so running this twice
//! gives the same tree as running it once.
use crate::model::source::{join_base, ImageSource};
use crate::model::{walk, Document, Node};

/// The renderable form of `src`, or `None` if it is already renderable
pub fn resolve_src(src: &str, base: &str) -> Option<String> {
    match ImageSource::classify(src) {
        ImageSource::StorageKey => Some(join_base(base, src)),
        ImageSource::AbsoluteUrl | ImageSource::Temporary | ImageSource::Empty => None,
    }
}

/// Resolve every image of `doc` against `base`
pub fn resolve(doc: Document, base: &str) -> Document {
    let root = walk::map(doc.into_root(), &mut |node| match node {
        Node::Image(mut leaf) => {
            if let Some(attrs) = leaf.attrs.as_mut() {
                if let Some(url) = attrs.src().and_then(|src| resolve_src(src, base)) {
                    attrs.set_src(url);
                }
            }
            Node::Image(leaf)
        }
        other => other,
    });
    Document::from(root)
}

/// The cover image of a post follows the same rule
pub fn resolve_cover(src: &str, base: &str) -> String {
    resolve_src(src, base).unwrap_or_else(|| src.to_owned())
}
