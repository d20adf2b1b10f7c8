//! # Text direction
//!
//! Posts mix English and Arabic, sometimes within one block. Every
//! paragraph, heading and list is tagged with a `dir` attribute derived
//! from its text so that the editor and the renderer lay it out correctly.
mod scheduler;

pub use scheduler::{FrameScheduler, FRAME};

use crate::model::{walk, Attrs, Direction, Node};

/// Whether `c` belongs to a right-to-left script (Hebrew, Arabic, Syriac and
/// their presentation forms)
pub fn is_rtl_char(c: char) -> bool {
    matches!(c,
        '\u{0591}'..='\u{07FF}'
        | '\u{FB1D}'..='\u{FDFD}'
        | '\u{FE70}'..='\u{FEFC}')
}

/// Classify a run of text.
///
/// Text is right-to-left if it contains a right-to-left character and
/// starts (after whitespace) with one. Returns `None` for blank text, which
/// keeps whatever direction a block already had.
pub fn classify(text: &str) -> Option<Direction> {
    let first = text.trim().chars().next()?;
    if is_rtl_char(first) && text.chars().any(is_rtl_char) {
        Some(Direction::Rtl)
    } else {
        Some(Direction::Ltr)
    }
}

/// Whether a node gets a direction tag
fn is_directional(node: &Node) -> bool {
    matches!(
        node,
        Node::Paragraph(_)
            | Node::Heading(_)
            | Node::ListItem(_)
            | Node::BulletList(_)
            | Node::OrderedList(_)
    )
}

/// Tag one node, returning whether its attributes changed
fn tag(node: &mut Node) -> bool {
    if !is_directional(node) {
        return false;
    }
    // lists use the text of all their items combined
    let dir = match classify(&node.text_content()) {
        Some(dir) => dir,
        None => return false,
    };
    if node.attrs().and_then(Attrs::dir) == Some(dir) {
        return false;
    }
    match node.attrs_mut() {
        Some(attrs) => {
            attrs.set_dir(dir);
            true
        }
        None => false,
    }
}

/// Run the direction pass over a tree.
///
/// Only blocks whose computed direction differs from the stored one are
/// written; the number of rewritten blocks is returned, so a second run
/// over the same tree returns `0`.
pub fn apply(root: &mut Node) -> usize {
    walk::visit_mut(root, &mut tag)
}
