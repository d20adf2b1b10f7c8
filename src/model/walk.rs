//! # Tree traversal
//!
//! Every pass over a document goes through one of these walks. They recurse
//! along `content`, which is fine for the depth of real documents.
use super::Node;

/// Rewrite a tree bottom-up.
///
/// Children are rewritten before their parent is handed to `f`. Nodes are
/// moved through, never cloned, so anything `f` returns unchanged keeps its
/// allocation. Sibling order is preserved.
pub fn map<F>(mut node: Node, f: &mut F) -> Node
where
    F: FnMut(Node) -> Node,
{
    if let Some(block) = node.block_mut() {
        if let Some(content) = block.content.take() {
            block.content = Some(content.into_iter().map(|child| map(child, f)).collect());
        }
    }
    f(node)
}

/// Visit every node in document order (parents before children)
pub fn visit<'a, F>(node: &'a Node, f: &mut F)
where
    F: FnMut(&'a Node),
{
    f(node);
    for child in node.children() {
        visit(child, f);
    }
}

/// Visit every node mutably in document order.
///
/// `f` reports whether it changed the node; the number of changes is returned.
pub fn visit_mut<F>(node: &mut Node, f: &mut F) -> usize
where
    F: FnMut(&mut Node) -> bool,
{
    let mut changed = usize::from(f(node));
    if let Some(content) = node.block_mut().and_then(|b| b.content.as_mut()) {
        for child in content.iter_mut() {
            changed += visit_mut(child, f);
        }
    }
    changed
}

/// All image sources in document order
pub fn image_sources(node: &Node) -> Vec<&str> {
    let mut out = Vec::new();
    visit(node, &mut |n| {
        if let Some(src) = n.image_src() {
            out.push(src);
        }
    });
    out
}

#[cfg(test)]
mod tests {
    use super::{image_sources, map, visit, visit_mut};
    use crate::model::Node;

    fn sample() -> Node {
        Node::doc(vec![
            Node::paragraph(vec![Node::text("a")]),
            Node::image("one"),
            Node::blockquote(vec![Node::paragraph(vec![Node::text("b")]), Node::image("two")]),
            Node::bullet_list(vec![Node::list_item(vec![Node::image("three")])]),
        ])
    }

    #[test]
    fn test_map_preserves_order() {
        let out = map(sample(), &mut |node| match node {
            Node::Text(mut t) => {
                t.text = t.text.to_uppercase();
                Node::Text(t)
            }
            other => other,
        });
        assert_eq!(out.text_content(), "AB");
        assert_eq!(image_sources(&out), vec!["one", "two", "three"]);
    }

    #[test]
    fn test_map_identity_is_noop() {
        let out = map(sample(), &mut |node| node);
        assert_eq!(out, sample());
    }

    #[test]
    fn test_map_children_before_parent() {
        let mut seen = Vec::new();
        map(sample(), &mut |node| {
            seen.push(node.type_name());
            node
        });
        assert_eq!(seen.first(), Some(&"text"));
        assert_eq!(seen.last(), Some(&"doc"));
    }

    #[test]
    fn test_visit_order() {
        let mut seen = Vec::new();
        visit(&sample(), &mut |node| seen.push(node.type_name()));
        assert_eq!(
            seen,
            vec![
                "doc",
                "paragraph",
                "text",
                "image",
                "blockquote",
                "paragraph",
                "text",
                "image",
                "bulletList",
                "listItem",
                "image"
            ]
        );
    }

    #[test]
    fn test_visit_mut_counts_changes() {
        let mut doc = sample();
        let changed = visit_mut(&mut doc, &mut |node| match node {
            Node::Image(leaf) => {
                let attrs = leaf.attrs.get_or_insert_with(Default::default);
                if attrs.src() == Some("two") {
                    attrs.set_src("2");
                    true
                } else {
                    false
                }
            }
            _ => false,
        });
        assert_eq!(changed, 1);
        assert_eq!(image_sources(&doc), vec!["one", "2", "three"]);
    }
}
