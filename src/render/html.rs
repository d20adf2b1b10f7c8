use super::{Indicator, RenderedDocument};
use crate::model::{Attrs, Mark, Node};
use pulldown_cmark_escape::{escape_href, escape_html, FmtWriter};
use std::fmt::{self, Write};
use std::time::Instant;

/// HTML for a rendered document at a point in time (copy buttons show
/// their state as of `now`)
pub struct Html<'a> {
    doc: &'a RenderedDocument,
    now: Instant,
}

impl RenderedDocument {
    pub fn html(&self, now: Instant) -> Html<'_> {
        Html { doc: self, now }
    }
}

fn text(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    escape_html(FmtWriter(&mut *f), s)
}

fn href(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    escape_href(FmtWriter(&mut *f), s)
}

fn dir_attr(f: &mut fmt::Formatter<'_>, node: &Node) -> fmt::Result {
    match node.attrs().and_then(Attrs::dir) {
        Some(dir) => write!(f, " dir=\"{}\"", dir),
        None => Ok(()),
    }
}

fn mark_tag(mark: &Mark) -> Option<&'static str> {
    match mark.kind.as_str() {
        "bold" => Some("strong"),
        "italic" => Some("em"),
        "code" => Some("code"),
        "strike" => Some("s"),
        "underline" => Some("u"),
        "link" => Some("a"),
        _ => None,
    }
}

impl<'a> Html<'a> {
    fn children(&self, f: &mut fmt::Formatter<'_>, node: &Node, blocks: &mut usize) -> fmt::Result {
        for child in node.children() {
            self.node(f, child, blocks)?;
        }
        Ok(())
    }

    fn wrap(
        &self,
        f: &mut fmt::Formatter<'_>,
        tag: &str,
        node: &Node,
        blocks: &mut usize,
    ) -> fmt::Result {
        write!(f, "<{}", tag)?;
        dir_attr(f, node)?;
        f.write_char('>')?;
        self.children(f, node, blocks)?;
        write!(f, "</{}>", tag)
    }

    fn marked(&self, f: &mut fmt::Formatter<'_>, content: &str, marks: &[Mark]) -> fmt::Result {
        let tags: Vec<(&Mark, &str)> = marks
            .iter()
            .filter_map(|m| mark_tag(m).map(|tag| (m, tag)))
            .collect();
        for (mark, tag) in &tags {
            match mark.attrs.as_ref().and_then(Attrs::href) {
                Some(url) if *tag == "a" => {
                    f.write_str("<a href=\"")?;
                    href(f, url)?;
                    f.write_str("\">")?;
                }
                _ => write!(f, "<{}>", tag)?,
            }
        }
        text(f, content)?;
        for (_, tag) in tags.iter().rev() {
            write!(f, "</{}>", tag)?;
        }
        Ok(())
    }

    fn code_block(&self, f: &mut fmt::Formatter<'_>, blocks: &mut usize) -> fmt::Result {
        let view = match self.doc.code_blocks.get(*blocks) {
            Some(view) => view,
            None => return Ok(()),
        };
        *blocks += 1;

        f.write_str("<div class=\"code-block\"")?;
        if let Some(control) = &view.control {
            let indicator: Indicator = control.indicator(self.now);
            write!(
                f,
                " data-copy-attached=\"true\"><button class=\"copy-button\" data-state=\"{}\">{}</button",
                indicator.as_str(),
                indicator.label()
            )?;
        }
        f.write_str("><pre><code")?;
        if let Some(language) = &view.language {
            f.write_str(" class=\"language-")?;
            text(f, language)?;
            f.write_char('"')?;
        }
        f.write_char('>')?;
        text(f, &view.text)?;
        f.write_str("</code></pre></div>")
    }

    fn node(&self, f: &mut fmt::Formatter<'_>, node: &Node, blocks: &mut usize) -> fmt::Result {
        match node {
            Node::Doc(_) => self.children(f, node, blocks),
            Node::Paragraph(_) => self.wrap(f, "p", node, blocks),
            Node::Heading(_) => {
                let level = node.attrs().and_then(Attrs::level).unwrap_or(1).clamp(1, 6);
                self.wrap(f, &format!("h{}", level), node, blocks)
            }
            Node::BulletList(_) => self.wrap(f, "ul", node, blocks),
            Node::OrderedList(_) => self.wrap(f, "ol", node, blocks),
            Node::ListItem(_) => self.wrap(f, "li", node, blocks),
            Node::Blockquote(_) => self.wrap(f, "blockquote", node, blocks),
            Node::CodeBlock(_) => self.code_block(f, blocks),
            Node::Link(_) => {
                f.write_str("<a href=\"")?;
                href(f, node.attrs().and_then(Attrs::href).unwrap_or_default())?;
                f.write_str("\">")?;
                self.children(f, node, blocks)?;
                f.write_str("</a>")
            }
            Node::Text(t) => match &t.marks {
                Some(marks) => self.marked(f, &t.text, marks),
                None => text(f, &t.text),
            },
            Node::Image(_) => {
                let attrs = node.attrs();
                f.write_str("<img src=\"")?;
                href(f, attrs.and_then(Attrs::src).unwrap_or_default())?;
                f.write_str("\" alt=\"")?;
                text(f, attrs.and_then(Attrs::alt).unwrap_or_default())?;
                f.write_str("\">")
            }
            Node::HorizontalRule(_) => f.write_str("<hr>"),
            Node::HardBreak(_) => f.write_str("<br>"),
        }
    }
}

impl<'a> fmt::Display for Html<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut blocks = 0;
        self.node(f, self.doc.doc.root(), &mut blocks)
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{Direction, Document, Mark, Node};
    use crate::render::RenderedDocument;
    use std::time::Instant;

    #[test]
    fn test_html() {
        let mut para = Node::paragraph(vec![
            Node::text("a < b "),
            Node::marked_text("bold", vec![Mark::new("bold")]),
        ]);
        para.attrs_mut().unwrap().set_dir(Direction::Ltr);
        let doc = Document::new(vec![
            Node::heading(2, vec![Node::text("Title")]),
            para,
            Node::image("https://cdn/x/k1"),
            Node::bullet_list(vec![Node::list_item(vec![Node::paragraph(vec![Node::text("i")])])]),
            Node::horizontal_rule(),
        ]);
        let html = RenderedDocument::new(doc).html(Instant::now()).to_string();
        assert_eq!(
            html,
            "<h2>Title</h2>\
             <p dir=\"ltr\">a &lt; b <strong>bold</strong></p>\
             <img src=\"https://cdn/x/k1\" alt=\"\">\
             <ul><li><p>i</p></li></ul>\
             <hr>"
        );
    }

    #[test]
    fn test_code_block_marker() {
        let doc = Document::new(vec![
            Node::code_block(Some("rust"), "if a < b {}"),
            Node::code_block(None, "plain"),
        ]);
        let mut rendered = RenderedDocument::new(doc);
        let now = Instant::now();

        let html = rendered.html(now).to_string();
        assert!(!html.contains("data-copy-attached"));

        rendered.attach_copy_controls();
        let html = rendered.html(now).to_string();
        assert_eq!(html.matches("data-copy-attached=\"true\"").count(), 2);
        assert!(html.contains("<code class=\"language-rust\">if a &lt; b {}</code>"));
        assert!(html.contains("data-state=\"idle\">Copy</button>"));
    }
}
