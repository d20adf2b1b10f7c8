//! # The document model
//!
//! This module follows the tiptap/ProseMirror JSON serialization of nodes:
//! every node is an object with a `"type"` tag, optional `"attrs"`, and
//! either `"content"` (containers) or `"text"` (text leaves).
pub mod de;
pub mod source;
pub mod walk;

use displaydoc::Display;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Error when reading or writing a document
#[derive(Debug, Error, Display)]
pub enum ModelError {
    /// Invalid document JSON: {0}
    Json(#[from] serde_json::Error),
}

/// Text direction of a block
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ltr,
    Rtl,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Ltr => "ltr",
            Direction::Rtl => "rtl",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The attributes of a node.
///
/// Kept as a plain JSON object so that keys this crate does not know about
/// (and explicit `null`s) survive a load/save cycle.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Attrs(Map<String, Value>);

impl Attrs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// The stored direction, `None` if unset, `null` or unknown
    pub fn dir(&self) -> Option<Direction> {
        match self.get_str("dir") {
            Some("ltr") => Some(Direction::Ltr),
            Some("rtl") => Some(Direction::Rtl),
            _ => None,
        }
    }

    pub fn set_dir(&mut self, dir: Direction) {
        self.set("dir", dir.as_str());
    }

    pub fn src(&self) -> Option<&str> {
        self.get_str("src")
    }

    pub fn set_src(&mut self, src: impl Into<String>) {
        self.set("src", src.into());
    }

    pub fn alt(&self) -> Option<&str> {
        self.get_str("alt")
    }

    /// Language of a code block
    pub fn language(&self) -> Option<&str> {
        self.get_str("language")
    }

    /// Level of a heading
    pub fn level(&self) -> Option<u64> {
        self.get("level").and_then(Value::as_u64)
    }

    pub fn href(&self) -> Option<&str> {
        self.get_str("href")
    }
}

/// An inline mark on a text node (bold, italic, link, ...)
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Mark {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<Attrs>,
}

impl Mark {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            attrs: None,
        }
    }
}

/// A node that may hold children
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Block {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<Attrs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Fragment>,
}

impl Block {
    pub fn new(content: Fragment) -> Self {
        Self {
            attrs: None,
            content: Some(content),
        }
    }

    pub fn with_attrs(attrs: Attrs, content: Fragment) -> Self {
        Self {
            attrs: Some(attrs),
            content: Some(content),
        }
    }

    pub fn children(&self) -> &[Node] {
        self.content.as_deref().unwrap_or(&[])
    }
}

/// A node that never holds children
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Leaf {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<Attrs>,
}

/// A run of text
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Text {
    #[serde(default, deserialize_with = "de::deserialize_or_default")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marks: Option<Vec<Mark>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Node {
    Doc(Block),
    Paragraph(Block),
    Heading(Block),
    BulletList(Block),
    OrderedList(Block),
    ListItem(Block),
    Blockquote(Block),
    CodeBlock(Block),
    Link(Block),
    Text(Text),
    Image(Leaf),
    HorizontalRule(Leaf),
    HardBreak(Leaf),
}

pub type Fragment = Vec<Node>;

impl Node {
    pub fn doc(content: Fragment) -> Self {
        Node::Doc(Block::new(content))
    }

    pub fn paragraph(content: Fragment) -> Self {
        Node::Paragraph(Block::new(content))
    }

    pub fn heading(level: u8, content: Fragment) -> Self {
        Node::Heading(Block::with_attrs(Attrs::new().with("level", level), content))
    }

    pub fn bullet_list(items: Fragment) -> Self {
        Node::BulletList(Block::new(items))
    }

    pub fn ordered_list(items: Fragment) -> Self {
        Node::OrderedList(Block::new(items))
    }

    pub fn list_item(content: Fragment) -> Self {
        Node::ListItem(Block::new(content))
    }

    pub fn blockquote(content: Fragment) -> Self {
        Node::Blockquote(Block::new(content))
    }

    pub fn code_block(language: Option<&str>, code: impl Into<String>) -> Self {
        let attrs = Attrs::new().with("language", language.map(str::to_owned));
        Node::CodeBlock(Block::with_attrs(attrs, vec![Node::text(code)]))
    }

    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(Text {
            text: text.into(),
            marks: None,
        })
    }

    pub fn marked_text(text: impl Into<String>, marks: Vec<Mark>) -> Self {
        Node::Text(Text {
            text: text.into(),
            marks: Some(marks),
        })
    }

    pub fn image(src: impl Into<String>) -> Self {
        Node::Image(Leaf {
            attrs: Some(Attrs::new().with("src", src.into())),
        })
    }

    pub fn horizontal_rule() -> Self {
        Node::HorizontalRule(Leaf::default())
    }

    /// The `"type"` tag of this node
    pub fn type_name(&self) -> &'static str {
        match self {
            Node::Doc(_) => "doc",
            Node::Paragraph(_) => "paragraph",
            Node::Heading(_) => "heading",
            Node::BulletList(_) => "bulletList",
            Node::OrderedList(_) => "orderedList",
            Node::ListItem(_) => "listItem",
            Node::Blockquote(_) => "blockquote",
            Node::CodeBlock(_) => "codeBlock",
            Node::Link(_) => "link",
            Node::Text(_) => "text",
            Node::Image(_) => "image",
            Node::HorizontalRule(_) => "horizontalRule",
            Node::HardBreak(_) => "hardBreak",
        }
    }

    pub fn block(&self) -> Option<&Block> {
        match self {
            Node::Doc(b)
            | Node::Paragraph(b)
            | Node::Heading(b)
            | Node::BulletList(b)
            | Node::OrderedList(b)
            | Node::ListItem(b)
            | Node::Blockquote(b)
            | Node::CodeBlock(b)
            | Node::Link(b) => Some(b),
            Node::Text(_) | Node::Image(_) | Node::HorizontalRule(_) | Node::HardBreak(_) => None,
        }
    }

    pub fn block_mut(&mut self) -> Option<&mut Block> {
        match self {
            Node::Doc(b)
            | Node::Paragraph(b)
            | Node::Heading(b)
            | Node::BulletList(b)
            | Node::OrderedList(b)
            | Node::ListItem(b)
            | Node::Blockquote(b)
            | Node::CodeBlock(b)
            | Node::Link(b) => Some(b),
            Node::Text(_) | Node::Image(_) | Node::HorizontalRule(_) | Node::HardBreak(_) => None,
        }
    }

    pub fn attrs(&self) -> Option<&Attrs> {
        match self {
            Node::Text(_) => None,
            Node::Image(l) | Node::HorizontalRule(l) | Node::HardBreak(l) => l.attrs.as_ref(),
            _ => self.block().and_then(|b| b.attrs.as_ref()),
        }
    }

    /// The attributes of this node, created empty if missing.
    ///
    /// Returns `None` for text nodes, which carry marks instead.
    pub fn attrs_mut(&mut self) -> Option<&mut Attrs> {
        let slot = match self {
            Node::Text(_) => return None,
            Node::Image(l) | Node::HorizontalRule(l) | Node::HardBreak(l) => &mut l.attrs,
            Node::Doc(b)
            | Node::Paragraph(b)
            | Node::Heading(b)
            | Node::BulletList(b)
            | Node::OrderedList(b)
            | Node::ListItem(b)
            | Node::Blockquote(b)
            | Node::CodeBlock(b)
            | Node::Link(b) => &mut b.attrs,
        };
        Some(slot.get_or_insert_with(Attrs::new))
    }

    pub fn children(&self) -> &[Node] {
        self.block().map(Block::children).unwrap_or(&[])
    }

    /// Source of an image node
    pub fn image_src(&self) -> Option<&str> {
        match self {
            Node::Image(l) => l.attrs.as_ref().and_then(Attrs::src),
            _ => None,
        }
    }

    /// The concatenated text of all descendants
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Node::Text(t) => out.push_str(&t.text),
            Node::HardBreak(_) => out.push('\n'),
            _ => {
                for child in self.children() {
                    child.collect_text(out);
                }
            }
        }
    }
}

/// The content of a post in one language
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Document(Node);

impl Default for Document {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Node> for Document {
    fn from(root: Node) -> Self {
        Self(root)
    }
}

impl Document {
    pub fn new(content: Fragment) -> Self {
        Self(Node::doc(content))
    }

    /// A fresh document, as the editor creates it
    pub fn empty() -> Self {
        Self::new(vec![Node::paragraph(Vec::new())])
    }

    /// A single visible paragraph, shown in place of content that could not be loaded
    pub fn placeholder(message: &str) -> Self {
        Self::new(vec![Node::paragraph(vec![Node::text(message)])])
    }

    pub fn from_json(input: &str) -> Result<Self, ModelError> {
        Ok(serde_json::from_str(input)?)
    }

    pub fn from_value(value: Value) -> Result<Self, ModelError> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_json(&self) -> Result<String, ModelError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn root(&self) -> &Node {
        &self.0
    }

    pub fn root_mut(&mut self) -> &mut Node {
        &mut self.0
    }

    pub fn into_root(self) -> Node {
        self.0
    }

    pub fn plain_text(&self) -> String {
        self.0.text_content()
    }
}
