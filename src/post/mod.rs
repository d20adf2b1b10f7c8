//! # Posts
//!
//! A post is written in English and Arabic. Title, description and content
//! exist per language; the cover image, tags and publish status are shared.
//! The database owns posts, this crate only defines the shape of the
//! per-language content and the cover reference.
mod store;

pub use store::{ContentStore, FolderStore, MemoryStore, StoreError};

use crate::model::Document;
use displaydoc::Display;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error when parsing a language code
#[derive(Debug, Error, Display)]
pub enum ParseLanguageError {
    /// Unknown language `{0}`, expected `en` or `ar`
    Unknown(String),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Ar,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::En, Language::Ar];

    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Ar => "ar",
        }
    }

    pub fn other(self) -> Self {
        match self {
            Language::En => Language::Ar,
            Language::Ar => Language::En,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = ParseLanguageError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "en" => Ok(Self::En),
            "ar" => Ok(Self::Ar),
            _ => Err(ParseLanguageError::Unknown(s.to_owned())),
        }
    }
}

/// One value per language
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Localized<T> {
    pub en: T,
    pub ar: T,
}

impl<T> Localized<T> {
    pub fn get(&self, lang: Language) -> &T {
        match lang {
            Language::En => &self.en,
            Language::Ar => &self.ar,
        }
    }

    pub fn get_mut(&mut self, lang: Language) -> &mut T {
        match lang {
            Language::En => &mut self.en,
            Language::Ar => &mut self.ar,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishStatus {
    Draft,
    Published,
}

impl Default for PublishStatus {
    fn default() -> Self {
        PublishStatus::Draft
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Post {
    pub id: String,
    pub title: Localized<String>,
    pub description: Localized<String>,
    pub content: Localized<Document>,
    /// A storage key or URL
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub status: PublishStatus,
}

impl Post {
    /// A new draft with empty content in both languages
    pub fn draft(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: Localized::default(),
            description: Localized::default(),
            content: Localized::default(),
            cover_image: None,
            tags: BTreeSet::new(),
            status: PublishStatus::Draft,
        }
    }

    pub fn content(&self, lang: Language) -> &Document {
        self.content.get(lang)
    }

    pub fn content_mut(&mut self, lang: Language) -> &mut Document {
        self.content.get_mut(lang)
    }

    /// Start the content of `to` from a copy of `from`
    pub fn clone_content(&mut self, from: Language, to: Language) {
        if from != to {
            let doc = self.content.get(from).clone();
            *self.content.get_mut(to) = doc;
        }
    }

    pub fn is_published(&self) -> bool {
        self.status == PublishStatus::Published
    }
}

#[cfg(test)]
mod tests {
    use super::{Language, Post, PublishStatus};
    use crate::model::{Document, Node};

    #[test]
    fn test_language_parse() {
        assert_eq!("en".parse::<Language>().unwrap(), Language::En);
        assert_eq!("ar".parse::<Language>().unwrap(), Language::Ar);
        let err = "fr".parse::<Language>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown language `fr`, expected `en` or `ar`");
        let _: &dyn std::error::Error = &err;
        assert_eq!(Language::Ar.other(), Language::En);
    }

    #[test]
    fn test_draft_starts_empty() {
        let post = Post::draft("hello");
        assert_eq!(post.content(Language::En), &Document::empty());
        assert_eq!(post.content(Language::Ar), &Document::empty());
        assert_eq!(post.status, PublishStatus::Draft);
    }

    #[test]
    fn test_clone_content() {
        let mut post = Post::draft("hello");
        *post.content_mut(Language::En) =
            Document::new(vec![Node::paragraph(vec![Node::text("Hi")])]);
        post.clone_content(Language::En, Language::Ar);
        assert_eq!(post.content(Language::Ar).plain_text(), "Hi");

        *post.content_mut(Language::Ar) = Document::placeholder("مرحبا");
        assert_eq!(post.content(Language::En).plain_text(), "Hi");
    }

    #[test]
    fn test_post_json() {
        let json = r#"{
            "id": "p1",
            "title": { "en": "Hi", "ar": "مرحبا" },
            "description": { "en": "", "ar": "" },
            "content": {
                "en": { "type": "doc", "content": [] },
                "ar": { "type": "doc", "content": [] }
            },
            "cover_image": "cover.png",
            "tags": ["rust"],
            "status": "published"
        }"#;
        let post: Post = serde_json::from_str(json).unwrap();
        assert!(post.is_published());
        assert_eq!(post.title.get(Language::Ar), "مرحبا");
        assert_eq!(post.cover_image.as_deref(), Some("cover.png"));
    }
}
