use super::Language;
use async_trait::async_trait;
use displaydoc::Display;
use serde::Deserialize;
use slug::slugify;
use std::collections::HashMap;
use std::io::{self, ErrorKind};
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, instrument};

/// Error from the content store
#[derive(Debug, Error, Display)]
pub enum StoreError {
    /// IO error on {path:?}: {source}
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Invalid post id {0:?}
    InvalidId(String),
}

/// Where the per-language content of posts is kept
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// The stored JSON of `post` in `lang`, if any
    async fn load(&self, post: &str, lang: Language) -> Result<Option<String>, StoreError>;

    async fn save(&self, post: &str, lang: Language, json: String) -> Result<(), StoreError>;
}

/// Content as `<save_dir>/<post-id>.<lang>.json`.
///
/// Post ids must already be slugs, so that no two ids share a file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FolderStore {
    /// The directory to save the files to
    #[serde(default)]
    save_dir: Option<PathBuf>,
}

impl FolderStore {
    pub fn new(save_dir: impl Into<PathBuf>) -> Self {
        Self {
            save_dir: Some(save_dir.into()),
        }
    }

    fn dir(&self) -> PathBuf {
        self.save_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("posts"))
    }

    /// The file for `post` in `lang`
    pub fn path(&self, post: &str, lang: Language) -> Result<PathBuf, StoreError> {
        let post_slug: String = slugify(post);
        if post_slug.is_empty() || post_slug != post {
            return Err(StoreError::InvalidId(post.to_owned()));
        }
        Ok(self.dir().join(format!("{}.{}.json", post_slug, lang)))
    }
}

#[async_trait]
impl ContentStore for FolderStore {
    #[instrument(skip(self))]
    async fn load(&self, post: &str, lang: Language) -> Result<Option<String>, StoreError> {
        let path = self.path(post, lang)?;
        match fs::read_to_string(&path).await {
            Ok(json) => Ok(Some(json)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    #[instrument(skip(self, json))]
    async fn save(&self, post: &str, lang: Language, json: String) -> Result<(), StoreError> {
        let path = self.path(post, lang)?;
        let dir = self.dir();
        if let Err(source) = fs::create_dir_all(&dir).await {
            return Err(StoreError::Io { path: dir, source });
        }
        if let Err(source) = fs::write(&path, json).await {
            return Err(StoreError::Io { path, source });
        }
        debug!("Saved {:?}", path);
        Ok(())
    }
}

/// Content in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: Mutex<HashMap<(String, Language), String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, post: &str, lang: Language) -> Option<String> {
        self.docs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(post.to_owned(), lang))
            .cloned()
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn load(&self, post: &str, lang: Language) -> Result<Option<String>, StoreError> {
        Ok(self.get(post, lang))
    }

    async fn save(&self, post: &str, lang: Language, json: String) -> Result<(), StoreError> {
        self.docs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert((post.to_owned(), lang), json);
        Ok(())
    }
}
