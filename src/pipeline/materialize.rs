//! # Image materialization
//!
//! Runs once per save. Every image whose `src` is a temporary handle is
//! uploaded and rewritten to the public URL of the upload.
//!
//! The pass works in three steps so that a failure never leaves a half
//! rewritten document behind:
//!
//! 1. [`Plan::prepare`] collects the handles and their bytes from the registry
//! 2. [`Plan::execute`] uploads all of them concurrently and waits for every one
//! 3. only then is a copy of the document rewritten
use super::Settings;
use crate::model::source::{self, ImageSource};
use crate::model::{walk, Document, Node};
use crate::registry::TempFileRegistry;
use crate::storage::{Storage, StorageError};
use bytes::Bytes;
use chrono::Utc;
use displaydoc::Display;
use futures_util::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Error when materializing a document
#[derive(Debug, Error, Display)]
pub enum MaterializeError {
    /// Upload of {handle} as {key:?} failed: {source}
    Upload {
        handle: String,
        key: String,
        #[source]
        source: StorageError,
    },
    /// Image {0} is not in the temporary file registry
    Orphaned(String),
}

/// Picks the storage key for an uploaded file
pub trait KeyNamer: Send + Sync {
    fn key_for(&self, file_name: &str) -> String;
}

impl<F> KeyNamer for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn key_for(&self, file_name: &str) -> String {
        self(file_name)
    }
}

/// Only keep ASCII letters, digits and dots of a file name
pub fn sanitize_name(name: &str) -> String {
    let clean: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '.')
        .collect();
    if clean.is_empty() {
        String::from("image")
    } else {
        clean
    }
}

/// Names keys `{nanoseconds}-{sanitized name}`.
///
/// The timestamp is strictly increasing per generator, so two files with
/// the same name never get the same key.
#[derive(Debug, Default)]
pub struct KeyGenerator {
    last: AtomicI64,
}

impl KeyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_stamp(&self) -> i64 {
        let now = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let prev = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|prev| prev);
        now.max(prev + 1)
    }
}

impl KeyNamer for KeyGenerator {
    fn key_for(&self, file_name: &str) -> String {
        format!("{}-{}", self.next_stamp(), sanitize_name(file_name))
    }
}

/// One finished upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub handle: String,
    pub key: String,
    pub url: String,
}

/// The outcome of a successful pass
#[derive(Debug, Clone)]
pub struct Materialized {
    /// The document to persist
    pub doc: Document,
    /// What was uploaded, in document order
    pub uploads: Vec<Upload>,
    /// Handles that were referenced but had no registry entry
    pub orphans: Vec<String>,
}

impl Materialized {
    /// Handle to URL, for patching other copies of the document
    pub fn rewrites(&self) -> HashMap<String, String> {
        self.uploads
            .iter()
            .map(|u| (u.handle.clone(), u.url.clone()))
            .collect()
    }
}

#[derive(Debug, Clone)]
struct Job {
    handle: String,
    key: String,
    bytes: Bytes,
}

/// Everything a save needs, detached from the editor's registry
#[derive(Debug, Clone)]
pub struct Plan {
    doc: Document,
    jobs: Vec<Job>,
    orphans: Vec<String>,
}

impl Plan {
    /// Collect the temporary images of `doc`.
    ///
    /// A handle that is used by several images is uploaded once. Handles
    /// missing from the registry are logged and kept as they are, unless
    /// `settings.strict_orphans` is set.
    pub fn prepare(
        doc: &Document,
        registry: &TempFileRegistry,
        keys: &dyn KeyNamer,
        settings: &Settings,
    ) -> Result<Self, MaterializeError> {
        let mut seen = HashSet::new();
        let mut jobs = Vec::new();
        let mut orphans = Vec::new();

        for src in walk::image_sources(doc.root()) {
            if ImageSource::classify(src) != ImageSource::Temporary || !seen.insert(src) {
                continue;
            }
            match registry.get(src) {
                Some(file) => jobs.push(Job {
                    handle: src.to_owned(),
                    key: keys.key_for(&file.name),
                    bytes: file.bytes.clone(),
                }),
                None if settings.strict_orphans => {
                    return Err(MaterializeError::Orphaned(src.to_owned()));
                }
                None => {
                    warn!("Image {} has no registry entry, keeping it unresolved", src);
                    orphans.push(src.to_owned());
                }
            }
        }

        Ok(Self {
            doc: doc.clone(),
            jobs,
            orphans,
        })
    }

    /// Number of uploads this plan makes
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn orphans(&self) -> &[String] {
        &self.orphans
    }

    /// Upload everything, then rewrite.
    ///
    /// If any upload fails the whole pass fails and no document is produced.
    /// The uploads that did finish are removed again on a best-effort basis.
    pub async fn execute(
        self,
        storage: &dyn Storage,
        bucket: &str,
    ) -> Result<Materialized, MaterializeError> {
        let Plan { doc, jobs, orphans } = self;
        if !jobs.is_empty() {
            info!("Uploading {} images to {}", jobs.len(), bucket);
        }

        let results = join_all(jobs.into_iter().map(|job| async move {
            let Job { handle, key, bytes } = job;
            if let Err(source) = storage.upload(bucket, &key, bytes).await {
                return Err(MaterializeError::Upload {
                    handle,
                    key,
                    source,
                });
            }
            let url = storage.public_url(bucket, &key);
            debug!("Uploaded {} to {}", handle, url);
            Ok(Upload { handle, key, url })
        }))
        .await;

        let mut uploads = Vec::with_capacity(results.len());
        let mut failure = None;
        for result in results {
            match result {
                Ok(upload) => uploads.push(upload),
                Err(e) if failure.is_none() => failure = Some(e),
                Err(e) => warn!("{}", e),
            }
        }
        if let Some(e) = failure {
            let keys: Vec<String> = uploads.into_iter().map(|u| u.key).collect();
            if !keys.is_empty() {
                debug!("Rolling back {} uploads", keys.len());
                if let Err(remove_err) = storage.remove(bucket, &keys).await {
                    warn!("Could not remove {:?} after a failed upload: {}", keys, remove_err);
                }
            }
            return Err(e);
        }

        let mut out = Materialized {
            doc,
            uploads,
            orphans,
        };
        let urls = out.rewrites();
        apply_rewrites(out.doc.root_mut(), &urls);
        Ok(out)
    }
}

/// Point every image whose source is a key of `urls` at the mapped URL,
/// returning the number of rewritten nodes
pub fn apply_rewrites(root: &mut Node, urls: &HashMap<String, String>) -> usize {
    walk::visit_mut(root, &mut |node| match node {
        Node::Image(leaf) => {
            let url = leaf
                .attrs
                .as_ref()
                .and_then(|a| a.src())
                .filter(|src| source::is_temporary(src))
                .and_then(|src| urls.get(src));
            match (url, leaf.attrs.as_mut()) {
                (Some(url), Some(attrs)) => {
                    attrs.set_src(url.clone());
                    true
                }
                _ => false,
            }
        }
        _ => false,
    })
}

/// Prepare and execute in one go
pub async fn materialize(
    doc: &Document,
    registry: &TempFileRegistry,
    storage: &dyn Storage,
    keys: &dyn KeyNamer,
    settings: &Settings,
) -> Result<Materialized, MaterializeError> {
    Plan::prepare(doc, registry, keys, settings)?
        .execute(storage, &settings.bucket)
        .await
}

#[cfg(test)]
mod tests {
    use super::{materialize, sanitize_name, KeyGenerator, KeyNamer, MaterializeError, Plan};
    use crate::model::source::{is_temporary, ImageSource};
    use crate::model::{walk, Document, Node};
    use crate::pipeline::Settings;
    use crate::registry::{TempFile, TempFileRegistry};
    use crate::storage::MemoryStorage;
    use std::collections::HashSet;
    use std::time::Duration;

    fn settings() -> Settings {
        Settings::new("x".to_owned(), "https://cdn/x".to_owned())
    }

    fn registry(handles: &[(&str, &str)]) -> TempFileRegistry {
        let mut registry = TempFileRegistry::new();
        for (handle, name) in handles {
            registry.register(*handle, TempFile::new(*name, name.as_bytes().to_vec()));
        }
        registry
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("my photo (1).PNG"), "myphoto1.PNG");
        assert_eq!(sanitize_name("صورة.jpg"), ".jpg");
        assert_eq!(sanitize_name("???"), "image");
    }

    #[test]
    fn test_keys_are_unique() {
        let keys = KeyGenerator::new();
        let generated: HashSet<String> = (0..100).map(|_| keys.key_for("a.png")).collect();
        assert_eq!(generated.len(), 100);
        assert!(generated.iter().all(|k| k.ends_with("-a.png")));
    }

    #[tokio::test]
    async fn test_end_to_end_with_fixed_key() {
        let doc = Document::new(vec![
            Node::paragraph(vec![Node::text("Hello")]),
            Node::image("blob:1"),
        ]);
        let registry = registry(&[("blob:1", "photo.png")]);
        let storage = MemoryStorage::new("https://cdn");
        let keys = |_: &str| String::from("k1");

        let out = materialize(&doc, &registry, &storage, &keys, &settings())
            .await
            .unwrap();

        assert_eq!(
            out.doc,
            Document::new(vec![
                Node::paragraph(vec![Node::text("Hello")]),
                Node::image("https://cdn/x/k1"),
            ])
        );
        assert_eq!(out.uploads.len(), 1);
        assert_eq!(out.uploads[0].key, "k1");
        assert_eq!(&storage.get("x", "k1").unwrap()[..], &b"photo.png"[..]);
        // the input is only borrowed
        assert_eq!(walk::image_sources(doc.root()), vec!["blob:1"]);
    }

    #[tokio::test]
    async fn test_no_temporary_sources_remain() {
        let doc = Document::new(vec![
            Node::image("blob:a"),
            Node::blockquote(vec![Node::image("blob:b"), Node::image("https://x/y.png")]),
            Node::bullet_list(vec![Node::list_item(vec![Node::image("blob:a")])]),
            Node::image("k-old"),
            Node::image(""),
        ]);
        let registry = registry(&[("blob:a", "a.png"), ("blob:b", "b.png")]);
        let storage = MemoryStorage::new("https://cdn");

        let out = materialize(&doc, &registry, &storage, &KeyGenerator::new(), &settings())
            .await
            .unwrap();

        let sources = walk::image_sources(out.doc.root());
        assert!(sources.iter().all(|src| !is_temporary(src)));
        assert_eq!(sources[2], "https://x/y.png");
        assert_eq!(sources[4], "k-old");
        assert_eq!(sources[5], "");
        // blob:a appears twice but is uploaded once
        assert_eq!(out.uploads.len(), 2);
        assert_eq!(storage.len(), 2);
        assert_eq!(sources[0], sources[3]);
    }

    #[tokio::test]
    async fn test_one_failed_upload_fails_the_pass() {
        let doc = Document::new(vec![Node::image("blob:a"), Node::image("blob:b")]);
        let original = doc.clone();
        let registry = registry(&[("blob:a", "good.png"), ("blob:b", "bad.png")]);
        let storage = MemoryStorage::new("https://cdn");
        storage.fail_uploads("bad");

        let res = materialize(&doc, &registry, &storage, &KeyGenerator::new(), &settings()).await;

        match res {
            Err(MaterializeError::Upload { handle, .. }) => assert_eq!(handle, "blob:b"),
            other => panic!("expected upload failure, got {:?}", other),
        }
        assert_eq!(doc, original);
        assert_eq!(registry.len(), 2);
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_failed_passes_leave_nothing_behind() {
        let doc = Document::new(vec![Node::image("blob:a"), Node::image("blob:b")]);
        let registry = registry(&[("blob:a", "good.png"), ("blob:b", "bad.png")]);
        let storage = MemoryStorage::new("https://cdn");
        storage.fail_uploads("bad");
        let keys = KeyGenerator::new();

        for _ in 0..3 {
            let res = materialize(&doc, &registry, &storage, &keys, &settings()).await;
            assert!(res.is_err());
        }
        assert!(storage.is_empty());
        assert_eq!(storage.completed().len(), 3);
        assert_eq!(storage.removed(), storage.completed());
    }

    #[tokio::test]
    async fn test_order_is_kept_when_uploads_finish_out_of_order() {
        let doc = Document::new(vec![
            Node::image("blob:slow"),
            Node::paragraph(vec![Node::text("between")]),
            Node::image("blob:fast"),
        ]);
        let registry = registry(&[("blob:slow", "slow.png"), ("blob:fast", "fast.png")]);
        let storage = MemoryStorage::new("https://cdn");
        storage.delay_uploads("slow", Duration::from_millis(50));

        let out = materialize(&doc, &registry, &storage, &KeyGenerator::new(), &settings())
            .await
            .unwrap();

        let completed = storage.completed();
        assert!(completed[0].ends_with("fast.png"));
        assert!(completed[1].ends_with("slow.png"));

        let sources = walk::image_sources(out.doc.root());
        assert!(sources[0].ends_with("slow.png"));
        assert!(sources[1].ends_with("fast.png"));
        assert_eq!(out.doc.root().children()[1].type_name(), "paragraph");
    }

    #[tokio::test]
    async fn test_orphan_is_reported() {
        let doc = Document::new(vec![Node::image("blob:gone"), Node::image("blob:a")]);
        let registry = registry(&[("blob:a", "a.png")]);
        let storage = MemoryStorage::new("https://cdn");

        let out = materialize(&doc, &registry, &storage, &KeyGenerator::new(), &settings())
            .await
            .unwrap();

        assert_eq!(out.orphans, vec!["blob:gone".to_owned()]);
        let sources = walk::image_sources(out.doc.root());
        assert_eq!(sources[0], "blob:gone");
        assert_eq!(ImageSource::classify(sources[1]), ImageSource::AbsoluteUrl);
    }

    #[test]
    fn test_strict_orphan_fails() {
        let doc = Document::new(vec![Node::image("blob:gone")]);
        let res = Plan::prepare(
            &doc,
            &TempFileRegistry::new(),
            &KeyGenerator::new(),
            &settings().strict(true),
        );
        assert!(matches!(res, Err(MaterializeError::Orphaned(h)) if h == "blob:gone"));
    }

    #[tokio::test]
    async fn test_second_pass_is_noop() {
        let doc = Document::new(vec![Node::image("blob:a")]);
        let registry = registry(&[("blob:a", "a.png")]);
        let storage = MemoryStorage::new("https://cdn");
        let keys = KeyGenerator::new();

        let once = materialize(&doc, &registry, &storage, &keys, &settings())
            .await
            .unwrap();
        let twice = materialize(&once.doc, &registry, &storage, &keys, &settings())
            .await
            .unwrap();
        assert_eq!(twice.doc, once.doc);
        assert!(twice.uploads.is_empty());
    }
}
