//! # Unused uploads
//!
//! When a post is saved again, images that were removed from it stay in the
//! bucket. These helpers find the keys the previous version used and the
//! new one does not. Both languages of a post may point at the same upload,
//! so keys still used by any other document are kept.
use crate::model::source::{strip_base, ImageSource};
use crate::model::{walk, Document};
use crate::storage::{Storage, StorageError};
use std::collections::BTreeSet;
use tracing::info;

/// The storage keys `doc` refers to, as bare keys or as URLs below `base`
pub fn storage_keys(doc: &Document, base: &str) -> BTreeSet<String> {
    walk::image_sources(doc.root())
        .into_iter()
        .filter_map(|src| match ImageSource::classify(src) {
            ImageSource::StorageKey => Some(src),
            ImageSource::AbsoluteUrl => strip_base(base, src),
            ImageSource::Temporary | ImageSource::Empty => None,
        })
        .map(str::to_owned)
        .collect()
}

/// Keys used by `previous` but neither by `current` nor by any of `others`
pub fn stale_keys(
    previous: &Document,
    current: &Document,
    others: &[Document],
    base: &str,
) -> Vec<String> {
    let mut keep = storage_keys(current, base);
    for other in others {
        keep.extend(storage_keys(other, base));
    }
    storage_keys(previous, base)
        .into_iter()
        .filter(|key| !keep.contains(key))
        .collect()
}

/// Remove the keys `current` dropped and `others` do not use, returning them
pub async fn prune(
    storage: &dyn Storage,
    bucket: &str,
    previous: &Document,
    current: &Document,
    others: &[Document],
    base: &str,
) -> Result<Vec<String>, StorageError> {
    let stale = stale_keys(previous, current, others, base);
    if !stale.is_empty() {
        info!("Removing {} unused images from {}", stale.len(), bucket);
        storage.remove(bucket, &stale).await?;
    }
    Ok(stale)
}

#[cfg(test)]
mod tests {
    use super::{prune, stale_keys, storage_keys};
    use crate::model::{Document, Node};
    use crate::storage::{MemoryStorage, Storage};
    use bytes::Bytes;

    const BASE: &str = "https://cdn/x";

    #[test]
    fn test_storage_keys() {
        let doc = Document::new(vec![
            Node::image("legacy.png"),
            Node::image("https://cdn/x/1-a.png"),
            Node::image("https://elsewhere/b.png"),
            Node::image("blob:1"),
        ]);
        let keys: Vec<_> = storage_keys(&doc, BASE).into_iter().collect();
        assert_eq!(keys, vec!["1-a.png".to_owned(), "legacy.png".to_owned()]);
    }

    #[test]
    fn test_stale_keys() {
        let previous = Document::new(vec![Node::image("https://cdn/x/1-a.png"), Node::image("old.png")]);
        let current = Document::new(vec![Node::image("https://cdn/x/1-a.png")]);
        assert_eq!(stale_keys(&previous, &current, &[], BASE), vec!["old.png".to_owned()]);
        assert!(stale_keys(&current, &current, &[], BASE).is_empty());
    }

    #[test]
    fn test_keys_shared_with_other_documents_are_kept() {
        let previous = Document::new(vec![Node::image("https://cdn/x/1-shared.png"), Node::image("old.png")]);
        let current = Document::empty();
        let other = Document::new(vec![Node::image("https://cdn/x/1-shared.png")]);
        assert_eq!(
            stale_keys(&previous, &current, &[other], BASE),
            vec!["old.png".to_owned()]
        );
    }

    #[tokio::test]
    async fn test_prune_removes_from_storage() {
        let storage = MemoryStorage::new("https://cdn");
        storage.upload("x", "old.png", Bytes::new()).await.unwrap();
        storage.upload("x", "kept.png", Bytes::new()).await.unwrap();

        let previous = Document::new(vec![Node::image("old.png"), Node::image("kept.png")]);
        let current = Document::new(vec![Node::image("https://cdn/x/kept.png")]);
        let removed = prune(&storage, "x", &previous, &current, &[], BASE).await.unwrap();

        assert_eq!(removed, vec!["old.png".to_owned()]);
        assert!(storage.get("x", "old.png").is_none());
        assert!(storage.get("x", "kept.png").is_some());
    }
}
