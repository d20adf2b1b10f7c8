use super::{check_key, Storage, StorageError};
use crate::model::source::join_base;
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, instrument};

/// Buckets as directories below `root`, served from `public_base`
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    public_base: String,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>, public_base: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base: public_base.into(),
        }
    }

    fn path(&self, bucket: &str, key: &str) -> Result<PathBuf, StorageError> {
        check_key(bucket)?;
        check_key(key)?;
        Ok(self.root.join(bucket).join(key))
    }
}

#[async_trait]
impl Storage for LocalStorage {
    #[instrument(skip(self, bytes))]
    async fn upload(&self, bucket: &str, key: &str, bytes: Bytes) -> Result<(), StorageError> {
        let path = self.path(bucket, key)?;
        let io_err = |source: std::io::Error| StorageError::Io {
            bucket: bucket.to_owned(),
            key: key.to_owned(),
            source,
        };
        fs::create_dir_all(self.root.join(bucket))
            .await
            .map_err(io_err)?;
        fs::write(&path, &bytes).await.map_err(io_err)?;
        debug!("Stored {:?}", path);
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        join_base(
            &join_base(&self.public_base, bucket),
            &urlencoding::encode(key),
        )
    }

    #[instrument(skip(self))]
    async fn remove(&self, bucket: &str, keys: &[String]) -> Result<(), StorageError> {
        for key in keys {
            let path = self.path(bucket, key)?;
            match fs::remove_file(&path).await {
                Ok(()) => debug!("Removed {:?}", path),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(StorageError::Io {
                        bucket: bucket.to_owned(),
                        key: key.clone(),
                        source,
                    })
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::LocalStorage;
    use crate::storage::{Storage, StorageError};
    use bytes::Bytes;

    #[tokio::test]
    async fn test_upload_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "http://localhost:8080/public/");

        storage
            .upload("blog-images", "1-a.png", Bytes::from_static(b"png"))
            .await
            .unwrap();
        let path = dir.path().join("blog-images").join("1-a.png");
        assert_eq!(std::fs::read(&path).unwrap(), b"png");

        storage
            .remove("blog-images", &["1-a.png".to_owned(), "missing.png".to_owned()])
            .await
            .unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_rejects_path_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "http://localhost");
        let res = storage
            .upload("blog-images", "../escape.png", Bytes::new())
            .await;
        assert!(matches!(res, Err(StorageError::InvalidKey(_))));
    }

    #[test]
    fn test_public_url() {
        let storage = LocalStorage::new("/tmp", "http://localhost:8080/public/");
        assert_eq!(
            storage.public_url("blog-images", "1-a.png"),
            "http://localhost:8080/public/blog-images/1-a.png"
        );
        assert_eq!(
            storage.public_url("blog-images", "a b.png"),
            "http://localhost:8080/public/blog-images/a%20b.png"
        );
    }
}
