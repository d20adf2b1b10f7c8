//! # Object storage
//!
//! Image bytes live in buckets of an object store. The pipeline only needs
//! three operations from it: upload a key, turn a key into a public URL and
//! remove keys that are no longer referenced.
mod local;
mod memory;

pub use local::LocalStorage;
pub use memory::MemoryStorage;

use async_trait::async_trait;
use bytes::Bytes;
use displaydoc::Display;
use std::io;
use thiserror::Error;

/// Error from the storage collaborator
#[derive(Debug, Error, Display)]
pub enum StorageError {
    /// IO error on {bucket}/{key}: {source}
    Io {
        bucket: String,
        key: String,
        #[source]
        source: io::Error,
    },
    /// Invalid storage key {0:?}
    InvalidKey(String),
    /// Storage rejected {0:?}: {1}
    Rejected(String, String),
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// Store `bytes` under `key` in `bucket`
    async fn upload(&self, bucket: &str, key: &str, bytes: Bytes) -> Result<(), StorageError>;

    /// The absolute URL under which `key` is served
    fn public_url(&self, bucket: &str, key: &str) -> String;

    /// Delete `keys` from `bucket`, missing keys are not an error
    async fn remove(&self, bucket: &str, keys: &[String]) -> Result<(), StorageError>;
}

/// Keys are flat names within a bucket
pub(crate) fn check_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() || key == "." || key == ".." || key.contains('/') || key.contains('\\') {
        Err(StorageError::InvalidKey(key.to_owned()))
    } else {
        Ok(())
    }
}
