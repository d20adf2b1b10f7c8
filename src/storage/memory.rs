use super::{check_key, Storage, StorageError};
use crate::model::source::join_base;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::trace;

#[derive(Debug, Default)]
struct State {
    objects: HashMap<(String, String), Bytes>,
    completed: Vec<String>,
    removed: Vec<String>,
    fail: Vec<String>,
    delays: Vec<(String, Duration)>,
}

/// Keeps objects in memory. Used for dry runs and in tests, where uploads
/// can be slowed down or made to fail by key.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    public_base: String,
    state: Mutex<State>,
}

impl MemoryStorage {
    pub fn new(public_base: impl Into<String>) -> Self {
        Self {
            public_base: public_base.into(),
            state: Mutex::default(),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // poisoning is ignored, the state stays consistent between statements
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Reject uploads of keys containing `pattern`
    pub fn fail_uploads(&self, pattern: impl Into<String>) {
        self.state().fail.push(pattern.into());
    }

    /// Delay uploads of keys containing `pattern`
    pub fn delay_uploads(&self, pattern: impl Into<String>, delay: Duration) {
        self.state().delays.push((pattern.into(), delay));
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.state()
            .objects
            .get(&(bucket.to_owned(), key.to_owned()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.state().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().objects.is_empty()
    }

    /// Keys in the order their uploads finished
    pub fn completed(&self) -> Vec<String> {
        self.state().completed.clone()
    }

    pub fn removed(&self) -> Vec<String> {
        self.state().removed.clone()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn upload(&self, bucket: &str, key: &str, bytes: Bytes) -> Result<(), StorageError> {
        check_key(key)?;
        let delay = self
            .state()
            .delays
            .iter()
            .find(|(pattern, _)| key.contains(pattern.as_str()))
            .map(|(_, delay)| *delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        if state.fail.iter().any(|pattern| key.contains(pattern.as_str())) {
            return Err(StorageError::Rejected(
                key.to_owned(),
                String::from("upload failed"),
            ));
        }
        trace!("Stored {}/{} in memory", bucket, key);
        state
            .objects
            .insert((bucket.to_owned(), key.to_owned()), bytes);
        state.completed.push(key.to_owned());
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        join_base(&join_base(&self.public_base, bucket), key)
    }

    async fn remove(&self, bucket: &str, keys: &[String]) -> Result<(), StorageError> {
        let mut state = self.state();
        for key in keys {
            state.objects.remove(&(bucket.to_owned(), key.clone()));
            state.removed.push(key.clone());
        }
        Ok(())
    }
}
