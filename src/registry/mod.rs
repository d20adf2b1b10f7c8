//! # Temporary files
//!
//! Images inserted into the editor are kept in memory until the post is
//! saved. The editor puts a `blob:` handle into the document right away and
//! keeps the bytes here, keyed by that handle.
//!
//! Each entry moves `absent -> registered -> absent`, nothing else. Entries
//! leave the registry when their image is uploaded, or all at once when the
//! editing session ends.
use crate::model::source::TEMPORARY_PREFIX;
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, trace};
use uuid::Uuid;

/// An image picked by the user but not yet uploaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempFile {
    /// The original file name
    pub name: String,
    /// The raw file contents
    pub bytes: Bytes,
}

impl TempFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// A committed change to the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    Registered(String),
    Removed(String),
    /// All entries were dropped, with the number of entries that were present
    Cleared(usize),
}

type Observer = Box<dyn Fn(&RegistryEvent) + Send>;

/// A fresh temporary handle
pub fn new_handle() -> String {
    format!("{}{}", TEMPORARY_PREFIX, Uuid::new_v4())
}

#[derive(Default)]
pub struct TempFileRegistry {
    files: HashMap<String, TempFile>,
    observers: Vec<Observer>,
}

impl fmt::Debug for TempFileRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TempFileRegistry")
            .field("handles", &self.files.keys().collect::<Vec<_>>())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl TempFileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer that is called after every change
    pub fn subscribe<F>(&mut self, observer: F)
    where
        F: Fn(&RegistryEvent) + Send + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    fn notify(&self, event: RegistryEvent) {
        trace!("registry event {:?}", event);
        for observer in &self.observers {
            observer(&event);
        }
    }

    /// Keep `file` under `handle`, which is returned unchanged
    pub fn register(&mut self, handle: impl Into<String>, file: TempFile) -> String {
        let handle = handle.into();
        debug!("Registered {} ({}, {} bytes)", handle, file.name, file.bytes.len());
        self.files.insert(handle.clone(), file);
        self.notify(RegistryEvent::Registered(handle.clone()));
        handle
    }

    /// Drop the entry for `handle`. The handle must not be used again.
    pub fn remove(&mut self, handle: &str) -> Option<TempFile> {
        let file = self.files.remove(handle)?;
        self.notify(RegistryEvent::Removed(handle.to_owned()));
        Some(file)
    }

    /// Drop all entries
    pub fn cleanup(&mut self) {
        let count = self.files.len();
        self.files.clear();
        self.files.shrink_to_fit();
        if count > 0 {
            debug!("Released {} temporary files", count);
        }
        self.notify(RegistryEvent::Cleared(count));
    }

    pub fn get(&self, handle: &str) -> Option<&TempFile> {
        self.files.get(handle)
    }

    pub fn contains(&self, handle: &str) -> bool {
        self.files.contains_key(handle)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn handles(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }
}
