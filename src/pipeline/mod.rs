//! # The content pipeline
//!
//! Documents are stored in a different form than they are edited or shown:
//!
//! - on save, [`materialize`] uploads the images that only exist in the
//!   editor and points their nodes at the uploaded copies
//! - on render, [`resolve`] turns bare storage keys from older posts into
//!   public URLs
//! - [`prune`] finds uploads a new version of a post no longer uses
pub mod materialize;
pub mod prune;
pub mod resolve;

pub use materialize::{
    apply_rewrites, KeyGenerator, KeyNamer, MaterializeError, Materialized, Plan, Upload,
};
pub use resolve::{resolve, resolve_cover, resolve_src};

use derive_new::new;

/// Where images go and how strict the save path is
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct Settings {
    /// The bucket images are uploaded to
    pub bucket: String,
    /// Public URL of the bucket, the prefix for bare storage keys
    pub storage_base: String,
    /// Fail a save when an image handle is missing from the registry
    #[new(default)]
    pub strict_orphans: bool,
}

impl Settings {
    pub fn strict(mut self, strict_orphans: bool) -> Self {
        self.strict_orphans = strict_orphans;
        self
    }
}
