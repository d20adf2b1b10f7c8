//! # Image sources
//!
//! An image `src` is always in one of three states. Other code relies on
//! this exact rule, so it lives in one place:
//!
//! - starts with `http://` or `https://`: an absolute URL, directly renderable
//! - starts with `blob:`: a temporary handle, only valid in its editing session
//! - anything else: a storage key, only meaningful to the storage collaborator

/// Prefix of temporary handles
pub const TEMPORARY_PREFIX: &str = "blob:";

const URL_PREFIXES: [&str; 2] = ["http://", "https://"];

/// The state of an image source
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ImageSource {
    /// No source at all
    Empty,
    /// An in-memory handle owned by an editing session
    Temporary,
    /// An opaque key inside a storage bucket
    StorageKey,
    /// A fully qualified URL
    AbsoluteUrl,
}

impl ImageSource {
    pub fn classify(src: &str) -> Self {
        if src.is_empty() {
            ImageSource::Empty
        } else if is_absolute_url(src) {
            ImageSource::AbsoluteUrl
        } else if is_temporary(src) {
            ImageSource::Temporary
        } else {
            ImageSource::StorageKey
        }
    }
}

pub fn is_absolute_url(src: &str) -> bool {
    URL_PREFIXES.iter().any(|prefix| src.starts_with(prefix))
}

pub fn is_temporary(src: &str) -> bool {
    src.starts_with(TEMPORARY_PREFIX)
}

/// Join a storage base path and a key without doubling the separator
pub fn join_base(base: &str, key: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        key.trim_start_matches('/')
    )
}

/// The storage key of a URL issued below `base`, if it is one
pub fn strip_base<'a>(base: &str, url: &'a str) -> Option<&'a str> {
    let base = base.trim_end_matches('/');
    url.strip_prefix(base)
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|key| !key.is_empty())
}
