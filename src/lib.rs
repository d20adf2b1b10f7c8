//! # Folio
//!
//! The content pipeline of a bilingual (English/Arabic) blog. Posts are
//! stored as rich-text document trees; images inserted while editing live
//! in memory until the post is saved, are then uploaded and referenced by
//! URL. On display, stored documents are resolved, tagged with their text
//! direction and code blocks get a copy button.
pub mod config;
pub mod direction;
pub mod editor;
pub mod model;
pub mod pipeline;
pub mod post;
pub mod registry;
pub mod render;
pub mod storage;
pub mod util;
