//! Structural normalizer for Spanish Wiktionary entries.
//!
//! The crate parses a page into an arena-backed section tree, scans templates
//! and ignored regions of the wikitext, and runs a fixed pipeline of
//! idempotent rewrite passes that bring an entry to the current layout.

pub mod catgram;
pub mod config;
pub mod depth;
pub mod editor;
pub mod error;
pub mod ordering;
pub mod page;
pub mod ranges;
pub mod section;
pub mod store;
pub mod template;

// Re-export the types most callers need
pub use catgram::{Catgram, Data};
pub use config::{Config, Settings};
pub use editor::{Change, Editor, PIPELINE, Pass};
pub use error::{EditorError, EditorResult};
pub use page::{Page, SectionId};
pub use section::{LangHeader, Section};
pub use store::{DirectoryStore, MemoryStore, PageStore};
pub use template::Template;
