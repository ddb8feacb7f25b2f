//! Page storage seam.
//!
//! This module defines the `PageStore` trait the driver uses to fetch page
//! text and submit edits, so the pipeline never depends on a particular
//! content service. Two implementations ship with the crate: a directory of
//! plain files and an in-memory map for tests.
//!
//! # Example
//!
//! ```ignore
//! use wikt_normalizer::store::{MemoryStore, PageStore, SubmitOutcome};
//!
//! let store = MemoryStore::new();
//! store.insert("casa", "=={{lengua|es}}==");
//! let page = store.fetch_text("casa")?;
//! let outcome = store.submit_edit("casa", "nuevo", "resumen", page.revision)?;
//! assert_eq!(outcome, SubmitOutcome::Success);
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, info};

use crate::error::{EditorError, EditorResult};

/// Page text together with the revision it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPage {
    pub title: String,
    pub text: String,
    pub revision: u64,
}

/// Result of submitting an edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Success,
    /// The page changed since the base revision was read
    Conflict,
}

/// Source and sink of page text.
pub trait PageStore: Send + Sync {
    /// Fetch the current text of a page
    ///
    /// # Arguments
    ///
    /// * `title` - Page title
    ///
    /// # Errors
    ///
    /// Returns `EditorError::Io` if the page cannot be read.
    fn fetch_text(&self, title: &str) -> EditorResult<StoredPage>;

    /// Replace the text of a page
    ///
    /// # Arguments
    ///
    /// * `title` - Page title
    /// * `text` - New page text
    /// * `summary` - Edit summary
    /// * `base_revision` - Revision the edit was computed from
    ///
    /// # Returns
    ///
    /// * `SubmitOutcome::Conflict` if the page moved past `base_revision`
    fn submit_edit(
        &self,
        title: &str,
        text: &str,
        summary: &str,
        base_revision: u64,
    ) -> EditorResult<SubmitOutcome>;
}

/// Pages stored as `<dir>/<title>.wiki` files. The file's modification time
/// (in seconds) serves as revision.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirectoryStore { root: root.into() }
    }

    fn path_for(&self, title: &str) -> PathBuf {
        let file_name: String = title
            .trim()
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' => '_',
                ' ' => '_',
                c => c,
            })
            .collect();
        self.root.join(format!("{}.wiki", file_name))
    }

    fn revision_of(path: &Path) -> EditorResult<u64> {
        let modified = fs::metadata(path)?.modified()?;
        Ok(modified
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0))
    }
}

impl PageStore for DirectoryStore {
    fn fetch_text(&self, title: &str) -> EditorResult<StoredPage> {
        let path = self.path_for(title);
        debug!("Reading {} from {}", title, path.display());

        let text = fs::read_to_string(&path)?;
        let revision = DirectoryStore::revision_of(&path)?;

        Ok(StoredPage {
            title: title.to_string(),
            text,
            revision,
        })
    }

    fn submit_edit(
        &self,
        title: &str,
        text: &str,
        summary: &str,
        base_revision: u64,
    ) -> EditorResult<SubmitOutcome> {
        let path = self.path_for(title);

        if path.exists() && DirectoryStore::revision_of(&path)? > base_revision {
            return Ok(SubmitOutcome::Conflict);
        }

        fs::write(&path, text)?;
        info!("Saved {} ({})", title, summary);
        Ok(SubmitOutcome::Success)
    }
}

/// In-memory pages with monotonically increasing revisions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pages: Mutex<HashMap<String, (String, u64)>>,
    summaries: Mutex<Vec<(String, String)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Create or overwrite a page, bumping its revision.
    pub fn insert(&self, title: &str, text: &str) {
        if let Ok(mut pages) = self.pages.lock() {
            let revision = pages.get(title).map_or(1, |(_, r)| r + 1);
            pages.insert(title.to_string(), (text.to_string(), revision));
        }
    }

    /// Edit summaries accepted so far, oldest first.
    pub fn summaries(&self) -> Vec<(String, String)> {
        self.summaries
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

fn poisoned<T>(_: T) -> EditorError {
    EditorError::Io("page store lock poisoned".to_string())
}

impl PageStore for MemoryStore {
    fn fetch_text(&self, title: &str) -> EditorResult<StoredPage> {
        let pages = self.pages.lock().map_err(poisoned)?;
        let (text, revision) = pages
            .get(title)
            .ok_or_else(|| EditorError::Io(format!("Page not found: {}", title)))?;

        Ok(StoredPage {
            title: title.to_string(),
            text: text.clone(),
            revision: *revision,
        })
    }

    fn submit_edit(
        &self,
        title: &str,
        text: &str,
        summary: &str,
        base_revision: u64,
    ) -> EditorResult<SubmitOutcome> {
        let mut pages = self.pages.lock().map_err(poisoned)?;
        let current = pages.get(title).map_or(0, |(_, r)| *r);

        if current != base_revision {
            return Ok(SubmitOutcome::Conflict);
        }

        pages.insert(title.to_string(), (text.to_string(), current + 1));
        self.summaries
            .lock()
            .map_err(poisoned)?
            .push((title.to_string(), summary.to_string()));

        Ok(SubmitOutcome::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        store.insert("casa", "texto");

        let page = store.fetch_text("casa").unwrap();
        assert_eq!(page.text, "texto");
        assert_eq!(page.revision, 1);

        let outcome = store.submit_edit("casa", "nuevo", "resumen", 1).unwrap();
        assert_eq!(outcome, SubmitOutcome::Success);
        assert_eq!(store.fetch_text("casa").unwrap().text, "nuevo");
        assert_eq!(store.summaries(), vec![("casa".to_string(), "resumen".to_string())]);
    }

    #[test]
    fn test_memory_store_conflict() {
        let store = MemoryStore::new();
        store.insert("casa", "texto");
        store.insert("casa", "otro");

        let outcome = store.submit_edit("casa", "nuevo", "resumen", 1).unwrap();
        assert_eq!(outcome, SubmitOutcome::Conflict);
        assert_eq!(store.fetch_text("casa").unwrap().text, "otro");
    }

    #[test]
    fn test_memory_store_missing_page() {
        let store = MemoryStore::new();
        assert!(matches!(store.fetch_text("nada"), Err(EditorError::Io(_))));
    }

    #[test]
    fn test_directory_store() {
        let dir = std::env::temp_dir().join(format!("wikt-store-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let store = DirectoryStore::new(&dir);
        fs::write(dir.join("casa_de_campo.wiki"), "texto").unwrap();

        let page = store.fetch_text("casa de campo").unwrap();
        assert_eq!(page.text, "texto");

        let outcome = store
            .submit_edit("casa de campo", "nuevo", "resumen", page.revision)
            .unwrap();
        assert_eq!(outcome, SubmitOutcome::Success);
        assert_eq!(fs::read_to_string(dir.join("casa_de_campo.wiki")).unwrap(), "nuevo");

        fs::remove_dir_all(&dir).unwrap();
    }
}
