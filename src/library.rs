//! Library access with an explicit, caller-owned document cache.
//!
//! A library root holds single-file documents (`<id>.json`) and multi-part
//! documents (`<id>/metadata.json` plus part files). Nothing is cached
//! globally; whoever owns the `DocumentCache` decides its lifetime.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::assembler::{self, MANIFEST_FILE};
use crate::error::Error;
use crate::types::Document;

/// Where a library document is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// A directory with a manifest and part files.
    MultiPart(PathBuf),
    /// A single JSON file.
    Single(PathBuf),
}

/// Documents loaded from one library root, keyed by id.
#[derive(Debug, Clone)]
pub struct DocumentCache {
    /// Loaded documents.
    entries: BTreeMap<String, Arc<Document>>,
    /// Library root directory.
    root: PathBuf,
}

impl DocumentCache {
    /// Ids of every document stored under the root, loaded or not.
    pub fn available_ids(&self) -> BTreeSet<String> {
        return walkdir::WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter_map(|entry| return document_id(entry.path()))
            .collect();
    }

    /// Drop every cached document.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Return the document with `id`, loading it on first access.
    ///
    /// # Errors
    ///
    /// Returns `Error::FileNotFound` if the library has no such document, or
    /// any JSON or assembly error from loading it.
    pub fn get(&mut self, id: &str) -> Result<Arc<Document>, Error> {
        if let Some(document) = self.entries.get(id) {
            return Ok(Arc::clone(document));
        }
        let document = Arc::new(load(&self.locate(id)?)?);
        tracing::debug!(document = %id, "cached library document");
        self.entries.insert(id.to_string(), Arc::clone(&document));
        return Ok(document);
    }

    /// Forget one document so the next `get` reloads it from disk. Returns
    /// whether it was cached.
    pub fn invalidate(&mut self, id: &str) -> bool {
        return self.entries.remove(id).is_some();
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        return self.entries.is_empty();
    }

    /// Number of cached documents.
    pub fn len(&self) -> usize {
        return self.entries.len();
    }

    /// Where the document with `id` is stored.
    ///
    /// # Errors
    ///
    /// Returns `Error::FileNotFound` naming the single-file path when neither
    /// layout exists.
    pub fn locate(&self, id: &str) -> Result<Source, Error> {
        let dir = self.root.join(id);
        if dir.join(MANIFEST_FILE).is_file() {
            return Ok(Source::MultiPart(dir));
        }
        let file = self.root.join(format!("{id}.json"));
        if file.is_file() {
            return Ok(Source::Single(file));
        }
        return Err(Error::FileNotFound { path: file });
    }

    /// An empty cache over `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        return Self { entries: BTreeMap::new(), root: root.into() };
    }

    /// Library root directory.
    pub fn root(&self) -> &Path {
        return &self.root;
    }
}

/// Load a document from either storage layout.
///
/// # Errors
///
/// Returns `Error::FileNotFound`, `Error::Json`, or `Error::PartLoad`.
pub fn load(source: &Source) -> Result<Document, Error> {
    return match source {
        Source::MultiPart(dir) => assembler::assemble_dir(dir),
        Source::Single(path) => {
            let json =
                std::fs::read_to_string(path).map_err(|_err| return Error::FileNotFound { path: path.clone() })?;
            Document::from_json(&json)
        },
    };
}

/// Document id for a library entry: `<id>.json` files, or `<id>/`
/// directories holding a manifest.
fn document_id(path: &Path) -> Option<String> {
    if path.is_dir() {
        if !path.join(MANIFEST_FILE).is_file() {
            return None;
        }
        return path.file_name().map(|name| return name.to_string_lossy().into_owned());
    }
    let is_json = path.extension().is_some_and(|ext| return ext.eq_ignore_ascii_case("json"));
    if !is_json {
        return None;
    }
    return path.file_stem().map(|stem| return stem.to_string_lossy().into_owned());
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Library with one single-file and one multi-part document.
    fn library() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("isavasya.json"), r#"{"grantha_id": "isavasya", "passages": [{"ref": "1"}]}"#)
            .unwrap();
        let multi = dir.path().join("katha");
        std::fs::create_dir(&multi).unwrap();
        std::fs::write(multi.join(MANIFEST_FILE), r#"{"grantha_id": "katha", "parts": ["part1.json"]}"#).unwrap();
        std::fs::write(multi.join("part1.json"), r#"{"passages": [{"ref": "1.1"}]}"#).unwrap();
        std::fs::create_dir(dir.path().join("scratch")).unwrap();
        return dir;
    }

    #[test]
    fn lists_both_layouts() {
        let dir = library();
        let cache = DocumentCache::new(dir.path());
        let ids: Vec<String> = cache.available_ids().into_iter().collect();
        assert_eq!(ids, vec!["isavasya", "katha"]);
    }

    #[test]
    fn caches_until_invalidated() {
        let dir = library();
        let mut cache = DocumentCache::new(dir.path());
        assert!(cache.is_empty());
        let first = cache.get("katha").unwrap();
        assert_eq!(first.main.len(), 1);
        assert_eq!(cache.len(), 1);

        std::fs::write(dir.path().join("katha").join("part1.json"), r#"{"passages": [{"ref": "1.1"}, {"ref": "1.2"}]}"#)
            .unwrap();
        assert_eq!(cache.get("katha").unwrap().main.len(), 1);
        assert!(cache.invalidate("katha"));
        assert_eq!(cache.get("katha").unwrap().main.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn unknown_document_is_not_found() {
        let dir = library();
        let mut cache = DocumentCache::new(dir.path());
        assert!(matches!(cache.get("missing"), Err(Error::FileNotFound { .. })));
    }
}
