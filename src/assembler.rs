//! Multi-part document assembly: a `metadata.json` manifest lists part files
//! in logical order; parts are loaded concurrently and merged in that order.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::types::{Commentary, Document, Passage};

/// File name of the manifest inside a multi-part document directory.
pub const MANIFEST_FILE: &str = "metadata.json";

/// Result of one part load, indexed by manifest position.
type Slot = Option<Result<PartialDocument, Error>>;

/// Loads part files from a directory on disk. Part names must stay inside
/// that directory: absolute paths and `..` are refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsPartLoader {
    /// Directory the manifest's file names are relative to.
    pub root: PathBuf,
}

impl PartLoader for FsPartLoader {
    fn load(&self, part: &str) -> Result<PartialDocument, Error> {
        let relative = Path::new(part);
        if part.is_empty() || !relative.components().all(|c| return matches!(c, Component::Normal(_) | Component::CurDir)) {
            let reason = format!("part path `{part}` leaves the manifest directory");
            return Err(Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, reason)));
        }
        let path = self.root.join(relative);
        let json = std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                return Error::FileNotFound { path: path.clone() };
            }
            return Error::Io(e);
        })?;
        let partial: PartialDocument = serde_json::from_str(&json)?;
        return Ok(partial);
    }
}

/// Document metadata plus the ordered list of part files.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    /// Document fields shared by every part: id, title, structure, aliases.
    pub meta: Document,
    /// Parts in logical document order.
    pub parts: Vec<PartEntry>,
}

impl Manifest {
    /// Parse a manifest. `parts` entries may be `{"file", "id"}` objects or
    /// bare file names; a missing id defaults to the file stem.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if the manifest or its parts list is malformed.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let mut value: serde_json::Value = serde_json::from_str(json)?;
        let parts_value = value
            .as_object_mut()
            .and_then(|object| return object.remove("parts"))
            .unwrap_or_else(|| return serde_json::Value::Array(Vec::new()));
        let specs: Vec<PartSpec> = serde_json::from_value(parts_value)?;
        let mut meta: Document = serde_json::from_value(value)?;
        meta.assign_kinds();
        return Ok(Self { meta, parts: specs.into_iter().map(PartSpec::into_entry).collect() });
    }

    /// Read `metadata.json` from a multi-part document directory.
    ///
    /// # Errors
    ///
    /// Returns `Error::FileNotFound` if the manifest is missing, or
    /// `Error::Json` if it is malformed.
    pub fn load(dir: &Path) -> Result<Self, Error> {
        let path = dir.join(MANIFEST_FILE);
        let json = std::fs::read_to_string(&path).map_err(|_err| return Error::FileNotFound { path: path.clone() })?;
        return Self::from_json(&json);
    }
}

/// One part listed in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartEntry {
    /// Part file name, relative to the manifest directory.
    pub file: String,
    /// Part identifier stamped on every passage loaded from it.
    #[serde(default)]
    pub id: String,
}

/// The passage and commentary content of one part file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialDocument {
    /// Commentaries, or fragments of commentaries, found in this part.
    #[serde(default)]
    pub commentaries: Vec<Commentary>,
    /// Concluding material found in this part.
    #[serde(rename = "concluding_material", alias = "concludingMaterial", default)]
    pub concluding: Vec<Passage>,
    /// Main passages found in this part.
    #[serde(rename = "passages", default)]
    pub main: Vec<Passage>,
    /// Prefatory material found in this part.
    #[serde(rename = "prefatory_material", alias = "prefatoryMaterial", default)]
    pub prefatory: Vec<Passage>,
}

/// Manifest `parts` entry as written: an object or a bare file name.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PartSpec {
    /// Bare file name.
    File(String),
    /// `{"file": ..., "id": ...}`.
    Named(PartEntry),
}

impl PartSpec {
    /// Normalize to an entry with a non-empty id.
    fn into_entry(self) -> PartEntry {
        let mut entry = match self {
            Self::File(file) => PartEntry { file, id: String::new() },
            Self::Named(entry) => entry,
        };
        if entry.id.is_empty() {
            entry.id = Path::new(&entry.file)
                .file_stem()
                .map_or_else(|| return entry.file.clone(), |stem| return stem.to_string_lossy().into_owned());
        }
        return entry;
    }
}

/// Source of part content. Implemented for closures so callers and tests can
/// supply parts from memory.
pub trait PartLoader: Sync {
    /// Load the part stored under `part` (a manifest file name).
    ///
    /// # Errors
    ///
    /// Any error; assembly reports it as `Error::PartLoad` for this part.
    fn load(&self, part: &str) -> Result<PartialDocument, Error>;
}

impl<F> PartLoader for F
where
    F: Fn(&str) -> Result<PartialDocument, Error> + Sync,
{
    fn load(&self, part: &str) -> Result<PartialDocument, Error> {
        return self(part);
    }
}

/// Load every part concurrently and merge them in manifest order.
///
/// Passages and commentary passages are tagged with their part id.
/// Commentaries with the same id are merged by concatenating passages.
///
/// # Errors
///
/// Returns `Error::PartLoad` naming the first part (in manifest order) that
/// failed to load. No partial document is returned.
pub fn assemble<L: PartLoader + ?Sized>(manifest: &Manifest, loader: &L) -> Result<Document, Error> {
    let mut loaded = load_parts(&manifest.parts, loader);
    let mut document = manifest.meta.clone();

    for (entry, slot) in manifest.parts.iter().zip(loaded.iter_mut()) {
        let partial = match slot.take() {
            Some(Ok(partial)) => partial,
            Some(Err(e)) => return Err(Error::PartLoad { part: entry.file.clone(), reason: e.to_string() }),
            None => {
                return Err(Error::PartLoad { part: entry.file.clone(), reason: "loader returned no result".to_string() });
            },
        };
        tracing::debug!(document = %document.id, part = %entry.id, passages = partial.main.len(), "merging part");
        merge_part(&mut document, partial, &entry.id);
    }
    document.assign_kinds();
    return Ok(document);
}

/// Assemble the multi-part document stored in `dir`.
///
/// # Errors
///
/// Returns manifest errors, or `Error::PartLoad` for a missing or malformed part.
pub fn assemble_dir(dir: &Path) -> Result<Document, Error> {
    let manifest = Manifest::load(dir)?;
    return assemble(&manifest, &FsPartLoader { root: dir.to_path_buf() });
}

/// Run every load on its own scoped thread; results land in manifest slots
/// regardless of completion order.
fn load_parts<L: PartLoader + ?Sized>(parts: &[PartEntry], loader: &L) -> Vec<Slot> {
    let (tx, rx) = crossbeam_channel::unbounded();
    std::thread::scope(|scope| {
        for (position, entry) in parts.iter().enumerate() {
            let tx = tx.clone();
            scope.spawn(move || {
                let _ = tx.send((position, loader.load(&entry.file)));
            });
        }
    });
    drop(tx);

    let mut slots: Vec<Slot> = parts.iter().map(|_| return None).collect();
    for (position, result) in rx {
        if let Some(slot) = slots.get_mut(position) {
            *slot = Some(result);
        }
    }
    return slots;
}

/// Append one part's content to the document, stamping `part_id`.
fn merge_part(document: &mut Document, partial: PartialDocument, part_id: &str) {
    let stamp = |mut passage: Passage| {
        passage.source_part = Some(part_id.to_string());
        return passage;
    };
    document.prefatory.extend(partial.prefatory.into_iter().map(stamp));
    document.main.extend(partial.main.into_iter().map(stamp));
    document.concluding.extend(partial.concluding.into_iter().map(stamp));

    for mut commentary in partial.commentaries {
        for passage in &mut commentary.passages {
            passage.source_part = Some(part_id.to_string());
        }
        match document.commentaries.iter_mut().find(|c| return c.id == commentary.id) {
            Some(existing) => {
                if existing.title.is_empty() {
                    existing.title = commentary.title;
                }
                if existing.commentator.is_empty() {
                    existing.commentator = commentary.commentator;
                }
                existing.passages.extend(commentary.passages);
            },
            None => document.commentaries.push(commentary),
        }
    }
}
