//! Global abbreviation map and its inverted lookup index.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::error::Error;
use crate::hasher::normalize_text;

/// Script key used for abbreviations added through the config file.
pub const LOCAL_SCRIPT: &str = "local";

/// Document id to per-script abbreviation lists, as produced by the library
/// build step.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct AbbreviationMap(
    /// `document id -> script -> [abbreviation]`.
    pub BTreeMap<String, BTreeMap<String, Vec<String>>>,
);

impl AbbreviationMap {
    /// Parse the JSON map.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if the JSON does not have the map shape.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        return Ok(serde_json::from_str(json)?);
    }

    /// Read and parse a JSON map file.
    ///
    /// # Errors
    ///
    /// Returns `Error::FileNotFound` if the file is missing, or `Error::Json`.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let json = std::fs::read_to_string(path).map_err(|_err| return Error::FileNotFound { path: path.to_path_buf() })?;
        return Self::from_json(&json);
    }

    /// Add config-file overrides under the `local` script key.
    pub fn merge_overrides(&mut self, overrides: &BTreeMap<String, Vec<String>>) {
        for (document, abbreviations) in overrides {
            let local = self.0.entry(document.clone()).or_default().entry(LOCAL_SCRIPT.to_string()).or_default();
            for abbreviation in abbreviations {
                if !local.contains(abbreviation) {
                    local.push(abbreviation.clone());
                }
            }
        }
    }

    /// Build the abbreviation to document index.
    pub fn index(&self) -> AbbreviationIndex {
        let mut exact: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut loose: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (document, scripts) in &self.0 {
            for abbreviation in scripts.values().flatten() {
                let trimmed = abbreviation.trim();
                if trimmed.is_empty() {
                    continue;
                }
                exact.entry(trimmed.to_string()).or_default().insert(document.clone());
                loose.entry(loose_key(trimmed)).or_default().insert(document.clone());
            }
        }
        return AbbreviationIndex { exact, loose };
    }
}

/// Inverted index: abbreviation to the documents claiming it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AbbreviationIndex {
    /// Abbreviations as written.
    exact: BTreeMap<String, BTreeSet<String>>,
    /// Abbreviations with whitespace and punctuation removed, lowercased.
    loose: BTreeMap<String, BTreeSet<String>>,
}

impl AbbreviationIndex {
    /// Resolve an abbreviation. The exact spelling wins over a loose match.
    pub fn lookup(&self, abbreviation: &str) -> Lookup {
        let trimmed = abbreviation.trim();
        if let Some(documents) = self.exact.get(trimmed) {
            return Lookup::from_candidates(documents);
        }
        return self.loose.get(&loose_key(trimmed)).map_or(Lookup::Unknown, Lookup::from_candidates);
    }
}

/// Result of an abbreviation lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// More than one document claims the abbreviation.
    Ambiguous(Vec<String>),
    /// Exactly one document claims it.
    Found(String),
    /// No document claims it.
    Unknown,
}

impl Lookup {
    /// Classify a candidate set.
    fn from_candidates(documents: &BTreeSet<String>) -> Self {
        let mut iter = documents.iter();
        return match (iter.next(), iter.next()) {
            (Some(only), None) => Self::Found(only.clone()),
            (Some(_), Some(_)) => Self::Ambiguous(documents.iter().cloned().collect()),
            (None, _) => Self::Unknown,
        };
    }
}

/// Lowercased abbreviation without whitespace or punctuation.
fn loose_key(abbreviation: &str) -> String {
    return normalize_text(abbreviation).to_lowercase();
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Map with two Upanishads and one shared abbreviation.
    fn sample() -> AbbreviationMap {
        return AbbreviationMap::from_json(
            r#"{
                "chandogya-upanishad": {"devanagari": ["छां.उ.", "छा.उ."], "roman": ["Chā.U."]},
                "brihadaranyaka-upanishad": {"devanagari": ["बृ.उ."], "roman": ["Bṛ.U.", "U."]},
                "isavasya-upanishad": {"roman": ["U."]}
            }"#,
        )
        .unwrap();
    }

    #[test]
    fn exact_lookup() {
        assert_eq!(sample().index().lookup("छां.उ."), Lookup::Found("chandogya-upanishad".to_string()));
    }

    #[test]
    fn loose_lookup_ignores_spacing_and_dots() {
        assert_eq!(sample().index().lookup("छां उ"), Lookup::Found("chandogya-upanishad".to_string()));
        assert_eq!(sample().index().lookup("bṛ. u."), Lookup::Found("brihadaranyaka-upanishad".to_string()));
    }

    #[test]
    fn shared_abbreviation_is_ambiguous() {
        let Lookup::Ambiguous(candidates) = sample().index().lookup("U.") else { panic!("expected ambiguity") };
        assert_eq!(candidates, vec!["brihadaranyaka-upanishad", "isavasya-upanishad"]);
    }

    #[test]
    fn unknown_abbreviation() {
        assert_eq!(sample().index().lookup("XYZ"), Lookup::Unknown);
    }

    #[test]
    fn overrides_extend_the_map() {
        let mut map = sample();
        let overrides = BTreeMap::from([("katha-upanishad".to_string(), vec!["क.उ.".to_string()])]);
        map.merge_overrides(&overrides);
        assert_eq!(map.index().lookup("क.उ."), Lookup::Found("katha-upanishad".to_string()));
    }
}
