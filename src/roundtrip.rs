//! Round-trip validation: hash equality decides, a structural diff explains.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::error::Error;
use crate::hasher::{self, HashScope};
use crate::import;
use crate::types::{Content, ContentHash, Document};

/// Most refs listed per category in a diff hint.
const HINT_LIMIT: usize = 10;

/// Validation result. Only hash equality decides; the hint is advisory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Hashes differ.
    Failed {
        /// Hash of the document under test.
        actual: ContentHash,
        /// Structural summary locating the difference.
        hint: String,
    },
    /// Hashes match.
    Passed,
}

impl Outcome {
    /// True when validation passed.
    pub const fn is_ok(&self) -> bool {
        return matches!(self, Self::Passed);
    }
}

/// Explain how `reconstructed` differs from `reference`, or summarize its
/// passage counts when no reference is available.
pub fn diff_hint(reconstructed: &Document, reference: Option<&Document>, scope: &HashScope) -> String {
    let Some(reference) = reference else {
        return format!(
            "reconstructed {}; rerun with the source JSON for a per-ref diff",
            count_summary(reconstructed, scope)
        );
    };

    let mut hint = String::new();
    let before = counts(reference, scope);
    let after = counts(reconstructed, scope);
    for (list, expected) in &before {
        let found = after.get(list).copied().unwrap_or(0);
        if found != *expected {
            let _ = write!(hint, "{list}: {expected} -> {found} passages; ");
        }
    }

    let expected_prints = hasher::passage_fingerprints(reference, scope);
    let found_prints = hasher::passage_fingerprints(reconstructed, scope);
    let expected_lengths = lengths(reference, scope);
    let found_lengths = lengths(reconstructed, scope);

    let changed: Vec<String> = expected_prints
        .iter()
        .filter(|(key, print)| return found_prints.get(*key).is_some_and(|found| return found != *print))
        .map(|(key, _)| {
            let was = expected_lengths.get(key).copied().unwrap_or(0);
            let now = found_lengths.get(key).copied().unwrap_or(0);
            return format!("{key} (chars {was} -> {now})");
        })
        .collect();
    let missing: Vec<String> = expected_prints.keys().filter(|k| return !found_prints.contains_key(*k)).cloned().collect();
    let unexpected: Vec<String> = found_prints.keys().filter(|k| return !expected_prints.contains_key(*k)).cloned().collect();

    push_category(&mut hint, "changed", &changed);
    push_category(&mut hint, "missing", &missing);
    push_category(&mut hint, "unexpected", &unexpected);
    if hint.is_empty() {
        return "no per-ref difference found; content may have moved between passages with the same ref".to_string();
    }
    return hint.trim_end_matches([';', ' ']).to_string();
}

/// Recompute the hash of `reconstructed` and compare it with the hash stored
/// at export time.
pub fn validate(
    original_hash: &ContentHash,
    reconstructed: &Document,
    scope: &HashScope,
    reference: Option<&Document>,
) -> Outcome {
    let actual = hasher::hash_document(reconstructed, scope);
    if actual == *original_hash {
        return Outcome::Passed;
    }
    let hint = diff_hint(reconstructed, reference, scope);
    tracing::warn!(document = %reconstructed.id, expected = %original_hash, actual = %actual, "round-trip hash mismatch");
    return Outcome::Failed { actual, hint };
}

/// Check a JSON document against markup exported from it: the document must
/// hash to the stored value under the markup's scope, and the markup must
/// parse back to the same hash.
///
/// # Errors
///
/// Returns any error from parsing the markup.
pub fn verify(document: &Document, markup: &str) -> Result<Outcome, Error> {
    let parsed = import::parse(markup)?;
    let source_hash = hasher::hash_document(document, &parsed.scope);
    if source_hash != parsed.stored_hash {
        let hint = format!(
            "the JSON document no longer matches the hash stored in the markup; {}",
            diff_hint(&parsed.document, Some(document), &parsed.scope)
        );
        return Ok(Outcome::Failed { actual: source_hash, hint });
    }
    return Ok(validate(&parsed.stored_hash, &parsed.document, &parsed.scope, Some(document)));
}

/// Passage count per list and per selected commentary.
fn counts(document: &Document, scope: &HashScope) -> BTreeMap<String, usize> {
    let mut out = BTreeMap::new();
    out.insert("prefatory".to_string(), document.prefatory.len());
    out.insert("main".to_string(), document.main.len());
    out.insert("concluding".to_string(), document.concluding.len());
    for commentary in document.commentaries.iter().filter(|c| return scope.commentaries.contains(&c.id)) {
        out.insert(format!("commentary/{}", commentary.id), commentary.passages.len());
    }
    return out;
}

/// One-line passage count summary.
fn count_summary(document: &Document, scope: &HashScope) -> String {
    let parts: Vec<String> = counts(document, scope).iter().map(|(list, n)| return format!("{list}: {n}")).collect();
    return parts.join(", ");
}

/// Character count per fingerprint key, counting only scripts in scope.
fn lengths(document: &Document, scope: &HashScope) -> BTreeMap<String, usize> {
    let mut out = BTreeMap::new();
    let lists = [("prefatory", &document.prefatory), ("main", &document.main), ("concluding", &document.concluding)];
    for (list, passages) in lists {
        for passage in passages {
            out.insert(format!("{list}:{}", passage.reference), scoped_len(&passage.content, scope));
        }
    }
    for commentary in document.commentaries.iter().filter(|c| return scope.commentaries.contains(&c.id)) {
        for passage in &commentary.passages {
            let notes: usize = passage.prefatory_notes.iter().map(|n| return scoped_len(&n.content, scope)).sum();
            let total = notes.saturating_add(scoped_len(&passage.content, scope));
            out.insert(format!("commentary/{}:{}", commentary.id, passage.reference), total);
        }
    }
    return out;
}

/// Append `name: a, b, c (and N more); ` when `keys` is non-empty.
fn push_category(hint: &mut String, name: &str, keys: &[String]) {
    if keys.is_empty() {
        return;
    }
    let shown: Vec<&str> = keys.iter().take(HINT_LIMIT).map(String::as_str).collect();
    let _ = write!(hint, "{name}: {}", shown.join(", "));
    if keys.len() > HINT_LIMIT {
        let _ = write!(hint, " (and {} more)", keys.len().saturating_sub(HINT_LIMIT));
    }
    hint.push_str("; ");
}

/// Character count of the content fields a hash under `scope` covers.
fn scoped_len(content: &Content, scope: &HashScope) -> usize {
    let sanskrit: usize = content
        .sanskrit
        .iter()
        .filter(|(script, _)| return scope.scripts.contains(script))
        .map(|(_, text)| return text.chars().count())
        .sum();
    let english = content.english.as_deref().map_or(0, |s| return s.chars().count());
    let translation = content.english_translation.as_deref().map_or(0, |s| return s.chars().count());
    return sanskrit.saturating_add(english).saturating_add(translation);
}

#[cfg(test)]
#[allow(clippy::indexing_slicing, reason = "tests")]
mod tests {
    use super::*;
    use crate::export::{self, ExportOptions};
    use crate::types::{Passage, PassageRef, Script, StructureLevel};

    /// Flat document with two verses.
    fn isavasya() -> Document {
        let mut document = Document {
            id: "isavasya".to_string(),
            structure_levels: StructureLevel::chain(&["Mantra"]),
            ..Document::default()
        };
        for (reference, text) in [("1", "ईशा वास्यमिदं सर्वम्"), ("2", "कुर्वन्नेवेह कर्माणि")] {
            let mut passage = Passage { reference: PassageRef::new(reference), ..Passage::default() };
            passage.content.sanskrit.insert(Script::Devanagari, text.to_string());
            document.main.push(passage);
        }
        return document;
    }

    #[test]
    fn identical_document_passes() {
        let document = isavasya();
        let scope = HashScope::full(&document);
        let hash = hasher::hash_document(&document, &scope);
        assert!(validate(&hash, &document, &scope, None).is_ok());
    }

    #[test]
    fn hint_names_changed_and_missing_refs() {
        let original = isavasya();
        let scope = HashScope::full(&original);
        let hash = hasher::hash_document(&original, &scope);

        let mut damaged = original.clone();
        damaged.main[0].content.sanskrit.insert(Script::Devanagari, "ईशो वास्यमिदं सर्वम्".to_string());
        damaged.main.pop();

        let Outcome::Failed { hint, .. } = validate(&hash, &damaged, &scope, Some(&original)) else {
            panic!("damaged document must fail");
        };
        assert!(hint.contains("main: 2 -> 1 passages"), "{hint}");
        assert!(hint.contains("changed: main:1"), "{hint}");
        assert!(hint.contains("missing: main:2"), "{hint}");
    }

    #[test]
    fn hint_without_reference_summarizes_counts() {
        let document = isavasya();
        let hint = diff_hint(&document, None, &HashScope::full(&document));
        assert!(hint.contains("main: 2"), "{hint}");
    }

    #[test]
    fn verify_detects_edited_json() {
        let original = isavasya();
        let markup = export::serialize(&original, &ExportOptions::default()).unwrap();
        assert!(verify(&original, &markup).unwrap().is_ok());

        let mut edited = original;
        edited.main[1].content.sanskrit.insert(Script::Devanagari, "कुर्वन्".to_string());
        assert!(!verify(&edited, &markup).unwrap().is_ok());
    }
}
