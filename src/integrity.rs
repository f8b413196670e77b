//! Document-level lint. Issues are reported, never fatal: a document with
//! issues can still be converted.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use crate::assembler::Manifest;
use crate::structure;
use crate::types::{Document, Passage, PassageRef};

/// One integrity problem in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// What kind of problem this is.
    pub kind: IssueKind,
    /// Where: `main:3.1.1`, `commentary/<id>:3.1.1`, or a part file name.
    pub location: String,
    /// Human-readable description.
    pub message: String,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "[{}] {}: {}", self.kind, self.location, self.message);
    }
}

/// Category of an integrity issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IssueKind {
    /// Two passages in the same list share a ref.
    DuplicateRef,
    /// Manifest and part files on disk disagree.
    ManifestMismatch,
    /// Commentary has no Devanagari commentator name.
    MissingCommentator,
    /// Commentary has no title.
    MissingTitle,
    /// A ref sorts before the ref preceding it.
    NonMonotonic,
    /// Commentary passage addresses no passage of the document.
    OrphanCommentary,
    /// A part starts before the previous part ends.
    PartOrder,
    /// Main passage ref has the wrong number of segments.
    RefDepth,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DuplicateRef => "duplicate-ref",
            Self::ManifestMismatch => "manifest",
            Self::MissingCommentator => "missing-commentator",
            Self::MissingTitle => "missing-title",
            Self::NonMonotonic => "order",
            Self::OrphanCommentary => "orphan-commentary",
            Self::PartOrder => "part-order",
            Self::RefDepth => "ref-depth",
        };
        return f.write_str(name);
    }
}

/// Run every single-document check.
pub fn check(document: &Document) -> Vec<Issue> {
    let mut issues = Vec::new();
    check_depth(document, &mut issues);

    check_order("main", document.main.iter().map(|p| return &p.reference), &mut issues);
    for commentary in &document.commentaries {
        let list = format!("commentary/{}", commentary.id);
        check_order(&list, commentary.passages.iter().map(|p| return &p.reference), &mut issues);
    }
    check_commentaries(document, &mut issues);

    for issue in &issues {
        tracing::warn!(document = %document.id, "{issue}");
    }
    return issues;
}

/// Check an assembled multi-part document: each part's first main ref must
/// not sort before the previous part's last main ref.
pub fn check_parts(document: &Document) -> Vec<Issue> {
    let mut issues = Vec::new();
    let mut previous: Option<(&str, &str)> = None;
    let mut current: Option<(&str, &str)> = None;

    for passage in &document.main {
        let part = passage.source_part.as_deref().unwrap_or("");
        let reference = passage.reference.as_str();
        if let Some((open, _)) = current.filter(|(open, _)| return *open == part) {
            current = Some((open, reference));
            continue;
        }
        if current.is_some() {
            previous = current;
        }
        let regressed = previous.filter(|(_, last)| return structure::compare_refs(reference, last).is_lt());
        if let Some((previous_part, last)) = regressed {
            issues.push(Issue {
                kind: IssueKind::PartOrder,
                location: part.to_string(),
                message: format!("first ref `{reference}` sorts before last ref `{last}` of `{previous_part}`"),
            });
        }
        current = Some((part, reference));
    }
    for issue in &issues {
        tracing::warn!(document = %document.id, "{issue}");
    }
    return issues;
}

/// Compare the manifest's part list with the `part*.json` files in `dir`.
pub fn check_manifest(dir: &Path, manifest: &Manifest) -> Vec<Issue> {
    let on_disk: BTreeSet<String> = walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| return entry.file_type().is_file())
        .filter_map(|entry| return entry.file_name().to_str().map(str::to_string))
        .filter(|name| {
            return name.starts_with("part")
                && Path::new(name).extension().is_some_and(|ext| return ext.eq_ignore_ascii_case("json"));
        })
        .collect();
    let listed: BTreeSet<String> = manifest.parts.iter().map(|p| return p.file.clone()).collect();

    let mut issues = Vec::new();
    for unlisted in on_disk.difference(&listed) {
        issues.push(Issue {
            kind: IssueKind::ManifestMismatch,
            location: unlisted.clone(),
            message: "part file on disk is not listed in the manifest".to_string(),
        });
    }
    for missing in listed.difference(&on_disk) {
        issues.push(Issue {
            kind: IssueKind::ManifestMismatch,
            location: missing.clone(),
            message: "manifest lists a part file that does not exist".to_string(),
        });
    }
    return issues;
}

/// Commentary metadata and soft links to passages.
fn check_commentaries(document: &Document, issues: &mut Vec<Issue>) {
    let known: BTreeSet<&str> = all_passages(document).map(|p| return p.reference.as_str()).collect();

    for commentary in &document.commentaries {
        let list = format!("commentary/{}", commentary.id);
        if commentary.title.trim().is_empty() {
            issues.push(Issue {
                kind: IssueKind::MissingTitle,
                location: list.clone(),
                message: "commentary has no title".to_string(),
            });
        }
        if commentary.commentator.get("devanagari").is_none_or(|name| return name.trim().is_empty()) {
            issues.push(Issue {
                kind: IssueKind::MissingCommentator,
                location: list.clone(),
                message: "commentary has no devanagari commentator name".to_string(),
            });
        }
        for passage in &commentary.passages {
            let reference = passage.reference.as_str();
            let linked = known.contains(reference) || known.iter().any(|r| return structure::range_contains(reference, r));
            if !linked {
                issues.push(Issue {
                    kind: IssueKind::OrphanCommentary,
                    location: format!("{list}:{reference}"),
                    message: "no passage with this ref".to_string(),
                });
            }
        }
    }
}

/// Main passage refs against the structure depth.
fn check_depth(document: &Document, issues: &mut Vec<Issue>) {
    let expected = structure::depth(&document.structure_levels);
    if expected == 0 && !document.main.is_empty() {
        issues.push(Issue {
            kind: IssueKind::RefDepth,
            location: "main".to_string(),
            message: "document has main passages but no structure levels".to_string(),
        });
        return;
    }
    for passage in &document.main {
        if let Err(e) = structure::validate_ref_depth(&document.id, passage, expected) {
            issues.push(Issue {
                kind: IssueKind::RefDepth,
                location: format!("main:{}", passage.reference),
                message: e.to_string(),
            });
        }
    }
}

/// Refs in one list must be non-decreasing and distinct.
fn check_order<'a>(list: &str, refs: impl Iterator<Item = &'a PassageRef>, issues: &mut Vec<Issue>) {
    let mut previous: Option<&PassageRef> = None;
    for reference in refs {
        if let Some(before) = previous {
            let location = format!("{list}:{reference}");
            if before == reference {
                issues.push(Issue {
                    kind: IssueKind::DuplicateRef,
                    location,
                    message: "ref repeats the previous passage".to_string(),
                });
            } else if structure::compare_refs(reference.as_str(), before.as_str()).is_lt() {
                issues.push(Issue {
                    kind: IssueKind::NonMonotonic,
                    location,
                    message: format!("ref follows `{before}` but sorts before it"),
                });
            }
        }
        previous = Some(reference);
    }
}

/// Prefatory, main, and concluding passages.
fn all_passages(document: &Document) -> impl Iterator<Item = &Passage> {
    return document.prefatory.iter().chain(&document.main).chain(&document.concluding);
}

#[cfg(test)]
#[allow(clippy::indexing_slicing, reason = "tests")]
mod tests {
    use super::*;
    use crate::types::{Commentary, CommentaryPassage, StructureLevel};

    /// Two-level document with the given main refs and one commentary.
    fn document(main: &[&str], commentary: &[&str]) -> Document {
        let passages =
            commentary.iter().map(|r| return CommentaryPassage { reference: PassageRef::new(*r), ..CommentaryPassage::default() }).collect();
        return Document {
            commentaries: vec![Commentary {
                commentator: [("devanagari".to_string(), "शङ्कराचार्यः".to_string())].into(),
                id: "shankara".to_string(),
                passages,
                title: "काठकोपनिषद्भाष्यम्".to_string(),
                ..Commentary::default()
            }],
            id: "katha-upanishad".to_string(),
            main: main.iter().map(|r| return Passage { reference: PassageRef::new(*r), ..Passage::default() }).collect(),
            structure_levels: StructureLevel::chain(&["Valli", "Mantra"]),
            ..Document::default()
        };
    }

    /// Kinds of every issue found.
    fn kinds(issues: &[Issue]) -> Vec<IssueKind> {
        return issues.iter().map(|i| return i.kind).collect();
    }

    #[test]
    fn clean_document_has_no_issues() {
        assert!(check(&document(&["1.1", "1.2", "1.10", "2.1"], &["1.1", "1.2-10"])).is_empty());
    }

    #[test]
    fn flags_out_of_order_and_duplicate_refs() {
        let issues = check(&document(&["1.2", "1.1", "1.1"], &[]));
        assert_eq!(kinds(&issues), vec![IssueKind::NonMonotonic, IssueKind::DuplicateRef]);
        assert_eq!(issues[0].location, "main:1.1");
    }

    #[test]
    fn flags_orphan_commentary_including_ranges() {
        let issues = check(&document(&["1.1", "1.2"], &["1.1", "1.5-7", "3.1"]));
        let orphans: Vec<&str> = issues.iter().map(|i| return i.location.as_str()).collect();
        assert_eq!(orphans, vec!["commentary/shankara:1.5-7", "commentary/shankara:3.1"]);
    }

    #[test]
    fn huge_commentary_range_is_linked_without_expanding_it() {
        let issues = check(&document(&["1.1", "1.2"], &["1.1-4000000000", "2.1-4000000000"]));
        let orphans: Vec<&str> = issues.iter().map(|i| return i.location.as_str()).collect();
        assert_eq!(orphans, vec!["commentary/shankara:2.1-4000000000"]);
    }

    #[test]
    fn flags_wrong_depth_and_missing_metadata() {
        let mut doc = document(&["1.1", "2"], &[]);
        doc.commentaries[0].title.clear();
        doc.commentaries[0].commentator.clear();
        let found = kinds(&check(&doc));
        assert!(found.contains(&IssueKind::RefDepth), "{found:?}");
        assert!(found.contains(&IssueKind::MissingTitle), "{found:?}");
        assert!(found.contains(&IssueKind::MissingCommentator), "{found:?}");
    }

    #[test]
    fn flags_part_that_starts_before_previous_ends() {
        let mut doc = document(&["2.1", "2.2", "1.1", "3.1"], &[]);
        for (passage, part) in doc.main.iter_mut().zip(["part2", "part2", "part1", "part3"]) {
            passage.source_part = Some(part.to_string());
        }
        let issues = check_parts(&doc);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].location, "part1");
    }
}
