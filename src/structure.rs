//! Structure tree queries and hierarchical grouping of passages.
//!
//! Nothing here assumes a fixed number of levels: every walk follows the
//! tree (or the ref segments) to whatever depth it has, iteratively.

use std::cmp::Ordering;

use crate::error::Error;
use crate::types::{Passage, PassageKind, PassageRef, StructureLevel};

/// A node of the grouped passage tree. Leaf groups hold passages; inner
/// groups hold child groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group<'a> {
    /// Child groups in numeric segment order.
    pub children: Vec<Group<'a>>,
    /// One-based depth, equal to the heading depth in markup.
    pub depth: usize,
    /// Key of the structure level this group belongs to.
    pub level: String,
    /// Passages whose ref equals `path`.
    pub passages: Vec<&'a Passage>,
    /// Ref prefix this group covers, e.g. `3.1`.
    pub path: String,
    /// Last segment of `path`.
    pub segment: String,
}

impl Group<'_> {
    /// Display key: level key plus segment, e.g. `Brahmana 1`.
    pub fn label(&self) -> String {
        return format!("{} {}", self.level, self.segment);
    }
}

/// Order refs segment-wise by number (`10` after `9`), breaking ties on the
/// raw text so ordering is total.
pub fn compare_refs(a: &str, b: &str) -> Ordering {
    let key_a = PassageRef::new(a).sort_key();
    let key_b = PassageRef::new(b).sort_key();
    return key_a.cmp(&key_b).then_with(|| return a.cmp(b));
}

/// Number of levels, following the first child until none remain. A flat
/// document has depth 1; a document with no structure has depth 0.
pub fn depth(levels: &[StructureLevel]) -> usize {
    return level_keys(levels).len();
}

/// Partition passages into nested groups keyed by successive ref segments.
///
/// Passages are grouped in numeric ref order regardless of input order.
/// A passage with more segments than the structure is deep lands in the
/// deepest group its first segments select.
pub fn group_by_hierarchy<'a>(passages: &'a [Passage], levels: &[StructureLevel]) -> Vec<Group<'a>> {
    let keys = level_keys(levels);
    let max_depth = keys.len().max(1);

    let mut sorted: Vec<&Passage> = passages.iter().collect();
    sorted.sort_by(|a, b| return compare_refs(a.reference.as_str(), b.reference.as_str()));

    let mut roots: Vec<Group<'a>> = Vec::new();
    let mut open: Vec<Group<'a>> = Vec::new();

    for passage in sorted {
        let segments: Vec<&str> = passage.reference.as_str().split('.').take(max_depth).collect();
        let shared = open
            .iter()
            .zip(&segments)
            .take_while(|(group, segment)| return group.segment == **segment)
            .count();
        close_groups(&mut open, &mut roots, shared);

        for (index, segment) in segments.iter().enumerate().skip(shared) {
            let level = keys
                .get(index)
                .map_or_else(|| return format!("Level{}", index.saturating_add(1)), |k| return (*k).to_string());
            let path = segments.get(..=index).map_or_else(String::new, |s| return s.join("."));
            open.push(Group {
                children: Vec::new(),
                depth: index.saturating_add(1),
                level,
                passages: Vec::new(),
                path,
                segment: (*segment).to_string(),
            });
        }
        if let Some(leaf) = open.last_mut() {
            leaf.passages.push(passage);
        }
    }
    close_groups(&mut open, &mut roots, 0);
    return roots;
}

/// Structure level at a zero-based depth along the first-child chain.
pub fn level_at(levels: &[StructureLevel], index: usize) -> Option<&StructureLevel> {
    let mut current = levels.first();
    for _ in 0..index {
        current = current?.children.first();
    }
    return current;
}

/// Level keys from outermost to leaf, following the first child.
pub fn level_keys(levels: &[StructureLevel]) -> Vec<&str> {
    let mut keys = Vec::new();
    let mut current = levels.first();
    while let Some(level) = current {
        keys.push(level.key.as_str());
        current = level.children.first();
    }
    return keys;
}

/// Whether ranged ref `range` covers `reference`: `6.3.24-26` covers
/// `6.3.25` but neither `6.3.27` nor `6.4.25`. Plain refs, reversed ranges
/// and non-numeric bounds cover nothing.
pub fn range_contains(range: &str, reference: &str) -> bool {
    let Some((prefix, start, end)) = range_bounds(range) else { return false };
    let (candidate_prefix, last) = reference.rsplit_once('.').unwrap_or(("", reference));
    if candidate_prefix != prefix {
        return false;
    }
    return last.parse::<u64>().is_ok_and(|n| return start <= n && n <= end);
}

/// Prefix and inclusive numeric bounds of a ranged ref's last segment.
fn range_bounds(range: &str) -> Option<(&str, u64, u64)> {
    let (prefix, last) = range.rsplit_once('.').unwrap_or(("", range));
    let (start, end) = last.split_once('-')?;
    let start: u64 = start.parse().ok()?;
    let end: u64 = end.parse().ok()?;
    if end < start {
        return None;
    }
    return Some((prefix, start, end));
}

/// `6.3.24-30` becomes `6.3.24`; refs without a range yield `None`.
pub fn range_start(reference: &str) -> Option<String> {
    let (prefix, last) = reference.rsplit_once('.').unwrap_or(("", reference));
    let (start, _) = last.split_once('-')?;
    if prefix.is_empty() {
        return Some(start.to_string());
    }
    return Some(format!("{prefix}.{start}"));
}

/// Check that a main passage's ref has exactly `expected` numeric segments.
/// Prefatory and concluding passages are not checked.
///
/// # Errors
///
/// Returns `Error::StructureInconsistency` naming the document and ref when
/// the segment count is wrong or a segment is not a non-negative integer.
pub fn validate_ref_depth(document: &str, passage: &Passage, expected: usize) -> Result<(), Error> {
    if passage.kind != PassageKind::Main {
        return Ok(());
    }
    let inconsistency = |reason: String| {
        return Error::StructureInconsistency {
            document: document.to_string(),
            reason,
            reference: passage.reference.to_string(),
        };
    };
    let found = passage.reference.segment_count();
    if found != expected {
        return Err(inconsistency(format!("main passage ref has {found} segments, structure is {expected} deep")));
    }
    if passage.reference.segments().is_none() {
        return Err(inconsistency("ref segments must be non-negative integers".to_string()));
    }
    return Ok(());
}

/// Pop open groups down to `keep`, attaching each to its parent or the roots.
fn close_groups<'a>(open: &mut Vec<Group<'a>>, roots: &mut Vec<Group<'a>>, keep: usize) {
    while open.len() > keep {
        let Some(group) = open.pop() else { break };
        match open.last_mut() {
            Some(parent) => parent.children.push(group),
            None => roots.push(group),
        }
    }
}
