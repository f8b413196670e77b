//! Citation resolution: abbreviation expansion, path normalization, and
//! structural alias lookup against the target document's outline.
//!
//! Resolution never fails. Anything that cannot be mapped to a library
//! passage comes back as `Resolution::Unresolved` with the reason.

use std::collections::{BTreeMap, BTreeSet};

use crate::abbreviations::{AbbreviationIndex, AbbreviationMap, Lookup};
use crate::scanner::{self, Citation};
use crate::structure;
use crate::types::{Document, PassageRef, Reference, Resolution, StructuralAlias, UnresolvedReason};

/// What the resolver needs to know about a target document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outline {
    /// Structural aliases declared by the document.
    pub aliases: Vec<StructuralAlias>,
    /// Level keys from outermost to leaf.
    pub level_keys: Vec<String>,
}

impl Outline {
    /// Extract the outline of a loaded document.
    pub fn of(document: &Document) -> Self {
        return Self {
            aliases: document.structural_aliases.clone(),
            level_keys: structure::level_keys(&document.structure_levels).into_iter().map(str::to_string).collect(),
        };
    }
}

/// Resolves citations against an abbreviation index and a set of known
/// document outlines.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    /// Document ids available in the library.
    available: BTreeSet<String>,
    /// Abbreviation lookup.
    index: AbbreviationIndex,
    /// Outlines of documents whose structure is known.
    outlines: BTreeMap<String, Outline>,
}

impl Resolver {
    /// Mark a document id as part of the library without loading it.
    pub fn add_available(&mut self, id: impl Into<String>) {
        self.available.insert(id.into());
    }

    /// Register a loaded document: its outline and its library membership.
    pub fn add_document(&mut self, document: &Document) {
        self.available.insert(document.id.clone());
        self.outlines.insert(document.id.clone(), Outline::of(document));
    }

    /// Resolver over an abbreviation index with an empty library.
    pub fn new(index: AbbreviationIndex) -> Self {
        return Self { available: BTreeSet::new(), index, outlines: BTreeMap::new() };
    }

    /// Extract and resolve every citation in `text`, in order of appearance.
    pub fn parse_references(&self, text: &str) -> Vec<Reference> {
        return scanner::extract(text).iter().map(|citation| return self.resolve(citation)).collect();
    }

    /// Resolve one extracted citation.
    pub fn resolve(&self, citation: &Citation) -> Reference {
        let path = normalize_path(&citation.path);
        let (document_id, resolution) = match self.lookup_document(&citation.abbreviation) {
            Ok(id) => {
                let resolution = self.resolve_path(&id, &path);
                (id, resolution)
            },
            Err(reason) => (citation.abbreviation.clone(), Resolution::Unresolved(reason)),
        };
        let resolved_path = match &resolution {
            Resolution::Resolved => self.canonical_path(&document_id, &path),
            Resolution::Unresolved(_) => path,
        };
        tracing::debug!(raw = %citation.raw_text, document = %document_id, path = %resolved_path, "resolved citation");
        let in_library = is_in_library(&document_id, &self.available);
        return Reference {
            display_text: citation.display_text.clone(),
            document_id,
            in_library,
            path: PassageRef::new(resolved_path),
            raw_text: citation.raw_text.clone(),
            resolution,
        };
    }

    /// Replace alias segments with their numeric values. Only called on a
    /// path that resolved.
    fn canonical_path(&self, document_id: &str, path: &str) -> String {
        let outline = self.outlines.get(document_id);
        let segments: Vec<String> = path
            .split('.')
            .enumerate()
            .map(|(position, segment)| {
                if segment.parse::<u32>().is_ok() {
                    return segment.to_string();
                }
                return outline
                    .and_then(|o| return alias_value(o, segment, position).ok())
                    .map_or_else(|| return segment.to_string(), |value| return value.to_string());
            })
            .collect();
        return segments.join(".");
    }

    /// Map an abbreviation (or a literal document id) to a document id.
    fn lookup_document(&self, abbreviation: &str) -> Result<String, UnresolvedReason> {
        return match self.index.lookup(abbreviation) {
            Lookup::Found(id) => Ok(id),
            Lookup::Ambiguous(candidates) => Err(UnresolvedReason::AmbiguousAbbreviation { candidates }),
            Lookup::Unknown if self.available.contains(abbreviation) || self.outlines.contains_key(abbreviation) => {
                Ok(abbreviation.to_string())
            },
            Lookup::Unknown => Err(UnresolvedReason::UnknownAbbreviation),
        };
    }

    /// Check every segment of a normalized path against the target outline.
    fn resolve_path(&self, document_id: &str, path: &str) -> Resolution {
        if path.is_empty() {
            return Resolution::Unresolved(UnresolvedReason::EmptyPath);
        }
        let segments: Vec<&str> = path.split('.').collect();
        let Some(outline) = self.outlines.get(document_id) else {
            // Structure unknown: only numeric paths can be trusted.
            return match segments.iter().find(|s| return s.parse::<u32>().is_err()) {
                Some(alias) => Resolution::Unresolved(UnresolvedReason::UnknownAlias { alias: (*alias).to_string() }),
                None => Resolution::Resolved,
            };
        };

        let depth = outline.level_keys.len();
        if depth > 0 && segments.len() > depth {
            return Resolution::Unresolved(UnresolvedReason::OutOfRange { depth, segments: segments.len() });
        }
        for (position, segment) in segments.iter().enumerate() {
            if segment.parse::<u32>().is_ok() {
                continue;
            }
            if let Err(reason) = alias_value(outline, segment, position) {
                return Resolution::Unresolved(reason);
            }
        }
        return Resolution::Resolved;
    }
}

/// Resolve citations in `text` using only the global abbreviation map. The
/// map's document ids make up the library; no structural aliases are known.
pub fn parse_references(text: &str, map: &AbbreviationMap) -> Vec<Reference> {
    let mut resolver = Resolver::new(map.index());
    for id in map.0.keys() {
        resolver.add_available(id.clone());
    }
    return resolver.parse_references(text);
}

/// Whether a document id is part of the library.
pub fn is_in_library(document_id: &str, available: &BTreeSet<String>) -> bool {
    return available.contains(document_id);
}

/// Normalize a raw citation path: Devanagari digits become ASCII, `-`, `/`
/// and `:` become `.`, and empty segments are dropped.
pub fn normalize_path(raw: &str) -> String {
    let mapped: String = raw
        .trim()
        .chars()
        .map(|c| {
            return match c {
                '-' | '/' | ':' => '.',
                _ => devanagari_digit(c).unwrap_or(c),
            };
        })
        .collect();
    let segments: Vec<&str> = mapped.split('.').filter(|s| return !s.is_empty()).collect();
    return segments.join(".");
}

/// Numeric value of an alias segment at a zero-based path position.
fn alias_value(outline: &Outline, segment: &str, position: usize) -> Result<u32, UnresolvedReason> {
    let matches: Vec<&StructuralAlias> =
        outline.aliases.iter().filter(|a| return a.alias.trim().eq_ignore_ascii_case(segment)).collect();
    let levels: BTreeSet<&str> = matches.iter().map(|a| return a.level.as_str()).collect();
    let expected = outline.level_keys.get(position).map_or("", String::as_str);

    let mut iter = levels.iter();
    return match (iter.next(), iter.next()) {
        (None, _) => Err(UnresolvedReason::UnknownAlias { alias: segment.to_string() }),
        (Some(_), Some(_)) => Err(UnresolvedReason::AmbiguousAlias {
            alias: segment.to_string(),
            levels: levels.iter().map(|l| return (*l).to_string()).collect(),
        }),
        (Some(level), None) if *level != expected => Err(UnresolvedReason::AliasAtWrongLevel {
            alias: segment.to_string(),
            expected: expected.to_string(),
            found: (*level).to_string(),
        }),
        (Some(_), None) => {
            let Some(alias) = matches.first() else {
                return Err(UnresolvedReason::UnknownAlias { alias: segment.to_string() });
            };
            Ok(alias.canonical_value)
        },
    };
}

/// ASCII counterpart of a Devanagari digit.
fn devanagari_digit(c: char) -> Option<char> {
    let offset = u32::from(c).checked_sub(u32::from('०'))?;
    if offset > 9 {
        return None;
    }
    return char::from_digit(offset, 10);
}
