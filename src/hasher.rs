/// Content hashing for round-trip validation.
///
/// Text is normalized before hashing so reformatting (line breaks,
/// indentation, dandas, zero-width joiners, composed or decomposed code
/// points) never changes a digest, while any change to a letter does.
use std::collections::{BTreeMap, BTreeSet};

use sha2::{Digest as _, Sha256};
use unicode_normalization::UnicodeNormalization as _;

use crate::structure::compare_refs;
use crate::types::{Commentary, CommentaryPassage, Content, ContentHash, Document, Passage, Script, ScriptText};

/// Joins normalized pieces so text moved across passage boundaries hashes differently.
const PIECE_SEPARATOR: char = '\u{1f}';

/// Sentence-final marks and ASCII punctuation excluded from hashing.
const PUNCTUATION: &[char] = &[
    '\u{0964}', '\u{0965}', ',', '.', ';', ':', '!', '?', '-', '\u{2014}', '\u{2013}', '(', ')',
    '[', ']', '{', '}', '"', '\'', '`',
];

/// Zero-width marks excluded from hashing.
const ZERO_WIDTH: &[char] = &['\u{200b}', '\u{200c}', '\u{200d}', '\u{2060}', '\u{feff}'];

/// The portion of a document a hash covers: which scripts, which commentaries.
/// Markup only carries the scripts and commentaries selected at export, so
/// both ends of a round trip must hash under the same scope.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HashScope {
    /// Commentary ids included in the hash.
    pub commentaries: BTreeSet<String>,
    /// Scripts included in the hash.
    pub scripts: BTreeSet<Script>,
}

impl HashScope {
    /// Every script and every commentary present in the document.
    pub fn full(document: &Document) -> Self {
        return Self {
            commentaries: document.commentary_ids().into_iter().collect(),
            scripts: Script::ALL.into_iter().collect(),
        };
    }

    /// Scope built from explicit script and commentary lists.
    pub fn new<I, C>(scripts: I, commentaries: C) -> Self
    where
        I: IntoIterator<Item = Script>,
        C: IntoIterator<Item = String>,
    {
        return Self {
            commentaries: commentaries.into_iter().collect(),
            scripts: scripts.into_iter().collect(),
        };
    }
}

/// NFC-compose, then strip whitespace, punctuation, and zero-width marks.
pub fn normalize_text(text: &str) -> String {
    return text
        .nfc()
        .filter(|c| return !c.is_whitespace() && !PUNCTUATION.contains(c) && !ZERO_WIDTH.contains(c))
        .collect();
}

/// SHA-256 of the normalized text.
pub fn hash_text(text: &str) -> ContentHash {
    return digest(&normalize_text(text));
}

/// Hash every piece of text in a document that falls within `scope`.
///
/// Traversal order: prefatory, main passages in numeric ref order,
/// concluding, then selected commentaries in declaration order. Within a
/// passage: scripts in fixed order, English translation, English, labels.
pub fn hash_document(document: &Document, scope: &HashScope) -> ContentHash {
    let mut pieces = Vec::new();

    for passage in &document.prefatory {
        push_passage(&mut pieces, passage, scope);
    }
    for passage in sorted_main(document) {
        push_passage(&mut pieces, passage, scope);
    }
    for passage in &document.concluding {
        push_passage(&mut pieces, passage, scope);
    }
    for commentary in selected_commentaries(document, scope) {
        for passage in sorted_commentary_passages(commentary) {
            push_commentary_passage(&mut pieces, passage, scope);
        }
    }

    let joined: String = pieces.join(&PIECE_SEPARATOR.to_string());
    return digest(&joined);
}

/// Per-ref fingerprints, keyed `main:3.1.1` or `commentary/<id>:3.1.1`.
/// Used to localize a round-trip mismatch once the whole-document hash differs.
pub fn passage_fingerprints(document: &Document, scope: &HashScope) -> BTreeMap<String, ContentHash> {
    let mut prints = BTreeMap::new();
    let lists = [("prefatory", &document.prefatory), ("main", &document.main), ("concluding", &document.concluding)];
    for (list, passages) in lists {
        for passage in passages {
            let mut pieces = Vec::new();
            push_passage(&mut pieces, passage, scope);
            prints.insert(format!("{list}:{}", passage.reference), digest(&pieces.join(&PIECE_SEPARATOR.to_string())));
        }
    }
    for commentary in selected_commentaries(document, scope) {
        for passage in &commentary.passages {
            let mut pieces = Vec::new();
            push_commentary_passage(&mut pieces, passage, scope);
            let key = format!("commentary/{}:{}", commentary.id, passage.reference);
            prints.insert(key, digest(&pieces.join(&PIECE_SEPARATOR.to_string())));
        }
    }
    return prints;
}

/// SHA-256 hex digest of already-normalized text.
fn digest(normalized: &str) -> ContentHash {
    let hash = Sha256::digest(normalized.as_bytes());
    return ContentHash(format!("{hash:x}"));
}

/// Push a normalized piece, skipping pieces that normalize to nothing.
fn push_piece(pieces: &mut Vec<String>, text: &str) {
    let normalized = normalize_text(text);
    if !normalized.is_empty() {
        pieces.push(normalized);
    }
}

/// Push scripts in fixed order, then the English fields.
fn push_content(pieces: &mut Vec<String>, content: &Content, scope: &HashScope) {
    push_script_text(pieces, &content.sanskrit, scope);
    if let Some(translation) = &content.english_translation {
        push_piece(pieces, translation);
    }
    if let Some(english) = &content.english {
        push_piece(pieces, english);
    }
}

/// Push per-script text for the scripts in scope, in fixed script order.
fn push_script_text(pieces: &mut Vec<String>, text: &ScriptText, scope: &HashScope) {
    for (script, value) in text {
        if scope.scripts.contains(script) {
            push_piece(pieces, value);
        }
    }
}

/// Content first, then the label.
fn push_passage(pieces: &mut Vec<String>, passage: &Passage, scope: &HashScope) {
    push_content(pieces, &passage.content, scope);
    if let Some(label) = &passage.label {
        push_script_text(pieces, label, scope);
    }
}

/// Notes (label, then content) before the main commentary text.
fn push_commentary_passage(pieces: &mut Vec<String>, passage: &CommentaryPassage, scope: &HashScope) {
    for note in &passage.prefatory_notes {
        push_piece(pieces, &note.label);
        push_content(pieces, &note.content, scope);
    }
    push_content(pieces, &passage.content, scope);
}

/// Commentaries in declaration order, restricted to the scope.
fn selected_commentaries<'a>(document: &'a Document, scope: &'a HashScope) -> impl Iterator<Item = &'a Commentary> {
    return document.commentaries.iter().filter(|c| return scope.commentaries.contains(&c.id));
}

/// Commentary passages in numeric ref order. Stable, so equal refs keep
/// declaration order.
fn sorted_commentary_passages(commentary: &Commentary) -> Vec<&CommentaryPassage> {
    let mut passages: Vec<&CommentaryPassage> = commentary.passages.iter().collect();
    passages.sort_by(|a, b| return compare_refs(a.reference.as_str(), b.reference.as_str()));
    return passages;
}

/// Main passages in numeric ref order. Stable for duplicate refs.
fn sorted_main(document: &Document) -> Vec<&Passage> {
    let mut passages: Vec<&Passage> = document.main.iter().collect();
    passages.sort_by(|a, b| return compare_refs(a.reference.as_str(), b.reference.as_str()));
    return passages;
}
