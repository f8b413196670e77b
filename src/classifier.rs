//! Best-effort splitting of raw commentary text into prefatory notes and the
//! commentary body.
//!
//! This runs before conversion, on text that has not been split yet. Its
//! output is ordinary document data; round-trip hashing never depends on it.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::{Content, Document, PrefatoryNote, Script};

/// Note type given to notes found by a classifier.
pub const NOTE_TYPE: &str = "commentary_intro";

/// A first line that is bold and nothing else: `**अवतारिका**`.
#[allow(clippy::expect_used, reason = "pattern is a literal, checked by tests")]
static BOLD_LINE: LazyLock<Regex> =
    LazyLock::new(|| return Regex::new(r"^\s*\*\*([^*]+?)\*\*\s*$").expect("valid regex"));

/// `<!-- note: label -->` on a line of its own.
#[allow(clippy::expect_used, reason = "pattern is a literal, checked by tests")]
static NOTE_LINE: LazyLock<Regex> =
    LazyLock::new(|| return Regex::new(r"^\s*<!--\s*note:\s*(.*?)\s*-->\s*$").expect("valid regex"));

/// Treats a paragraph whose first line is wholly bold as the start of a note
/// labelled by the bold text. Fragile: bold is also used for emphasis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoldMarkerClassifier;

impl NoteClassifier for BoldMarkerClassifier {
    fn classify(&self, paragraph: &str) -> Segment {
        return classify_first_line(&BOLD_LINE, paragraph);
    }
}

/// Recognizes notes opened by an explicit `<!-- note: label -->` line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExplicitMarkerClassifier;

impl NoteClassifier for ExplicitMarkerClassifier {
    fn classify(&self, paragraph: &str) -> Segment {
        return classify_first_line(&NOTE_LINE, paragraph);
    }
}

/// How a classifier reads one paragraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Commentary body text.
    Body,
    /// Start of a prefatory note.
    Note {
        /// Note label taken from the marker.
        label: String,
        /// Paragraph text with the marker line removed.
        text: String,
    },
}

/// Result of splitting one commentary text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Split {
    /// Commentary body, paragraphs joined by blank lines.
    pub body: String,
    /// Notes in order of appearance, label and text.
    pub notes: Vec<(String, String)>,
}

/// Decides whether a paragraph of raw commentary opens a prefatory note.
pub trait NoteClassifier {
    /// Classify one paragraph (text between blank lines).
    fn classify(&self, paragraph: &str) -> Segment;
}

/// Split raw commentary text into notes and body.
///
/// Notes only occur before the body: the first paragraph classified as body
/// ends the note zone, and every later paragraph is body. The one exception
/// is a note whose marker line had no text after it: the next body paragraph
/// becomes that note's text.
pub fn split_commentary(text: &str, classifier: &dyn NoteClassifier) -> Split {
    let mut split = Split::default();
    let mut body: Vec<&str> = Vec::new();
    let mut in_notes = true;

    for paragraph in paragraphs(text) {
        if !in_notes {
            body.push(paragraph);
            continue;
        }
        match classifier.classify(paragraph) {
            Segment::Note { label, text } => split.notes.push((label, text)),
            Segment::Body => match split.notes.last_mut() {
                Some((_, note)) if note.is_empty() => note.push_str(paragraph),
                _ => {
                    in_notes = false;
                    body.push(paragraph);
                },
            },
        }
    }
    split.body = body.join("\n\n");
    return split;
}

/// Split the Devanagari text of every commentary passage that has no notes
/// yet. Returns how many notes were created.
pub fn split_document(document: &mut Document, classifier: &dyn NoteClassifier) -> usize {
    let mut created: usize = 0;
    for commentary in &mut document.commentaries {
        for passage in &mut commentary.passages {
            if !passage.prefatory_notes.is_empty() {
                continue;
            }
            let Some(raw) = passage.content.sanskrit.get(&Script::Devanagari) else { continue };
            let split = split_commentary(raw, classifier);
            if split.notes.is_empty() {
                continue;
            }
            created = created.saturating_add(split.notes.len());
            passage.prefatory_notes = split
                .notes
                .into_iter()
                .map(|(label, text)| {
                    let mut content = Content::default();
                    content.sanskrit.insert(Script::Devanagari, text);
                    return PrefatoryNote { content, label, note_type: NOTE_TYPE.to_string() };
                })
                .collect();
            passage.content.sanskrit.insert(Script::Devanagari, split.body);
        }
    }
    tracing::debug!(document = %document.id, notes = created, "split commentary notes");
    return created;
}

/// Note if the first line matches `marker`, whose first group is the label.
fn classify_first_line(marker: &Regex, paragraph: &str) -> Segment {
    let (first, rest) = paragraph.split_once('\n').unwrap_or((paragraph, ""));
    let Some(label) = marker.captures(first).and_then(|cap| return cap.get(1)) else {
        return Segment::Body;
    };
    return Segment::Note { label: label.as_str().trim().to_string(), text: rest.trim().to_string() };
}

/// Non-empty paragraphs, trimmed.
fn paragraphs(text: &str) -> impl Iterator<Item = &str> {
    return text.split("\n\n").map(str::trim).filter(|p| return !p.is_empty());
}
