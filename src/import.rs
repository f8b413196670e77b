//! Markup to document parsing.
//!
//! A single left-to-right pass over the body. Heading depth is the tree
//! depth; a stack of open ancestor headings checks that every structural
//! ref extends its parent's ref. The structure tree is rebuilt from the
//! headings actually observed and reconciled with the declared levels.

use crate::error::Error;
use crate::frontmatter::{self, Frontmatter};
use crate::hasher::HashScope;
use crate::markup::{self, COMMENTARY_HEADING, CONCLUDING_HEADING, CommentaryMarker, FenceKind, Line, NoteMarker, PREFATORY_HEADING};
use crate::roundtrip::{self, Outcome};
use crate::structure;
use crate::types::{
    Commentary, CommentaryPassage, Content, ContentHash, Document, Passage, PassageKind, PassageRef, PrefatoryNote, Script,
    ScriptText, StructureLevel,
};

/// A fenced content block being accumulated.
struct OpenFence {
    /// Field the block fills.
    kind: FenceKind,
    /// Lines collected so far, verbatim.
    lines: Vec<String>,
    /// Line the fence opened on.
    start: usize,
    /// Tag the closing fence must repeat.
    tag: String,
}

/// A structural heading whose subtree is still open.
struct OpenHeading {
    /// Full ref carried by the heading.
    reference: String,
}

/// Result of parsing markup, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    /// The reconstructed document.
    pub document: Document,
    /// Scope the stored hash covers.
    pub scope: HashScope,
    /// Hash stored in the frontmatter at export time.
    pub stored_hash: ContentHash,
}

/// Parser state for one markup body.
struct Parser {
    /// Open structural headings, outermost first. Index `i` holds depth `i + 1`.
    ancestors: Vec<OpenHeading>,
    /// Document under construction.
    document: Document,
    /// Open content fence, if any.
    fence: Option<OpenFence>,
    /// Current one-based line number.
    line: usize,
    /// Open commentary note and the line it opened on.
    note: Option<(PrefatoryNote, usize)>,
    /// Level key observed at each heading depth. Empty when the heading had no key.
    observed: Vec<String>,
    /// Commentary id announced by a marker and the line it appeared on.
    pending_commentary: Option<(String, usize)>,
    /// Where content blocks go.
    target: Target,
}

/// Receiver of content blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    /// A commentary passage, by commentary and passage index.
    Commentary {
        /// Index into `Document::commentaries`.
        commentary: usize,
        /// Index into that commentary's passages.
        passage: usize,
    },
    /// Before the first heading.
    Nothing,
    /// A passage in one of the three passage lists.
    Passage {
        /// Which list.
        kind: PassageKind,
        /// Index into the list.
        index: usize,
    },
}

impl Parser {
    /// Attach `<!-- source_part: x -->` to the current passage.
    fn apply_source_part(&mut self, part: &str) -> Result<(), Error> {
        let slot = match self.target {
            Target::Commentary { commentary, passage } => self
                .document
                .commentaries
                .get_mut(commentary)
                .and_then(|c| return c.passages.get_mut(passage))
                .map(|p| return &mut p.source_part),
            Target::Nothing => None,
            Target::Passage { kind, index } => self.list_mut(kind).get_mut(index).map(|p| return &mut p.source_part),
        };
        let Some(slot) = slot else {
            return Err(self.malformed("source_part marker before any heading"));
        };
        *slot = Some(part.to_string());
        return Ok(());
    }

    /// Close the open fence and store its text in the current target.
    fn close_fence(&mut self, fence: OpenFence) -> Result<(), Error> {
        let text = fence.lines.join("\n");
        let start = fence.start;
        let Some(content) = self.content_mut() else {
            return Err(Error::MalformedMarkup { line: start, reason: "content block before any heading".to_string() });
        };
        let slot = match fence.kind {
            FenceKind::English => content.english.get_or_insert_with(String::new),
            FenceKind::EnglishTranslation => content.english_translation.get_or_insert_with(String::new),
            FenceKind::Sanskrit(script) => content.sanskrit.entry(script).or_default(),
        };
        if !slot.is_empty() {
            slot.push('\n');
        }
        slot.push_str(&text);
        return Ok(());
    }

    /// Content receiving the next fenced block: the open note, or the target.
    fn content_mut(&mut self) -> Option<&mut Content> {
        return match (&mut self.note, self.target) {
            (Some((note, _)), _) => Some(&mut note.content),
            (None, Target::Commentary { commentary, passage }) => self
                .document
                .commentaries
                .get_mut(commentary)
                .and_then(|c| return c.passages.get_mut(passage))
                .map(|p| return &mut p.content),
            (None, Target::Nothing) => None,
            (None, Target::Passage { kind, index }) => match kind {
                PassageKind::Concluding => self.document.concluding.get_mut(index),
                PassageKind::Main => self.document.main.get_mut(index),
                PassageKind::Prefatory => self.document.prefatory.get_mut(index),
            }
            .map(|p| return &mut p.content),
        };
    }

    /// Reject leftovers at end of input, then reconcile structure.
    fn finish(mut self) -> Result<Document, Error> {
        if let Some(fence) = &self.fence {
            return Err(Error::MalformedMarkup { line: fence.start, reason: format!("content block `{}` never closed", fence.tag) });
        }
        if let Some((_, line)) = &self.note {
            return Err(Error::MalformedMarkup { line: *line, reason: "note never closed with `<!-- /note -->`".to_string() });
        }
        if let Some((_, line)) = &self.pending_commentary {
            return Err(Error::MalformedMarkup { line: *line, reason: "commentary marker not followed by a commentary heading".to_string() });
        }
        self.reconcile_levels()?;

        let leaf = structure::depth(&self.document.structure_levels);
        self.document.main.retain(|p| {
            return p.reference.segment_count() >= leaf || !p.content.is_empty() || p.source_part.is_some();
        });
        for passage in &self.document.main {
            structure::validate_ref_depth(&self.document.id, passage, leaf)?;
        }
        return Ok(self.document);
    }

    /// Dispatch one line outside a content fence.
    fn handle(&mut self, raw: &str) -> Result<(), Error> {
        match markup::classify(raw) {
            Line::Blank | Line::Comment => {},
            Line::CommentaryMarker(payload) => {
                let marker: CommentaryMarker = serde_json::from_str(payload)
                    .map_err(|e| return self.malformed(&format!("commentary marker: {e}")))?;
                self.pending_commentary = Some((marker.commentary_id, self.line));
            },
            Line::FenceClose(tag) => return Err(self.malformed(&format!("`<!-- /{tag} -->` without an open block"))),
            Line::FenceOpen(tag) => {
                let kind = FenceKind::parse(tag).map_err(|e| return self.malformed(&e))?;
                self.fence = Some(OpenFence { kind, lines: Vec::new(), start: self.line, tag: tag.to_string() });
            },
            Line::Heading { depth, text } => self.handle_heading(depth, text)?,
            Line::NoteClose => {
                let Some((note, _)) = self.note.take() else {
                    return Err(self.malformed("`<!-- /note -->` without an open note"));
                };
                self.push_note(note)?;
            },
            Line::NoteOpen(payload) => self.open_note(payload)?,
            Line::SourcePart(part) => self.apply_source_part(part)?,
            Line::Text => {
                tracing::warn!(line = self.line, document = %self.document.id, "text outside a content block is ignored");
            },
        }
        return Ok(());
    }

    /// Start a commentary passage under the pending commentary id.
    fn handle_commentary_heading(&mut self, reference: &str) -> Result<(), Error> {
        let Some((id, _)) = self.pending_commentary.take() else {
            return Err(self.malformed("commentary heading without a preceding `<!-- commentary: ... -->` marker"));
        };
        if reference.is_empty() {
            return Err(self.malformed("commentary heading without a ref"));
        }
        let position = self.document.commentaries.iter().position(|c| return c.id == id);
        let commentary = position.unwrap_or_else(|| {
            self.document.commentaries.push(Commentary { id, ..Commentary::default() });
            return self.document.commentaries.len().saturating_sub(1);
        });
        let Some(owner) = self.document.commentaries.get_mut(commentary) else {
            return Err(self.malformed("commentary index out of bounds"));
        };
        owner.passages.push(CommentaryPassage { reference: PassageRef::new(reference), ..CommentaryPassage::default() });
        let passage = owner.passages.len().saturating_sub(1);
        self.target = Target::Commentary { commentary, passage };
        return Ok(());
    }

    /// Route a heading to its form.
    fn handle_heading(&mut self, depth: usize, text: &str) -> Result<(), Error> {
        if let Some((_, line)) = &self.note {
            return Err(Error::MalformedMarkup { line: *line, reason: "note not closed before the next heading".to_string() });
        }
        if let Some(reference) = text.strip_prefix(COMMENTARY_HEADING) {
            return self.handle_commentary_heading(reference.trim());
        }
        if let Some((_, line)) = &self.pending_commentary {
            return Err(Error::MalformedMarkup { line: *line, reason: "commentary marker not followed by a commentary heading".to_string() });
        }
        if let Some(rest) = text.strip_prefix(PREFATORY_HEADING) {
            return self.handle_material(PassageKind::Prefatory, rest.trim());
        }
        if let Some(rest) = text.strip_prefix(CONCLUDING_HEADING) {
            return self.handle_material(PassageKind::Concluding, rest.trim());
        }
        return self.handle_structural(depth, text);
    }

    /// Start a prefatory or concluding passage: `0.1 (devanagari: "...")`.
    fn handle_material(&mut self, kind: PassageKind, rest: &str) -> Result<(), Error> {
        let (reference, label_text) = markup::split_label(rest);
        if reference.is_empty() {
            return Err(self.malformed("prefatory or concluding heading without a ref"));
        }
        if reference.contains(' ') {
            return Err(self.malformed("label must be wrapped in parentheses"));
        }
        let label = self.label(label_text)?;
        self.ancestors.clear();
        let list = self.list_mut(kind);
        list.push(Passage { kind, label, reference: PassageRef::new(reference), ..Passage::default() });
        let index = list.len().saturating_sub(1);
        self.target = Target::Passage { kind, index };
        return Ok(());
    }

    /// Open a structural heading such as `## Brahmana 3.1`, optionally
    /// followed by the passage label.
    fn handle_structural(&mut self, depth: usize, text: &str) -> Result<(), Error> {
        let (head, label_text) = markup::split_label(text);
        let (key, reference) = head.rsplit_once(' ').map_or(("", head), |(k, r)| return (k.trim(), r));
        if reference.is_empty() {
            return Err(self.malformed("structural heading without a ref"));
        }
        if depth > self.ancestors.len().saturating_add(1) {
            return Err(self.inconsistency(
                reference,
                format!("level-{depth} heading with no enclosing level-{} heading", depth.saturating_sub(1)),
            ));
        }
        self.ancestors.truncate(depth.saturating_sub(1));
        let segments = PassageRef::new(reference).segment_count();
        if segments != depth {
            return Err(self.inconsistency(reference, format!("heading at depth {depth} carries a {segments}-segment ref")));
        }
        if let Some(parent) = self.ancestors.last() {
            let extends = reference.strip_prefix(parent.reference.as_str()).is_some_and(|rest| return rest.starts_with('.'));
            if !extends {
                let reason = format!("ref does not extend enclosing heading `{}`", parent.reference);
                return Err(self.inconsistency(reference, reason));
            }
        }
        self.observe_level(depth, key, reference)?;

        self.ancestors.push(OpenHeading { reference: reference.to_string() });
        let label = self.label(label_text)?;
        self.document.main.push(Passage { kind: PassageKind::Main, label, reference: PassageRef::new(reference), ..Passage::default() });
        self.target = Target::Passage { kind: PassageKind::Main, index: self.document.main.len().saturating_sub(1) };
        return Ok(());
    }

    /// Structure inconsistency at the current line.
    fn inconsistency(&self, reference: &str, reason: String) -> Error {
        return Error::StructureInconsistency {
            document: self.document.id.clone(),
            reason: format!("line {}: {reason}", self.line),
            reference: reference.to_string(),
        };
    }

    /// Parse the inside of a heading label. Empty text or an empty label is `None`.
    fn label(&self, inner: &str) -> Result<Option<ScriptText>, Error> {
        if inner.trim().is_empty() {
            return Ok(None);
        }
        let label = markup::parse_label(inner).map_err(|e| return self.malformed(&e))?;
        return Ok(Some(label).filter(|l| return !l.is_empty()));
    }

    /// The passage list for a kind.
    fn list_mut(&mut self, kind: PassageKind) -> &mut Vec<Passage> {
        return match kind {
            PassageKind::Concluding => &mut self.document.concluding,
            PassageKind::Main => &mut self.document.main,
            PassageKind::Prefatory => &mut self.document.prefatory,
        };
    }

    /// Malformed markup at the current line.
    fn malformed(&self, reason: &str) -> Error {
        return Error::MalformedMarkup { line: self.line, reason: reason.to_string() };
    }

    /// Record the level key seen at a depth; a different key at the same depth
    /// means the headings do not form one structure.
    fn observe_level(&mut self, depth: usize, key: &str, reference: &str) -> Result<(), Error> {
        if self.observed.len() < depth {
            self.observed.resize(depth, String::new());
        }
        let index = depth.saturating_sub(1);
        let Some(slot) = self.observed.get_mut(index) else { return Ok(()) };
        if key.is_empty() {
            return Ok(());
        }
        if slot.is_empty() {
            key.clone_into(slot);
            return Ok(());
        }
        if slot != key {
            let reason = format!("level key `{key}` at depth {depth}, earlier headings at this depth use `{slot}`");
            return Err(self.inconsistency(reference, reason));
        }
        return Ok(());
    }

    /// Open a commentary note.
    fn open_note(&mut self, payload: &str) -> Result<(), Error> {
        if !matches!(self.target, Target::Commentary { .. }) {
            return Err(self.malformed("note outside a commentary section"));
        }
        if self.note.is_some() {
            return Err(self.malformed("nested note"));
        }
        let marker: NoteMarker = serde_json::from_str(payload).map_err(|e| return self.malformed(&format!("note marker: {e}")))?;
        let note = PrefatoryNote { content: Content::default(), label: marker.label, note_type: marker.note_type };
        self.note = Some((note, self.line));
        return Ok(());
    }

    /// Append a closed note to the current commentary passage.
    fn push_note(&mut self, note: PrefatoryNote) -> Result<(), Error> {
        let Target::Commentary { commentary, passage } = self.target else {
            return Err(self.malformed("note outside a commentary section"));
        };
        let owner = self.document.commentaries.get_mut(commentary).and_then(|c| return c.passages.get_mut(passage));
        let Some(owner) = owner else {
            return Err(self.malformed("note outside a commentary section"));
        };
        owner.prefatory_notes.push(note);
        return Ok(());
    }

    /// Merge observed level keys with the declared tree. Observed levels
    /// deeper than the declaration extend it; a contradicting key is an error.
    fn reconcile_levels(&mut self) -> Result<(), Error> {
        let declared: Vec<String> = structure::level_keys(&self.document.structure_levels).into_iter().map(str::to_string).collect();
        for (index, (seen, known)) in self.observed.iter().zip(&declared).enumerate() {
            if !seen.is_empty() && seen != known {
                return Err(Error::StructureInconsistency {
                    document: self.document.id.clone(),
                    reason: format!("headings at depth {} use `{seen}`, frontmatter declares `{known}`", index.saturating_add(1)),
                    reference: String::new(),
                });
            }
        }
        if self.observed.len() <= declared.len() {
            return Ok(());
        }

        let extra: Vec<String> = self
            .observed
            .iter()
            .enumerate()
            .skip(declared.len())
            .map(|(index, key)| {
                if key.is_empty() {
                    return format!("Level{}", index.saturating_add(1));
                }
                return key.clone();
            })
            .collect();
        tracing::debug!(document = %self.document.id, levels = ?extra, "extending structure from observed headings");
        let tail = StructureLevel::chain(&extra);
        let mut node = self.document.structure_levels.first_mut();
        if node.is_none() {
            self.document.structure_levels = tail;
            return Ok(());
        }
        while let Some(level) = node {
            if level.children.is_empty() {
                level.children = tail;
                break;
            }
            node = level.children.first_mut();
        }
        return Ok(());
    }
}

/// Parse markup and validate the reconstruction against the stored hash.
/// `reference` is the source document when available; it only sharpens the
/// diff hint.
///
/// # Errors
///
/// Returns any parse error, or `Error::RoundTripHashMismatch` when the
/// reconstruction does not hash to the stored value. No document is returned
/// on failure, so callers cannot write a corrupt artifact.
pub fn convert(markup: &str, reference: Option<&Document>) -> Result<Document, Error> {
    let parsed = parse(markup)?;
    return match roundtrip::validate(&parsed.stored_hash, &parsed.document, &parsed.scope, reference) {
        Outcome::Failed { actual, hint } => Err(Error::RoundTripHashMismatch {
            actual: actual.prefixed(),
            document: parsed.document.id,
            expected: parsed.stored_hash.prefixed(),
            hint,
        }),
        Outcome::Passed => {
            tracing::debug!(document = %parsed.document.id, "round trip validated");
            Ok(parsed.document)
        },
    };
}

/// Parse markup into a document without validating the hash.
///
/// # Errors
///
/// Returns `Error::MalformedMarkup` for a missing or unparseable header, an
/// unterminated fence or note, or a malformed metadata comment, and
/// `Error::StructureInconsistency` when headings do not form a valid tree.
pub fn parse(markup: &str) -> Result<Parsed, Error> {
    let (header, body, body_start) = frontmatter::split(markup)?;
    if header.validation_hash.trim().is_empty() {
        return Err(Error::MalformedMarkup { line: 1, reason: "frontmatter has an empty validation_hash".to_string() });
    }
    let scope = scope_of(&header);
    let stored_hash = ContentHash::parse_prefixed(&header.validation_hash);

    let mut parser = Parser {
        ancestors: Vec::new(),
        document: header.to_document()?,
        fence: None,
        line: body_start,
        note: None,
        observed: Vec::new(),
        pending_commentary: None,
        target: Target::Nothing,
    };

    for (offset, raw) in body.lines().enumerate() {
        parser.line = body_start.saturating_add(offset);
        if let Some(mut fence) = parser.fence.take() {
            if markup::classify(raw) == Line::FenceClose(fence.tag.as_str()) {
                parser.close_fence(fence)?;
            } else {
                fence.lines.push(raw.to_string());
                parser.fence = Some(fence);
            }
            continue;
        }
        parser.handle(raw)?;
    }

    let document = parser.finish()?;
    tracing::debug!(
        document = %document.id,
        main = document.main.len(),
        commentaries = document.commentaries.len(),
        "parsed markup"
    );
    return Ok(Parsed { document, scope, stored_hash });
}

/// Scope declared by the header. A header without a script list covers all scripts.
fn scope_of(header: &Frontmatter) -> HashScope {
    let scripts: Vec<Script> = if header.scripts.is_empty() { Script::ALL.to_vec() } else { header.scripts.clone() };
    return HashScope::new(scripts, header.commentaries.iter().cloned());
}

#[cfg(test)]
#[allow(clippy::indexing_slicing, reason = "tests")]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::export::{self, CommentarySelection, ExportOptions};
    use crate::hasher;

    /// Header with a three-level structure and a placeholder hash.
    const HEADER: &str = "+++\ngrantha_id = \"brihadaranyaka\"\ncanonical_title = \"बृहदारण्यकोपनिषत्\"\nscripts = [\"devanagari\"]\nvalidation_hash = \"sha256:00\"\n\n[[structure_levels]]\nkey = \"Adhyaya\"\n[[structure_levels.children]]\nkey = \"Brahmana\"\n[[structure_levels.children.children]]\nkey = \"Mantra\"\n+++\n";

    /// Document of `levels` depth with one verse per listed ref and one commentary.
    fn sample(levels: &[&str], refs: &[&str]) -> Document {
        let mut document = Document {
            id: "sample".to_string(),
            structure_levels: StructureLevel::chain(levels),
            title: "नमूना".to_string(),
            ..Document::default()
        };
        for (n, reference) in refs.iter().enumerate() {
            let mut passage = Passage { reference: PassageRef::new(*reference), ..Passage::default() };
            passage.content.sanskrit.insert(Script::Devanagari, format!("श्लोकः {n}\nद्वितीया पङ्क्तिः ।"));
            passage.content.english_translation = Some(format!("Verse {n}."));
            document.main.push(passage);
        }
        let mut note = PrefatoryNote { label: "अवतारिका".to_string(), note_type: "commentary_intro".to_string(), ..PrefatoryNote::default() };
        note.content.sanskrit.insert(Script::Devanagari, "अथ".to_string());
        let mut gloss = CommentaryPassage { prefatory_notes: vec![note], reference: PassageRef::new(refs[0]), ..CommentaryPassage::default() };
        gloss.content.sanskrit.insert(Script::Devanagari, "व्याख्या".to_string());
        document.commentaries.push(Commentary { id: "bhashya".to_string(), passages: vec![gloss], title: "भाष्यम्".to_string(), ..Commentary::default() });
        return document;
    }

    #[test]
    fn round_trip_preserves_hash_at_every_depth() {
        let cases: [(&[&str], &[&str]); 4] = [
            (&["Mantra"], &["1", "2", "10"]),
            (&["Valli", "Mantra"], &["1.1", "1.2", "2.1"]),
            (&["Adhyaya", "Brahmana", "Mantra"], &["3.1.1", "3.1.2", "3.2.1"]),
            (&["Kanda", "Prapathaka", "Anuvaka", "Mantra"], &["1.1.1.1", "1.1.2.1", "2.1.1.1"]),
        ];
        for (levels, refs) in cases {
            let original = sample(levels, refs);
            let markup = export::serialize(&original, &ExportOptions::default()).unwrap();
            let parsed = parse(&markup).unwrap();
            assert_eq!(hasher::hash_document(&parsed.document, &parsed.scope), parsed.stored_hash);
            assert_eq!(parsed.document.main.len(), refs.len());
            assert_eq!(parsed.document.structure_levels, original.structure_levels);
        }
    }

    #[test]
    fn three_level_document_with_commentary_round_trips() {
        let original = sample(&["Adhyaya", "Brahmana", "Mantra"], &["3.1.1"]);
        let markup = export::serialize(&original, &ExportOptions::default()).unwrap();
        let document = convert(&markup, None).unwrap();
        assert_eq!(document.main.len(), 1);
        assert_eq!(document.main[0].reference.as_str(), "3.1.1");
        assert_eq!(document.commentaries.len(), 1);
        assert_eq!(document.commentaries[0].passages.len(), 1);
        assert_eq!(document.commentaries[0].passages[0].reference.as_str(), "3.1.1");
        assert_eq!(document.commentaries[0].passages[0].prefatory_notes[0].note_type, "commentary_intro");
        assert_eq!(document.commentaries[0].title, "भाष्यम्");
    }

    #[test]
    fn commentary_subset_round_trips() {
        let original = sample(&["Mantra"], &["1"]);
        let options = ExportOptions { commentaries: CommentarySelection::None, ..ExportOptions::default() };
        let markup = export::serialize(&original, &options).unwrap();
        let document = convert(&markup, None).unwrap();
        assert!(document.commentaries.is_empty());
    }

    #[test]
    fn corrupted_character_fails_validation() {
        let original = sample(&["Adhyaya", "Brahmana", "Mantra"], &["3.1.1"]);
        let markup = export::serialize(&original, &ExportOptions::default()).unwrap();
        let corrupted = markup.replacen("श्लोकः", "श्लोकाः", 1);
        let err = convert(&corrupted, Some(&original)).unwrap_err();
        let Error::RoundTripHashMismatch { hint, .. } = err else { panic!("expected hash mismatch, got {err}") };
        assert!(hint.contains("3.1.1"), "hint should name the ref: {hint}");
    }

    #[test]
    fn reformatting_inside_fences_still_validates() {
        let original = sample(&["Mantra"], &["1"]);
        let markup = export::serialize(&original, &ExportOptions::default()).unwrap();
        let reflowed = markup.replace("\nद्वितीया पङ्क्तिः ।", "\n\n    द्वितीया   पङ्क्तिः");
        assert!(convert(&reflowed, None).is_ok());
    }

    #[test]
    fn skipped_heading_level_is_inconsistent() {
        let markup = format!("{HEADER}\n# Adhyaya 3\n\n### Mantra 3.1.1\n");
        let err = parse(&markup).unwrap_err();
        assert!(matches!(err, Error::StructureInconsistency { .. }), "{err}");
    }

    #[test]
    fn child_ref_must_extend_parent() {
        let markup = format!("{HEADER}\n# Adhyaya 3\n\n## Brahmana 4.1\n\n### Mantra 4.1.1\n");
        let err = parse(&markup).unwrap_err();
        assert!(err.to_string().contains("does not extend"), "{err}");
    }

    #[test]
    fn unterminated_fence_reports_its_line() {
        let markup = format!("{HEADER}\n# Adhyaya 3\n\n## Brahmana 3.1\n\n### Mantra 3.1.1\n\n<!-- sanskrit:devanagari -->\nजनकः\n");
        let err = parse(&markup).unwrap_err();
        assert!(matches!(err, Error::MalformedMarkup { line: 21, .. }), "{err}");
    }

    #[test]
    fn missing_frontmatter_is_malformed() {
        let err = parse("# Mantra 1\n").unwrap_err();
        assert!(matches!(err, Error::MalformedMarkup { .. }));
    }

    #[test]
    fn structure_is_derived_from_headings_when_undeclared() {
        let markup = "+++\ngrantha_id = \"x\"\nvalidation_hash = \"sha256:00\"\n+++\n\n# Valli 1\n\n## Mantra 1.1\n\n<!-- sanskrit:devanagari -->\nक\n<!-- /sanskrit:devanagari -->\n";
        let parsed = parse(markup).unwrap();
        assert_eq!(structure::level_keys(&parsed.document.structure_levels), vec!["Valli", "Mantra"]);
        assert_eq!(parsed.document.main.len(), 1);
        assert_eq!(parsed.document.main[0].reference.as_str(), "1.1");
    }

    #[test]
    fn main_passage_label_round_trips() {
        let mut original = sample(&["Mantra"], &["1", "2"]);
        let mut label = ScriptText::new();
        label.insert(Script::Devanagari, "प्रथमः (आदिः)".to_string());
        original.main[0].label = Some(label.clone());
        let markup = export::serialize(&original, &ExportOptions::default()).unwrap();
        let document = convert(&markup, Some(&original)).unwrap();
        assert_eq!(document.main[0].label, Some(label));
        assert_eq!(document.main[0].reference.as_str(), "1");
        assert_eq!(document.main[1].label, None);
    }

    #[test]
    fn edited_main_passage_label_fails_validation() {
        let mut original = sample(&["Mantra"], &["1"]);
        let mut label = ScriptText::new();
        label.insert(Script::Devanagari, "प्रथमः".to_string());
        original.main[0].label = Some(label);
        let markup = export::serialize(&original, &ExportOptions::default()).unwrap();
        let edited = markup.replacen("प्रथमः", "द्वितीयः", 1);
        let err = convert(&edited, Some(&original)).unwrap_err();
        assert!(matches!(err, Error::RoundTripHashMismatch { .. }), "{err}");
    }

    #[test]
    fn commentary_on_prefatory_and_concluding_refs_round_trips() {
        let mut original = sample(&["Mantra"], &["1"]);
        let mut invocation = Passage { kind: PassageKind::Prefatory, reference: PassageRef::new("0.1"), ..Passage::default() };
        invocation.content.sanskrit.insert(Script::Devanagari, "ॐ पूर्णमदः".to_string());
        let mut closing = Passage { kind: PassageKind::Concluding, reference: PassageRef::new("99.1"), ..Passage::default() };
        closing.content.sanskrit.insert(Script::Devanagari, "ॐ शान्तिः".to_string());
        original.prefatory.push(invocation);
        original.concluding.push(closing);
        for (reference, text) in [("0.1", "पूर्णमिति"), ("99.1", "शान्तिरिति")] {
            let mut gloss = CommentaryPassage { reference: PassageRef::new(reference), ..CommentaryPassage::default() };
            gloss.content.sanskrit.insert(Script::Devanagari, text.to_string());
            original.commentaries[0].passages.push(gloss);
        }

        let markup = export::serialize(&original, &ExportOptions::default()).unwrap();
        assert!(markup.contains("## Commentary: 0.1"), "{markup}");
        let document = convert(&markup, Some(&original)).unwrap();
        let refs: Vec<&str> = document.commentaries[0].passages.iter().map(|p| return p.reference.as_str()).collect();
        assert_eq!(refs, vec!["0.1", "1", "99.1"]);
        assert_eq!(document.prefatory.len(), 1);
        assert_eq!(document.concluding.len(), 1);
        assert_eq!(document.commentaries[0].passages[2].content.sanskrit[&Script::Devanagari], "शान्तिरिति");
    }

    #[test]
    fn duplicate_refs_stay_separate_passages() {
        let mut original = sample(&["Mantra"], &["1", "1"]);
        original.main[1].content.sanskrit.insert(Script::Devanagari, "पुनः".to_string());
        let markup = export::serialize(&original, &ExportOptions::default()).unwrap();
        let document = convert(&markup, None).unwrap();
        assert_eq!(document.main.len(), 2);
    }
}
