//! Document to markup serialization.
//!
//! Output is a pure function of the document and the options: no
//! timestamps, no map iteration over unordered collections, so identical
//! input always yields byte-identical markup.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::Error;
use crate::frontmatter;
use crate::hasher::{self, HashScope};
use crate::markup::{self, COMMENTARY_HEADING, CONCLUDING_HEADING, CommentaryMarker, FenceKind, NoteMarker, PREFATORY_HEADING};
use crate::structure::{self, Group};
use crate::types::{CommentaryPassage, Content, Document, Passage, PassageKind, Script};

/// Which commentaries an export carries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CommentarySelection {
    /// Every commentary present in the document.
    #[default]
    All,
    /// No commentary layer.
    None,
    /// Only the listed ids; unknown ids are ignored.
    Only(BTreeSet<String>),
}

/// Export options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    /// Commentary layer selection.
    pub commentaries: CommentarySelection,
    /// Scripts rendered in content fences and labels.
    pub scripts: BTreeSet<Script>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        return Self { commentaries: CommentarySelection::All, scripts: Script::ALL.into_iter().collect() };
    }
}

/// A commentary passage waiting to be rendered after its target passage.
struct Attached<'a> {
    /// Owning commentary id.
    commentary: &'a str,
    /// The passage itself.
    passage: &'a CommentaryPassage,
}

/// Body writer state for one export.
struct Writer<'a> {
    /// Commentary passages keyed by the ref of the passage they follow.
    attached: BTreeMap<String, Vec<Attached<'a>>>,
    /// Output buffer.
    out: String,
    /// Scripts rendered, in fixed order.
    scripts: Vec<Script>,
}

impl<'a> Writer<'a> {
    /// Render one commentary passage under a heading at `depth`.
    fn commentary(&mut self, depth: usize, item: &Attached<'a>) -> Result<(), Error> {
        let marker = serde_json::to_string(&CommentaryMarker { commentary_id: item.commentary.to_string() })?;
        self.out.push_str(&format!("<!-- commentary: {marker} -->\n"));
        self.heading(depth, &format!("{COMMENTARY_HEADING} {}", item.passage.reference));
        self.source_part(item.passage.source_part.as_deref());
        for note in &item.passage.prefatory_notes {
            let marker = serde_json::to_string(&NoteMarker { label: note.label.clone(), note_type: note.note_type.clone() })?;
            self.out.push_str(&format!("<!-- note: {marker} -->\n"));
            self.content(&note.content);
            self.out.push_str("<!-- /note -->\n\n");
        }
        self.content(&item.passage.content);
        return Ok(());
    }

    /// Render every commentary passage attached to `reference`, once.
    fn commentaries_for(&mut self, reference: &str, depth: usize) -> Result<(), Error> {
        let Some(items) = self.attached.remove(reference) else { return Ok(()) };
        for item in &items {
            self.commentary(depth, item)?;
        }
        return Ok(());
    }

    /// Render content fences: scripts in fixed order, then English fields.
    fn content(&mut self, content: &Content) {
        for script in self.scripts.clone() {
            if let Some(text) = content.sanskrit.get(&script) {
                self.fence(FenceKind::Sanskrit(script), text);
            }
        }
        if let Some(text) = &content.english_translation {
            self.fence(FenceKind::EnglishTranslation, text);
        }
        if let Some(text) = &content.english {
            self.fence(FenceKind::English, text);
        }
    }

    /// Render one fenced block. Empty text is omitted.
    fn fence(&mut self, kind: FenceKind, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        let tag = kind.tag();
        self.out.push_str(&format!("<!-- {tag} -->\n"));
        self.out.push_str(text.trim_end_matches('\n'));
        self.out.push_str(&format!("\n<!-- /{tag} -->\n\n"));
    }

    /// Render a heading followed by a blank line.
    fn heading(&mut self, depth: usize, text: &str) {
        self.out.push_str(&format!("{} {text}\n\n", "#".repeat(depth.max(1))));
    }

    /// Heading text with the passage label appended in the rendered scripts.
    fn labelled(&self, text: String, passage: &Passage) -> String {
        let label = passage.label.as_ref().map(|l| return markup::format_label(l, &self.scripts)).unwrap_or_default();
        if label.is_empty() {
            return text;
        }
        return format!("{text} {label}");
    }

    /// Render a prefatory or concluding passage and its commentary.
    fn material(&mut self, passage: &Passage) -> Result<(), Error> {
        let prefix = if passage.kind == PassageKind::Concluding { CONCLUDING_HEADING } else { PREFATORY_HEADING };
        let heading = self.labelled(format!("{prefix} {}", passage.reference), passage);
        self.heading(1, &heading);
        self.source_part(passage.source_part.as_deref());
        self.content(&passage.content);
        return self.commentaries_for(passage.reference.as_str(), 2);
    }

    /// Render the structural tree depth-first with an explicit stack.
    fn tree(&mut self, roots: &[Group<'_>]) -> Result<(), Error> {
        let mut stack: Vec<&Group<'_>> = roots.iter().rev().collect();
        while let Some(group) = stack.pop() {
            if group.passages.is_empty() {
                self.heading(group.depth, &format!("{} {}", group.level, group.path));
            }
            for passage in &group.passages {
                let heading = self.labelled(format!("{} {}", group.level, group.path), passage);
                self.heading(group.depth, &heading);
                self.source_part(passage.source_part.as_deref());
                self.content(&passage.content);
            }
            if !group.passages.is_empty() {
                self.commentaries_for(&group.path, group.depth.saturating_add(1))?;
            }
            stack.extend(group.children.iter().rev());
        }
        return Ok(());
    }

    /// Render a `source_part` marker when the passage came from a part file.
    fn source_part(&mut self, part: Option<&str>) {
        if let Some(part) = part {
            self.out.push_str(&format!("<!-- source_part: {part} -->\n\n"));
        }
    }
}

/// Hash scope an export with these options produces.
pub fn scope_for(document: &Document, options: &ExportOptions) -> HashScope {
    return HashScope::new(options.scripts.iter().copied(), selected_commentaries(document, options));
}

/// Serialize a document to markup.
///
/// # Errors
///
/// Returns `Error::StructureInconsistency` if a main passage's ref does not
/// match the structure depth, or a serialization error from the header.
pub fn serialize(document: &Document, options: &ExportOptions) -> Result<String, Error> {
    validate_structure(document)?;

    let commentaries = selected_commentaries(document, options);
    let scope = scope_for(document, options);
    let hash = hasher::hash_document(document, &scope);
    tracing::debug!(document = %document.id, hash = %hash, scripts = scope.scripts.len(), commentaries = commentaries.len(), "exporting");

    let scripts: Vec<Script> = options.scripts.iter().copied().collect();
    let header = frontmatter::for_document(document, scripts.clone(), commentaries.clone(), hash.prefixed())?;

    let mut writer = Writer { attached: BTreeMap::new(), out: frontmatter::render(&header)?, scripts };
    writer.out.push('\n');
    let orphans = attach_commentaries(document, &commentaries, &mut writer.attached);

    for passage in &document.prefatory {
        writer.material(passage)?;
    }
    let groups = structure::group_by_hierarchy(&document.main, &document.structure_levels);
    writer.tree(&groups)?;
    for item in &orphans {
        writer.commentary(1, item)?;
    }
    for passage in &document.concluding {
        writer.material(passage)?;
    }

    let mut out = writer.out;
    while out.ends_with("\n\n") {
        out.pop();
    }
    return Ok(out);
}

/// Map each selected commentary passage to the ref it is rendered after.
/// A ranged ref such as `6.3.24-30` follows the passage at its start.
/// Passages with no target are returned for rendering after the main text.
fn attach_commentaries<'a>(
    document: &'a Document,
    commentaries: &[String],
    attached: &mut BTreeMap<String, Vec<Attached<'a>>>,
) -> Vec<Attached<'a>> {
    let known: BTreeSet<&str> = document
        .prefatory
        .iter()
        .chain(&document.main)
        .chain(&document.concluding)
        .map(|p| return p.reference.as_str())
        .collect();

    let mut orphans = Vec::new();
    for commentary in document.commentaries.iter().filter(|c| return commentaries.contains(&c.id)) {
        for passage in &commentary.passages {
            let item = Attached { commentary: &commentary.id, passage };
            let raw = passage.reference.as_str();
            let start = structure::range_start(raw);
            let target = if known.contains(raw) { Some(raw) } else { start.as_deref().filter(|s| return known.contains(s)) };
            match target {
                Some(target) => attached.entry(target.to_string()).or_default().push(item),
                None => orphans.push(item),
            }
        }
    }
    return orphans;
}

/// Commentary ids the options select, in declaration order.
fn selected_commentaries(document: &Document, options: &ExportOptions) -> Vec<String> {
    let ids = document.commentary_ids();
    return match &options.commentaries {
        CommentarySelection::All => ids,
        CommentarySelection::None => Vec::new(),
        CommentarySelection::Only(wanted) => {
            for missing in wanted.iter().filter(|w| return !ids.contains(w)) {
                tracing::warn!(document = %document.id, commentary = %missing, "requested commentary not in document");
            }
            ids.into_iter().filter(|id| return wanted.contains(id)).collect()
        },
    };
}

/// Reject documents whose main refs do not match the structure depth.
fn validate_structure(document: &Document) -> Result<(), Error> {
    let expected = structure::depth(&document.structure_levels);
    if expected == 0 && !document.main.is_empty() {
        return Err(Error::StructureInconsistency {
            document: document.id.clone(),
            reason: "document has main passages but no structure levels".to_string(),
            reference: String::new(),
        });
    }
    for passage in &document.main {
        structure::validate_ref_depth(&document.id, passage, expected)?;
    }
    return Ok(());
}

#[cfg(test)]
#[allow(clippy::indexing_slicing, reason = "tests")]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::types::{Commentary, PassageRef, StructureLevel};

    /// Three-level document with one verse and one commentary passage at `3.1.1`.
    fn brihadaranyaka() -> Document {
        let mut verse = Passage { reference: PassageRef::new("3.1.1"), ..Passage::default() };
        verse.content.sanskrit.insert(Script::Devanagari, "जनको ह वैदेहः".to_string());
        verse.content.sanskrit.insert(Script::Roman, "janako ha vaidehaḥ".to_string());
        let mut gloss = CommentaryPassage { reference: PassageRef::new("3.1.1"), ..CommentaryPassage::default() };
        gloss.content.sanskrit.insert(Script::Devanagari, "जनक इति".to_string());
        return Document {
            commentaries: vec![Commentary { id: "bhashya".to_string(), passages: vec![gloss], ..Commentary::default() }],
            id: "brihadaranyaka".to_string(),
            main: vec![verse],
            structure_levels: StructureLevel::chain(&["Adhyaya", "Brahmana", "Mantra"]),
            title: "बृहदारण्यकोपनिषत्".to_string(),
            ..Document::default()
        };
    }

    #[test]
    fn renders_nested_headings_and_commentary_one_level_deeper() {
        let markup = serialize(&brihadaranyaka(), &ExportOptions::default()).unwrap();
        let headings: Vec<&str> = markup.lines().filter(|l| return l.starts_with('#')).collect();
        assert_eq!(headings, vec!["# Adhyaya 3", "## Brahmana 3.1", "### Mantra 3.1.1", "#### Commentary: 3.1.1"]);
        assert!(markup.contains("<!-- commentary: {\"commentary_id\":\"bhashya\"} -->"));
    }

    #[test]
    fn output_is_deterministic() {
        let doc = brihadaranyaka();
        let options = ExportOptions::default();
        assert_eq!(serialize(&doc, &options).unwrap(), serialize(&doc, &options).unwrap());
    }

    #[test]
    fn script_and_commentary_selection_limit_output() {
        let options = ExportOptions {
            commentaries: CommentarySelection::None,
            scripts: [Script::Devanagari].into_iter().collect(),
        };
        let markup = serialize(&brihadaranyaka(), &options).unwrap();
        assert!(!markup.contains("sanskrit:roman"));
        assert!(!markup.contains("Commentary:"));
        assert!(!markup.contains("commentaries_metadata"));
    }

    #[test]
    fn rejects_main_ref_with_wrong_depth() {
        let mut doc = brihadaranyaka();
        doc.main[0].reference = PassageRef::new("3.1");
        let err = serialize(&doc, &ExportOptions::default()).unwrap_err();
        assert!(matches!(err, Error::StructureInconsistency { .. }));
    }

    #[test]
    fn main_passage_label_goes_in_its_heading() {
        let mut doc = brihadaranyaka();
        let mut label = crate::types::ScriptText::new();
        label.insert(Script::Devanagari, "प्रथमः".to_string());
        label.insert(Script::Roman, "prathamaḥ".to_string());
        doc.main[0].label = Some(label);
        let options = ExportOptions { scripts: [Script::Devanagari].into_iter().collect(), ..ExportOptions::default() };
        let markup = serialize(&doc, &options).unwrap();
        assert!(markup.contains("### Mantra 3.1.1 (devanagari: \"प्रथमः\")\n"), "{markup}");
        assert!(!markup.contains("prathamaḥ"));
    }

    #[test]
    fn ranged_commentary_follows_its_start_passage() {
        let mut doc = brihadaranyaka();
        doc.commentaries[0].passages[0].reference = PassageRef::new("3.1.1-4");
        let markup = serialize(&doc, &ExportOptions::default()).unwrap();
        let verse_at = markup.find("### Mantra 3.1.1").unwrap();
        let gloss_at = markup.find("#### Commentary: 3.1.1-4").unwrap();
        assert!(gloss_at > verse_at);
    }
}
