use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::types::{Content, Document};

/// `[label](ref:<abbr>/<path>)`.
#[allow(clippy::expect_used, reason = "pattern is a literal, checked by tests")]
static LINK_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| return Regex::new(r"\[([^\]]+)\]\(ref:([^)/\s]+)/([^)\s]*)\)").expect("valid regex"));

/// `(<abbr> <path>)` where the path starts with an ASCII or Devanagari digit.
#[allow(clippy::expect_used, reason = "pattern is a literal, checked by tests")]
static PAREN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    return Regex::new(r"\(\s*([^()\s0-9०-९][^()]*?)\s+([0-9०-९][^\s()]*)\s*\)").expect("valid regex");
});

/// A citation marker found in text, before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Citation {
    /// Document abbreviation as written.
    pub abbreviation: String,
    /// Text to display for the citation.
    pub display_text: String,
    /// Marker syntax the citation used.
    pub form: CitationForm,
    /// Structural path as written.
    pub path: String,
    /// The full marker text.
    pub raw_text: String,
    /// Byte offset of the marker in the scanned text.
    pub start: usize,
}

/// Marker syntax of a citation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CitationForm {
    /// `[label](ref:abbr/path)`.
    Link,
    /// `(abbr path)`.
    Parenthetical,
}

/// Where in a document a citation was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    /// `main`, `prefatory`, `concluding`, or `commentary/<id>`.
    pub list: String,
    /// Ref of the passage holding the citation.
    pub reference: String,
}

/// Extract citations from text in order of appearance. A parenthetical
/// match overlapping a link marker is dropped.
pub fn extract(text: &str) -> Vec<Citation> {
    let mut citations: Vec<Citation> = LINK_PATTERN
        .captures_iter(text)
        .filter_map(|cap| return parse_capture(&cap, CitationForm::Link))
        .collect();
    let links: Vec<(usize, usize)> = LINK_PATTERN.find_iter(text).map(|m| return (m.start(), m.end())).collect();

    for cap in PAREN_PATTERN.captures_iter(text) {
        let Some(whole) = cap.get(0) else { continue };
        let overlaps = links.iter().any(|(start, end)| return whole.start() < *end && *start < whole.end());
        if overlaps {
            continue;
        }
        if let Some(citation) = parse_capture(&cap, CitationForm::Parenthetical) {
            citations.push(citation);
        }
    }
    citations.sort_by_key(|c| return c.start);
    return citations;
}

/// Extract citations from every text field of a document, with their sites.
pub fn scan_document(document: &Document) -> Vec<(Site, Citation)> {
    let mut found = Vec::new();
    let lists = [("prefatory", &document.prefatory), ("main", &document.main), ("concluding", &document.concluding)];
    for (list, passages) in lists {
        for passage in passages {
            let site = Site { list: list.to_string(), reference: passage.reference.to_string() };
            scan_content(&passage.content, &site, &mut found);
        }
    }
    for commentary in &document.commentaries {
        for passage in &commentary.passages {
            let site = Site { list: format!("commentary/{}", commentary.id), reference: passage.reference.to_string() };
            for note in &passage.prefatory_notes {
                scan_content(&note.content, &site, &mut found);
            }
            scan_content(&passage.content, &site, &mut found);
        }
    }
    return found;
}

/// Build a citation from a link or parenthetical capture.
fn parse_capture(cap: &Captures<'_>, form: CitationForm) -> Option<Citation> {
    let whole = cap.get(0)?;
    let (display_text, abbreviation, path) = match form {
        CitationForm::Link => (cap.get(1)?.as_str(), cap.get(2)?.as_str(), cap.get(3)?.as_str()),
        CitationForm::Parenthetical => {
            let inner = whole.as_str().trim_start_matches('(').trim_end_matches(')').trim();
            (inner, cap.get(1)?.as_str(), cap.get(2)?.as_str())
        },
    };
    if abbreviation.trim().is_empty() {
        return None;
    }
    return Some(Citation {
        abbreviation: abbreviation.trim().to_string(),
        display_text: display_text.to_string(),
        form,
        path: path.to_string(),
        raw_text: whole.as_str().to_string(),
        start: whole.start(),
    });
}

/// Scan every text field of one content block.
fn scan_content(content: &Content, site: &Site, found: &mut Vec<(Site, Citation)>) {
    let fields = content.sanskrit.values().chain(&content.english_translation).chain(&content.english);
    for text in fields {
        for citation in extract(text) {
            found.push((site.clone(), citation));
        }
    }
}

#[cfg(test)]
#[allow(clippy::indexing_slicing, reason = "tests")]
mod tests {
    use super::*;

    #[test]
    fn extracts_parenthetical_citation_with_dotted_abbreviation() {
        let citations = extract("सदेव सोम्येदमग्र आसीत् (छां.उ. 6.2.1) इति श्रुतेः");
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].abbreviation, "छां.उ.");
        assert_eq!(citations[0].path, "6.2.1");
        assert_eq!(citations[0].raw_text, "(छां.उ. 6.2.1)");
        assert_eq!(citations[0].form, CitationForm::Parenthetical);
    }

    #[test]
    fn extracts_devanagari_digits() {
        let citations = extract("(बृ.उ. ३.१.१)");
        assert_eq!(citations[0].path, "३.१.१");
    }

    #[test]
    fn extracts_link_marker_without_double_counting() {
        let citations = extract("see ([Shiksha valli](ref:tai/shiksha.1)) and (Br.Su. 1.1.1)");
        assert_eq!(citations.len(), 2);
        assert_eq!(citations[0].form, CitationForm::Link);
        assert_eq!(citations[0].display_text, "Shiksha valli");
        assert_eq!(citations[0].abbreviation, "tai");
        assert_eq!(citations[0].path, "shiksha.1");
        assert_eq!(citations[1].abbreviation, "Br.Su.");
    }

    #[test]
    fn ignores_plain_parentheses() {
        assert!(extract("(this is a remark) and (३)").is_empty());
    }
}
