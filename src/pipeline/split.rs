//! Section splitting: one concatenated OCR transcript → per-document sections.
//!
//! The OCR stage writes every image's text into one file, each block opened
//! by a marker line of the form `--- Extracted Text from <file> ---`. This
//! module walks that file lazily and yields one [`Section`] per block.
//!
//! Rules:
//! - every line is trimmed; blank lines are dropped before splitting
//! - a marker line opens a new section and is not part of its content
//! - non-blank text before the first marker forms its own section with no
//!   source name
//! - a section with no content lines (marker directly followed by another
//!   marker or end of input) is never emitted

use std::iter::Peekable;

/// Fixed prefix of a section marker line.
pub const SECTION_MARKER: &str = "--- Extracted Text from";

/// The text extracted from one source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// 1-indexed position among emitted sections.
    pub index: usize,
    /// File name taken from the marker line, if there was one.
    pub source: Option<String>,
    /// Non-blank, trimmed content lines.
    pub lines: Vec<String>,
}

impl Section {
    /// Content joined with `\n`, as sent to the model.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// `source` or a positional fallback, for log lines.
    pub fn label(&self) -> String {
        match self.source {
            Some(ref s) => s.clone(),
            None => format!("section {}", self.index),
        }
    }
}

/// Build the marker line for `file_name`.
pub fn marker_line(file_name: &str) -> String {
    format!("{SECTION_MARKER} {file_name} ---")
}

fn is_marker(line: &str) -> bool {
    line.starts_with(SECTION_MARKER)
}

fn marker_source(line: &str) -> Option<String> {
    let rest = line.strip_prefix(SECTION_MARKER)?;
    let rest = rest.trim();
    let rest = rest.strip_suffix("---").unwrap_or(rest).trim();
    if rest.is_empty() {
        None
    } else {
        Some(rest.to_string())
    }
}

/// Lazy iterator over the sections of a transcript.
///
/// Consumes the underlying line iterator; it cannot be restarted.
pub struct Sections<'a, I: Iterator<Item = &'a str>> {
    lines: Peekable<I>,
    emitted: usize,
}

impl<'a, I: Iterator<Item = &'a str>> Sections<'a, I> {
    pub fn new(lines: I) -> Self {
        Self {
            lines: lines.peekable(),
            emitted: 0,
        }
    }

    fn next_non_blank(&mut self) -> Option<&'a str> {
        self.lines.by_ref().map(str::trim).find(|l| !l.is_empty())
    }
}

impl<'a, I: Iterator<Item = &'a str>> Iterator for Sections<'a, I> {
    type Item = Section;

    fn next(&mut self) -> Option<Section> {
        loop {
            let head = self.next_non_blank()?;
            let mut content = Vec::new();
            let source = if is_marker(head) {
                marker_source(head)
            } else {
                // Only reachable for text preceding the first marker.
                content.push(head.to_string());
                None
            };

            while let Some(line) = self.lines.peek() {
                let line = line.trim();
                if is_marker(line) {
                    break;
                }
                if !line.is_empty() {
                    content.push(line.to_string());
                }
                self.lines.next();
            }

            if content.is_empty() {
                continue;
            }

            self.emitted += 1;
            return Some(Section {
                index: self.emitted,
                source,
                lines: content,
            });
        }
    }
}

/// Split a whole transcript into sections.
pub fn split_sections(corpus: &str) -> Sections<'_, std::str::Lines<'_>> {
    Sections::new(corpus.lines())
}
