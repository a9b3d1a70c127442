//! Response parsing: free-text model reply → [`FieldRecord`].
//!
//! The reply is expected to hold one `<Field>: <value>` pair per line, but
//! nothing enforces that, so parsing is a table of rules rather than a
//! grammar. Each [`FieldRule`] pairs a field with a matcher; for every rule
//! the first line the matcher accepts *and* that contains a colon supplies
//! the value (text after the first colon, trimmed). Adding a field means
//! adding a rule, not another branch.
//!
//! Matchers are whole-word and case-sensitive: `Name` matches
//! `Candidate Name: …` but not `Surname: …` or `Names: …`. Values are not
//! validated; scores stay strings.

use crate::pipeline::postprocess::clean_response;
use crate::record::{Field, FieldRecord};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// One row of the extraction table: field → line matcher.
pub struct FieldRule {
    pub field: Field,
    matcher: Regex,
}

impl FieldRule {
    fn new(field: Field) -> Self {
        let pattern = format!(r"\b{}\b", regex::escape(field.label()));
        Self {
            field,
            // Labels are fixed ASCII words; the pattern always compiles.
            matcher: Regex::new(&pattern).unwrap(),
        }
    }

    pub fn matches(&self, line: &str) -> bool {
        self.matcher.is_match(line)
    }

    /// Value carried by `line` if it names this rule's field.
    fn capture<'l>(&self, line: &'l str) -> Option<&'l str> {
        if !self.matches(line) {
            return None;
        }
        line.split_once(':').map(|(_, value)| value.trim())
    }
}

/// Rules in declaration order. Earlier rules win ties.
pub static FIELD_RULES: Lazy<Vec<FieldRule>> =
    Lazy::new(|| Field::ALL.into_iter().map(FieldRule::new).collect());

/// Parse a raw model response into a complete record.
pub fn parse_response(response: &str) -> FieldRecord {
    let cleaned = clean_response(response);
    let lines: Vec<&str> = cleaned.lines().collect();
    let mut record = FieldRecord::default();

    for rule in FIELD_RULES.iter() {
        if let Some(value) = lines.iter().find_map(|line| rule.capture(line)) {
            record.set(rule.field, value);
        }
    }

    let missing = record.missing_fields();
    if !missing.is_empty() {
        debug!("Fields defaulted to N/A: {:?}", missing);
    }
    record
}
