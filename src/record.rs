//! Fixed-schema records produced by the response parser.
//!
//! A [`FieldRecord`] always carries every canonical [`Field`]. Data the
//! model could not find is stored as the sentinel [`NOT_AVAILABLE`], never
//! as an absent key or `null`, so the JSON artifact has the same shape for
//! every section.
//!
//! [`RecordBatch`] is the looser, on-disk view used when reading JSON
//! artifacts back: a file may hold a single object or an array of them, and
//! objects may carry extra or missing keys. [`RecordBatch::flatten`] is the
//! one place that coerces one-or-many into a flat sequence.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Placeholder for a field with no extracted data.
pub const NOT_AVAILABLE: &str = "N/A";

/// A record as read from a JSON artifact: field name → arbitrary JSON value.
pub type LooseRecord = Map<String, Value>;

/// One canonical field of a score certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    OverallScore,
    ReadingScore,
    WritingScore,
    ListeningScore,
    SpeakingScore,
    DateOfExamination,
    DateOfIssue,
}

impl Field {
    /// Every canonical field, in declaration order.
    pub const ALL: [Field; 8] = [
        Field::Name,
        Field::OverallScore,
        Field::ReadingScore,
        Field::WritingScore,
        Field::ListeningScore,
        Field::SpeakingScore,
        Field::DateOfExamination,
        Field::DateOfIssue,
    ];

    /// The label used in model responses and as the JSON key.
    pub fn label(self) -> &'static str {
        match self {
            Field::Name => "Name",
            Field::OverallScore => "Overall Score",
            Field::ReadingScore => "Reading Score",
            Field::WritingScore => "Writing Score",
            Field::ListeningScore => "Listening Score",
            Field::SpeakingScore => "Speaking Score",
            Field::DateOfExamination => "Date of Examination",
            Field::DateOfIssue => "Date of Issue",
        }
    }
}

fn not_available() -> String {
    NOT_AVAILABLE.to_string()
}

/// The structured result of parsing one section's extraction response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRecord {
    #[serde(rename = "Name", default = "not_available")]
    pub name: String,
    #[serde(rename = "Overall Score", default = "not_available")]
    pub overall_score: String,
    #[serde(rename = "Reading Score", default = "not_available")]
    pub reading_score: String,
    #[serde(rename = "Writing Score", default = "not_available")]
    pub writing_score: String,
    #[serde(rename = "Listening Score", default = "not_available")]
    pub listening_score: String,
    #[serde(rename = "Speaking Score", default = "not_available")]
    pub speaking_score: String,
    #[serde(rename = "Date of Examination", default = "not_available")]
    pub date_of_examination: String,
    #[serde(rename = "Date of Issue", default = "not_available")]
    pub date_of_issue: String,
}

impl Default for FieldRecord {
    fn default() -> Self {
        Self {
            name: not_available(),
            overall_score: not_available(),
            reading_score: not_available(),
            writing_score: not_available(),
            listening_score: not_available(),
            speaking_score: not_available(),
            date_of_examination: not_available(),
            date_of_issue: not_available(),
        }
    }
}

impl FieldRecord {
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Name => &self.name,
            Field::OverallScore => &self.overall_score,
            Field::ReadingScore => &self.reading_score,
            Field::WritingScore => &self.writing_score,
            Field::ListeningScore => &self.listening_score,
            Field::SpeakingScore => &self.speaking_score,
            Field::DateOfExamination => &self.date_of_examination,
            Field::DateOfIssue => &self.date_of_issue,
        }
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        let slot = match field {
            Field::Name => &mut self.name,
            Field::OverallScore => &mut self.overall_score,
            Field::ReadingScore => &mut self.reading_score,
            Field::WritingScore => &mut self.writing_score,
            Field::ListeningScore => &mut self.listening_score,
            Field::SpeakingScore => &mut self.speaking_score,
            Field::DateOfExamination => &mut self.date_of_examination,
            Field::DateOfIssue => &mut self.date_of_issue,
        };
        *slot = value.into();
    }

    /// Fields still holding the sentinel.
    pub fn missing_fields(&self) -> Vec<Field> {
        Field::ALL
            .into_iter()
            .filter(|f| self.get(*f) == NOT_AVAILABLE)
            .collect()
    }

    /// Loose view keyed by field label.
    pub fn to_loose(&self) -> LooseRecord {
        Field::ALL
            .into_iter()
            .map(|f| (f.label().to_string(), Value::String(self.get(f).to_string())))
            .collect()
    }
}

/// The contents of one JSON artifact: a single record or a list of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordBatch {
    Many(Vec<LooseRecord>),
    One(LooseRecord),
}

impl From<FieldRecord> for RecordBatch {
    fn from(record: FieldRecord) -> Self {
        RecordBatch::One(record.to_loose())
    }
}

impl From<Vec<FieldRecord>> for RecordBatch {
    fn from(records: Vec<FieldRecord>) -> Self {
        RecordBatch::Many(records.iter().map(FieldRecord::to_loose).collect())
    }
}

impl RecordBatch {
    /// Coerce any mix of single records and lists into one flat sequence,
    /// preserving order.
    pub fn flatten(batches: impl IntoIterator<Item = RecordBatch>) -> Vec<LooseRecord> {
        let mut flat = Vec::new();
        for batch in batches {
            match batch {
                RecordBatch::Many(records) => flat.extend(records),
                RecordBatch::One(record) => flat.push(record),
            }
        }
        flat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_record_is_all_sentinel() {
        let r = FieldRecord::default();
        for f in Field::ALL {
            assert_eq!(r.get(f), NOT_AVAILABLE, "{f:?}");
        }
        assert_eq!(r.missing_fields().len(), Field::ALL.len());
    }

    #[test]
    fn serialises_with_labels_in_order() {
        let mut r = FieldRecord::default();
        r.set(Field::Name, "Jane Doe");
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.starts_with(r#"{"Name":"Jane Doe","Overall Score":"N/A""#), "{json}");
        assert!(json.ends_with(r#""Date of Issue":"N/A"}"#), "{json}");
    }

    #[test]
    fn deserialise_fills_missing_with_sentinel() {
        let r: FieldRecord = serde_json::from_str(r#"{"Name": "Ali"}"#).unwrap();
        assert_eq!(r.name, "Ali");
        assert_eq!(r.date_of_issue, NOT_AVAILABLE);
    }

    #[test]
    fn batch_accepts_object_or_array() {
        let one: RecordBatch = serde_json::from_str(r#"{"Name": "A"}"#).unwrap();
        assert!(matches!(one, RecordBatch::One(_)));
        let many: RecordBatch = serde_json::from_str(r#"[{"Name": "A"}, {"Name": "B"}]"#).unwrap();
        assert!(matches!(many, RecordBatch::Many(ref v) if v.len() == 2));
    }

    #[test]
    fn flatten_preserves_order() {
        let a: RecordBatch = serde_json::from_str(r#"{"Name": "A"}"#).unwrap();
        let bc: RecordBatch = serde_json::from_str(r#"[{"Name": "B"}, {"Name": "C"}]"#).unwrap();
        let d: RecordBatch = serde_json::from_str(r#"{"Name": "D"}"#).unwrap();
        let flat = RecordBatch::flatten(vec![a, bc, d]);
        let names: Vec<_> = flat.iter().map(|r| r["Name"].as_str().unwrap()).collect();
        assert_eq!(names, ["A", "B", "C", "D"]);
    }
}
