//! Schema reconciliation: heterogeneous records → one rectangular [`Table`].
//!
//! Records reach this stage from the parser (always complete) or from JSON
//! artifacts on disk (possibly hand-edited, possibly produced by an older
//! run with different keys). Reconciliation never fails on shape: it maps
//! whatever keys it finds onto the fixed [`EXPORT_SCHEMA`], fills gaps with
//! an empty string, and drops everything else.
//!
//! ## Column mapping
//!
//! The export schema shortens the per-skill labels (`Reading Score` →
//! `Reading`). Each export column lists the record keys it accepts, in
//! priority order; the first key present in a record supplies the value.
//! The export name itself is always the last fallback, so a JSON file
//! already in export shape reconciles to itself.

use crate::record::{LooseRecord, RecordBatch};
use crate::table::Table;
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::debug;

/// One column of the export schema and the record keys feeding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportColumn {
    pub name: &'static str,
    pub sources: &'static [&'static str],
}

/// Fixed column set and order of the spreadsheet and the SQL table.
pub const EXPORT_SCHEMA: [ExportColumn; 7] = [
    ExportColumn { name: "Name", sources: &["Name"] },
    ExportColumn { name: "Overall Score", sources: &["Overall Score"] },
    ExportColumn { name: "Reading", sources: &["Reading Score", "Reading"] },
    ExportColumn { name: "Writing", sources: &["Writing Score", "Writing"] },
    ExportColumn { name: "Listening", sources: &["Listening Score", "Listening"] },
    ExportColumn { name: "Speaking", sources: &["Speaking Score", "Speaking"] },
    ExportColumn { name: "Date of Examination", sources: &["Date of Examination"] },
];

/// Export column names in order.
pub fn export_columns() -> Vec<String> {
    EXPORT_SCHEMA.iter().map(|c| c.name.to_string()).collect()
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn project(record: &LooseRecord) -> Vec<String> {
    EXPORT_SCHEMA
        .iter()
        .map(|col| {
            col.sources
                .iter()
                .find_map(|key| record.get(*key))
                .map(cell_text)
                .unwrap_or_default()
        })
        .collect()
}

/// Reconcile any mix of single records and record lists into a table.
pub fn reconcile(batches: impl IntoIterator<Item = RecordBatch>) -> Table {
    reconcile_flat(&RecordBatch::flatten(batches))
}

/// Reconcile an already-flat sequence of records.
pub fn reconcile_flat(records: &[LooseRecord]) -> Table {
    let observed: BTreeSet<&str> = records
        .iter()
        .flat_map(|r| r.keys().map(String::as_str))
        .collect();
    let dropped: Vec<&str> = observed
        .iter()
        .copied()
        .filter(|k| !EXPORT_SCHEMA.iter().any(|c| c.sources.contains(k)))
        .collect();
    let absent: Vec<&str> = EXPORT_SCHEMA
        .iter()
        .filter(|c| !c.sources.iter().any(|s| observed.contains(s)))
        .map(|c| c.name)
        .collect();
    if !dropped.is_empty() {
        debug!("Dropping columns outside the export schema: {:?}", dropped);
    }
    if !absent.is_empty() {
        debug!("Export columns absent from every record: {:?}", absent);
    }

    let rows = records.iter().map(project).collect();
    Table::new(export_columns(), rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::parse::parse_response;
    use crate::record::FieldRecord;
    use serde_json::json;

    fn loose(v: Value) -> LooseRecord {
        match v {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn columns_are_exactly_the_export_schema() {
        let t = reconcile(vec![RecordBatch::One(loose(json!({"Extra": "x"})))]);
        assert_eq!(
            t.columns(),
            ["Name", "Overall Score", "Reading", "Writing", "Listening", "Speaking", "Date of Examination"]
        );
        assert_eq!(t.rows()[0], vec![String::new(); 7]);
    }

    #[test]
    fn field_records_map_onto_short_names() {
        let record = parse_response("Name: Jane Doe\nOverall Score: 7.5\nReading Score: 7.0\n");
        let t = reconcile(vec![RecordBatch::from(vec![record])]);
        assert_eq!(t.len(), 1);
        assert_eq!(t.get(0, "Name"), Some("Jane Doe"));
        assert_eq!(t.get(0, "Overall Score"), Some("7.5"));
        assert_eq!(t.get(0, "Reading"), Some("7.0"));
        assert_eq!(t.get(0, "Writing"), Some("N/A"));
        assert_eq!(t.get(0, "Date of Examination"), Some("N/A"));
        // Date of Issue has no export column.
        assert_eq!(t.get(0, "Date of Issue"), None);
    }

    #[test]
    fn export_shaped_records_reconcile_to_themselves() {
        let t = reconcile(vec![RecordBatch::One(loose(json!({
            "Name": "A", "Reading": "6", "Writing": "5.5"
        })))]);
        assert_eq!(t.get(0, "Reading"), Some("6"));
        assert_eq!(t.get(0, "Writing"), Some("5.5"));
        assert_eq!(t.get(0, "Speaking"), Some(""));
    }

    #[test]
    fn long_label_wins_over_short_label() {
        let t = reconcile_flat(&[loose(json!({"Reading": "short", "Reading Score": "long"}))]);
        assert_eq!(t.get(0, "Reading"), Some("long"));
    }

    #[test]
    fn non_string_values_are_stringified() {
        let t = reconcile_flat(&[loose(json!({"Overall Score": 7.5, "Name": null}))]);
        assert_eq!(t.get(0, "Overall Score"), Some("7.5"));
        assert_eq!(t.get(0, "Name"), Some(""));
    }

    #[test]
    fn mixed_batches_keep_encounter_order() {
        let t = reconcile(vec![
            RecordBatch::One(loose(json!({"Name": "A"}))),
            RecordBatch::Many(vec![loose(json!({"Name": "B"})), loose(json!({"Name": "C"}))]),
        ]);
        let names: Vec<_> = (0..t.len()).map(|i| t.get(i, "Name").unwrap()).collect();
        assert_eq!(names, ["A", "B", "C"]);
    }

    #[test]
    fn reconcile_is_idempotent() {
        let records = vec![
            FieldRecord::default().to_loose(),
            loose(json!({"Name": "B", "Unknown": 1})),
        ];
        assert_eq!(reconcile_flat(&records), reconcile_flat(&records));
    }

    #[test]
    fn empty_input_gives_header_only_table() {
        let t = reconcile(Vec::new());
        assert!(t.is_empty());
        assert_eq!(t.columns().len(), EXPORT_SCHEMA.len());
    }
}
