//! The rectangular table handed to persistence.

use serde::{Deserialize, Serialize};

/// An ordered set of rows sharing one ordered column set.
///
/// Every row has exactly one value per column; [`Table::new`] pads short rows
/// with empty strings and truncates long ones, so the invariant holds for any
/// input. The table is not mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawTable")]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

#[derive(Deserialize)]
struct RawTable {
    columns: Vec<String>,
    #[serde(default)]
    rows: Vec<Vec<String>>,
}

impl From<RawTable> for Table {
    fn from(raw: RawTable) -> Self {
        Table::new(raw.columns, raw.rows)
    }
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value at `row` under the named column.
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row).map(|r| r[col].as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn short_and_long_rows_are_normalised() {
        let t = Table::new(
            cols(&["A", "B"]),
            vec![vec!["1".into()], vec!["x".into(), "y".into(), "z".into()]],
        );
        assert_eq!(t.rows()[0], vec!["1".to_string(), String::new()]);
        assert_eq!(t.rows()[1].len(), 2);
        assert_eq!(t.get(1, "B"), Some("y"));
        assert_eq!(t.get(0, "C"), None);
    }

    #[test]
    fn deserialized_rows_are_normalised() {
        let t: Table = serde_json::from_str(
            r#"{"columns": ["A", "B"], "rows": [["1"], ["x", "y", "z"], []]}"#,
        )
        .unwrap();
        assert_eq!(t, Table::new(
            cols(&["A", "B"]),
            vec![vec!["1".into()], vec!["x".into(), "y".into()], Vec::new()],
        ));
        assert!(t.rows().iter().all(|r| r.len() == 2));
        assert_eq!(t.get(2, "A"), Some(""));

        let back: Table = serde_json::from_str(&serde_json::to_string(&t).unwrap()).unwrap();
        assert_eq!(back, t);
    }
}
