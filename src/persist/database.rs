//! SQLite artifact: the table replaced wholesale on every run.
//!
//! Every column is stored as `TEXT`. Drop, create and insert happen in one
//! transaction, so readers see either the previous table or the new one.

use crate::error::PipelineError;
use crate::table::Table;
use rusqlite::{params_from_iter, Connection};
use std::path::Path;
use tracing::debug;

/// Quote an identifier for SQLite (`"` doubled inside).
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn create_sql(table: &Table, table_name: &str) -> String {
    let columns: Vec<String> = table
        .columns()
        .iter()
        .map(|c| format!("{} TEXT", quote_ident(c)))
        .collect();
    format!("CREATE TABLE {} ({})", quote_ident(table_name), columns.join(", "))
}

fn insert_sql(table: &Table, table_name: &str) -> String {
    let names: Vec<String> = table.columns().iter().map(|c| quote_ident(c)).collect();
    let params: Vec<String> = (1..=names.len()).map(|i| format!("?{i}")).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table_name),
        names.join(", "),
        params.join(", ")
    )
}

/// Replace `table_name` in the database at `db_path` with `table`.
///
/// The database file is created if it does not exist. Other tables in the
/// same file are left alone.
pub fn write_table(table: &Table, db_path: &Path, table_name: &str) -> Result<(), PipelineError> {
    let db_err = |source| PipelineError::Database {
        path: db_path.to_path_buf(),
        source,
    };

    let mut conn = Connection::open(db_path).map_err(db_err)?;
    let tx = conn.transaction().map_err(db_err)?;

    tx.execute(&format!("DROP TABLE IF EXISTS {}", quote_ident(table_name)), [])
        .map_err(db_err)?;
    tx.execute(&create_sql(table, table_name), []).map_err(db_err)?;
    {
        let mut stmt = tx.prepare(&insert_sql(table, table_name)).map_err(db_err)?;
        for row in table.rows() {
            stmt.execute(params_from_iter(row.iter())).map_err(db_err)?;
        }
    }
    tx.commit().map_err(db_err)?;

    debug!(
        "Replaced table {} in {} ({} rows)",
        table_name,
        db_path.display(),
        table.len()
    );
    Ok(())
}

/// Read `table_name` back, columns in declaration order, NULLs as empty text.
pub fn read_table(db_path: &Path, table_name: &str) -> Result<Table, PipelineError> {
    let db_err = |source| PipelineError::Database {
        path: db_path.to_path_buf(),
        source,
    };
    if !db_path.exists() {
        return Err(PipelineError::InputNotFound {
            path: db_path.to_path_buf(),
        });
    }

    let conn = Connection::open(db_path).map_err(db_err)?;
    let mut stmt = conn
        .prepare(&format!("SELECT * FROM {} ORDER BY rowid", quote_ident(table_name)))
        .map_err(db_err)?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let width = columns.len();

    let rows = stmt
        .query_map([], |row| {
            (0..width)
                .map(|i| row.get::<_, Option<String>>(i).map(Option::unwrap_or_default))
                .collect::<Result<Vec<String>, _>>()
        })
        .map_err(db_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(db_err)?;

    Ok(Table::new(columns, rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[&[&str]]) -> Table {
        Table::new(
            vec!["Name".into(), "Overall Score".into(), "Date of Examination".into()],
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn round_trip_keeps_order_and_text() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("out.db");
        let t = table(&[&["Jane", "7.5", "12/03/2022"], &["Ali", "N/A", ""]]);
        write_table(&t, &db, "ocr_data").unwrap();
        assert_eq!(read_table(&db, "ocr_data").unwrap(), t);
    }

    #[test]
    fn columns_are_declared_text() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("out.db");
        write_table(&table(&[&["A", "7", "x"]]), &db, "ocr_data").unwrap();

        let conn = Connection::open(&db).unwrap();
        let mut stmt = conn.prepare("SELECT type FROM pragma_table_info('ocr_data')").unwrap();
        let types: Vec<String> = stmt
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(types, ["TEXT", "TEXT", "TEXT"]);

        let kind: String = conn
            .query_row("SELECT typeof(\"Overall Score\") FROM ocr_data", [], |r| r.get(0))
            .unwrap();
        assert_eq!(kind, "text");
    }

    #[test]
    fn second_write_replaces_rows() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("out.db");
        write_table(&table(&[&["A", "1", ""], &["B", "2", ""]]), &db, "ocr_data").unwrap();
        write_table(&table(&[&["C", "3", ""]]), &db, "ocr_data").unwrap();

        let back = read_table(&db, "ocr_data").unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back.get(0, "Name"), Some("C"));
    }

    #[test]
    fn other_tables_survive() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("out.db");
        write_table(&table(&[&["A", "1", ""]]), &db, "first").unwrap();
        write_table(&table(&[&["B", "2", ""]]), &db, "second").unwrap();
        assert_eq!(read_table(&db, "first").unwrap().get(0, "Name"), Some("A"));
    }

    #[test]
    fn awkward_names_are_quoted() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("out.db");
        let t = Table::new(
            vec!["say \"hi\"".into(), "select".into()],
            vec![vec!["x".into(), "y".into()]],
        );
        write_table(&t, &db, "my table").unwrap();
        assert_eq!(read_table(&db, "my table").unwrap(), t);
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn all_empty_rows_are_stored() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("out.db");
        let t = table(&[&["A", "1", ""], &["", "", ""], &[]]);
        write_table(&t, &db, "ocr_data").unwrap();

        let back = read_table(&db, "ocr_data").unwrap();
        assert_eq!(back.len(), 3);
        assert_eq!(back, t);
    }

    #[test]
    fn header_only_table_creates_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("out.db");
        write_table(&table(&[]), &db, "ocr_data").unwrap();
        let back = read_table(&db, "ocr_data").unwrap();
        assert!(back.is_empty());
        assert_eq!(back.columns().len(), 3);
    }
}
