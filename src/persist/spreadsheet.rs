//! Spreadsheet artifact: one sheet, header row, string cells, no index column.
//!
//! Writes go to a temp file next to the target and are renamed into place;
//! the previous workbook stays intact until the new one is complete.

use crate::error::PipelineError;
use crate::table::Table;
use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::Workbook;
use std::path::Path;
use tracing::debug;

fn sheet_err(path: &Path, detail: impl ToString) -> PipelineError {
    PipelineError::Spreadsheet {
        path: path.to_path_buf(),
        detail: detail.to_string(),
    }
}

/// Write `table` to an `.xlsx` file, replacing any existing file.
pub fn write_table(table: &Table, path: &Path) -> Result<(), PipelineError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Sheet1").map_err(|e| sheet_err(path, e))?;

    for (col, name) in table.columns().iter().enumerate() {
        sheet
            .write_string(0, col as u16, name)
            .map_err(|e| sheet_err(path, e))?;
    }
    for (r, row) in table.rows().iter().enumerate() {
        for (col, value) in row.iter().enumerate() {
            sheet
                .write_string(r as u32 + 1, col as u16, value)
                .map_err(|e| sheet_err(path, e))?;
        }
    }

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let tmp = tempfile::Builder::new()
        .suffix(".xlsx")
        .tempfile_in(dir)
        .map_err(|e| PipelineError::io(dir, e))?;
    workbook.save(tmp.path()).map_err(|e| sheet_err(path, e))?;
    tmp.persist(path)
        .map_err(|e| PipelineError::io(path, e.error))?;

    debug!("Wrote {} rows to {}", table.len(), path.display());
    Ok(())
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Read the first sheet of a workbook back into a table.
///
/// The first row is the header; empty cells become empty strings.
pub fn read_table(path: &Path) -> Result<Table, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::InputNotFound {
            path: path.to_path_buf(),
        });
    }
    let mut workbook = open_workbook_auto(path).map_err(|e| sheet_err(path, e))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| sheet_err(path, "workbook has no sheets"))?
        .map_err(|e| sheet_err(path, e))?;

    let mut rows = range.rows();
    let columns: Vec<String> = match rows.next() {
        Some(header) => header.iter().map(cell_text).collect(),
        None => return Ok(Table::new(Vec::new(), Vec::new())),
    };
    let body = rows.map(|r| r.iter().map(cell_text).collect()).collect();
    Ok(Table::new(columns, body))
}
