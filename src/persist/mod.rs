//! Artifact writers: the spreadsheet and the SQLite table.
//!
//! Both artifacts hold the same [`Table`]: same columns, same order, every
//! value as text.

pub mod database;
pub mod spreadsheet;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::table::Table;
use std::path::{Path, PathBuf};
use tracing::info;

/// Where a run wrote its tabular artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub spreadsheet: PathBuf,
    pub database: PathBuf,
}

/// Write `table` to the configured spreadsheet, then to the database.
///
/// Creates the output directory if needed. Both writers take the in-memory
/// table; a spreadsheet reader may drop trailing rows whose cells are all
/// empty, so the database is never loaded from the written workbook.
pub fn persist(table: &Table, config: &PipelineConfig) -> Result<ArtifactPaths, PipelineError> {
    std::fs::create_dir_all(&config.output_dir)
        .map_err(|e| PipelineError::io(&config.output_dir, e))?;

    let spreadsheet = config.spreadsheet_path();
    spreadsheet::write_table(table, &spreadsheet)?;
    info!("Saved spreadsheet to {}", spreadsheet.display());

    let database = config.database_path();
    database::write_table(table, &database, &config.table_name)?;
    info!(
        "Loaded {} rows into table {} in {}",
        table.len(),
        config.table_name,
        database.display()
    );

    Ok(ArtifactPaths {
        spreadsheet,
        database,
    })
}

/// Load an existing spreadsheet into `table_name`, replacing it.
///
/// Returns the loaded table.
pub fn load_spreadsheet(
    spreadsheet_path: &Path,
    db_path: &Path,
    table_name: &str,
) -> Result<Table, PipelineError> {
    let table = spreadsheet::read_table(spreadsheet_path)?;
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
    }
    database::write_table(&table, db_path, table_name)?;
    info!(
        "Loaded {} rows into table {} in {}",
        table.len(),
        table_name,
        db_path.display()
    );
    Ok(table)
}
