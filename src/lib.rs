//! # scan2table
//!
//! Turn a folder of scanned score certificates into one normalised table,
//! saved as a spreadsheet and as a SQLite table.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Images/English/*.png|jpg
//!  │
//!  ├─ 1. OCR        vision model transcribes each scan → Output/Txt/Final.txt
//!  ├─ 2. Split      marker lines cut the transcript into sections
//!  ├─ 3. Extract    one LLM call per section, exponential backoff on faults
//!  ├─ 4. Parse      `Label: value` lines → FieldRecord ("N/A" when absent)
//!  ├─ 5. JSON       records → Output/Json/Final.json
//!  ├─ 6. Reconcile  any mix of records → fixed 7-column table
//!  └─ 7. Persist    → combined_json_data.xlsx → output_database.db (ocr_data)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scan2table::{run, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / GEMINI_API_KEY / ...
//!     let config = PipelineConfig::default();
//!     let summary = run(&config).await?;
//!     eprintln!("{} rows written to {}", summary.rows, summary.spreadsheet_path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Offline use
//!
//! [`process_corpus`] is generic over [`ExtractionClient`], so the whole
//! pipeline after OCR can be driven by any client, including a scripted one.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `scan2table` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! scan2table = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod persist;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod record;
pub mod run;
pub mod table;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, PipelineConfig, PipelineConfigBuilder};
pub use error::{ExtractionFault, PipelineError};
pub use persist::{load_spreadsheet, ArtifactPaths};
pub use pipeline::extract::{ExtractionClient, LlmClient, ResilientExtractor};
pub use pipeline::retry::BackoffPolicy;
pub use progress::{NoopProgressCallback, PipelineProgress, ProgressCallback};
pub use record::{Field, FieldRecord, RecordBatch, NOT_AVAILABLE};
pub use run::{
    extract_to_json, process_corpus, resolve_provider, run, run_from_text, run_sync, tabulate,
    transcribe, RunSummary,
};
pub use table::Table;
