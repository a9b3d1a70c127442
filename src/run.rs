//! Eager (whole-run) entry points.
//!
//! Every function here runs to completion and returns a [`RunSummary`] or a
//! fatal [`PipelineError`]. Sections are processed one at a time in document
//! order. All remote calls finish before the first artifact is written,
//! so a run that fails during extraction leaves no JSON, spreadsheet or
//! database behind.
//!
//! | Function | Reads | Writes |
//! |----------|-------|--------|
//! | [`run`] | images | text, JSON, spreadsheet, database |
//! | [`run_from_text`] | text | JSON, spreadsheet, database |
//! | [`transcribe`] | images | text |
//! | [`extract_to_json`] | text | JSON |
//! | [`tabulate`] | JSON files | spreadsheet, database |
//! | [`crate::persist::load_spreadsheet`] | spreadsheet | database |

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::persist::{self, ArtifactPaths};
use crate::pipeline::extract::{ExtractionClient, LlmClient, ResilientExtractor};
use crate::pipeline::ocr;
use crate::pipeline::parse::parse_response;
use crate::pipeline::reconcile::reconcile;
use crate::pipeline::split::split_sections;
use crate::record::{FieldRecord, RecordBatch};
use crate::table::Table;
use edgequake_llm::{LLMProvider, ProviderFactory};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// What a run produced and where it put it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Sections extracted. `None` when records came from JSON files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sections: Option<usize>,
    /// Rows in the final table.
    pub rows: usize,
    /// Intermediate JSON artifact, when this run wrote one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_path: Option<PathBuf>,
    pub spreadsheet_path: PathBuf,
    pub database_path: PathBuf,
    pub table_name: String,
    pub duration_ms: u64,
}

/// Full pipeline: OCR the images, then extract, tabulate and persist.
///
/// # Example
/// ```rust,no_run
/// use scan2table::{run, PipelineConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// // Provider auto-detected from OPENAI_API_KEY / GEMINI_API_KEY / ...
/// let config = PipelineConfig::builder().images_dir("Images/English").build()?;
/// let summary = run(&config).await?;
/// println!("{} rows → {}", summary.rows, summary.database_path.display());
/// # Ok(())
/// # }
/// ```
pub async fn run(config: &PipelineConfig) -> Result<RunSummary, PipelineError> {
    config.validate()?;
    let provider = resolve_provider(config).await?;
    ocr::process_images(&provider, &config.images_dir, &config.text_path, &config.extraction)
        .await?;
    let corpus = read_corpus(&config.text_path).await?;
    process_corpus(&corpus, &extractor_for(provider, config), config).await
}

/// Start from an existing text artifact at `config.text_path`.
pub async fn run_from_text(config: &PipelineConfig) -> Result<RunSummary, PipelineError> {
    config.validate()?;
    let corpus = read_corpus(&config.text_path).await?;
    let provider = resolve_provider(config).await?;
    process_corpus(&corpus, &extractor_for(provider, config), config).await
}

/// OCR only: images → text artifact. Returns the number of images.
pub async fn transcribe(config: &PipelineConfig) -> Result<usize, PipelineError> {
    config.validate()?;
    let provider = resolve_provider(config).await?;
    ocr::process_images(&provider, &config.images_dir, &config.text_path, &config.extraction)
        .await
}

/// Extraction only: text artifact → JSON artifact. Returns the records.
pub async fn extract_to_json(config: &PipelineConfig) -> Result<Vec<FieldRecord>, PipelineError> {
    config.validate()?;
    let corpus = read_corpus(&config.text_path).await?;
    let provider = resolve_provider(config).await?;
    let records = extract_records(&corpus, &extractor_for(provider, config)).await?;
    write_records_json(&config.json_path, &records).await?;
    Ok(records)
}

/// Split, extract, parse, write JSON, reconcile and persist one corpus.
///
/// Generic over the client so tests can drive the whole pipeline offline.
pub async fn process_corpus<C: ExtractionClient>(
    corpus: &str,
    extractor: &ResilientExtractor<C>,
    config: &PipelineConfig,
) -> Result<RunSummary, PipelineError> {
    let start = Instant::now();
    config.validate()?;

    let records = extract_records(corpus, extractor).await?;
    let sections = records.len();
    write_records_json(&config.json_path, &records).await?;

    let table = reconcile([RecordBatch::from(records)]);
    let paths = persist_blocking(table.clone(), config).await?;

    let summary = RunSummary {
        sections: Some(sections),
        rows: table.len(),
        json_path: Some(config.json_path.clone()),
        spreadsheet_path: paths.spreadsheet,
        database_path: paths.database,
        table_name: config.table_name.clone(),
        duration_ms: start.elapsed().as_millis() as u64,
    };
    info!(
        "Run complete: {} sections, {} rows, {}ms",
        sections, summary.rows, summary.duration_ms
    );
    Ok(summary)
}

/// Combine JSON artifacts (each an array of records or a single record)
/// into the spreadsheet and the database.
pub async fn tabulate(
    json_paths: &[PathBuf],
    config: &PipelineConfig,
) -> Result<RunSummary, PipelineError> {
    let start = Instant::now();
    config.validate()?;

    let batches = read_record_batches(json_paths).await?;
    let table = reconcile(batches);
    info!(
        "Combined {} JSON files into {} rows",
        json_paths.len(),
        table.len()
    );
    let paths = persist_blocking(table.clone(), config).await?;

    Ok(RunSummary {
        sections: None,
        rows: table.len(),
        json_path: None,
        spreadsheet_path: paths.spreadsheet,
        database_path: paths.database,
        table_name: config.table_name.clone(),
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

/// Synchronous wrapper around [`run`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_sync(config: &PipelineConfig) -> Result<RunSummary, PipelineError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PipelineError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run(config))
}

/// Extract one [`FieldRecord`] per section of `corpus`, in encounter order.
///
/// Stops at the first section whose extraction fails; nothing is returned
/// for the sections before it.
pub async fn extract_records<C: ExtractionClient>(
    corpus: &str,
    extractor: &ResilientExtractor<C>,
) -> Result<Vec<FieldRecord>, PipelineError> {
    let progress = extractor.config().progress_callback.as_ref();
    let total = split_sections(corpus).count();
    if total == 0 {
        warn!("No sections found; the table will only have a header row");
    }
    info!("Extracting fields from {} sections", total);
    if let Some(cb) = progress {
        cb.on_extraction_start(total);
    }

    let mut records = Vec::with_capacity(total);
    for section in split_sections(corpus) {
        if let Some(cb) = progress {
            cb.on_section_start(section.index, total);
        }
        debug!("Processing {} ({}/{})", section.label(), section.index, total);

        let raw = match extractor.extract(&section.text()).await {
            Ok(raw) => raw,
            Err(e) => {
                error!("Extraction failed for {}: {}", section.label(), e);
                return Err(e);
            }
        };
        let record = parse_response(&raw);
        let missing = record.missing_fields();
        if !missing.is_empty() {
            debug!("{}: no value for {:?}", section.label(), missing);
        }
        records.push(record);

        if let Some(cb) = progress {
            cb.on_section_complete(section.index, total);
        }
    }

    if let Some(cb) = progress {
        cb.on_extraction_complete(total);
    }
    Ok(records)
}

/// Write records as a pretty-printed JSON array, creating the parent folder.
pub async fn write_records_json(path: &Path, records: &[FieldRecord]) -> Result<(), PipelineError> {
    let json = serde_json::to_string_pretty(records).map_err(|e| PipelineError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| PipelineError::io(parent, e))?;
    }
    tokio::fs::write(path, json)
        .await
        .map_err(|e| PipelineError::io(path, e))?;
    info!("Saved {} records to {}", records.len(), path.display());
    Ok(())
}

/// Read JSON artifacts, each either an array of records or a single record.
pub async fn read_record_batches(paths: &[PathBuf]) -> Result<Vec<RecordBatch>, PipelineError> {
    let mut batches = Vec::with_capacity(paths.len());
    for path in paths {
        if !path.exists() {
            return Err(PipelineError::InputNotFound { path: path.clone() });
        }
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| PipelineError::io(path, e))?;
        let batch: RecordBatch = serde_json::from_str(&text).map_err(|e| PipelineError::Json {
            path: path.clone(),
            source: e,
        })?;
        debug!("Read {}", path.display());
        batches.push(batch);
    }
    Ok(batches)
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn read_corpus(path: &Path) -> Result<String, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::InputNotFound {
            path: path.to_path_buf(),
        });
    }
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| PipelineError::io(path, e))
}

fn extractor_for(
    provider: Arc<dyn LLMProvider>,
    config: &PipelineConfig,
) -> ResilientExtractor<LlmClient> {
    let client = LlmClient::new(provider, &config.extraction);
    ResilientExtractor::new(client, config.extraction.clone())
}

/// SQLite and the xlsx writer are blocking; keep them off the runtime threads.
async fn persist_blocking(
    table: Table,
    config: &PipelineConfig,
) -> Result<ArtifactPaths, PipelineError> {
    let config = config.clone();
    tokio::task::spawn_blocking(move || persist::persist(&table, &config))
        .await
        .map_err(|e| PipelineError::Internal(format!("persist task panicked: {e}")))?
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, PipelineError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        PipelineError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. pre-built `extraction.provider`
/// 2. `extraction.provider_name` + model
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, both set
/// 4. `OPENAI_API_KEY` present → OpenAI
/// 5. `ProviderFactory::from_env` auto-detection
pub async fn resolve_provider(config: &PipelineConfig) -> Result<Arc<dyn LLMProvider>, PipelineError> {
    let extraction = &config.extraction;
    let model = extraction
        .model
        .as_deref()
        .unwrap_or(crate::config::DEFAULT_MODEL);

    if let Some(ref provider) = extraction.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = extraction.provider_name {
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_provider(&prov, &env_model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| PipelineError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, GEMINI_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;
    Ok(llm_provider)
}
