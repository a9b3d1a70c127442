//! Configuration types for a scan-to-table run.
//!
//! Two structs, one per concern:
//!
//! * [`ExtractionConfig`]: everything the remote extraction call needs:
//!   provider, model, retry policy, prompt. It is handed to
//!   [`crate::pipeline::extract::ResilientExtractor::new`] explicitly; there
//!   is no process-wide client or credential.
//! * [`PipelineConfig`]: the artifact paths and table name, plus the nested
//!   extraction config. Built via [`PipelineConfig::builder()`].

use crate::error::PipelineError;
use crate::pipeline::retry::BackoffPolicy;
use crate::progress::ProgressCallback;
use crate::prompts::INPUT_PLACEHOLDER;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Model used when a provider is named without a model.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Configuration for the remote extraction (and OCR) calls.
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Attempts per section before giving up. Default: 5. Never below 1.
    pub retries: u32,

    /// Wait after the first failure; doubles after every further failure. Default: 10 s.
    ///
    /// Free-tier Gemini and OpenAI quotas reset on the order of a minute, so
    /// the default sequence (10 → 20 → 40 → 80 → 160 s) rides out a full
    /// quota window before giving up.
    pub initial_delay: Duration,

    /// LLM model identifier. If None, uses [`DEFAULT_MODEL`] or the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "gemini", "ollama").
    /// If None along with `provider`, the provider is auto-detected.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.0 (extraction wants determinism).
    pub temperature: f32,

    /// Maximum tokens per response. Default: 1024.
    pub max_tokens: usize,

    /// Custom instruction template containing `{input_text}`. If None, uses
    /// [`crate::prompts::EXTRACTION_PROMPT`].
    pub prompt_template: Option<String>,

    /// Receives retry events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        let policy = BackoffPolicy::default();
        Self {
            retries: policy.retries,
            initial_delay: policy.initial_delay,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 1024,
            prompt_template: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("retries", &self.retries)
            .field("initial_delay", &self.initial_delay)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("prompt_template", &self.prompt_template.as_ref().map(|t| t.len()))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn PipelineProgress>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(self.retries, self.initial_delay)
    }

    pub(crate) fn validate(&self) -> Result<(), PipelineError> {
        if self.retries == 0 {
            return Err(PipelineError::InvalidConfig(
                "retries must be ≥ 1".into(),
            ));
        }
        if let Some(ref t) = self.prompt_template {
            if !t.contains(INPUT_PLACEHOLDER) {
                return Err(PipelineError::InvalidConfig(format!(
                    "prompt template must contain the {INPUT_PLACEHOLDER} placeholder"
                )));
            }
        }
        Ok(())
    }
}

/// Artifact locations and the extraction settings for one run.
///
/// # Example
/// ```rust
/// use scan2table::PipelineConfig;
/// use std::time::Duration;
///
/// let config = PipelineConfig::builder()
///     .images_dir("scans")
///     .output_dir("out")
///     .table_name("results")
///     .retries(3)
///     .initial_delay(Duration::from_secs(2))
///     .build()
///     .unwrap();
/// assert_eq!(config.database_path().to_str(), Some("out/output_database.db"));
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Folder of scanned images. Default: `Images/English`.
    pub images_dir: PathBuf,

    /// Concatenated OCR text with section markers. Default: `Output/Txt/Final.txt`.
    pub text_path: PathBuf,

    /// Intermediate JSON array of records. Default: `Output/Json/Final.json`.
    pub json_path: PathBuf,

    /// Folder receiving the spreadsheet and the database. Default: `Output/Data`.
    pub output_dir: PathBuf,

    /// Relational table name. Default: `ocr_data`.
    pub table_name: String,

    /// Spreadsheet file name inside `output_dir`. Default: `combined_json_data.xlsx`.
    pub spreadsheet_file: String,

    /// Database file name inside `output_dir`. Default: `output_database.db`.
    pub database_file: String,

    pub extraction: ExtractionConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            images_dir: PathBuf::from("Images/English"),
            text_path: PathBuf::from("Output/Txt/Final.txt"),
            json_path: PathBuf::from("Output/Json/Final.json"),
            output_dir: PathBuf::from("Output/Data"),
            table_name: "ocr_data".to_string(),
            spreadsheet_file: "combined_json_data.xlsx".to_string(),
            database_file: "output_database.db".to_string(),
            extraction: ExtractionConfig::default(),
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("images_dir", &self.images_dir)
            .field("text_path", &self.text_path)
            .field("json_path", &self.json_path)
            .field("output_dir", &self.output_dir)
            .field("table_name", &self.table_name)
            .field("spreadsheet_file", &self.spreadsheet_file)
            .field("database_file", &self.database_file)
            .field("extraction", &self.extraction)
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn spreadsheet_path(&self) -> PathBuf {
        self.output_dir.join(&self.spreadsheet_file)
    }

    pub fn database_path(&self) -> PathBuf {
        self.output_dir.join(&self.database_file)
    }

    /// Checked by [`PipelineConfigBuilder::build`] and again by every entry
    /// point, since the fields are public.
    pub(crate) fn validate(&self) -> Result<(), PipelineError> {
        if self.table_name.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "table name must not be empty".into(),
            ));
        }
        if self.spreadsheet_file.trim().is_empty() || self.database_file.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "artifact file names must not be empty".into(),
            ));
        }
        self.extraction.validate()
    }
}

/// Builder for [`PipelineConfig`].
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl fmt::Debug for PipelineConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.config, f)
    }
}

impl PipelineConfigBuilder {
    pub fn images_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.config.images_dir = path.as_ref().to_path_buf();
        self
    }

    pub fn text_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config.text_path = path.as_ref().to_path_buf();
        self
    }

    pub fn json_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config.json_path = path.as_ref().to_path_buf();
        self
    }

    pub fn output_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.config.output_dir = path.as_ref().to_path_buf();
        self
    }

    pub fn table_name(mut self, name: impl Into<String>) -> Self {
        self.config.table_name = name.into();
        self
    }

    pub fn spreadsheet_file(mut self, name: impl Into<String>) -> Self {
        self.config.spreadsheet_file = name.into();
        self
    }

    pub fn database_file(mut self, name: impl Into<String>) -> Self {
        self.config.database_file = name.into();
        self
    }

    pub fn extraction(mut self, extraction: ExtractionConfig) -> Self {
        self.config.extraction = extraction;
        self
    }

    pub fn retries(mut self, n: u32) -> Self {
        self.config.extraction.retries = n.max(1);
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.config.extraction.initial_delay = delay;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.extraction.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.extraction.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.extraction.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.extraction.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.extraction.max_tokens = n;
        self
    }

    pub fn prompt_template(mut self, template: impl Into<String>) -> Self {
        self.config.extraction.prompt_template = Some(template.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.extraction.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_layout() {
        let c = PipelineConfig::default();
        assert_eq!(c.table_name, "ocr_data");
        assert_eq!(c.extraction.retries, 5);
        assert_eq!(c.extraction.initial_delay, Duration::from_secs(10));
        assert_eq!(c.spreadsheet_path(), PathBuf::from("Output/Data/combined_json_data.xlsx"));
        assert_eq!(c.database_path(), PathBuf::from("Output/Data/output_database.db"));
    }

    #[test]
    fn builder_clamps_retries_and_temperature() {
        let c = PipelineConfig::builder()
            .retries(0)
            .temperature(9.0)
            .build()
            .unwrap();
        assert_eq!(c.extraction.retries, 1);
        assert_eq!(c.extraction.temperature, 2.0);
    }

    #[test]
    fn empty_table_name_rejected() {
        let err = PipelineConfig::builder().table_name("  ").build().unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }

    #[test]
    fn template_without_placeholder_rejected() {
        let err = PipelineConfig::builder()
            .prompt_template("Extract the name.")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("{input_text}"), "{err}");
    }

    #[test]
    fn debug_hides_provider() {
        let c = PipelineConfig::default();
        let dbg = format!("{c:?}");
        assert!(dbg.contains("ocr_data"));
        assert!(dbg.contains("retries: 5"));
    }
}
