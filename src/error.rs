//! Error types for the scan2table library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`PipelineError`]: **Fatal.** The run cannot continue (input missing,
//!   provider not configured, retry budget exhausted, an artifact could not
//!   be written). Returned as `Err(PipelineError)` from every entry point in
//!   [`crate::run`]. No output artifact is written once one of these occurs.
//!
//! * [`ExtractionFault`]: **Recoverable.** One remote call failed. The
//!   backoff driver in [`crate::pipeline::retry`] absorbs these until the
//!   retry budget runs out, at which point the last fault is folded into
//!   [`PipelineError::MaxRetriesExceeded`].
//!
//! Missing fields are not errors at all: the parser defaults them to
//! [`crate::record::NOT_AVAILABLE`] and the reconciler to an empty string.

use crate::pipeline::retry::Outcome;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the scan2table library.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// An input file or directory does not exist.
    #[error("Input not found: '{path}'\nCheck the path exists and is readable.")]
    InputNotFound { path: PathBuf },

    /// Reading or writing a file failed.
    #[error("I/O failure on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A scanned image could not be decoded or re-encoded.
    #[error("Could not decode image '{path}': {detail}")]
    ImageDecode { path: PathBuf, detail: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Every attempt for one section failed with a recoverable fault.
    #[error("Max retries exceeded: {attempts} attempts failed.\nLast error: {last_error}")]
    MaxRetriesExceeded { attempts: u32, last_error: String },

    /// The provider rejected the request in a way retrying cannot fix.
    #[error("Extraction rejected by provider: {detail}")]
    ExtractionRejected { detail: String },

    // ── Artifact errors ───────────────────────────────────────────────────
    /// The intermediate JSON artifact could not be read or written.
    #[error("JSON artifact '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The spreadsheet could not be written or read back.
    #[error("Spreadsheet '{path}': {detail}")]
    Spreadsheet { path: PathBuf, detail: String },

    /// The relational store rejected the load.
    #[error("Database '{path}': {source}")]
    Database {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }
}

/// A single failed call to the remote extraction service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionFault {
    /// HTTP 429, quota or "resource exhausted". Retried.
    #[error("rate limited: {detail}")]
    RateLimited { detail: String },

    /// Anything else that may clear up on its own (5xx, timeouts, resets). Retried.
    #[error("transient failure: {detail}")]
    Transient { detail: String },

    /// Authentication or permission failure. Not retried.
    #[error("fatal failure: {detail}")]
    Fatal { detail: String },
}

const RATE_LIMIT_MARKERS: &[&str] = &[
    "rate limit",
    "rate_limit",
    "ratelimit",
    "too many requests",
    "quota",
    "resource exhausted",
    "resource_exhausted",
    "resourceexhausted",
];

const FATAL_MARKERS: &[&str] = &[
    "unauthorized",
    "unauthorised",
    "authentication",
    "invalid api key",
    "invalid_api_key",
    "permission denied",
];

/// HTTP status codes only count as standalone tokens, never as digits
/// inside a duration or a token count.
static RATE_LIMIT_STATUS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b429\b").unwrap());
static FATAL_STATUS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b40[13]\b").unwrap());

impl ExtractionFault {
    /// Classify a provider error message.
    ///
    /// Rate-limit markers are checked first: a 429 that happens to mention
    /// "authentication" in its body is still a rate limit.
    pub fn classify(message: impl Into<String>) -> Self {
        let detail = message.into();
        let lower = detail.to_lowercase();
        let has = |markers: &[&str]| markers.iter().any(|m| lower.contains(m));
        if RATE_LIMIT_STATUS.is_match(&lower) || has(RATE_LIMIT_MARKERS) {
            ExtractionFault::RateLimited { detail }
        } else if FATAL_STATUS.is_match(&lower) || has(FATAL_MARKERS) {
            ExtractionFault::Fatal { detail }
        } else {
            ExtractionFault::Transient { detail }
        }
    }

    /// The retry-machine outcome this fault drives.
    pub fn outcome(&self) -> Outcome {
        match self {
            ExtractionFault::RateLimited { .. } | ExtractionFault::Transient { .. } => {
                Outcome::TransientFault
            }
            ExtractionFault::Fatal { .. } => Outcome::FatalFault,
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            ExtractionFault::RateLimited { detail }
            | ExtractionFault::Transient { detail }
            | ExtractionFault::Fatal { detail } => detail,
        }
    }
}
