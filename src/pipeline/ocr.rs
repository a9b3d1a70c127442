//! OCR: a folder of scans → one marked-up text transcript.
//!
//! Each image is transcribed by the configured vision model and appended to
//! the transcript under a marker line (see [`crate::pipeline::split`]). The
//! stage runs one image at a time, in file-name order, under the same
//! backoff policy as field extraction.

use crate::config::ExtractionConfig;
use crate::error::{ExtractionFault, PipelineError};
use crate::pipeline::encode::{encode_file, is_scan};
use crate::pipeline::extract::build_options;
use crate::pipeline::postprocess::clean_transcription;
use crate::pipeline::retry::{with_backoff, RetryError};
use crate::pipeline::split::marker_line;
use crate::prompts::OCR_SYSTEM_PROMPT;
use edgequake_llm::{ChatMessage, ImageData, LLMProvider};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One transcribed image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcription {
    pub file_name: String,
    pub text: String,
}

/// List the scans in `dir`, sorted by file name.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    if !dir.is_dir() {
        return Err(PipelineError::InputNotFound {
            path: dir.to_path_buf(),
        });
    }
    let entries = std::fs::read_dir(dir).map_err(|e| PipelineError::io(dir, e))?;

    let mut images = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| PipelineError::io(dir, e))?.path();
        if path.is_file() && is_scan(&path) {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

/// Render transcriptions in the marker format the splitter reads back.
pub fn render_transcript(transcriptions: &[Transcription]) -> String {
    let mut out = String::new();
    for t in transcriptions {
        out.push('\n');
        out.push_str(&marker_line(&t.file_name));
        out.push('\n');
        out.push_str(&t.text);
        out.push('\n');
    }
    out
}

/// Ask the vision model for a verbatim transcription of one image.
async fn transcribe_image(
    provider: &Arc<dyn LLMProvider>,
    image: ImageData,
    file_name: &str,
    config: &ExtractionConfig,
) -> Result<String, PipelineError> {
    let messages = vec![
        ChatMessage::system(OCR_SYSTEM_PROMPT),
        ChatMessage::user_with_images("", vec![image]),
    ];
    let options = build_options(config);
    let (messages, options) = (&messages, &options);

    let result = with_backoff(
        config.backoff_policy(),
        file_name,
        config.progress_callback.as_ref(),
        move |_| async move {
            provider
                .chat(messages, Some(options))
                .await
                .map(|r| r.content)
                .map_err(|e| ExtractionFault::classify(e.to_string()))
        },
    )
    .await;

    match result {
        Ok(text) => Ok(text),
        Err(RetryError::Exhausted { attempts, last }) => Err(PipelineError::MaxRetriesExceeded {
            attempts,
            last_error: last.map(|f| f.to_string()).unwrap_or_default(),
        }),
        Err(RetryError::Aborted(fault)) => Err(PipelineError::ExtractionRejected {
            detail: fault.detail().to_string(),
        }),
    }
}

/// Transcribe every scan in `images_dir`.
pub async fn transcribe_dir(
    provider: &Arc<dyn LLMProvider>,
    images_dir: &Path,
    config: &ExtractionConfig,
) -> Result<Vec<Transcription>, PipelineError> {
    let images = list_images(images_dir)?;
    let total = images.len();
    info!("Found {} scans in {}", total, images_dir.display());
    if total == 0 {
        warn!("No .png/.jpg/.jpeg files in {}", images_dir.display());
    }
    if let Some(cb) = config.progress_callback.as_ref() {
        cb.on_ocr_start(total);
    }

    let mut out = Vec::with_capacity(total);
    for (i, path) in images.iter().enumerate() {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let image = encode_file(path)?;
        let raw = transcribe_image(provider, image, &file_name, config).await?;
        let text = clean_transcription(&raw);
        debug!("{}: {} chars transcribed", file_name, text.len());

        if let Some(cb) = config.progress_callback.as_ref() {
            cb.on_image_complete(i + 1, total, &file_name, text.len());
        }
        out.push(Transcription { file_name, text });
    }
    Ok(out)
}

/// Transcribe `images_dir` and write the marked-up transcript to `text_path`.
///
/// The file is only written once every image has been transcribed.
pub async fn process_images(
    provider: &Arc<dyn LLMProvider>,
    images_dir: &Path,
    text_path: &Path,
    config: &ExtractionConfig,
) -> Result<usize, PipelineError> {
    let transcriptions = transcribe_dir(provider, images_dir, config).await?;
    let transcript = render_transcript(&transcriptions);

    if let Some(parent) = text_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| PipelineError::io(parent, e))?;
    }
    tokio::fs::write(text_path, transcript)
        .await
        .map_err(|e| PipelineError::io(text_path, e))?;

    info!("All text saved to {}", text_path.display());
    Ok(transcriptions.len())
}
