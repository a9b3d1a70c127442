//! Prompts for the OCR and field-extraction stages.
//!
//! Centralising every prompt here means changing what the model is asked to
//! do never touches retry or parsing code, and unit tests can inspect the
//! prompts without a live provider.
//!
//! Callers can override the extraction template via
//! [`crate::config::ExtractionConfig::prompt_template`]; the constants here
//! are used only when no override is provided.

/// Placeholder substituted with a section's text.
pub const INPUT_PLACEHOLDER: &str = "{input_text}";

/// Default instruction template for extracting certificate fields.
///
/// The field labels listed here must stay in sync with
/// [`crate::record::Field::label`]: the parser looks for exactly these.
pub const EXTRACTION_PROMPT: &str = r#"Extract the following information from the text provided:
- Name
- Overall Score
- Reading Score
- Writing Score
- Listening Score
- Speaking Score
- Date of Examination
- Date of Issue

Please handle potential misspellings, such as:
- "Writing" may be spelled as "riting" or similar variations.
- "Reading" may appear as "reding" or other variations.
- "Listening" may appear as "listning" or other variations.
- "Speaking" may appear as "spaking" or other variations.

If you find a combined value for Reading and Writing, please apply the same score to both fields.

Ignore any occurrences of "Use of English" and its associated score. Do not include it in the final extracted data.

Most of the scores for Reading, Writing, Listening, and Speaking might be sequential and listed one under the other. Use this pattern to help locate and extract the values correctly.

If any data is not available in the text, return "N/A" for that field.

Answer with one field per line, in the form "<Field>: <value>".

Text to extract from:
{input_text}"#;

/// System prompt for transcribing one scanned image.
pub const OCR_SYSTEM_PROMPT: &str = r#"You are an OCR engine. Transcribe ALL text visible in the image exactly as printed.

Rules:
- Output plain text only, one printed line per output line
- Keep the reading order a human would use
- Do NOT summarise, translate, or correct the text
- Do NOT add commentary, Markdown, or code fences
- If the image contains no text, output nothing"#;

/// Substitute `input_text` into `template`.
pub fn render_extraction_prompt(template: &str, input_text: &str) -> String {
    template.replace(INPUT_PLACEHOLDER, input_text)
}
