//! Post-processing: deterministic cleanup of model responses and OCR text.
//!
//! Even a well-prompted model answers in Markdown now and then: the reply is
//! wrapped in a ```` ``` ```` fence, labels are bolded (`**Name:** Jane`),
//! or every field is a list bullet. None of that carries meaning for the
//! parser, and all of it can break "text after the first colon" matching, so
//! it is stripped here before parsing.
//!
//! Rules for responses (applied in order):
//! 1. Normalise line endings (CRLF → LF)
//! 2. Strip an outer code fence
//! 3. Remove emphasis markers (`**`, `__`)
//! 4. Remove leading list bullets (`-`, `*`, `•`)
//! 5. Trim every line
//!
//! OCR transcriptions only get rules 1, 2 and 5 plus blank-line removal.

use once_cell::sync::Lazy;
use regex::Regex;

/// Clean a raw extraction response before field parsing.
pub fn clean_response(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = strip_code_fence(&s);
    let s = remove_emphasis(&s);
    let s = remove_bullets(&s);
    trim_lines(&s)
}

/// Normalise one image's transcription: trimmed lines, no blank lines.
pub fn clean_transcription(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = strip_code_fence(&s);
    s.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Strip outer code fence ───────────────────────────────────────────

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\n(.*?)\n?```\s*$").unwrap());

fn strip_code_fence(input: &str) -> String {
    match RE_OUTER_FENCE.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 3: Remove emphasis markers ──────────────────────────────────────────

fn remove_emphasis(input: &str) -> String {
    input.replace("**", "").replace("__", "")
}

// ── Rule 4: Remove leading list bullets ──────────────────────────────────────

static RE_BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*[-*•][ \t]+").unwrap());

fn remove_bullets(input: &str) -> String {
    RE_BULLET.replace_all(input, "").to_string()
}

// ── Rule 5: Trim lines ───────────────────────────────────────────────────────

fn trim_lines(input: &str) -> String {
    input.lines().map(str::trim).collect::<Vec<_>>().join("\n")
}
