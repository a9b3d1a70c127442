//! Pipeline stages for scan-to-table extraction.
//!
//! Each submodule implements one transformation step. Only [`ocr`] and
//! [`extract`] talk to the network; everything else is a pure function of
//! its input.
//!
//! ## Data Flow
//!
//! ```text
//! scans ──▶ ocr ──▶ split ──▶ extract ──▶ postprocess ──▶ parse ──▶ reconcile
//! (png/jpg) (VLM)  (markers)  (LLM+retry)  (cleanup)     (fields)   (table)
//! ```
//!
//! 1. [`encode`] + [`ocr`]: transcribe every scan into one text file, one
//!    marker line per image
//! 2. [`split`]: cut the transcript back into per-document sections
//! 3. [`extract`]: ask the model for the eight fields, under [`retry`]
//! 4. [`postprocess`]: strip fences and Markdown emphasis from the reply
//! 5. [`parse`]: label-matching line parser → `FieldRecord`
//! 6. [`reconcile`]: map records of any shape onto the export schema

pub mod encode;
pub mod extract;
pub mod ocr;
pub mod parse;
pub mod postprocess;
pub mod reconcile;
pub mod retry;
pub mod split;
