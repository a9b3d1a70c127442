//! CLI binary for scan2table.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig`, renders progress, and prints the artifact paths.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use scan2table::{
    extract_to_json, load_spreadsheet, run, run_from_text, tabulate, transcribe, PipelineConfig,
    PipelineProgress, ProgressCallback, RunSummary,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar, reused for the OCR and the
/// extraction phases, with a log line per image and per retry.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    /// Switch to the full bar style for a phase of `total` steps.
    fn activate_bar(&self, prefix: &'static str, unit: &str, total: usize) {
        let template = format!(
            "{{spinner:.cyan}} {{prefix:.bold}}  \
             [{{bar:42.green/238}}] {{pos:>3}}/{{len}} {unit}  \
             ⏱ {{elapsed_precise}}  {{msg}}"
        );
        let style = ProgressStyle::with_template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_style(style);
        self.bar.set_prefix(prefix);
        self.bar.set_message("");
        self.bar.reset_eta();
    }
}

impl PipelineProgress for CliProgressCallback {
    fn on_ocr_start(&self, total_images: usize) {
        self.activate_bar("OCR", "scans", total_images);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Transcribing {total_images} scans…"))
        ));
    }

    fn on_image_complete(&self, index: usize, total: usize, file_name: &str, chars: usize) {
        self.bar.println(format!(
            "  {} Scan {:>3}/{:<3}  {:<30}  {}",
            green("✓"),
            index,
            total,
            file_name,
            dim(&format!("{chars:>5} chars")),
        ));
        self.bar.inc(1);
    }

    fn on_extraction_start(&self, total_sections: usize) {
        self.activate_bar("Extracting", "sections", total_sections);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting fields from {total_sections} sections…"))
        ));
    }

    fn on_section_start(&self, index: usize, _total: usize) {
        self.bar.set_message(format!("section {index}"));
    }

    fn on_retry(&self, attempt: u32, retries: u32, delay: Duration, reason: &str) {
        // Truncate very long error messages to keep output tidy.
        let msg: String = if reason.chars().count() > 80 {
            reason.chars().take(79).chain(['\u{2026}']).collect()
        } else {
            reason.to_string()
        };
        self.bar.println(format!(
            "  {} attempt {}/{} failed, waiting {}s  {}",
            yellow("⚠"),
            attempt,
            retries,
            delay.as_secs(),
            dim(&msg),
        ));
    }

    fn on_section_complete(&self, _index: usize, _total: usize) {
        self.bar.inc(1);
    }

    fn on_extraction_complete(&self, total_sections: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} sections extracted",
            green("✔"),
            bold(&total_sections.to_string())
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Full pipeline with the default folder layout
  scan2table run

  # Re-run extraction on an existing transcript
  scan2table run --skip-ocr

  # Individual stages
  scan2table ocr --images-dir scans/
  scan2table extract --text Output/Txt/Final.txt --json-out Output/Json/Final.json
  scan2table tabulate Output/Json/*.json
  scan2table load Output/Data/combined_json_data.xlsx --table results

  # Machine-readable summary
  scan2table --json run

DEFAULT LAYOUT:
  Images/English/               scans (*.png, *.jpg, *.jpeg)
  Output/Txt/Final.txt          transcript with section markers
  Output/Json/Final.json        one record per section
  Output/Data/combined_json_data.xlsx
  Output/Data/output_database.db  (table ocr_data)

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  GEMINI_API_KEY          Google Gemini API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  SCAN2TABLE_*            Fallback for every flag (e.g. SCAN2TABLE_RETRIES)
"#;

/// Turn scanned score certificates into a spreadsheet and a SQLite table.
#[derive(Parser, Debug)]
#[command(
    name = "scan2table",
    version,
    about = "Turn scanned score certificates into a spreadsheet and a SQLite table",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Folder of scanned images.
    #[arg(long, global = true, env = "SCAN2TABLE_IMAGES_DIR", default_value = "Images/English")]
    images_dir: PathBuf,

    /// Transcript written by OCR and read by extraction.
    #[arg(long = "text", global = true, env = "SCAN2TABLE_TEXT", default_value = "Output/Txt/Final.txt")]
    text_path: PathBuf,

    /// JSON array of extracted records.
    #[arg(long = "json-out", global = true, env = "SCAN2TABLE_JSON_OUT", default_value = "Output/Json/Final.json")]
    json_path: PathBuf,

    /// Folder receiving the spreadsheet and the database.
    #[arg(long, global = true, env = "SCAN2TABLE_OUTPUT_DIR", default_value = "Output/Data")]
    output_dir: PathBuf,

    /// Relational table name.
    #[arg(long, global = true, env = "SCAN2TABLE_TABLE", default_value = "ocr_data")]
    table: String,

    /// LLM model ID (e.g. gpt-4.1-nano, gemini-2.0-flash).
    #[arg(long, global = true, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, global = true, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Attempts per remote call before giving up.
    #[arg(long, global = true, env = "SCAN2TABLE_RETRIES", default_value_t = 5)]
    retries: u32,

    /// Wait after the first failure, in seconds; doubles after each failure.
    #[arg(long, global = true, env = "SCAN2TABLE_INITIAL_DELAY", default_value_t = 10)]
    initial_delay: u64,

    /// Max LLM output tokens per call.
    #[arg(long, global = true, env = "SCAN2TABLE_MAX_TOKENS", default_value_t = 1024)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, global = true, env = "SCAN2TABLE_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Path to a text file with a custom extraction prompt containing {input_text}.
    #[arg(long, global = true, env = "SCAN2TABLE_PROMPT")]
    prompt: Option<PathBuf>,

    /// Print a JSON summary instead of the human-readable confirmation.
    #[arg(long, global = true, env = "SCAN2TABLE_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "SCAN2TABLE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "SCAN2TABLE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "SCAN2TABLE_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// OCR, extract, tabulate and load in one go.
    Run {
        /// Start from the existing transcript instead of the images.
        #[arg(long)]
        skip_ocr: bool,
    },
    /// Transcribe the images into the text file.
    Ocr,
    /// Extract records from the text file into the JSON file.
    Extract,
    /// Combine JSON files into the spreadsheet and the database.
    Tabulate {
        /// JSON files, each an array of records or a single record.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Load a spreadsheet into the database table, replacing it.
    Load {
        /// Spreadsheet to load. Default: the one `tabulate` writes.
        spreadsheet: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress_cb: Option<ProgressCallback> = match cli.command {
        Command::Run { .. } | Command::Ocr | Command::Extract if show_progress => {
            Some(CliProgressCallback::new() as Arc<dyn PipelineProgress>)
        }
        _ => None,
    };
    let config = build_config(&cli, progress_cb).await?;

    match cli.command {
        Command::Run { skip_ocr } => {
            let summary = if skip_ocr {
                run_from_text(&config).await
            } else {
                run(&config).await
            }
            .context("Pipeline failed")?;
            report(&cli, &summary)?;
        }
        Command::Ocr => {
            let images = transcribe(&config).await.context("OCR failed")?;
            if cli.json {
                print_json(&serde_json::json!({
                    "images": images,
                    "text_path": config.text_path,
                }))?;
            } else if !cli.quiet {
                eprintln!(
                    "{}  {} scans  →  {}",
                    green("✔"),
                    images,
                    bold(&config.text_path.display().to_string())
                );
            }
        }
        Command::Extract => {
            let records = extract_to_json(&config).await.context("Extraction failed")?;
            if cli.json {
                print_json(&serde_json::json!({
                    "records": records.len(),
                    "json_path": config.json_path,
                }))?;
            } else if !cli.quiet {
                eprintln!(
                    "{}  {} records  →  {}",
                    green("✔"),
                    records.len(),
                    bold(&config.json_path.display().to_string())
                );
            }
        }
        Command::Tabulate { ref inputs } => {
            let summary = tabulate(inputs, &config)
                .await
                .context("Failed to combine JSON files")?;
            report(&cli, &summary)?;
        }
        Command::Load { ref spreadsheet } => {
            let source = spreadsheet.clone().unwrap_or_else(|| config.spreadsheet_path());
            let database = config.database_path();
            let table = load_spreadsheet(&source, &database, &config.table_name)
                .with_context(|| format!("Failed to load {}", source.display()))?;
            if cli.json {
                print_json(&serde_json::json!({
                    "rows": table.len(),
                    "spreadsheet_path": source,
                    "database_path": database,
                    "table_name": config.table_name,
                }))?;
            } else if !cli.quiet {
                eprintln!(
                    "{}  {} rows  →  {} (table {})",
                    green("✔"),
                    table.len(),
                    bold(&database.display().to_string()),
                    config.table_name
                );
            }
        }
    }

    Ok(())
}

/// Print the final confirmation naming every artifact, or the JSON summary.
fn report(cli: &Cli, summary: &RunSummary) -> Result<()> {
    if cli.json {
        return print_json(summary);
    }
    if cli.quiet {
        return Ok(());
    }
    if let Some(ref json_path) = summary.json_path {
        eprintln!("   JSON         {}", bold(&json_path.display().to_string()));
    }
    eprintln!(
        "   Spreadsheet  {}",
        bold(&summary.spreadsheet_path.display().to_string())
    );
    eprintln!(
        "   Database     {}  {}",
        bold(&summary.database_path.display().to_string()),
        dim(&format!("(table {})", summary.table_name)),
    );
    eprintln!(
        "{}  {} rows in {}ms",
        green("✔"),
        summary.rows,
        summary.duration_ms
    );
    Ok(())
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialise summary")?;
    println!("{json}");
    Ok(())
}

/// Map CLI args to `PipelineConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .images_dir(&cli.images_dir)
        .text_path(&cli.text_path)
        .json_path(&cli.json_path)
        .output_dir(&cli.output_dir)
        .table_name(&cli.table)
        .retries(cli.retries)
        .initial_delay(Duration::from_secs(cli.initial_delay))
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature);

    if let Some(ref path) = cli.prompt {
        let template = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.prompt_template(template);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
