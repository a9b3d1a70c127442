//! Offline integration tests: the whole pipeline after OCR, driven by a
//! scripted client, checked against the artifacts on disk.

use calamine::{open_workbook_auto, Data, Reader};
use rusqlite::Connection;
use scan2table::{
    process_corpus, tabulate, ExtractionClient, ExtractionConfig, ExtractionFault, PipelineConfig,
    PipelineError, ResilientExtractor,
};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Answers each prompt with the next scripted reply.
struct ScriptedClient {
    replies: Mutex<VecDeque<Result<String, ExtractionFault>>>,
}

impl ScriptedClient {
    fn new(replies: Vec<Result<&str, &str>>) -> Self {
        let replies = replies
            .into_iter()
            .map(|r| match r {
                Ok(text) => Ok(text.to_string()),
                Err(msg) => Err(ExtractionFault::classify(msg)),
            })
            .collect();
        Self {
            replies: Mutex::new(replies),
        }
    }
}

impl ExtractionClient for ScriptedClient {
    async fn complete(&self, _prompt: &str) -> Result<String, ExtractionFault> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ExtractionFault::classify("503 script exhausted")))
    }
}

fn extractor(client: ScriptedClient, retries: u32) -> ResilientExtractor<ScriptedClient> {
    let config = ExtractionConfig {
        retries,
        initial_delay: Duration::from_secs(10),
        ..Default::default()
    };
    ResilientExtractor::new(client, config)
}

fn config_in(dir: &Path) -> PipelineConfig {
    PipelineConfig::builder()
        .text_path(dir.join("Txt/Final.txt"))
        .json_path(dir.join("Json/Final.json"))
        .output_dir(dir.join("Data"))
        .build()
        .unwrap()
}

fn sheet_rows(path: &Path) -> Vec<Vec<String>> {
    let mut wb = open_workbook_auto(path).unwrap();
    let range = wb.worksheet_range_at(0).unwrap().unwrap();
    range
        .rows()
        .map(|r| {
            r.iter()
                .map(|c| match c {
                    Data::Empty => String::new(),
                    other => other.to_string(),
                })
                .collect()
        })
        .collect()
}

fn db_rows(path: &Path, table: &str) -> (Vec<String>, Vec<Vec<String>>) {
    let conn = Connection::open(path).unwrap();
    let mut stmt = conn.prepare(&format!("SELECT * FROM \"{table}\"")).unwrap();
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let width = columns.len();
    let rows = stmt
        .query_map([], |row| {
            (0..width)
                .map(|i| row.get::<_, String>(i))
                .collect::<Result<Vec<_>, _>>()
        })
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    (columns, rows)
}

const HEADER: [&str; 7] = [
    "Name",
    "Overall Score",
    "Reading",
    "Writing",
    "Listening",
    "Speaking",
    "Date of Examination",
];

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn single_section_reaches_every_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let corpus = "--- Extracted Text from a.png ---\nName: Jane Doe\nOverall Score: 7.5\nReading Score: 7.0\n";
    let client = ScriptedClient::new(vec![Ok(
        "Name: Jane Doe\nOverall Score: 7.5\nReading Score: 7.0\n",
    )]);

    let summary = process_corpus(corpus, &extractor(client, 5), &config)
        .await
        .unwrap();
    assert_eq!(summary.sections, Some(1));
    assert_eq!(summary.rows, 1);

    // JSON: every canonical field, sentinel for the missing ones.
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&config.json_path).unwrap()).unwrap();
    assert_eq!(
        json,
        serde_json::json!([{
            "Name": "Jane Doe",
            "Overall Score": "7.5",
            "Reading Score": "7.0",
            "Writing Score": "N/A",
            "Listening Score": "N/A",
            "Speaking Score": "N/A",
            "Date of Examination": "N/A",
            "Date of Issue": "N/A"
        }])
    );

    // Spreadsheet and database hold the same single row.
    let expected_row = vec!["Jane Doe", "7.5", "7.0", "N/A", "N/A", "N/A", "N/A"];
    let sheet = sheet_rows(&summary.spreadsheet_path);
    assert_eq!(sheet[0], HEADER);
    assert_eq!(sheet[1], expected_row);

    let (columns, rows) = db_rows(&summary.database_path, "ocr_data");
    assert_eq!(columns, HEADER);
    assert_eq!(rows, vec![expected_row]);
}

#[tokio::test]
async fn rows_follow_section_order_and_markdown_is_cleaned() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let corpus = "--- Extracted Text from a.png ---\nfirst\n\
                  --- Extracted Text from b.png ---\nsecond\n\
                  --- Extracted Text from c.png ---\nthird\n";
    let client = ScriptedClient::new(vec![
        Ok("Name: A"),
        Ok("```\n- **Name:** B\n- **Speaking Score:** 6.5\n```"),
        Ok("Name: C\nReading Score: 7\nWriting Score: 7"),
    ]);

    let summary = process_corpus(corpus, &extractor(client, 5), &config)
        .await
        .unwrap();
    let (_, rows) = db_rows(&summary.database_path, "ocr_data");
    let names: Vec<_> = rows.iter().map(|r| r[0].as_str()).collect();
    assert_eq!(names, ["A", "B", "C"]);
    assert_eq!(rows[1][5], "6.5");
    assert_eq!(rows[2][2..4], ["7", "7"]);
}

#[tokio::test(start_paused = true)]
async fn transient_faults_are_absorbed() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let client = ScriptedClient::new(vec![
        Err("429 Resource has been exhausted (e.g. check quota)"),
        Err("connection reset by peer"),
        Ok("Name: Jane"),
    ]);
    let start = tokio::time::Instant::now();
    let summary = process_corpus(
        "--- Extracted Text from a.png ---\nName: Jane\n",
        &extractor(client, 5),
        &config,
    )
    .await
    .unwrap();
    assert_eq!(summary.rows, 1);
    assert!(start.elapsed() >= Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_leave_no_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let client = ScriptedClient::new(vec![Ok("Name: A")]);
    let corpus = "--- Extracted Text from a.png ---\nx\n--- Extracted Text from b.png ---\ny\n";

    let err = process_corpus(corpus, &extractor(client, 3), &config)
        .await
        .unwrap_err();
    assert!(
        matches!(err, PipelineError::MaxRetriesExceeded { attempts: 3, .. }),
        "{err}"
    );
    assert!(!config.json_path.exists());
    assert!(!config.spreadsheet_path().exists());
    assert!(!config.database_path().exists());
}

#[tokio::test]
async fn empty_corpus_yields_header_only_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let summary = process_corpus("", &extractor(ScriptedClient::new(Vec::new()), 5), &config)
        .await
        .unwrap();
    assert_eq!(summary.sections, Some(0));
    assert_eq!(summary.rows, 0);
    assert_eq!(std::fs::read_to_string(&config.json_path).unwrap(), "[]");

    let sheet = sheet_rows(&summary.spreadsheet_path);
    assert_eq!(sheet, vec![HEADER.map(String::from).to_vec()]);
    let (columns, rows) = db_rows(&summary.database_path, "ocr_data");
    assert_eq!(columns, HEADER);
    assert!(rows.is_empty());
}

#[tokio::test]
async fn rerun_replaces_previous_table() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let corpus_two = "--- Extracted Text from a.png ---\nx\n--- Extracted Text from b.png ---\ny\n";
    process_corpus(
        corpus_two,
        &extractor(ScriptedClient::new(vec![Ok("Name: A"), Ok("Name: B")]), 5),
        &config,
    )
    .await
    .unwrap();
    let summary = process_corpus(
        "--- Extracted Text from c.png ---\nz\n",
        &extractor(ScriptedClient::new(vec![Ok("Name: C")]), 5),
        &config,
    )
    .await
    .unwrap();

    let (_, rows) = db_rows(&summary.database_path, "ocr_data");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], "C");
}

#[tokio::test]
async fn tabulate_combines_single_objects_and_arrays() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let one = dir.path().join("one.json");
    let many = dir.path().join("many.json");
    std::fs::write(&one, r#"{"Name": "Solo", "Writing": "6", "Extra": "dropped"}"#).unwrap();
    std::fs::write(
        &many,
        r#"[{"Name": "A", "Reading Score": "8"}, {"Name": "B", "Overall Score": 5.5}]"#,
    )
    .unwrap();

    let summary = tabulate(&[one, many], &config).await.unwrap();
    assert_eq!(summary.sections, None);
    assert_eq!(summary.rows, 3);

    let (columns, rows) = db_rows(&summary.database_path, "ocr_data");
    assert_eq!(columns, HEADER);
    assert_eq!(rows[0], ["Solo", "", "", "6", "", "", ""]);
    assert_eq!(rows[1], ["A", "", "8", "", "", "", ""]);
    assert_eq!(rows[2], ["B", "5.5", "", "", "", "", ""]);
}

#[tokio::test]
async fn tabulate_keeps_records_without_known_keys() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let input = dir.path().join("records.json");
    std::fs::write(&input, r#"[{"Name": "A"}, {"Extra": "only"}, {}]"#).unwrap();

    let summary = tabulate(&[input], &config).await.unwrap();
    assert_eq!(summary.rows, 3);

    let (_, rows) = db_rows(&summary.database_path, "ocr_data");
    assert_eq!(rows.len(), summary.rows);
    assert_eq!(rows[0][0], "A");
    assert!(rows[1..].iter().flatten().all(String::is_empty));
}
