//! End-to-end tests for edgequake-ocr2xlsx.
//!
//! Most tests run the full chain (folder walk → encode → HTTP → normalize →
//! ledger → workbook) against a local mock of the Messages API, so they need
//! no network access.
//!
//! One test talks to the real API. It is gated behind `E2E_ENABLED` and an
//! `ANTHROPIC_API_KEY`:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture

use calamine::{open_workbook_from_rs, Reader, Xlsx};
use edgequake_ocr2xlsx::{
    collect_sources, export_all, export_one, single_export_file_name, write_artifact, BatchConfig,
    BatchOrchestrator, BatchProgressCallback, BatchStatus, FileError, MediaKind,
    NoopProgressCallback, ProcessingOutcome, ProgressState, SourceFile,
};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

fn reply(text: &str) -> String {
    json!({
        "id": "msg_test",
        "type": "message",
        "role": "assistant",
        "content": [{"type": "text", "text": text}],
        "stop_reason": "end_turn"
    })
    .to_string()
}

/// Answer requests whose body mentions `needle` (the file name is part of the
/// instruction text) with `status` and `body`.
async fn answer(server: &mut ServerGuard, needle: &str, status: usize, body: String) -> mockito::Mock {
    server
        .mock("POST", "/v1/messages")
        .match_body(Matcher::Regex(regex::escape(needle)))
        .with_status(status)
        .with_header("content-type", "application/json")
        .with_body(body)
        .expect(1)
        .create_async()
        .await
}

fn config_for(server: &ServerGuard) -> BatchConfig {
    BatchConfig::builder()
        .api_base_url(server.url())
        .api_key("sk-test")
        .request_timeout_secs(5)
        .build()
        .unwrap()
}

fn touch(dir: &Path, name: &str) {
    std::fs::write(dir.join(name), b"fake file bytes").unwrap();
}

fn sheets(bytes: Vec<u8>) -> Vec<(String, Vec<Vec<String>>)> {
    let mut wb: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes)).unwrap();
    wb.sheet_names()
        .into_iter()
        .map(|name| {
            let range = wb.worksheet_range(&name).unwrap();
            let rows = range
                .rows()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect();
            (name, rows)
        })
        .collect()
}

// ── Mocked API ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_folder_batch_isolates_failures_and_merges_successes() {
    let mut server = Server::new_async().await;
    let ok_a = answer(
        &mut server,
        "a_receipt.png",
        200,
        reply("```json\n{\"headers\":[\"Item\",\"Price\"],\"rows\":[[\"Coffee\",\"450\"],[\"Total\",\"450\"]]}\n```"),
    )
    .await;
    let fail_b = answer(
        &mut server,
        "b_broken.pdf",
        500,
        json!({"type": "error", "error": {"type": "api_error", "message": "Internal server error"}})
            .to_string(),
    )
    .await;
    let ok_c = answer(
        &mut server,
        "c_invoice.jpg",
        200,
        reply(r#"{"rows":[["Invoice no.","INV-7"]]}"#),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "a_receipt.png");
    touch(dir.path(), "b_broken.pdf");
    touch(dir.path(), "c_invoice.jpg");
    touch(dir.path(), "notes.txt");

    let files = collect_sources([dir.path()]).unwrap();
    assert_eq!(files.len(), 3, "notes.txt must be skipped");

    let mut batch = BatchOrchestrator::from_config(&config_for(&server)).unwrap();
    batch.submit(files).unwrap();
    let ledger = batch.run().await.unwrap().clone();

    ok_a.assert_async().await;
    fail_b.assert_async().await;
    ok_c.assert_async().await;
    assert_eq!(batch.status(), &BatchStatus::Completed);

    let names: Vec<&str> = ledger.iter().map(|o| o.file_name.as_str()).collect();
    assert_eq!(names, vec!["a_receipt.png", "b_broken.pdf", "c_invoice.jpg"]);
    assert!(ledger.get(0).unwrap().is_success());
    assert_eq!(
        ledger.get(1).unwrap().error(),
        Some(&FileError::Remote {
            status: Some(500),
            message: "Internal server error".into()
        })
    );
    assert_eq!(ledger.summary().to_string(), "2 succeeded of 3");

    let merged = sheets(export_all(&ledger).unwrap());
    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0].0, "a_receipt");
    assert_eq!(merged[0].1[2], vec!["Total", "450"]);
    assert_eq!(merged[1].0, "c_invoice");
    assert_eq!(merged[1].1[0], vec!["Item", "Value"]);
}

#[tokio::test]
async fn test_single_export_written_to_disk() {
    let mut server = Server::new_async().await;
    let _m = answer(
        &mut server,
        "scan.pdf",
        200,
        reply("Here you go:\n{\"headers\":[\"Date\",\"Amount\"],\"rows\":[[\"2024-05-01\",1200]]}"),
    )
    .await;

    let file = SourceFile::with_kind("scan.pdf", MediaKind::Pdf, b"%PDF-1.4".to_vec());
    let mut batch = BatchOrchestrator::from_config(&config_for(&server)).unwrap();
    batch.submit(vec![file]).unwrap();
    let ledger = batch.run().await.unwrap();
    let outcome = ledger.get(0).unwrap();

    let out = tempfile::tempdir().unwrap();
    let path = out.path().join(single_export_file_name(&outcome.file_name));
    write_artifact(&path, &export_one(outcome).unwrap()).await.unwrap();

    assert!(path.ends_with("scan_OCR.xlsx"));
    let written = sheets(std::fs::read(&path).unwrap());
    assert_eq!(written[0].0, "OCR extracted data");
    assert_eq!(
        written[0].1,
        vec![vec!["Date", "Amount"], vec!["2024-05-01", "1200"]]
    );
}

#[tokio::test]
async fn test_long_file_name_still_exports() {
    let mut server = Server::new_async().await;
    let name = "quarterly-expense-report-for-the-tokyo-office.png";
    let _m = answer(&mut server, name, 200, reply(r#"{"rows":[["x","1"]]}"#)).await;

    let mut batch = BatchOrchestrator::from_config(&config_for(&server)).unwrap();
    batch
        .submit(vec![SourceFile::with_kind(name, MediaKind::Png, vec![1u8])])
        .unwrap();
    let ledger = batch.run().await.unwrap();

    let merged = sheets(export_all(ledger).unwrap());
    assert_eq!(merged[0].0, "quarterly-expense-report-for-th");
    assert_eq!(merged[0].0.chars().count(), 31);
}

#[tokio::test]
async fn test_export_requires_a_success() {
    let mut server = Server::new_async().await;
    let _m = answer(&mut server, "empty.png", 200, reply("I could not read this image.")).await;

    let mut batch = BatchOrchestrator::from_config(&config_for(&server)).unwrap();
    batch
        .submit(vec![SourceFile::with_kind("empty.png", MediaKind::Png, vec![0u8])])
        .unwrap();
    let ledger = batch.run().await.unwrap();

    let outcome = ledger.get(0).unwrap();
    assert!(matches!(outcome.error(), Some(FileError::MalformedResult { .. })));
    assert!(export_one(outcome).is_err());
    assert!(export_all(ledger).is_err());
}

#[derive(Default)]
struct Recorder {
    starts: AtomicUsize,
    lines: Mutex<Vec<String>>,
}

impl BatchProgressCallback for Recorder {
    fn on_file_start(&self, _state: &ProgressState) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_file_complete(&self, state: &ProgressState, outcome: &ProcessingOutcome) {
        self.lines.lock().unwrap().push(format!(
            "{}/{} {} {}",
            state.current,
            state.total,
            state.file_name,
            outcome.status()
        ));
    }

    fn on_batch_complete(&self, total_files: usize, success_count: usize) {
        self.lines
            .lock()
            .unwrap()
            .push(format!("done {success_count}/{total_files}"));
    }
}

#[tokio::test]
async fn test_progress_callback_from_config() {
    let mut server = Server::new_async().await;
    let _a = answer(&mut server, "one.gif", 200, reply(r#"{"rows":[["1"]]}"#)).await;
    let _b = answer(&mut server, "two.webp", 200, json!({"content": []}).to_string()).await;

    let recorder = Arc::new(Recorder::default());
    let config = BatchConfig::builder()
        .api_base_url(server.url())
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    let mut batch = BatchOrchestrator::from_config(&config).unwrap();
    batch
        .submit(vec![
            SourceFile::with_kind("one.gif", MediaKind::Gif, vec![1u8]),
            SourceFile::with_kind("two.webp", MediaKind::Webp, vec![2u8]),
        ])
        .unwrap();
    batch.run().await.unwrap();

    assert_eq!(recorder.starts.load(Ordering::SeqCst), 2);
    assert_eq!(
        *recorder.lines.lock().unwrap(),
        vec!["1/2 one.gif success", "2/2 two.webp error", "done 1/2"]
    );
    assert_eq!(
        batch.ledger().unwrap().get(1).unwrap().error(),
        Some(&FileError::EmptyResponse)
    );
}

#[test]
fn test_noop_callback_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<NoopProgressCallback>();
    assert_send_sync::<BatchOrchestrator>();
}

// ── Live API (opt-in) ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_live_api_rejects_garbage_image_gracefully() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
        return;
    }
    let Ok(key) = std::env::var("ANTHROPIC_API_KEY") else {
        println!("SKIP: ANTHROPIC_API_KEY not set");
        return;
    };

    let config = BatchConfig::builder().api_key(key).build().unwrap();
    let mut batch = BatchOrchestrator::from_config(&config).unwrap();
    batch
        .submit(vec![SourceFile::with_kind("garbage.png", MediaKind::Png, vec![0u8; 16])])
        .unwrap();
    let ledger = batch.run().await.unwrap();

    // Not a decodable PNG: the file must fail on its own, never the batch.
    assert_eq!(ledger.len(), 1);
    println!("{}", ledger.get(0).unwrap().describe());
    assert!(!ledger.get(0).unwrap().is_success());
}
