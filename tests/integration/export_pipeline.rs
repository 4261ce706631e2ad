//! End-to-end export scenarios against scripted row sources

use serde_json::json;
use std::sync::Arc;
use table_csv_exporter::exporter::{AutoConfirm, ExportStatus};
use table_csv_exporter::fetcher::FetcherError;
use table_csv_exporter::output::LocalOutputPolicy;
use table_csv_exporter::store::RowStore;
use table_csv_exporter::{
    EndpointInfo, ExportExecutor, ExportJob, ExportOutcome, FailureKind, FormatConfig, Row,
};
use tempfile::TempDir;

use crate::support::mock_source::{three_by_two_source, three_page_source, ScriptedSource};

fn endpoint() -> EndpointInfo {
    EndpointInfo::parse("https://sync.example.org", "default").unwrap()
}

fn census_job(dir: &TempDir, config: FormatConfig) -> ExportJob {
    ExportJob::new(endpoint(), "census", config, dir.path())
}

fn expected_path(dir: &TempDir, variant: &str) -> std::path::PathBuf {
    dir.path()
        .join("sync.example.org")
        .join("default")
        .join("census")
        .join(format!("census-{variant}.csv"))
}

fn executor(source: &ScriptedSource) -> ExportExecutor {
    ExportExecutor::new(Arc::new(source.clone()), Arc::new(LocalOutputPolicy))
}

#[tokio::test]
async fn test_three_pages_exported_in_order() {
    let dir = TempDir::new().unwrap();
    let source = three_page_source();

    let mut job = census_job(&dir, FormatConfig::default());
    let mut store = RowStore::new("census");
    let outcome = executor(&source).run(&mut job, &mut store).await;

    assert_eq!(
        outcome,
        ExportOutcome::Success {
            rows_written: 3,
            output_path: expected_path(&dir, "data"),
        }
    );
    assert_eq!(source.call_count(), 3);
    assert_eq!(
        source.cursors(),
        vec![None, Some("a".to_string()), Some("b".to_string())]
    );

    let content = std::fs::read_to_string(expected_path(&dir, "data")).unwrap();
    assert_eq!(content, "id,name\r\n1,\"A,B\"\r\n2,plain\r\n3,\r\n");
    assert!(content.lines().any(|line| line == "1,\"A,B\""));
}

#[tokio::test]
async fn test_three_pages_of_two_rows() {
    let dir = TempDir::new().unwrap();
    let source = three_by_two_source();

    let mut job = census_job(&dir, FormatConfig::default());
    let mut store = RowStore::new("census");
    let outcome = executor(&source).run(&mut job, &mut store).await;

    assert!(matches!(outcome, ExportOutcome::Success { rows_written: 6, .. }));
    assert_eq!(source.call_count(), 3);
    assert_eq!(store.size(), 6);
    let ids: Vec<&str> = store.rows().iter().filter_map(|r| r.value("id")).collect();
    assert_eq!(ids, vec!["1", "2", "3", "4", "5", "6"]);

    let content = std::fs::read_to_string(expected_path(&dir, "data")).unwrap();
    let lines: Vec<&str> = content.split_terminator("\r\n").collect();
    assert_eq!(lines.len(), 7);
    assert_eq!(lines[0], "id,name");
    assert_eq!(lines[1], "1,\"A,B\"");
    assert_eq!(lines[6], "6,f");
}

#[tokio::test]
async fn test_metadata_columns_kept_in_full_variant() {
    let dir = TempDir::new().unwrap();
    let source = three_page_source();
    let config = FormatConfig {
        include_metadata: true,
        null_value: "NULL".to_string(),
        ..FormatConfig::default()
    };

    let mut job = census_job(&dir, config);
    let outcome = executor(&source)
        .run(&mut job, &mut RowStore::new("census"))
        .await;
    assert!(outcome.is_success());

    let content = std::fs::read_to_string(expected_path(&dir, "full")).unwrap();
    assert_eq!(
        content,
        "id,name,_savepoint\r\n1,\"A,B\",s1\r\n2,plain,s2\r\n3,NULL,s3\r\n"
    );
}

#[tokio::test]
async fn test_prepopulated_store_skips_retrieval() {
    let dir = TempDir::new().unwrap();
    let source = three_page_source();

    let mut store = RowStore::new("census");
    store.extend_rows([
        Row::new().with("id", Some("9")).with("name", Some("cached")),
    ]);

    let mut job = census_job(&dir, FormatConfig::default());
    let outcome = executor(&source).run(&mut job, &mut store).await;

    assert!(outcome.is_success());
    assert_eq!(source.call_count(), 0);
    let content = std::fs::read_to_string(expected_path(&dir, "data")).unwrap();
    assert_eq!(content, "id,name\r\n9,cached\r\n");
}

#[tokio::test]
async fn test_zero_row_table_writes_header_only() {
    let dir = TempDir::new().unwrap();
    let source = ScriptedSource::new().page(vec![], "", false);
    let config = FormatConfig {
        columns: Some(vec!["id".to_string(), "name".to_string()]),
        ..FormatConfig::default()
    };

    let mut job = census_job(&dir, config);
    let outcome = executor(&source)
        .run(&mut job, &mut RowStore::new("census"))
        .await;

    assert!(matches!(outcome, ExportOutcome::Success { rows_written: 0, .. }));
    let content = std::fs::read_to_string(expected_path(&dir, "data")).unwrap();
    assert_eq!(content, "id,name\r\n");
}

#[tokio::test]
async fn test_second_page_failure_is_remote_fetch() {
    let dir = TempDir::new().unwrap();
    let source = ScriptedSource::new()
        .page(vec![json!({"id": "1"}), json!({"id": "2"})], "a", true)
        .failure(FetcherError::NetworkError("connection reset".to_string()));

    let task = executor(&source).spawn(
        census_job(&dir, FormatConfig::default()),
        RowStore::new("census"),
    );
    let (job, store, outcome) = task.join().await.unwrap();

    assert_eq!(outcome.failure_kind(), Some(FailureKind::RemoteFetch));
    assert_eq!(job.status, ExportStatus::Failed);
    // Rows from the first page are kept
    assert_eq!(store.size(), 2);
    assert!(!expected_path(&dir, "data").exists());
}

#[tokio::test]
async fn test_malformed_row_is_data_format() {
    let dir = TempDir::new().unwrap();
    let source = ScriptedSource::new().page(vec![json!({"id": ["nested"]})], "", false);

    let mut job = census_job(&dir, FormatConfig::default());
    let outcome = executor(&source)
        .run(&mut job, &mut RowStore::new("census"))
        .await;
    assert_eq!(outcome.failure_kind(), Some(FailureKind::DataFormat));
}

#[tokio::test]
async fn test_missing_strict_column_is_data_format() {
    let dir = TempDir::new().unwrap();
    let source = ScriptedSource::new().page(
        vec![json!({"id": "1", "name": "a"}), json!({"id": "2"})],
        "",
        false,
    );
    let config = FormatConfig {
        columns: Some(vec!["id".to_string(), "name".to_string()]),
        strict_columns: true,
        ..FormatConfig::default()
    };

    let mut job = census_job(&dir, config);
    let outcome = executor(&source)
        .run(&mut job, &mut RowStore::new("census"))
        .await;
    assert_eq!(outcome.failure_kind(), Some(FailureKind::DataFormat));

    // The partial file stays behind with the rows written before the failure
    let content = std::fs::read_to_string(expected_path(&dir, "data")).unwrap();
    assert_eq!(content, "id,name\r\n1,a\r\n");
}

#[tokio::test]
async fn test_unwritable_destination_is_write_failure() {
    let dir = TempDir::new().unwrap();
    // A regular file where the save directory should be
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, "x").unwrap();

    let source = three_page_source();
    let mut job = ExportJob::new(endpoint(), "census", FormatConfig::default(), &blocker);
    let outcome = executor(&source)
        .run(&mut job, &mut RowStore::new("census"))
        .await;

    assert_eq!(outcome.failure_kind(), Some(FailureKind::Write));
    assert_eq!(source.call_count(), 0);
}

#[tokio::test]
async fn test_interactive_decline_keeps_existing_file() {
    let dir = TempDir::new().unwrap();
    let path = expected_path(&dir, "data");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "previous export\r\n").unwrap();

    let source = three_page_source();
    let mut job = census_job(&dir, FormatConfig::default()).interactive(true);
    let outcome = executor(&source)
        .with_confirmer(Arc::new(AutoConfirm::no()))
        .run(&mut job, &mut RowStore::new("census"))
        .await;

    assert_eq!(outcome.failure_kind(), Some(FailureKind::Generic));
    assert_eq!(source.call_count(), 0);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "previous export\r\n");
}

#[tokio::test]
async fn test_headless_run_overwrites_existing_file() {
    let dir = TempDir::new().unwrap();
    let path = expected_path(&dir, "data");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "previous export\r\n").unwrap();

    let source = three_page_source();
    let mut job = census_job(&dir, FormatConfig::default());
    // Headless prompts take the caller's default, whatever the confirmer would say
    let outcome = executor(&source)
        .with_confirmer(Arc::new(AutoConfirm::no()))
        .run(&mut job, &mut RowStore::new("census"))
        .await;

    assert!(outcome.is_success());
    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.starts_with("id,name\r\n"));
    assert!(!content.contains("previous export"));
}

#[tokio::test]
async fn test_interactive_confirm_overwrites() {
    let dir = TempDir::new().unwrap();
    let path = expected_path(&dir, "data");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "previous export\r\n").unwrap();

    let source = three_page_source();
    let mut job = census_job(&dir, FormatConfig::default()).interactive(true);
    let outcome = executor(&source)
        .with_confirmer(Arc::new(AutoConfirm::yes()))
        .run(&mut job, &mut RowStore::new("census"))
        .await;

    assert!(outcome.is_success());
    assert_eq!(source.call_count(), 3);
}

#[tokio::test]
async fn test_job_runs_only_once() {
    let dir = TempDir::new().unwrap();
    let source = three_page_source();
    let executor = executor(&source);

    let mut job = census_job(&dir, FormatConfig::default());
    let mut store = RowStore::new("census");
    assert!(executor.run(&mut job, &mut store).await.is_success());

    let again = executor.run(&mut job, &mut store).await;
    assert_eq!(again.failure_kind(), Some(FailureKind::Generic));
    assert_eq!(source.call_count(), 3);
}
