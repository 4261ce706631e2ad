//! Unit tests for PaginatedFetcher

use serde_json::json;
use std::sync::Arc;
use table_csv_exporter::exporter::{ExportError, NoProgress};
use table_csv_exporter::fetcher::pagination::FetchSummary;
use table_csv_exporter::fetcher::{FetcherError, PaginatedFetcher};
use table_csv_exporter::store::RowStore;

use crate::support::mock_source::{three_by_two_source, ScriptedSource};

#[tokio::test]
async fn test_k_pages_take_k_requests() {
    for pages in 1..=5 {
        let mut source = ScriptedSource::new();
        for i in 0..pages {
            let has_more = i + 1 < pages;
            source = source.page(
                vec![json!({"id": format!("{i}-a")}), json!({"id": format!("{i}-b")})],
                &format!("cursor-{i}"),
                has_more,
            );
        }

        let fetcher = PaginatedFetcher::new(Arc::new(source.clone()));
        let mut store = RowStore::new("census");
        let summary = fetcher.fetch(&mut store, &NoProgress, None).await.unwrap();

        assert_eq!(summary, FetchSummary { pages, rows: pages * 2 });
        assert_eq!(source.call_count(), pages);
        assert!(source.tables().iter().all(|t| t == "census"));
    }
}

#[tokio::test]
async fn test_rows_kept_in_arrival_order() {
    let source = ScriptedSource::new()
        .page(vec![json!({"id": "1"}), json!({"id": "2"})], "a", true)
        .page(vec![], "b", true)
        .page(vec![json!({"id": "3"})], "", false);

    let fetcher = PaginatedFetcher::new(Arc::new(source.clone()));
    let mut store = RowStore::new("census");
    fetcher.fetch(&mut store, &NoProgress, None).await.unwrap();

    let ids: Vec<&str> = store.rows().iter().filter_map(|r| r.value("id")).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
    // An empty page with more results still advances the cursor
    assert_eq!(
        source.cursors(),
        vec![None, Some("a".to_string()), Some("b".to_string())]
    );
}

#[tokio::test]
async fn test_first_failure_stops_loop() {
    let source = ScriptedSource::new()
        .failure(FetcherError::ApiError("Client error 401".to_string()))
        .page(vec![json!({"id": "1"})], "", false);

    let fetcher = PaginatedFetcher::new(Arc::new(source.clone()));
    let mut store = RowStore::new("census");
    let err = fetcher.fetch(&mut store, &NoProgress, None).await.unwrap_err();

    assert!(matches!(err, ExportError::Fetch(FetcherError::ApiError(_))));
    assert_eq!(source.call_count(), 1);
    assert_eq!(store.size(), 0);
}

#[tokio::test]
async fn test_store_holds_sum_of_page_rows() {
    let source = three_by_two_source();
    let fetcher = PaginatedFetcher::new(Arc::new(source.clone()));
    let mut store = RowStore::new("census");

    let summary = fetcher.fetch(&mut store, &NoProgress, None).await.unwrap();
    assert_eq!(summary, FetchSummary { pages: 3, rows: 6 });
    assert_eq!(store.size(), 6);

    let ids: Vec<&str> = store.rows().iter().filter_map(|r| r.value("id")).collect();
    assert_eq!(ids, vec!["1", "2", "3", "4", "5", "6"]);
}
