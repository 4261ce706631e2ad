use std::sync::Arc;
use std::time::Duration;

use table_csv_exporter::exporter::ExportStatus;
use table_csv_exporter::output::LocalOutputPolicy;
use table_csv_exporter::shutdown::ShutdownCoordinator;
use table_csv_exporter::store::RowStore;
use table_csv_exporter::{EndpointInfo, ExportExecutor, ExportJob, FailureKind, FormatConfig};
use tempfile::TempDir;

use crate::support::mock_source::{EndlessSource, SlowSinglePage};

fn job(dir: &TempDir) -> ExportJob {
    ExportJob::new(
        EndpointInfo::parse("https://sync.example.org", "default").unwrap(),
        "census",
        FormatConfig::default(),
        dir.path(),
    )
}

#[tokio::test]
async fn shutdown_notifies_all_waiters() {
    let shutdown = ShutdownCoordinator::shared();

    let mut waiters = Vec::new();
    for _ in 0..10 {
        let handle = shutdown.clone();
        waiters.push(tokio::spawn(async move {
            handle.wait_for_shutdown().await;
        }));
    }

    // Let the waiters register
    tokio::time::sleep(Duration::from_millis(10)).await;
    shutdown.request_shutdown();

    for waiter in waiters {
        let result = tokio::time::timeout(Duration::from_secs(1), waiter).await;
        assert!(result.is_ok(), "A waiter was not notified of shutdown");
    }
}

#[tokio::test]
async fn cancel_stops_endless_pagination() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(EndlessSource::new(Duration::from_millis(5)));
    let executor = ExportExecutor::new(source.clone(), Arc::new(LocalOutputPolicy))
        .with_shutdown(ShutdownCoordinator::shared());

    let task = executor.spawn(job(&dir), RowStore::new("census"));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!task.is_finished());
    task.cancel();

    let (job, store, outcome) = tokio::time::timeout(Duration::from_secs(2), task.join())
        .await
        .expect("cancelled export should finish promptly")
        .unwrap();

    assert_eq!(outcome.failure_kind(), Some(FailureKind::Generic));
    assert_eq!(job.status, ExportStatus::Failed);
    assert!(store.size() > 0);
    assert!(source.call_count() >= store.size());
}

#[tokio::test]
async fn cancel_interrupts_slow_request() {
    let dir = TempDir::new().unwrap();
    // A single request would take far longer than the test allows
    let source = Arc::new(EndlessSource::new(Duration::from_secs(30)));
    let shutdown = ShutdownCoordinator::shared();
    let executor = ExportExecutor::new(source.clone(), Arc::new(LocalOutputPolicy))
        .with_shutdown(shutdown.clone());

    let task = executor.spawn(job(&dir), RowStore::new("census"));
    tokio::time::sleep(Duration::from_millis(20)).await;
    shutdown.request_shutdown();

    let outcome = tokio::time::timeout(Duration::from_secs(2), task.wait())
        .await
        .expect("cancellation should not wait for the request");
    assert_eq!(outcome.failure_kind(), Some(FailureKind::Generic));
    assert_eq!(source.call_count(), 0);
}

#[tokio::test]
async fn cancel_before_start_leaves_no_output() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(EndlessSource::new(Duration::from_millis(1)));
    let shutdown = ShutdownCoordinator::shared();
    shutdown.request_shutdown();

    let executor = ExportExecutor::new(source.clone(), Arc::new(LocalOutputPolicy))
        .with_shutdown(shutdown);
    let outcome = executor.spawn(job(&dir), RowStore::new("census")).wait().await;

    assert_eq!(outcome.failure_kind(), Some(FailureKind::Generic));
    assert_eq!(source.call_count(), 0);
    assert!(!dir
        .path()
        .join("sync.example.org/default/census/census-data.csv")
        .exists());
}

#[tokio::test]
async fn cancel_stops_only_its_own_task() {
    let first_dir = TempDir::new().unwrap();
    let second_dir = TempDir::new().unwrap();
    let third_dir = TempDir::new().unwrap();
    let source = Arc::new(SlowSinglePage {
        delay: Duration::from_millis(200),
    });
    let executor = ExportExecutor::new(source, Arc::new(LocalOutputPolicy))
        .with_shutdown(ShutdownCoordinator::shared());

    let first = executor.spawn(job(&first_dir), RowStore::new("census"));
    let second = executor.spawn(job(&second_dir), RowStore::new("census"));
    tokio::time::sleep(Duration::from_millis(20)).await;
    first.cancel();

    let first_outcome = first.wait().await;
    assert_eq!(first_outcome.failure_kind(), Some(FailureKind::Generic));

    // Tasks spawned after a cancel are unaffected
    let third = executor.spawn(job(&third_dir), RowStore::new("census"));

    let second_outcome = second.wait().await;
    assert!(second_outcome.is_success(), "{second_outcome:?}");
    let third_outcome = third.wait().await;
    assert!(third_outcome.is_success(), "{third_outcome:?}");
}

#[tokio::test]
async fn executor_shutdown_stops_every_task() {
    let first_dir = TempDir::new().unwrap();
    let second_dir = TempDir::new().unwrap();
    let shutdown = ShutdownCoordinator::shared();
    let source = Arc::new(SlowSinglePage {
        delay: Duration::from_secs(30),
    });
    let executor = ExportExecutor::new(source, Arc::new(LocalOutputPolicy))
        .with_shutdown(shutdown.clone());

    let first = executor.spawn(job(&first_dir), RowStore::new("census"));
    let second = executor.spawn(job(&second_dir), RowStore::new("census"));
    tokio::time::sleep(Duration::from_millis(20)).await;
    shutdown.request_shutdown();

    for task in [first, second] {
        let outcome = tokio::time::timeout(Duration::from_secs(2), task.wait())
            .await
            .expect("every task should stop");
        assert_eq!(outcome.failure_kind(), Some(FailureKind::Generic));
    }
}

#[tokio::test]
async fn executor_without_shutdown_ignores_other_handles() {
    let dir = TempDir::new().unwrap();
    let unrelated = ShutdownCoordinator::shared();
    unrelated.request_shutdown();

    let executor = ExportExecutor::new(
        Arc::new(SlowSinglePage {
            delay: Duration::from_millis(1),
        }),
        Arc::new(LocalOutputPolicy),
    );
    let outcome = executor.spawn(job(&dir), RowStore::new("census")).wait().await;
    assert!(outcome.is_success(), "{outcome:?}");
}
