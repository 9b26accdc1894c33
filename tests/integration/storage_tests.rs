//! The iteration controller writing to a SQLite database on disk

use crate::support::{settings, shop_urls, RecordDetails, ScriptedClassifier, ScriptedFrontier, TitleTable};
use product_harvester::harvest::IterationController;
use product_harvester::storage::{
    open_storage, HarvestArchive, ResultStore, RunStatus, SqliteResultStore,
};
use product_harvester::StopReason;
use std::path::Path;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const ROOT: &str = "https://shop.example.com/";

fn controller(
    store: SqliteResultStore,
    batches: Vec<Vec<String>>,
) -> IterationController<SqliteResultStore> {
    IterationController::new(
        settings(10, 5),
        Box::new(ScriptedFrontier::new(batches)),
        Box::new(TitleTable::new()),
        Box::new(ScriptedClassifier::accept_all()),
        Box::new(RecordDetails::new()),
        store,
    )
}

async fn harvest(db: &Path, dedup_across_runs: bool, batches: Vec<Vec<String>>) -> (i64, usize) {
    let store = open_storage(db)
        .unwrap()
        .begin_execution(ROOT, "hash", dedup_across_runs)
        .unwrap();
    let execution_id = store.execution_id();

    let mut controller = controller(store, batches);
    let summary = controller.run(&CancellationToken::new()).await.unwrap();
    let mut store = controller.into_store();
    store.finish(summary.stop_reason.run_status()).unwrap();

    (execution_id, summary.accepted)
}

#[tokio::test]
async fn test_products_survive_reopening_the_database() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("nested").join("harvest.db");

    let (execution_id, accepted) = harvest(&db, true, vec![shop_urls(&["lamp", "chair"])]).await;
    assert_eq!(accepted, 2);

    let storage = open_storage(&db).unwrap();
    let products = storage.products_for_execution(execution_id).unwrap();
    let titles: Vec<_> = products.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["lamp", "chair"]);

    let execution = storage.latest_execution(ROOT).unwrap().unwrap();
    assert_eq!(execution.status, RunStatus::Completed);
    assert_eq!(execution.products_found, 2);
}

#[tokio::test]
async fn test_dedup_across_runs_is_configurable() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("harvest.db");

    harvest(&db, true, vec![shop_urls(&["lamp", "chair"])]).await;
    let (_, deduped) = harvest(&db, true, vec![shop_urls(&["lamp", "sofa"])]).await;
    let (_, independent) = harvest(&db, false, vec![shop_urls(&["lamp", "sofa"])]).await;

    assert_eq!(deduped, 1);
    assert_eq!(independent, 2);

    let storage = open_storage(&db).unwrap();
    let numbers: Vec<_> = storage
        .list_executions(ROOT)
        .unwrap()
        .iter()
        .map(|e| e.execution_number)
        .collect();
    assert_eq!(numbers, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_stage_failure_marks_execution_failed() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("harvest.db");

    let store = open_storage(&db)
        .unwrap()
        .begin_execution(ROOT, "hash", true)
        .unwrap();
    let mut controller = IterationController::new(
        settings(10, 5),
        Box::new(ScriptedFrontier::new(vec![shop_urls(&["lamp"])])),
        Box::new(TitleTable::new()),
        Box::new(ScriptedClassifier::failing()),
        Box::new(RecordDetails::new()),
        store,
    );

    let summary = controller.run(&CancellationToken::new()).await.unwrap();
    assert!(matches!(summary.stop_reason, StopReason::StageFailed { .. }));

    let mut store = controller.into_store();
    store.finish(summary.stop_reason.run_status()).unwrap();
    assert_eq!(store.total_products(), 0);

    let execution = store.archive().latest_execution(ROOT).unwrap().unwrap();
    assert_eq!(execution.status, RunStatus::Failed);
    assert!(execution.finished_at.is_some());
}
