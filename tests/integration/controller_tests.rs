//! Iteration controller scenarios over scripted collaborators

use crate::support::{
    entries, settings, shop_urls, RecordDetails, ScriptedClassifier, ScriptedFrontier,
    StallingDetails, TitleTable,
};
use product_harvester::harvest::{HarvestSettings, IterationController, Stage, TitledUrl};
use product_harvester::storage::{MemoryResultStore, ResultStore};
use product_harvester::StopReason;
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;

fn titles_of(pages: &[TitledUrl]) -> Vec<&str> {
    pages.iter().map(|p| p.title.as_str()).collect()
}

#[tokio::test]
async fn test_two_iterations_then_exhaustion() {
    let frontier = ScriptedFrontier::new(vec![
        shop_urls(&["p1", "p2", "p3", "p4", "p5"]),
        shop_urls(&["p6", "p7", "p8", "p9", "p10"]),
    ]);
    let requests = frontier.requests();
    let titles = TitleTable::new();
    let title_calls = titles.calls();
    let accepted: HashSet<&str> = ["p1", "p2", "p3", "p6", "p8", "p10"].into_iter().collect();
    let classifier = ScriptedClassifier::accepting(move |page| accepted.contains(page.title.as_str()));
    let details = RecordDetails::new();
    let detail_calls = details.calls();

    let mut controller = IterationController::new(
        settings(10, 5),
        Box::new(frontier),
        Box::new(titles),
        Box::new(classifier),
        Box::new(details),
        MemoryResultStore::new(1),
    );

    let summary = controller.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(summary.stop_reason, StopReason::FrontierExhausted);
    assert_eq!(summary.iterations, 2);
    assert_eq!(summary.accepted, 6);
    assert_eq!(entries(&requests), vec![5, 5, 5]);
    assert_eq!(entries(&title_calls).iter().map(Vec::len).sum::<usize>(), 10);
    assert_eq!(entries(&detail_calls).len(), 2);
    assert_eq!(controller.store().records().len(), 6);
    assert_eq!(controller.store().save_count(), 1);
}

#[tokio::test]
async fn test_accepted_total_may_overshoot_only_in_last_iteration() {
    let frontier = ScriptedFrontier::new(vec![
        shop_urls(&["a", "b"]),
        shop_urls(&["c", "d"]),
        shop_urls(&["e", "f"]),
    ]);
    let requests = frontier.requests();

    let mut controller = IterationController::new(
        settings(3, 2),
        Box::new(frontier),
        Box::new(TitleTable::new()),
        Box::new(ScriptedClassifier::accept_all()),
        Box::new(RecordDetails::new()),
        MemoryResultStore::new(1),
    );

    let summary = controller.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(summary.stop_reason, StopReason::TargetReached);
    assert_eq!(summary.iterations, 2);
    assert_eq!(summary.accepted, 4);
    assert_eq!(entries(&requests).len(), 2);
}

#[tokio::test]
async fn test_empty_classification_persists_nothing_and_continues() {
    let frontier = ScriptedFrontier::new(vec![
        shop_urls(&["about", "blog"]),
        shop_urls(&["item-1", "item-2"]),
    ]);
    let classifier = ScriptedClassifier::accepting(|page| page.title.starts_with("item"));
    let classifier_calls = classifier.calls();
    let details = RecordDetails::new();
    let detail_calls = details.calls();

    let mut controller = IterationController::new(
        settings(10, 2),
        Box::new(frontier),
        Box::new(TitleTable::new()),
        Box::new(classifier),
        Box::new(details),
        MemoryResultStore::new(1),
    );

    let summary = controller.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(summary.iterations, 2);
    assert_eq!(summary.accepted, 2);
    assert_eq!(entries(&classifier_calls).len(), 2);
    // First iteration classified nothing, so details ran only once
    let detail_calls = entries(&detail_calls);
    assert_eq!(detail_calls.len(), 1);
    assert_eq!(titles_of(&detail_calls[0]), vec!["item-1", "item-2"]);
}

#[tokio::test]
async fn test_shared_title_within_batch_reaches_classifier_once() {
    let urls = shop_urls(&["lamp", "lamp-red", "chair"]);
    let titles = TitleTable::new()
        .with_title(&urls[0], "Brass Lamp")
        .with_title(&urls[1], "  Brass\n  Lamp ");
    let classifier = ScriptedClassifier::accept_all();
    let classifier_calls = classifier.calls();
    let details = RecordDetails::new();
    let detail_calls = details.calls();

    let mut controller = IterationController::new(
        settings(10, 3),
        Box::new(ScriptedFrontier::new(vec![urls.clone()])),
        Box::new(titles),
        Box::new(classifier),
        Box::new(details),
        MemoryResultStore::new(1),
    );

    let summary = controller.run(&CancellationToken::new()).await.unwrap();

    let classified = &entries(&classifier_calls)[0];
    assert_eq!(titles_of(classified), vec!["Brass Lamp", "chair"]);
    assert_eq!(classified[0].url, urls[0]);
    assert_eq!(entries(&detail_calls)[0].len(), 2);
    assert_eq!(summary.accepted, 2);
}

#[tokio::test]
async fn test_reemitted_urls_are_not_fetched_again() {
    let titles = TitleTable::new();
    let title_calls = titles.calls();

    let mut controller = IterationController::new(
        settings(10, 3),
        Box::new(ScriptedFrontier::new(vec![
            shop_urls(&["a", "b"]),
            shop_urls(&["b", "c", "c"]),
            shop_urls(&["a"]),
        ])),
        Box::new(titles),
        Box::new(ScriptedClassifier::accept_all()),
        Box::new(RecordDetails::new()),
        MemoryResultStore::new(1),
    );

    let summary = controller.run(&CancellationToken::new()).await.unwrap();

    // The third batch held only a known URL, so nothing was fetched for it
    assert_eq!(
        entries(&title_calls),
        vec![shop_urls(&["a", "b"]), shop_urls(&["c"])]
    );
    assert_eq!(summary.iterations, 3);
    assert_eq!(controller.processed_urls().len(), 3);
}

#[tokio::test]
async fn test_accepted_total_follows_store_count() {
    let mut controller = IterationController::new(
        settings(10, 3),
        Box::new(ScriptedFrontier::new(vec![shop_urls(&["x", "y", "z"])])),
        Box::new(TitleTable::new()),
        Box::new(ScriptedClassifier::accept_all()),
        Box::new(RecordDetails::duplicating()),
        MemoryResultStore::new(1),
    );

    let summary = controller.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(summary.accepted, 3);
    assert_eq!(controller.store().total_products(), 3);
}

#[tokio::test]
async fn test_previously_seen_titles_are_filtered() {
    let classifier = ScriptedClassifier::accept_all();
    let classifier_calls = classifier.calls();

    let mut controller = IterationController::new(
        settings(10, 3),
        Box::new(ScriptedFrontier::new(vec![shop_urls(&["lamp", "sofa"])])),
        Box::new(TitleTable::new()),
        Box::new(classifier),
        Box::new(RecordDetails::new()),
        MemoryResultStore::with_seen_titles(2, ["lamp"]),
    );

    let summary = controller.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(titles_of(&entries(&classifier_calls)[0]), vec!["sofa"]);
    assert_eq!(summary.execution_number, 2);
    assert_eq!(summary.accepted, 1);
    assert!(controller.store().seen_titles().contains("lamp"));
}

#[tokio::test]
async fn test_classifier_failure_stops_with_one_flush() {
    let details = RecordDetails::new();
    let detail_calls = details.calls();

    let mut controller = IterationController::new(
        settings(10, 3),
        Box::new(ScriptedFrontier::new(vec![shop_urls(&["a"]), shop_urls(&["b"])])),
        Box::new(TitleTable::new()),
        Box::new(ScriptedClassifier::failing()),
        Box::new(details),
        MemoryResultStore::new(1),
    );

    let summary = controller.run(&CancellationToken::new()).await.unwrap();

    match &summary.stop_reason {
        StopReason::StageFailed { stage, message } => {
            assert_eq!(*stage, Stage::Classify);
            assert!(message.contains("model unavailable"));
        }
        other => panic!("unexpected stop reason: {:?}", other),
    }
    assert_eq!(summary.iterations, 0);
    assert!(entries(&detail_calls).is_empty());
    assert_eq!(controller.store().save_count(), 1);
}

#[tokio::test]
async fn test_probe_failure_stops_before_discovery() {
    let frontier = ScriptedFrontier::failing_probe();
    let requests = frontier.requests();

    let mut controller = IterationController::new(
        settings(10, 3),
        Box::new(frontier),
        Box::new(TitleTable::new()),
        Box::new(ScriptedClassifier::accept_all()),
        Box::new(RecordDetails::new()),
        MemoryResultStore::new(1),
    );

    let summary = controller.run(&CancellationToken::new()).await.unwrap();

    assert!(matches!(
        summary.stop_reason,
        StopReason::StageFailed { stage: Stage::Init, .. }
    ));
    assert!(entries(&requests).is_empty());
    assert_eq!(controller.store().save_count(), 1);
}

#[tokio::test]
async fn test_interrupt_mid_iteration_discards_it_and_flushes_once() {
    let details = StallingDetails::after(1);
    let stalled = details.stalled();
    let shutdown = CancellationToken::new();

    let mut controller = IterationController::new(
        HarvestSettings {
            target_products: 10,
            batch_size: 2,
            concurrency: 2,
            classifier_batch_size: 2,
        },
        Box::new(ScriptedFrontier::new(vec![
            shop_urls(&["a", "b"]),
            shop_urls(&["c", "d"]),
            shop_urls(&["e"]),
        ])),
        Box::new(TitleTable::new()),
        Box::new(ScriptedClassifier::accept_all()),
        Box::new(details),
        MemoryResultStore::new(1),
    );

    let interrupter = {
        let shutdown = shutdown.clone();
        async move {
            stalled.notified().await;
            shutdown.cancel();
        }
    };
    let (outcome, ()) = tokio::join!(controller.run(&shutdown), interrupter);
    let summary = outcome.unwrap();

    assert_eq!(summary.stop_reason, StopReason::Interrupted);
    assert_eq!(summary.iterations, 1);
    assert_eq!(summary.accepted, 2);
    let stored: Vec<_> = controller
        .store()
        .records()
        .iter()
        .map(|r| r.title.as_str())
        .collect();
    assert_eq!(stored, vec!["a", "b"]);
    assert_eq!(controller.store().save_count(), 1);

    assert!(!controller.flush().unwrap());
    assert_eq!(controller.store().save_count(), 1);
}

#[tokio::test]
async fn test_rerun_resets_iteration_state() {
    let mut controller = IterationController::new(
        settings(10, 3),
        Box::new(ScriptedFrontier::new(vec![shop_urls(&["a"])])),
        Box::new(TitleTable::new()),
        Box::new(ScriptedClassifier::accept_all()),
        Box::new(RecordDetails::new()),
        MemoryResultStore::new(1),
    );

    let first = controller.run(&CancellationToken::new()).await.unwrap();
    let second = controller.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(first.accepted, 1);
    assert_eq!(second.accepted, 0);
    assert_eq!(second.iterations, 0);
    assert_eq!(second.stop_reason, StopReason::FrontierExhausted);
    assert_eq!(controller.store().save_count(), 2);
}
