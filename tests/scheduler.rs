// tests/scheduler.rs
mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{candidate, scraper, source, StubExtractor, StubFetcher};
use conference_scraper::scheduler::spawn_scheduler;
use conference_scraper::store::MemoryStore;

#[tokio::test]
async fn first_tick_runs_a_pass_immediately() {
    let store = Arc::new(MemoryStore::with_sources(vec![source(
        "1",
        "ПГУПС",
        "https://pgups.test",
    )]));
    let s = scraper(
        &store,
        StubFetcher::default().page("https://pgups.test", "p"),
        StubExtractor::default().answer("p", vec![candidate("Транспорт будущего", "2099-03-15")]),
    );

    let handle = spawn_scheduler(Arc::new(s), Duration::from_secs(3600));

    let stamped = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if store.source("1").and_then(|s| s.last_scraped_at).is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    handle.abort();

    assert!(stamped.is_ok(), "scheduler never ran a pass");
    assert_eq!(store.conferences().len(), 1);
}

#[tokio::test]
async fn failed_pass_does_not_stop_the_timer() {
    let store = Arc::new(MemoryStore::with_sources(vec![source(
        "1",
        "ПГУПС",
        "https://pgups.test",
    )]));
    store.fail_registry_with("temporarily unavailable");
    let fetcher = Arc::new(StubFetcher::default().page("https://pgups.test", "p"));
    let s = conference_scraper::Scraper::new(
        store.clone(),
        store.clone(),
        fetcher.clone(),
        Arc::new(StubExtractor::default()),
    );

    let handle = spawn_scheduler(Arc::new(s), Duration::from_millis(50));
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(!handle.is_finished(), "scheduler task exited after an error");
    handle.abort();
    assert!(fetcher.calls.lock().unwrap().is_empty());
}
