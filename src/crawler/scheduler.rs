//! Request scheduling for the fetchers and the frontier
//!
//! This module handles:
//! - Bounded fan-out of per-page fetches via a semaphore
//! - Minimum delays between frontier requests to the harvested site
//! - Integrating robots.txt crawl delays

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Runs `task` over every item with at most `cap` tasks in flight
///
/// Results come back in input order. Items whose task returns `None` or
/// panics are dropped. Dropping the returned future aborts every task still
/// running, which is how an interrupted stage stops its requests.
///
/// # Arguments
///
/// * `items` - Inputs, one task each
/// * `cap` - Maximum number of concurrently running tasks (at least 1)
/// * `task` - Builds the future for one item
pub async fn run_bounded<I, T, F, Fut>(items: Vec<I>, cap: usize, task: F) -> Vec<T>
where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(I) -> Fut,
    Fut: Future<Output = Option<T>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(cap.max(1)));
    let mut join_set = JoinSet::new();

    for (index, item) in items.into_iter().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        let work = task(item);
        join_set.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return None,
            };
            work.await.map(|value| (index, value))
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(Some(indexed)) => results.push(indexed),
            Ok(None) => {}
            Err(e) => tracing::warn!("Fetch task did not complete: {}", e),
        }
    }

    results.sort_by_key(|(index, _)| *index);
    results.into_iter().map(|(_, value)| value).collect()
}

/// Spaces out requests to one site
#[derive(Debug, Clone)]
pub struct RequestPacer {
    delay: Duration,
    last_request: Option<Instant>,
}

impl RequestPacer {
    /// Creates a pacer enforcing `delay` between requests
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_request: None,
        }
    }

    /// Raises the delay to a robots.txt `Crawl-delay`, never lowering it
    pub fn apply_crawl_delay(&mut self, crawl_delay: Option<Duration>) {
        if let Some(crawl_delay) = crawl_delay {
            if crawl_delay > self.delay {
                tracing::debug!("Honouring robots.txt crawl delay of {:?}", crawl_delay);
                self.delay = crawl_delay;
            }
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Time left before the next request may start
    pub fn time_until_next_request(&self, now: Instant) -> Option<Duration> {
        let last = self.last_request?;
        let ready_at = last + self.delay;
        (ready_at > now).then(|| ready_at - now)
    }

    /// Waits until the delay has elapsed, then records a request
    pub async fn wait_turn(&mut self) {
        if let Some(wait) = self.time_until_next_request(Instant::now()) {
            tokio::time::sleep(wait).await;
        }
        self.last_request = Some(Instant::now());
    }
}
