//! Scripted collaborators for driving the iteration controller
//!
//! Each fake records what it was asked for in a shared log, so tests can
//! inspect the calls after the fake has been boxed into the controller.

use async_trait::async_trait;
use product_harvester::harvest::{
    Classifier, DetailFetcher, Frontier, HarvestSettings, ProductRecord, RenderMode,
    TitleFetcher, TitledUrl,
};
use product_harvester::{HarvestError, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub type Log<T> = Arc<Mutex<Vec<T>>>;

pub fn shop_urls(paths: &[&str]) -> Vec<String> {
    paths
        .iter()
        .map(|p| format!("https://shop.example.com/{}", p))
        .collect()
}

pub fn settings(target_products: usize, batch_size: usize) -> HarvestSettings {
    HarvestSettings {
        target_products,
        batch_size,
        concurrency: 4,
        classifier_batch_size: 3,
    }
}

pub fn entries<T: Clone>(log: &Log<T>) -> Vec<T> {
    log.lock().unwrap().clone()
}

/// Hands out pre-scripted batches, then empty ones
pub struct ScriptedFrontier {
    batches: VecDeque<Vec<String>>,
    requests: Log<usize>,
    fail_probe: bool,
}

impl ScriptedFrontier {
    pub fn new(batches: Vec<Vec<String>>) -> Self {
        Self {
            batches: batches.into(),
            requests: Log::default(),
            fail_probe: false,
        }
    }

    pub fn failing_probe() -> Self {
        Self {
            fail_probe: true,
            ..Self::new(Vec::new())
        }
    }

    /// Batch sizes requested so far
    pub fn requests(&self) -> Log<usize> {
        self.requests.clone()
    }
}

#[async_trait]
impl Frontier for ScriptedFrontier {
    async fn probe_rendering(&mut self) -> Result<RenderMode> {
        if self.fail_probe {
            return Err(HarvestError::Classifier("probe unavailable".to_string()));
        }
        Ok(RenderMode::Static)
    }

    async fn next_batch(&mut self, size: usize) -> Result<Vec<String>> {
        self.requests.lock().unwrap().push(size);
        Ok(self.batches.pop_front().unwrap_or_default())
    }
}

/// Titles from a table, falling back to the last path segment
#[derive(Default)]
pub struct TitleTable {
    titles: HashMap<String, String>,
    calls: Log<Vec<String>>,
}

impl TitleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, url: &str, title: &str) -> Self {
        self.titles.insert(url.to_string(), title.to_string());
        self
    }

    pub fn calls(&self) -> Log<Vec<String>> {
        self.calls.clone()
    }
}

#[async_trait]
impl TitleFetcher for TitleTable {
    async fn fetch_titles(&self, urls: Vec<String>, _concurrency: usize) -> Result<Vec<TitledUrl>> {
        self.calls.lock().unwrap().push(urls.clone());
        Ok(urls
            .into_iter()
            .map(|url| {
                let title = self
                    .titles
                    .get(&url)
                    .cloned()
                    .unwrap_or_else(|| url.rsplit('/').next().unwrap_or_default().to_string());
                // Bypass TitledUrl::new so raw whitespace reaches the controller
                TitledUrl { url, title }
            })
            .collect())
    }
}

type Verdict = Box<dyn Fn(&TitledUrl) -> bool + Send + Sync>;

/// Accepts pages matching a predicate, or fails every call
pub struct ScriptedClassifier {
    verdict: Option<Verdict>,
    calls: Log<Vec<TitledUrl>>,
}

impl ScriptedClassifier {
    pub fn accepting(verdict: impl Fn(&TitledUrl) -> bool + Send + Sync + 'static) -> Self {
        Self {
            verdict: Some(Box::new(verdict)),
            calls: Log::default(),
        }
    }

    pub fn accept_all() -> Self {
        Self::accepting(|_| true)
    }

    pub fn failing() -> Self {
        Self {
            verdict: None,
            calls: Log::default(),
        }
    }

    pub fn calls(&self) -> Log<Vec<TitledUrl>> {
        self.calls.clone()
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn select_products(
        &self,
        pages: Vec<TitledUrl>,
        _batch_size: usize,
    ) -> Result<Vec<TitledUrl>> {
        self.calls.lock().unwrap().push(pages.clone());
        match &self.verdict {
            Some(verdict) => Ok(pages.into_iter().filter(|p| verdict(p)).collect()),
            None => Err(HarvestError::Classifier("model unavailable".to_string())),
        }
    }
}

/// One record per page; optionally every record twice
#[derive(Default)]
pub struct RecordDetails {
    duplicate: bool,
    calls: Log<Vec<TitledUrl>>,
}

impl RecordDetails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn duplicating() -> Self {
        Self {
            duplicate: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Log<Vec<TitledUrl>> {
        self.calls.clone()
    }
}

#[async_trait]
impl DetailFetcher for RecordDetails {
    async fn fetch_details(
        &self,
        pages: Vec<TitledUrl>,
        _concurrency: usize,
    ) -> Result<Vec<ProductRecord>> {
        self.calls.lock().unwrap().push(pages.clone());
        let copies = if self.duplicate { 2 } else { 1 };
        Ok(pages
            .iter()
            .flat_map(|page| std::iter::repeat_with(|| ProductRecord::new(page)).take(copies))
            .collect())
    }
}

/// Answers its first `open_calls` calls, then signals and never returns
pub struct StallingDetails {
    open_calls: usize,
    calls: AtomicUsize,
    stalled: Arc<Notify>,
}

impl StallingDetails {
    pub fn after(open_calls: usize) -> Self {
        Self {
            open_calls,
            calls: AtomicUsize::new(0),
            stalled: Arc::new(Notify::new()),
        }
    }

    /// Notified once a call has stalled
    pub fn stalled(&self) -> Arc<Notify> {
        self.stalled.clone()
    }
}

#[async_trait]
impl DetailFetcher for StallingDetails {
    async fn fetch_details(
        &self,
        pages: Vec<TitledUrl>,
        _concurrency: usize,
    ) -> Result<Vec<ProductRecord>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.open_calls {
            return Ok(pages.iter().map(ProductRecord::new).collect());
        }
        self.stalled.notify_one();
        std::future::pending().await
    }
}
