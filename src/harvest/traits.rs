//! Collaborator interfaces the iteration controller sequences
//!
//! Every method returns `Err` only when the stage as a whole cannot proceed.
//! Per-item problems (one page timing out, one page without a title) are
//! never errors: the item is simply missing from the returned vector.

use crate::harvest::types::{ProductRecord, RenderMode, TitledUrl};
use crate::Result;
use async_trait::async_trait;

/// Supplies candidate URLs for one root site
#[async_trait]
pub trait Frontier: Send {
    /// Decides whether the site renders its content client-side
    ///
    /// Called once, before the first batch is requested.
    async fn probe_rendering(&mut self) -> Result<RenderMode>;

    /// Returns up to `size` URLs this frontier has not handed out before
    ///
    /// An empty vector means the site is exhausted.
    async fn next_batch(&mut self, size: usize) -> Result<Vec<String>>;
}

/// Fetches page titles with bounded parallelism
#[async_trait]
pub trait TitleFetcher: Send + Sync {
    /// Returns a title for each URL that could be fetched, in input order
    ///
    /// At most `concurrency` requests are in flight at once. Failed or
    /// untitled pages are omitted, so the result may be shorter than `urls`.
    async fn fetch_titles(&self, urls: Vec<String>, concurrency: usize) -> Result<Vec<TitledUrl>>;
}

/// Decides which titled pages are product pages
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Returns the subset of `pages` judged to be product pages
    ///
    /// `batch_size` bounds how many pages go into one underlying call.
    async fn select_products(
        &self,
        pages: Vec<TitledUrl>,
        batch_size: usize,
    ) -> Result<Vec<TitledUrl>>;
}

/// Fetches structured product data with bounded parallelism
#[async_trait]
pub trait DetailFetcher: Send + Sync {
    /// Returns a record for each page whose details could be fetched
    ///
    /// At most `concurrency` requests are in flight at once. Failed pages are
    /// omitted.
    async fn fetch_details(
        &self,
        pages: Vec<TitledUrl>,
        concurrency: usize,
    ) -> Result<Vec<ProductRecord>>;
}
