//! Title fetching over HTTP

use crate::crawler::fetcher::fetch_title;
use crate::crawler::scheduler::run_bounded;
use crate::harvest::{TitleFetcher, TitledUrl};
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;

/// Fetches page titles by streaming each page only up to its `</title>`
pub struct HttpTitleFetcher {
    client: Client,
}

impl HttpTitleFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TitleFetcher for HttpTitleFetcher {
    async fn fetch_titles(&self, urls: Vec<String>, concurrency: usize) -> Result<Vec<TitledUrl>> {
        let requested = urls.len();
        let client = self.client.clone();

        let titled = run_bounded(urls, concurrency, move |url: String| {
            let client = client.clone();
            async move {
                fetch_title(&client, &url)
                    .await
                    .map(|title| TitledUrl::new(url, &title))
            }
        })
        .await;

        tracing::debug!("Fetched {} titles for {} URLs", titled.len(), requested);
        Ok(titled)
    }
}
