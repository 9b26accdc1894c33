//! Product detail fetching and extraction
//!
//! Structured data comes first: a schema.org `Product` in JSON-LD, found at
//! the top level, inside arrays, under `@graph`, or as a page's
//! `mainEntity`. Fields it lacks are filled from OpenGraph/product meta
//! tags, then microdata `itemprop` attributes, then the first `<h1>`.

use crate::crawler::fetcher::{fetch_page, FetchResult};
use crate::crawler::scheduler::run_bounded;
use crate::harvest::{normalize_title, DetailFetcher, ProductRecord, TitledUrl};
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use serde_json::Value;

/// Fetches classified pages and extracts a product record from each
pub struct HttpDetailFetcher {
    client: Client,
}

impl HttpDetailFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DetailFetcher for HttpDetailFetcher {
    async fn fetch_details(
        &self,
        pages: Vec<TitledUrl>,
        concurrency: usize,
    ) -> Result<Vec<ProductRecord>> {
        let requested = pages.len();
        let client = self.client.clone();

        let records = run_bounded(pages, concurrency, move |page: TitledUrl| {
            let client = client.clone();
            async move {
                match fetch_page(&client, &page.url).await {
                    FetchResult::Success { body, .. } => Some(extract_product(&body, &page)),
                    other => {
                        tracing::debug!("Detail fetch failed for {}: {:?}", page.url, other);
                        None
                    }
                }
            }
        })
        .await;

        tracing::debug!("Fetched details for {} of {} pages", records.len(), requested);
        Ok(records)
    }
}

/// Extracts product data from a product page
///
/// The record keeps `page.title` as its title; `name` falls back to that
/// title when the page names the product nowhere else.
pub fn extract_product(html: &str, page: &TitledUrl) -> ProductRecord {
    let document = Html::parse_document(html);
    let mut record = ProductRecord::new(page);

    let product = json_ld_product(&document);
    let offer = product.as_ref().and_then(|p| first(p.get("offers")?));
    let from_ld = |key: &str| product.as_ref().and_then(|p| text_value(p.get(key)?));
    let from_offer = |key: &str| offer.and_then(|o| text_value(o.get(key)?));

    let name = from_ld("name")
        .or_else(|| meta(&document, &["meta[property='og:title']"]))
        .or_else(|| itemprop(&document, "name"))
        .or_else(|| first_text(&document, "h1"));
    if let Some(name) = name {
        record.name = normalize_title(&name);
    }

    record.price = from_offer("price")
        .or_else(|| from_offer("lowPrice"))
        .or_else(|| {
            meta(
                &document,
                &[
                    "meta[property='product:price:amount']",
                    "meta[property='og:price:amount']",
                ],
            )
        })
        .or_else(|| itemprop(&document, "price"));

    record.currency = from_offer("priceCurrency")
        .or_else(|| {
            meta(
                &document,
                &[
                    "meta[property='product:price:currency']",
                    "meta[property='og:price:currency']",
                ],
            )
        })
        .or_else(|| itemprop(&document, "priceCurrency"));

    record.availability = from_offer("availability")
        .or_else(|| meta(&document, &["meta[property='product:availability']"]))
        .or_else(|| itemprop(&document, "availability"))
        .map(|value| short_schema_value(&value));

    record.description = from_ld("description")
        .or_else(|| {
            meta(
                &document,
                &["meta[property='og:description']", "meta[name='description']"],
            )
        })
        .or_else(|| itemprop(&document, "description"))
        .map(|text| normalize_title(&text));

    record.image_url = product
        .as_ref()
        .and_then(|p| image_value(p.get("image")?))
        .or_else(|| meta(&document, &["meta[property='og:image']"]))
        .or_else(|| itemprop(&document, "image"));

    record.sku = from_ld("sku")
        .or_else(|| from_ld("mpn"))
        .or_else(|| itemprop(&document, "sku"));

    record.brand = product
        .as_ref()
        .and_then(|p| named_value(p.get("brand")?))
        .or_else(|| meta(&document, &["meta[property='product:brand']"]))
        .or_else(|| itemprop(&document, "brand"));

    record
}

/// Finds the first schema.org Product in the page's JSON-LD blocks
fn json_ld_product(document: &Html) -> Option<Value> {
    let selector = Selector::parse(r#"script[type="application/ld+json"]"#).ok()?;

    document.select(&selector).find_map(|script| {
        let raw = script.text().collect::<String>();
        match serde_json::from_str::<Value>(raw.trim()) {
            Ok(value) => find_product(&value).cloned(),
            Err(e) => {
                tracing::trace!("Ignoring malformed JSON-LD block: {}", e);
                None
            }
        }
    })
}

fn find_product(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.iter().find_map(find_product),
        Value::Object(map) => {
            if is_product_type(map.get("@type")) {
                return Some(value);
            }
            ["@graph", "mainEntity", "itemListElement"]
                .iter()
                .filter_map(|key| map.get(*key))
                .find_map(find_product)
        }
        _ => None,
    }
}

fn is_product_type(kind: Option<&Value>) -> bool {
    match kind {
        Some(Value::String(s)) => is_product_name(s),
        Some(Value::Array(kinds)) => kinds
            .iter()
            .any(|k| k.as_str().map_or(false, is_product_name)),
        _ => false,
    }
}

fn is_product_name(kind: &str) -> bool {
    let kind = kind.rsplit('/').next().unwrap_or(kind);
    kind.eq_ignore_ascii_case("Product") || kind.eq_ignore_ascii_case("ProductGroup")
}

/// First element of an array, or the value itself
fn first(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.first(),
        Value::Null => None,
        other => Some(other),
    }
}

/// Strings and numbers as trimmed text; anything else is ignored
fn text_value(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// A plain string or an object carrying a `name`
fn named_value(value: &Value) -> Option<String> {
    match first(value)? {
        Value::Object(map) => text_value(map.get("name")?),
        other => text_value(other),
    }
}

/// A URL string, an array of them, or an ImageObject
fn image_value(value: &Value) -> Option<String> {
    match first(value)? {
        Value::Object(map) => map
            .get("url")
            .or_else(|| map.get("contentUrl"))
            .and_then(text_value),
        other => text_value(other),
    }
}

/// "https://schema.org/InStock" becomes "InStock"
fn short_schema_value(value: &str) -> String {
    value
        .trim()
        .rsplit('/')
        .next()
        .unwrap_or(value)
        .to_string()
}

fn meta(document: &Html, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|raw| {
        let selector = Selector::parse(raw).ok()?;
        document
            .select(&selector)
            .filter_map(|element| element.value().attr("content"))
            .map(str::trim)
            .find(|content| !content.is_empty())
            .map(str::to_string)
    })
}

/// Microdata value: `content`, then `href`/`src`, then the element text
fn itemprop(document: &Html, prop: &str) -> Option<String> {
    let selector = Selector::parse(&format!("[itemprop='{}']", prop)).ok()?;

    document.select(&selector).find_map(|element| {
        let attrs = element.value();
        let value = attrs
            .attr("content")
            .or_else(|| attrs.attr("href"))
            .or_else(|| attrs.attr("src"))
            .map(str::to_string)
            .unwrap_or_else(|| normalize_title(&element.text().collect::<String>()));
        let value = value.trim().to_string();
        (!value.is_empty()).then_some(value)
    })
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .map(|element| normalize_title(&element.text().collect::<String>()))
        .find(|text| !text.is_empty())
}
