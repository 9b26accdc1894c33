//! Values that flow between pipeline stages

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Collapses whitespace runs and trims, so titles compare reliably
///
/// # Examples
///
/// ```
/// use product_harvester::harvest::normalize_title;
///
/// assert_eq!(normalize_title("  Blue\n\t Widget  "), "Blue Widget");
/// ```
pub fn normalize_title(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A page URL paired with its (normalised) title
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TitledUrl {
    pub url: String,
    pub title: String,
}

impl TitledUrl {
    pub fn new(url: impl Into<String>, title: &str) -> Self {
        Self {
            url: url.into(),
            title: normalize_title(title),
        }
    }
}

/// Structured data extracted from one product page
///
/// `title` is the page title the page was classified under; it is the
/// deduplication key in every result store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub title: String,
    pub url: String,
    pub name: String,
    pub price: Option<String>,
    pub currency: Option<String>,
    pub availability: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub sku: Option<String>,
    pub brand: Option<String>,
    pub harvested_at: DateTime<Utc>,
}

impl ProductRecord {
    /// Creates a record with only the page identity filled in
    pub fn new(page: &TitledUrl) -> Self {
        Self {
            title: page.title.clone(),
            url: page.url.clone(),
            name: page.title.clone(),
            price: None,
            currency: None,
            availability: None,
            description: None,
            image_url: None,
            sku: None,
            brand: None,
            harvested_at: Utc::now(),
        }
    }
}

/// How the harvested site builds its pages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Links and titles are present in the served HTML
    Static,
    /// Content is assembled client-side; served HTML is mostly script
    JavaScript,
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static => write!(f, "static"),
            Self::JavaScript => write!(f, "javascript-driven"),
        }
    }
}
