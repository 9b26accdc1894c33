//! Offline classification by URL and title keywords

use crate::harvest::{Classifier, TitledUrl};
use crate::Result;
use async_trait::async_trait;
use url::Url;

/// Accepts pages whose URL path or title mentions a product keyword
///
/// Matching is case-insensitive. Any exclude keyword vetoes a match.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    keywords: Vec<String>,
    exclude: Vec<String>,
}

impl KeywordClassifier {
    pub fn new(keywords: &[String], exclude: &[String]) -> Self {
        Self {
            keywords: lowercase_non_blank(keywords),
            exclude: lowercase_non_blank(exclude),
        }
    }

    /// Returns true if the page looks like a product page
    pub fn matches(&self, page: &TitledUrl) -> bool {
        let path = Url::parse(&page.url)
            .map(|url| url.path().to_lowercase())
            .unwrap_or_else(|_| page.url.to_lowercase());
        let title = page.title.to_lowercase();
        let mentions = |needle: &String| path.contains(needle.as_str()) || title.contains(needle.as_str());

        self.keywords.iter().any(mentions) && !self.exclude.iter().any(mentions)
    }
}

fn lowercase_non_blank(words: &[String]) -> Vec<String> {
    words
        .iter()
        .map(|w| w.trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

#[async_trait]
impl Classifier for KeywordClassifier {
    async fn select_products(
        &self,
        pages: Vec<TitledUrl>,
        _batch_size: usize,
    ) -> Result<Vec<TitledUrl>> {
        Ok(pages.into_iter().filter(|page| self.matches(page)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> KeywordClassifier {
        KeywordClassifier::new(
            &["/p/".to_string(), "Sofa".to_string(), "  ".to_string()],
            &["/cart".to_string()],
        )
    }

    #[test]
    fn test_matches_path_or_title() {
        let c = classifier();
        assert!(c.matches(&TitledUrl::new("https://shop.example.com/p/12", "Lamp")));
        assert!(c.matches(&TitledUrl::new("https://shop.example.com/x", "Green sofa")));
        assert!(!c.matches(&TitledUrl::new("https://shop.example.com/about", "About us")));
    }

    #[test]
    fn test_host_is_not_matched() {
        let c = KeywordClassifier::new(&["shop".to_string()], &[]);
        assert!(!c.matches(&TitledUrl::new("https://shop.example.com/about", "About")));
    }

    #[test]
    fn test_exclude_vetoes() {
        let c = classifier();
        assert!(!c.matches(&TitledUrl::new("https://shop.example.com/cart/p/12", "Cart")));
    }

    #[tokio::test]
    async fn test_select_products_keeps_order() {
        let pages = vec![
            TitledUrl::new("https://shop.example.com/p/1", "One"),
            TitledUrl::new("https://shop.example.com/blog", "Blog"),
            TitledUrl::new("https://shop.example.com/p/2", "Two"),
        ];

        let selected = classifier().select_products(pages, 10).await.unwrap();

        let titles: Vec<_> = selected.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["One", "Two"]);
    }
}
