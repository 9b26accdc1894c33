//! Classifier implementations
//!
//! Two classifiers decide which titled URLs are product pages:
//! - [`LlmClassifier`] asks a chat-completions model, one call per chunk
//! - [`KeywordClassifier`] matches URL paths and titles offline

mod keyword;
mod llm;

pub use keyword::KeywordClassifier;
pub use llm::LlmClassifier;

use crate::config::{ClassifierConfig, ClassifierKind};
use crate::harvest::Classifier;
use crate::{ConfigError, Result};
use reqwest::Client;

/// Builds the classifier named by `config.kind`
///
/// The LLM classifier reads its API key from the environment variable named
/// in the config and fails if it is unset or empty.
pub fn build_classifier(config: &ClassifierConfig, client: Client) -> Result<Box<dyn Classifier>> {
    match config.kind {
        ClassifierKind::Keywords => {
            tracing::info!(
                "Using keyword classifier ({} keywords, {} excludes)",
                config.keywords.len(),
                config.exclude_keywords.len()
            );
            Ok(Box::new(KeywordClassifier::new(
                &config.keywords,
                &config.exclude_keywords,
            )))
        }
        ClassifierKind::Llm => {
            let api_key = std::env::var(&config.api_key_env)
                .ok()
                .filter(|key| !key.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingEnv(config.api_key_env.clone()))?;

            tracing::info!(
                "Using LLM classifier (model {} at {})",
                config.model,
                config.endpoint
            );
            Ok(Box::new(LlmClassifier::new(
                client,
                &config.endpoint,
                &config.model,
                api_key,
                config.max_retries,
            )))
        }
    }
}
