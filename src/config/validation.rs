use crate::config::types::{
    ClassifierConfig, ClassifierKind, Config, CrawlerConfig, HarvestConfig, OutputConfig,
    UserAgentConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_harvest_config(&config.harvest)?;
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_classifier_config(&config.classifier)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates loop settings
fn validate_harvest_config(config: &HarvestConfig) -> Result<(), ConfigError> {
    let root = Url::parse(&config.root_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid root-url: {}", e)))?;

    if root.scheme() != "http" && root.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "root-url '{}' must use http or https",
            config.root_url
        )));
    }

    if root.host_str().is_none() {
        return Err(ConfigError::Validation(format!(
            "root-url '{}' has no host",
            config.root_url
        )));
    }

    if config.target_products < 1 {
        return Err(ConfigError::Validation(
            "target-products must be >= 1".to_string(),
        ));
    }

    check_range("batch-size", config.batch_size, 1, 1000)?;
    check_range("concurrent-requests", config.concurrent_requests, 1, 100)?;
    check_range(
        "classifier-batch-size",
        config.classifier_batch_size,
        1,
        500,
    )?;

    Ok(())
}

fn check_range(name: &str, value: usize, min: usize, max: usize) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::Validation(format!(
            "{} must be between {} and {}, got {}",
            name, min, max, value
        )));
    }
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.request_timeout < 1 {
        return Err(ConfigError::Validation(
            "request-timeout must be >= 1 second".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler-name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates classifier configuration for the selected kind
fn validate_classifier_config(config: &ClassifierConfig) -> Result<(), ConfigError> {
    match config.kind {
        ClassifierKind::Llm => {
            Url::parse(&config.endpoint)
                .map_err(|e| ConfigError::InvalidUrl(format!("Invalid endpoint: {}", e)))?;

            if config.model.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "model cannot be empty for the llm classifier".to_string(),
                ));
            }

            if config.api_key_env.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "api-key-env cannot be empty for the llm classifier".to_string(),
                ));
            }
        }
        ClassifierKind::Keywords => {
            if config.keywords.iter().all(|k| k.trim().is_empty()) {
                return Err(ConfigError::Validation(
                    "keywords classifier needs at least one keyword".to_string(),
                ));
            }
        }
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.results_dir.is_empty() {
        return Err(ConfigError::Validation(
            "results-dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact-email cannot be empty".to_string(),
        ));
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
