//! Contains validation logic for the final Config struct.

use super::{Config, Result};
use crate::core::error::AppError;
use std::time::Duration;

/// Validates the configuration settings after loading and potential overrides.
/// Mutates the config to clamp values or set defaults where applicable and logical.
/// Internal helper for the builder's `build` method.
pub(crate) fn validate_config(config: &mut Config) -> Result<()> {
    if config.sleep_between_requests.0 < 0.0 || config.sleep_between_requests.1 < 0.0 {
        return Err(AppError::Config(
            "Sleep durations cannot be negative.".to_string(),
        ));
    }
    if config.sleep_between_requests.0 > config.sleep_between_requests.1 {
        tracing::warn!(
            "Min sleep ({:.2}s) > Max sleep ({:.2}s). Setting max sleep = min sleep.",
            config.sleep_between_requests.0,
            config.sleep_between_requests.1
        );
        config.sleep_between_requests.1 = config.sleep_between_requests.0;
    }
    if config.smtp_timeout.is_zero() {
        tracing::warn!("SMTP timeout was set to 0. Using the 5s reference budget.");
        config.smtp_timeout = Duration::from_secs(5);
    }
    if config.dns_timeout.is_zero() {
        tracing::warn!("DNS timeout was set to 0. Using 5s.");
        config.dns_timeout = Duration::from_secs(5);
    }
    if config.max_concurrency == 0 {
        tracing::warn!("Max concurrency was set to 0. Setting to 1.");
        config.max_concurrency = 1;
    }
    if config.smtp_port == 0 {
        return Err(AppError::Config("SMTP port cannot be 0.".to_string()));
    }
    if !config.email_regex.is_match(&config.smtp_sender_email) {
        return Err(AppError::Config(format!(
            "Invalid SMTP sender email format: {}",
            config.smtp_sender_email
        )));
    }
    if config.smtp_helo_name.is_empty() || config.smtp_helo_name.contains(char::is_whitespace) {
        return Err(AppError::Config(format!(
            "Invalid HELO name: '{}'",
            config.smtp_helo_name
        )));
    }
    if config.default_methods.is_empty() {
        tracing::warn!("No discovery methods configured. Every domain will yield zero candidates.");
    }
    for url in [&config.search_url, &config.archive_url] {
        url::Url::parse(url)
            .map_err(|e| AppError::Config(format!("Invalid endpoint URL '{}': {}", url, e)))?;
    }
    config.generic_email_prefixes = config
        .generic_email_prefixes
        .iter()
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .collect();
    Ok(())
}
