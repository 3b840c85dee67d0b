//! Handles loading configuration from files and applying it to the Config struct.

use super::{Config, ConfigFile};
use anyhow::Context;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Loads configuration settings from a TOML file.
/// Returns the parsed `ConfigFile` content.
/// Internal to the builder logic.
pub(crate) fn load_config_file(file_path: &str) -> anyhow::Result<ConfigFile> {
    let path = Path::new(file_path);
    if !path.exists() || !path.is_file() {
        return Err(anyhow::anyhow!(
            "File not found or is not a file: {}",
            file_path
        ));
    }
    tracing::debug!("Attempting to read config file: {}", file_path);
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", file_path))?;

    tracing::debug!("Attempting to parse TOML from: {}", file_path);
    let config_file_content: ConfigFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse TOML configuration from {}", file_path))?;

    tracing::debug!("Successfully parsed configuration file: {}", file_path);
    Ok(config_file_content)
}

fn secs(value: f64) -> Duration {
    Duration::from_secs_f64(value.max(0.0))
}

/// Applies settings from a parsed `ConfigFile` onto a mutable `Config` instance.
/// Internal helper for the builder. This merges settings.
pub(crate) fn apply_file_config(config: &mut Config, file_config: &ConfigFile) {
    // Network
    if let Some(timeout) = file_config.network.request_timeout {
        config.request_timeout = secs(timeout);
    }
    if let Some(min_sleep) = file_config.network.min_sleep {
        config.sleep_between_requests.0 = min_sleep;
    }
    if let Some(max_sleep) = file_config.network.max_sleep {
        config.sleep_between_requests.1 = max_sleep;
    }
    if let Some(ref user_agent) = file_config.network.user_agent {
        config.user_agent = user_agent.clone();
    }

    // DNS
    if let Some(timeout) = file_config.dns.dns_timeout {
        config.dns_timeout = secs(timeout);
    }
    if let Some(ref servers) = file_config.dns.dns_servers {
        if !servers.is_empty() {
            config.dns_servers = servers.clone();
        }
    }

    // SMTP
    if let Some(timeout) = file_config.smtp.smtp_timeout {
        config.smtp_timeout = secs(timeout);
    }
    if let Some(ref sender) = file_config.smtp.smtp_sender_email {
        config.smtp_sender_email = sender.trim().to_string();
    }
    if let Some(ref helo) = file_config.smtp.helo_name {
        config.smtp_helo_name = helo.trim().to_string();
    }
    if let Some(port) = file_config.smtp.port {
        config.smtp_port = port;
    }

    // Discovery
    if let Some(ref methods) = file_config.discovery.methods {
        config.default_methods = methods.clone();
    }
    if let Some(ref pages) = file_config.discovery.common_pages {
        config.common_pages_to_scrape = pages.clone();
    }
    if let Some(ref prefixes) = file_config.discovery.generic_email_prefixes {
        config.generic_email_prefixes = prefixes.clone();
    }
    if let Some(ref hosts) = file_config.discovery.social_hosts {
        config.social_hosts = hosts.clone();
    }
    if let Some(ref url) = file_config.discovery.search_url {
        config.search_url = url.trim().to_string();
    }
    if let Some(ref url) = file_config.discovery.archive_url {
        config.archive_url = url.trim().to_string();
    }
    if let Some(ref servers) = file_config.discovery.whois_servers {
        config
            .whois_servers
            .extend(servers.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    // Filter
    if let Some(ref markers) = file_config.filter.extra_denylist {
        for marker in markers {
            let marker = marker.trim().to_lowercase();
            if !marker.is_empty() && !config.denylist.contains(&marker) {
                config.denylist.push(marker);
            }
        }
    }

    // Enrichment
    if let Some(verify) = file_config.enrichment.verify_emails {
        config.verify_emails = verify;
    }
    if let Some(find) = file_config.enrichment.find_decision_maker {
        config.find_decision_maker = find;
    }
    if let Some(concurrency) = file_config.enrichment.max_concurrency {
        config.max_concurrency = concurrency;
    }
    if let Some(accept) = file_config.enrichment.accept_catch_all {
        config.accept_catch_all = accept;
    }
    if let Some(ref pages) = file_config.enrichment.decision_maker_pages {
        config.decision_maker_pages = pages.clone();
    }
}
