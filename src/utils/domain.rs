//! Utility functions for handling domain names and URLs.

use crate::core::error::{AppError, Result};
use url::Url;

/// Reduces a website URL or raw domain string to a bare, lowercased hostname.
///
/// Accepts inputs such as `https://www.Acme.co/contact?x=1`, `acme.co/`, or
/// `http://acme.co:8080`. The scheme, `www.` prefix, port, path, query and any
/// trailing dot/slash are dropped.
///
/// Returns `Err(AppError::DomainExtraction)` if the input is empty or no plausible
/// host can be recovered.
pub(crate) fn get_domain_from_url(website_url_or_domain: &str) -> Result<String> {
    let trimmed_input = website_url_or_domain.trim();
    if trimmed_input.is_empty() {
        tracing::warn!("Received empty input for domain extraction.");
        return Err(AppError::DomainExtraction(
            "Input string is empty".to_string(),
        ));
    }

    let url = with_scheme(trimmed_input)
        .parse::<Url>()
        .map_err(|e| {
            tracing::debug!("Failed to parse '{}' as URL: {}", trimmed_input, e);
            AppError::DomainExtraction(format!("'{}' is not a URL or domain: {}", trimmed_input, e))
        })?;

    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| AppError::DomainExtraction(format!("No host in '{}'", trimmed_input)))?;

    let host = host.trim_end_matches('.').to_lowercase();
    let domain = host.strip_prefix("www.").unwrap_or(&host);

    if !domain.contains('.') || domain.starts_with('.') || domain.split('.').any(str::is_empty) {
        return Err(AppError::DomainExtraction(format!(
            "Extracted host '{}' is not a registrable domain",
            domain
        )));
    }

    tracing::trace!("Normalized '{}' to domain '{}'", trimmed_input, domain);
    Ok(domain.to_string())
}

/// Builds the `https://` root URL for a normalized domain, optionally joined with a path.
pub(crate) fn site_url(domain: &str, path: &str) -> Result<Url> {
    let root = Url::parse(&format!("https://{}/", domain))?;
    Ok(root.join(path.trim_start_matches('/'))?)
}

fn with_scheme(input: &str) -> String {
    if input.contains("://") {
        input.to_string()
    } else {
        format!("https://{}", input)
    }
}
