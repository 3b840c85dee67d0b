//! Syntactic validation and denylist filtering of candidate addresses.

use crate::core::config::Config;
use crate::core::models::Candidate;

use regex::Regex;
use std::collections::HashSet;

/// Role, placeholder and platform-noise markers. Matched case-insensitively as
/// substrings of the full address.
pub(crate) const DEFAULT_DENYLIST: &[&str] = &[
    // role / system mailboxes
    "noreply",
    "no-reply",
    "donotreply",
    "do-not-reply",
    "mailer-daemon",
    "postmaster",
    "abuse@",
    "spam@",
    "hostmaster",
    "webmaster",
    "root@",
    // placeholders and samples
    "@example.com",
    "@example.org",
    "@example.net",
    "test@test",
    "sample@",
    "user@domain",
    "email@domain",
    "name@domain",
    "your@email",
    "youremail@",
    "@yourdomain",
    "johndoe@",
    "john.doe@",
    // platform / vendor noise
    "@sentry",
    "sentry.io",
    "wixpress.com",
    "@godaddy.com",
    "@squarespace.com",
    "@wordpress.com",
    "@wpengine.com",
    "@shopify.com",
    "@cloudflare.com",
    "@hubspot.com",
    "@mailchimp.com",
    "@newrelic.com",
    "@datadoghq.com",
];

/// File extensions that show up as fake TLDs when scraping `name@2x.png`-style asset names.
const ASSET_SUFFIXES: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp", ".ico", ".css", ".js", ".bmp", ".tiff",
];

/// Rejects syntactically invalid and known-noise addresses.
///
/// Built once from [`Config`] and passed to whoever needs it; holds no global state.
#[derive(Debug, Clone)]
pub struct AddressFilter {
    email_regex: Regex,
    denylist: Vec<String>,
}

impl AddressFilter {
    pub fn new(email_regex: Regex, denylist: impl IntoIterator<Item = String>) -> Self {
        Self {
            email_regex,
            denylist: denylist
                .into_iter()
                .map(|m| m.trim().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.email_regex.clone(), config.denylist.iter().cloned())
    }

    /// Whether the address has the `local@domain.tld` shape.
    pub fn is_syntactically_valid(&self, address: &str) -> bool {
        let lower = address.to_lowercase();
        self.email_regex.is_match(&lower)
            && !ASSET_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix))
    }

    /// The first denylist marker contained in the address, if any.
    pub fn denylist_match(&self, address: &str) -> Option<&str> {
        let lower = address.to_lowercase();
        self.denylist
            .iter()
            .find(|marker| lower.contains(marker.as_str()))
            .map(String::as_str)
    }

    pub fn accepts(&self, address: &str) -> bool {
        self.is_syntactically_valid(address) && self.denylist_match(address).is_none()
    }

    /// Keeps acceptable candidates in their original (first-seen) order.
    pub fn apply(&self, candidates: Vec<Candidate>) -> Vec<Candidate> {
        let mut seen = HashSet::new();
        candidates
            .into_iter()
            .filter(|candidate| {
                if !self.is_syntactically_valid(&candidate.address) {
                    tracing::trace!(target: "enrich_task", "Filtered {} (syntax)", candidate.address);
                    return false;
                }
                if let Some(marker) = self.denylist_match(&candidate.address) {
                    tracing::trace!(target: "enrich_task", "Filtered {} (denylist: {})", candidate.address, marker);
                    return false;
                }
                seen.insert(candidate.address.to_lowercase())
            })
            .collect()
    }
}
