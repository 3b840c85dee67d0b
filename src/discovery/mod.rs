//! Candidate discovery: independent strategies that each propose addresses for a
//! domain, and the [`Collector`] that runs them and unions their output.

pub mod archive;
pub mod dns_txt;
pub mod dork;
pub mod pattern;
pub mod social;
pub mod website;
pub mod whois;

pub use archive::ArchiveSource;
pub use dns_txt::DnsTxtSource;
pub use dork::DorkSource;
pub use pattern::PatternSource;
pub use social::SocialSource;
pub use website::WebsiteSource;
pub use whois::WhoisSource;

use crate::core::config::Config;
use crate::core::error::{AppError, Result};
use crate::core::models::{Candidate, Domain};
use crate::utils::dns::DnsLookup;

use async_trait::async_trait;
use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use url::Url;

/// Identifier of a discovery method. Also used as the origin tag of a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Website,
    Pattern,
    Whois,
    Social,
    Dns,
    Dork,
    Archive,
}

impl Strategy {
    pub const ALL: [Strategy; 7] = [
        Strategy::Website,
        Strategy::Pattern,
        Strategy::Whois,
        Strategy::Social,
        Strategy::Dns,
        Strategy::Dork,
        Strategy::Archive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Website => "website",
            Strategy::Pattern => "pattern",
            Strategy::Whois => "whois",
            Strategy::Social => "social",
            Strategy::Dns => "dns",
            Strategy::Dork => "dork",
            Strategy::Archive => "archive",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "website" | "crawl" | "scrape" => Ok(Strategy::Website),
            "pattern" | "patterns" => Ok(Strategy::Pattern),
            "whois" => Ok(Strategy::Whois),
            "social" => Ok(Strategy::Social),
            "dns" | "dns_txt" | "txt" => Ok(Strategy::Dns),
            "dork" | "search" => Ok(Strategy::Dork),
            "archive" | "wayback" => Ok(Strategy::Archive),
            other => Err(AppError::Config(format!(
                "Unknown discovery method '{}'. Expected one of: {}",
                other,
                Strategy::ALL.map(|s| s.as_str()).join(", ")
            ))),
        }
    }
}

/// Per-run inputs shared by every strategy.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryContext {
    /// Extra mailbox prefixes supplied by the caller for pattern generation.
    pub custom_prefixes: Vec<String>,
}

/// One discovery method.
///
/// Returning `Err` is the normal way to report failure: the [`Collector`] logs it
/// and treats the strategy as having found nothing.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    fn strategy(&self) -> Strategy;

    async fn discover(&self, domain: &Domain, ctx: &DiscoveryContext) -> Result<Vec<String>>;
}

/// Addresses found for one domain, deduplicated case-insensitively.
///
/// The first strategy to report an address keeps the attribution.
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    entries: Vec<Candidate>,
    seen: HashSet<String>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `address` unless an equal address is already present. Returns whether it was added.
    pub fn insert(&mut self, address: &str, source: Strategy) -> bool {
        let address = address.trim();
        if address.is_empty() || !self.seen.insert(address.to_lowercase()) {
            return false;
        }
        self.entries.push(Candidate {
            address: address.to_string(),
            source,
        });
        true
    }

    pub fn extend(&mut self, source: Strategy, addresses: impl IntoIterator<Item = String>) -> usize {
        addresses
            .into_iter()
            .filter(|address| self.insert(address, source))
            .count()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.seen.contains(&address.trim().to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        self.entries.iter()
    }

    pub fn into_vec(self) -> Vec<Candidate> {
        self.entries
    }
}

/// Runs the configured strategies for a domain and unions their results.
#[derive(Clone)]
pub struct Collector {
    sources: HashMap<Strategy, Arc<dyn CandidateSource>>,
}

impl Collector {
    /// A collector with every built-in strategy.
    pub fn from_config(
        config: Arc<Config>,
        http_client: reqwest::Client,
        resolver: Arc<dyn DnsLookup>,
    ) -> Self {
        Self::with_sources(vec![
            Arc::new(WebsiteSource::new(config.clone(), http_client.clone())),
            Arc::new(PatternSource::new(config.clone())),
            Arc::new(WhoisSource::new(config.clone())),
            Arc::new(SocialSource::new(config.clone(), http_client.clone())),
            Arc::new(DnsTxtSource::new(config.clone(), resolver)),
            Arc::new(DorkSource::new(config.clone(), http_client.clone())),
            Arc::new(ArchiveSource::new(config, http_client)),
        ])
    }

    /// A collector over explicit sources. A later source replaces an earlier one
    /// registered for the same strategy.
    pub fn with_sources(sources: Vec<Arc<dyn CandidateSource>>) -> Self {
        Self {
            sources: sources.into_iter().map(|s| (s.strategy(), s)).collect(),
        }
    }

    /// Runs `methods` concurrently, then merges their results in `methods` order so
    /// attribution does not depend on which strategy finished first.
    pub async fn collect(
        &self,
        domain: &Domain,
        methods: &[Strategy],
        ctx: &DiscoveryContext,
    ) -> CandidateSet {
        let mut ordered = Vec::with_capacity(methods.len());
        for method in methods {
            if !ordered.contains(method) {
                ordered.push(*method);
            }
        }

        let runs = ordered.iter().map(|strategy| async move {
            let result = match self.sources.get(strategy) {
                Some(source) => source.discover(domain, ctx).await,
                None => {
                    tracing::debug!(target: "discovery_task",
                        "[{}] No source registered for '{}'", domain, strategy);
                    Ok(Vec::new())
                }
            };
            (*strategy, result)
        });
        let results = join_all(runs).await;

        let mut set = CandidateSet::new();
        for (strategy, result) in results {
            match result {
                Ok(addresses) => {
                    let found = addresses.len();
                    let added = set.extend(strategy, addresses);
                    tracing::debug!(target: "discovery_task",
                        "[{}] {} found {} address(es), {} new", domain, strategy, found, added);
                }
                Err(e) => {
                    tracing::warn!(target: "discovery_task",
                        "[{}] Strategy '{}' failed, ignoring: {}", domain, strategy, e);
                }
            }
        }

        tracing::info!(target: "discovery_task",
            "[{}] Collected {} unique candidate(s) from {:?}", domain, set.len(), ordered);
        set
    }
}

/// Deliberately loose: the address filter applies the strict grammar later.
static EMAIL_SCAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[a-z0-9._%+'-]+@[a-z0-9](?:[a-z0-9-]*[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]*[a-z0-9])?)*\.[a-z]{2,24}\b")
        .expect("email scan regex is valid")
});

static MAILTO_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"a[href^="mailto:"], a[href^="MAILTO:"]"#).expect("valid selector"));

/// Pulls email-shaped substrings out of arbitrary text, lowercased, first-seen order.
pub(crate) fn extract_emails(text: &str) -> Vec<String> {
    let decoded = text
        .replace("&#64;", "@")
        .replace("&#x40;", "@")
        .replace("%40", "@")
        .replace("&amp;", "&");

    let mut seen = HashSet::new();
    EMAIL_SCAN
        .find_iter(&decoded)
        .map(|m| {
            m.as_str()
                .trim_start_matches(['.', '\'', '-'])
                .trim_end_matches('.')
                .to_lowercase()
        })
        .filter(|email| email.contains('@') && seen.insert(email.clone()))
        .collect()
}

/// Addresses from `mailto:` links first, then anything else email-shaped in the page.
pub(crate) fn extract_emails_from_html(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut emails: Vec<String> = document
        .select(&MAILTO_SELECTOR)
        .filter_map(|a| a.value().attr("href"))
        .flat_map(|href| {
            let target = &href["mailto:".len()..];
            let target = target.split('?').next().unwrap_or_default();
            extract_emails(target)
        })
        .collect();

    for email in extract_emails(html) {
        if !emails.contains(&email) {
            emails.push(email);
        }
    }
    emails
}

/// GETs `url` and returns the body, treating non-2xx statuses as errors.
pub(crate) async fn fetch_text(client: &reqwest::Client, url: &Url) -> Result<String> {
    tracing::trace!(target: "discovery_task", "GET {}", url);
    let response = client.get(url.clone()).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(AppError::HttpStatus {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    Ok(response.text().await?)
}
