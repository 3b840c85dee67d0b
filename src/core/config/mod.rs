//! Configuration for the enrichment pipeline.
//!
//! A [`Config`] is produced once by [`ConfigBuilder`] (defaults, then an optional TOML
//! file, then explicit overrides, then validation) and is shared read-only afterwards.

mod builder;
mod loading;
mod validation;

pub use builder::ConfigBuilder;
pub use crate::core::error::Result;

use crate::discovery::Strategy;
use crate::utils::filter::DEFAULT_DENYLIST;

use rand::Rng;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Conservative address grammar: dotted local-part, dotted domain, alphabetic TLD.
pub(crate) const EMAIL_REGEX: &str = r"(?i)^[a-z0-9_%+'-]+(?:\.[a-z0-9_%+'-]+)*@(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z]{2,24}$";

/// Effective configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub request_timeout: Duration,
    pub user_agent: String,
    /// Random pause range (seconds) between SMTP attempts within one domain.
    pub sleep_between_requests: (f32, f32),

    pub dns_timeout: Duration,
    pub dns_servers: Vec<String>,

    /// Overall budget for one SMTP handshake, connect included.
    pub smtp_timeout: Duration,
    pub smtp_sender_email: String,
    pub smtp_helo_name: String,
    pub smtp_port: u16,

    pub default_methods: Vec<Strategy>,
    pub common_pages_to_scrape: Vec<String>,
    pub generic_email_prefixes: Vec<String>,
    pub social_hosts: Vec<String>,
    pub search_url: String,
    pub archive_url: String,
    pub whois_servers: HashMap<String, String>,
    pub email_regex: Regex,

    pub denylist: Vec<String>,

    pub verify_emails: bool,
    pub find_decision_maker: bool,
    pub max_concurrency: usize,
    pub accept_catch_all: bool,
    pub decision_maker_pages: Vec<String>,

    pub loaded_config_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            user_agent: format!(
                "Mozilla/5.0 (compatible; email-enricher/{})",
                env!("CARGO_PKG_VERSION")
            ),
            sleep_between_requests: (0.5, 1.5),

            dns_timeout: Duration::from_secs(5),
            dns_servers: Vec::new(),

            smtp_timeout: Duration::from_secs(5),
            smtp_sender_email: "verify@email-enricher.local".to_string(),
            smtp_helo_name: "email-enricher.local".to_string(),
            smtp_port: 25,

            default_methods: vec![
                Strategy::Website,
                Strategy::Pattern,
                Strategy::Dns,
                Strategy::Dork,
            ],
            common_pages_to_scrape: vec![
                "/contact".to_string(),
                "/contact-us".to_string(),
                "/about".to_string(),
            ],
            generic_email_prefixes: ["info", "contact", "hello", "sales", "admin"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            social_hosts: [
                "facebook.com",
                "instagram.com",
                "linkedin.com",
                "twitter.com",
                "x.com",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            search_url: "https://html.duckduckgo.com/html/".to_string(),
            archive_url: "https://archive.org/wayback/available".to_string(),
            whois_servers: default_whois_servers(),
            email_regex: Regex::new(EMAIL_REGEX).expect("built-in email regex is valid"),

            denylist: DEFAULT_DENYLIST.iter().map(|s| s.to_string()).collect(),

            verify_emails: true,
            find_decision_maker: false,
            max_concurrency: 5,
            accept_catch_all: true,
            decision_maker_pages: vec![
                "/about".to_string(),
                "/about-us".to_string(),
                "/team".to_string(),
                "/our-team".to_string(),
            ],

            loaded_config_path: None,
        }
    }
}

fn default_whois_servers() -> HashMap<String, String> {
    [
        ("com", "whois.verisign-grs.com"),
        ("net", "whois.verisign-grs.com"),
        ("org", "whois.pir.org"),
        ("io", "whois.nic.io"),
        ("co", "whois.nic.co"),
        ("", "whois.iana.org"),
    ]
    .iter()
    .map(|(tld, server)| (tld.to_string(), server.to_string()))
    .collect()
}

/// Random pause drawn from `sleep_between_requests`.
pub(crate) fn get_random_sleep_duration(config: &Config) -> Duration {
    let (min, max) = config.sleep_between_requests;
    if max <= 0.0 {
        return Duration::ZERO;
    }
    let secs = if max > min {
        rand::thread_rng().gen_range(min..=max)
    } else {
        min
    };
    Duration::from_secs_f32(secs.max(0.0))
}

/// On-disk (TOML) representation. Every field is optional and overlays the defaults.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub network: NetworkSection,
    pub dns: DnsSection,
    pub smtp: SmtpSection,
    pub discovery: DiscoverySection,
    pub filter: FilterSection,
    pub enrichment: EnrichmentSection,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkSection {
    pub request_timeout: Option<f64>,
    pub user_agent: Option<String>,
    pub min_sleep: Option<f32>,
    pub max_sleep: Option<f32>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct DnsSection {
    pub dns_timeout: Option<f64>,
    pub dns_servers: Option<Vec<String>>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct SmtpSection {
    pub smtp_timeout: Option<f64>,
    pub smtp_sender_email: Option<String>,
    pub helo_name: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct DiscoverySection {
    pub methods: Option<Vec<Strategy>>,
    pub common_pages: Option<Vec<String>>,
    pub generic_email_prefixes: Option<Vec<String>>,
    pub social_hosts: Option<Vec<String>>,
    pub search_url: Option<String>,
    pub archive_url: Option<String>,
    pub whois_servers: Option<HashMap<String, String>>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct FilterSection {
    pub extra_denylist: Option<Vec<String>>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct EnrichmentSection {
    pub verify_emails: Option<bool>,
    pub find_decision_maker: Option<bool>,
    pub max_concurrency: Option<usize>,
    pub accept_catch_all: Option<bool>,
    pub decision_maker_pages: Option<Vec<String>>,
}
