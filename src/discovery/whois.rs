//! Registration-record lookup for registrant / admin / tech contact addresses.

use super::{extract_emails, CandidateSource, DiscoveryContext, Strategy};
use crate::core::config::Config;
use crate::core::error::{AppError, Result};
use crate::core::models::Domain;

use async_trait::async_trait;
use std::sync::Arc;
use whois_rust::{WhoIs, WhoIsLookupOptions};

/// Markers that registries put in place of a withheld contact.
const REDACTION_MARKERS: &[&str] = &["redacted", "privacy", "whoisguard", "protect", "proxy"];

pub struct WhoisSource {
    config: Arc<Config>,
}

impl WhoisSource {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Socket-level timeout for each WHOIS server contacted, including referrals.
    fn lookup_options(&self, domain: &str) -> Result<WhoIsLookupOptions> {
        let mut options = WhoIsLookupOptions::from_string(domain)
            .map_err(|e| AppError::Whois(format!("Invalid domain for WHOIS lookup: {}", e)))?;
        options.timeout = Some(self.config.request_timeout);
        Ok(options)
    }

    async fn lookup(&self, domain: &str) -> Result<String> {
        let servers = serde_json::to_string(&self.config.whois_servers)?;
        let whois = WhoIs::from_string(servers)
            .map_err(|e| AppError::Whois(format!("Failed to create WHOIS client: {}", e)))?;
        let options = self.lookup_options(domain)?;

        match tokio::time::timeout(
            self.config.request_timeout,
            tokio::task::spawn_blocking(move || whois.lookup(options)),
        )
        .await
        {
            Ok(Ok(Ok(text))) => Ok(text),
            Ok(Ok(Err(e))) => Err(AppError::Whois(format!("lookup failed: {}", e))),
            Ok(Err(e)) => Err(AppError::Task(format!("WHOIS lookup task failed: {}", e))),
            Err(_) => Err(AppError::Timeout(format!("WHOIS lookup for {}", domain))),
        }
    }
}

/// Emails from a raw WHOIS response, skipping privacy-service addresses.
pub(crate) fn emails_from_whois(text: &str) -> Vec<String> {
    extract_emails(text)
        .into_iter()
        .filter(|email| !REDACTION_MARKERS.iter().any(|m| email.contains(m)))
        .collect()
}

#[async_trait]
impl CandidateSource for WhoisSource {
    fn strategy(&self) -> Strategy {
        Strategy::Whois
    }

    async fn discover(&self, domain: &Domain, _ctx: &DiscoveryContext) -> Result<Vec<String>> {
        let text = self.lookup(domain.as_str()).await?;
        let emails = emails_from_whois(&text);
        tracing::debug!(target: "discovery_task", "[{}] WHOIS yielded {} address(es)", domain, emails.len());
        Ok(emails)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn blocking_lookup_carries_the_request_timeout() {
        let config = Config {
            request_timeout: Duration::from_millis(1500),
            ..Config::default()
        };
        let source = WhoisSource::new(Arc::new(config));
        let options = source.lookup_options("acme.co").unwrap();
        assert_eq!(options.timeout, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn keeps_contacts_and_drops_privacy_proxies() {
        let record = "\
Domain Name: ACME.CO
Registrar Abuse Contact Email: abuse@registrar.example
Registrant Email: owner@acme.co
Admin Email: 5f1c2e@withheldforprivacy.com
Tech Email: Select Request Email Form at https://domains.example/whoisguard
";
        let emails = emails_from_whois(record);
        assert!(emails.contains(&"owner@acme.co".to_string()));
        assert!(emails.contains(&"abuse@registrar.example".to_string()));
        assert!(!emails.iter().any(|e| e.contains("privacy")));
    }
}
