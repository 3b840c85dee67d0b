//! Addresses embedded in TXT records of the domain and its DMARC policy.

use super::{extract_emails, CandidateSource, DiscoveryContext, Strategy};
use crate::core::config::Config;
use crate::core::error::{AppError, Result};
use crate::core::models::Domain;
use crate::utils::dns::{DnsLookup, LookupFailure};

use async_trait::async_trait;
use std::sync::Arc;

pub struct DnsTxtSource {
    config: Arc<Config>,
    resolver: Arc<dyn DnsLookup>,
}

impl DnsTxtSource {
    pub fn new(config: Arc<Config>, resolver: Arc<dyn DnsLookup>) -> Self {
        Self { config, resolver }
    }

    async fn records(&self, name: &str) -> std::result::Result<Vec<String>, LookupFailure> {
        match tokio::time::timeout(self.config.dns_timeout * 2, self.resolver.lookup_txt(name)).await {
            Ok(result) => result,
            Err(_) => Err(LookupFailure::Other(format!("TXT lookup for {} timed out", name))),
        }
    }
}

#[async_trait]
impl CandidateSource for DnsTxtSource {
    fn strategy(&self) -> Strategy {
        Strategy::Dns
    }

    async fn discover(&self, domain: &Domain, _ctx: &DiscoveryContext) -> Result<Vec<String>> {
        let names = [domain.to_string(), format!("_dmarc.{}", domain)];
        let (apex, dmarc) = tokio::join!(self.records(&names[0]), self.records(&names[1]));

        let mut emails = Vec::new();
        let mut failures = Vec::new();
        for (name, lookup) in names.iter().zip([apex, dmarc]) {
            match lookup {
                Ok(records) => {
                    for record in records {
                        for email in extract_emails(&record) {
                            if !emails.contains(&email) {
                                emails.push(email);
                            }
                        }
                    }
                }
                Err(LookupFailure::NxDomain) => {
                    tracing::debug!(target: "discovery_task", "[{}] {} does not exist", domain, name);
                }
                Err(LookupFailure::Other(detail)) => failures.push(format!("{}: {}", name, detail)),
            }
        }

        if emails.is_empty() && failures.len() == names.len() {
            return Err(AppError::DnsLookup(format!("TXT lookups failed ({})", failures.join("; "))));
        }
        Ok(emails)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::dns::MxRecord;
    use std::collections::HashMap;

    struct TxtOnly(HashMap<&'static str, Vec<&'static str>>);

    #[async_trait]
    impl DnsLookup for TxtOnly {
        async fn lookup_mx(&self, _domain: &str) -> std::result::Result<Vec<MxRecord>, LookupFailure> {
            Ok(Vec::new())
        }

        async fn lookup_txt(&self, name: &str) -> std::result::Result<Vec<String>, LookupFailure> {
            self.0
                .get(name)
                .map(|records| records.iter().map(|r| r.to_string()).collect())
                .ok_or(LookupFailure::NxDomain)
        }
    }

    #[tokio::test]
    async fn reads_apex_and_dmarc_records() {
        let dns = TxtOnly(HashMap::from([
            ("acme.co", vec!["v=spf1 include:_spf.google.com ~all", "contact=hello@acme.co"]),
            ("_dmarc.acme.co", vec!["v=DMARC1; p=quarantine; rua=mailto:dmarc@acme.co"]),
        ]));
        let source = DnsTxtSource::new(Arc::new(Config::default()), Arc::new(dns));
        let found = source
            .discover(&Domain::parse("acme.co").unwrap(), &DiscoveryContext::default())
            .await
            .unwrap();
        assert_eq!(found, vec!["hello@acme.co", "dmarc@acme.co"]);
    }

    #[tokio::test]
    async fn missing_records_are_not_an_error() {
        let source = DnsTxtSource::new(Arc::new(Config::default()), Arc::new(TxtOnly(HashMap::new())));
        let found = source
            .discover(&Domain::parse("acme.co").unwrap(), &DiscoveryContext::default())
            .await
            .unwrap();
        assert!(found.is_empty());
    }
}
