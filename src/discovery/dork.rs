//! Search-engine query for `"@domain"` and extraction from the result page.

use super::{extract_emails, fetch_text, CandidateSource, DiscoveryContext, Strategy};
use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::models::Domain;

use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

pub struct DorkSource {
    config: Arc<Config>,
    client: reqwest::Client,
}

impl DorkSource {
    pub fn new(config: Arc<Config>, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn query_url(&self, domain: &Domain) -> Result<Url> {
        let mut url = Url::parse(&self.config.search_url)?;
        url.query_pairs_mut()
            .append_pair("q", &format!("\"@{}\"", domain));
        Ok(url)
    }
}

/// Result pages mention plenty of unrelated addresses; only those at the domain count.
fn at_domain(emails: Vec<String>, domain: &Domain) -> Vec<String> {
    let suffix = format!("@{}", domain);
    emails.into_iter().filter(|e| e.ends_with(&suffix)).collect()
}

#[async_trait]
impl CandidateSource for DorkSource {
    fn strategy(&self) -> Strategy {
        Strategy::Dork
    }

    async fn discover(&self, domain: &Domain, _ctx: &DiscoveryContext) -> Result<Vec<String>> {
        let url = self.query_url(domain)?;
        let page = fetch_text(&self.client, &url).await?;
        let emails = at_domain(extract_emails(&page), domain);
        tracing::debug!(target: "discovery_task", "[{}] Search results yielded {} address(es)", domain, emails.len());
        Ok(emails)
    }
}
