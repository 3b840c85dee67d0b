//! Web-archive snapshot lookup, for sites that have since removed contact details.

use super::{extract_emails_from_html, fetch_text, CandidateSource, DiscoveryContext, Strategy};
use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::models::Domain;

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use url::Url;

#[derive(Debug, Default, Deserialize)]
struct Availability {
    #[serde(default)]
    archived_snapshots: Snapshots,
}

#[derive(Debug, Default, Deserialize)]
struct Snapshots {
    closest: Option<Snapshot>,
}

#[derive(Debug, Deserialize)]
struct Snapshot {
    #[serde(default)]
    available: bool,
    url: String,
}

pub struct ArchiveSource {
    config: Arc<Config>,
    client: reqwest::Client,
}

impl ArchiveSource {
    pub fn new(config: Arc<Config>, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    /// URL of the closest archived snapshot of the home page, if any.
    async fn closest_snapshot(&self, domain: &Domain) -> Result<Option<Url>> {
        let mut lookup = Url::parse(&self.config.archive_url)?;
        lookup.query_pairs_mut().append_pair("url", domain.as_str());

        let body = fetch_text(&self.client, &lookup).await?;
        let availability: Availability = serde_json::from_str(&body)?;
        match availability.archived_snapshots.closest {
            Some(snapshot) if snapshot.available => Ok(Some(Url::parse(&snapshot.url)?)),
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl CandidateSource for ArchiveSource {
    fn strategy(&self) -> Strategy {
        Strategy::Archive
    }

    async fn discover(&self, domain: &Domain, _ctx: &DiscoveryContext) -> Result<Vec<String>> {
        let Some(snapshot) = self.closest_snapshot(domain).await? else {
            tracing::debug!(target: "discovery_task", "[{}] No archived snapshot available", domain);
            return Ok(Vec::new());
        };
        let html = fetch_text(&self.client, &snapshot).await?;
        let emails = extract_emails_from_html(&html);
        tracing::debug!(target: "discovery_task",
            "[{}] Snapshot {} yielded {} address(es)", domain, snapshot, emails.len());
        Ok(emails)
    }
}
