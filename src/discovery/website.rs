//! Crawls the home page and a few shallow contact pages.

use super::{extract_emails_from_html, fetch_text, CandidateSource, DiscoveryContext, Strategy};
use crate::core::config::Config;
use crate::core::error::{AppError, Result};
use crate::core::models::Domain;
use crate::utils::domain::site_url;

use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use url::Url;

pub struct WebsiteSource {
    config: Arc<Config>,
    client: reqwest::Client,
    base_url: Option<Url>,
}

impl WebsiteSource {
    pub fn new(config: Arc<Config>, client: reqwest::Client) -> Self {
        Self {
            config,
            client,
            base_url: None,
        }
    }

    /// Crawl `base_url` instead of `https://<domain>/`.
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    fn page_urls(&self, domain: &Domain) -> Result<Vec<Url>> {
        let mut paths = vec!["/".to_string()];
        for page in &self.config.common_pages_to_scrape {
            if !paths.contains(page) {
                paths.push(page.clone());
            }
        }

        paths
            .iter()
            .map(|path| -> Result<Url> {
                match &self.base_url {
                    Some(base) => Ok(base.join(path.trim_start_matches('/'))?),
                    None => site_url(domain.as_str(), path),
                }
            })
            .collect()
    }
}

#[async_trait]
impl CandidateSource for WebsiteSource {
    fn strategy(&self) -> Strategy {
        Strategy::Website
    }

    async fn discover(&self, domain: &Domain, _ctx: &DiscoveryContext) -> Result<Vec<String>> {
        let urls = self.page_urls(domain)?;
        let pages = join_all(urls.iter().map(|url| fetch_text(&self.client, url))).await;

        let mut emails = Vec::new();
        let mut last_error: Option<AppError> = None;
        let mut fetched = 0usize;
        for (url, page) in urls.iter().zip(pages) {
            match page {
                Ok(html) => {
                    fetched += 1;
                    for email in extract_emails_from_html(&html) {
                        if !emails.contains(&email) {
                            emails.push(email);
                        }
                    }
                }
                Err(e) => {
                    tracing::debug!(target: "discovery_task", "[{}] Could not fetch {}: {}", domain, url, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if fetched == 0 => Err(e),
            _ => {
                tracing::debug!(target: "discovery_task",
                    "[{}] Website crawl read {}/{} page(s), {} address(es)",
                    domain, fetched, urls.len(), emails.len());
                Ok(emails)
            }
        }
    }
}
