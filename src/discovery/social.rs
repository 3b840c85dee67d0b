//! Follows social-profile links from the home page and scans those pages.

use super::{extract_emails_from_html, fetch_text, CandidateSource, DiscoveryContext, Strategy};
use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::models::Domain;
use crate::utils::domain::site_url;

use async_trait::async_trait;
use futures::future::join_all;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::sync::Arc;
use url::Url;

/// At most this many profile pages are fetched per domain.
const MAX_PROFILES: usize = 4;

static LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("valid selector"));

pub struct SocialSource {
    config: Arc<Config>,
    client: reqwest::Client,
    base_url: Option<Url>,
}

impl SocialSource {
    pub fn new(config: Arc<Config>, client: reqwest::Client) -> Self {
        Self {
            config,
            client,
            base_url: None,
        }
    }

    /// Read profile links from `base_url` instead of `https://<domain>/`.
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    fn is_social_host(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_lowercase();
        self.config.social_hosts.iter().any(|social| {
            let social = social.to_lowercase();
            host == social || host.ends_with(&format!(".{}", social))
        })
    }

    /// Distinct social profile links on `html`, resolved against `page`.
    pub(crate) fn profile_links(&self, html: &str, page: &Url) -> Vec<Url> {
        let document = Html::parse_document(html);
        let mut links: Vec<Url> = Vec::new();
        for href in document
            .select(&LINK_SELECTOR)
            .filter_map(|a| a.value().attr("href"))
        {
            let Ok(mut url) = page.join(href) else {
                continue;
            };
            url.set_fragment(None);
            if self.is_social_host(&url) && !links.contains(&url) {
                links.push(url);
            }
            if links.len() >= MAX_PROFILES {
                break;
            }
        }
        links
    }
}

#[async_trait]
impl CandidateSource for SocialSource {
    fn strategy(&self) -> Strategy {
        Strategy::Social
    }

    async fn discover(&self, domain: &Domain, _ctx: &DiscoveryContext) -> Result<Vec<String>> {
        let home = match &self.base_url {
            Some(base) => base.clone(),
            None => site_url(domain.as_str(), "/")?,
        };
        let html = fetch_text(&self.client, &home).await?;
        let profiles = self.profile_links(&html, &home);
        if profiles.is_empty() {
            tracing::debug!(target: "discovery_task", "[{}] No social profile links on {}", domain, home);
            return Ok(Vec::new());
        }

        let pages = join_all(profiles.iter().map(|url| fetch_text(&self.client, url))).await;
        let mut emails = Vec::new();
        for (url, page) in profiles.iter().zip(pages) {
            match page {
                Ok(body) => {
                    for email in extract_emails_from_html(&body) {
                        if !emails.contains(&email) {
                            emails.push(email);
                        }
                    }
                }
                // Social sites routinely block anonymous fetches.
                Err(e) => tracing::debug!(target: "discovery_task", "[{}] Skipping {}: {}", domain, url, e),
            }
        }
        Ok(emails)
    }
}
