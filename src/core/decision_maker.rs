//! Best-effort lookup of a named owner / executive on the business website.

use crate::core::config::{get_random_sleep_duration, Config};
use crate::core::models::{DecisionMaker, Domain};
use crate::discovery::fetch_text;
use crate::utils::domain::site_url;
use crate::utils::patterns::generate_name_patterns;
use crate::utils::smtp::EmailVerifier;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use std::sync::Arc;
use url::Url;

/// Personal mailbox guesses verified per decision maker.
const MAX_VERIFIED_PATTERNS: usize = 3;

const WORD: &str = r"[A-Z](?:[a-z]+|'[A-Z][a-z]+)(?:-[A-Z][a-z]+)?";
const TITLE: &str = r"(?i:co-?founder|founder|owner|ceo|chief executive officer|president|managing director|director|general manager|manager)";

static NAME: Lazy<String> = Lazy::new(|| format!(r"{WORD}(?:\s[A-Z]\.)?\s{WORD}"));
static NAME_THEN_TITLE: Lazy<Regex> = Lazy::new(|| {
    let name = NAME.as_str();
    Regex::new(&format!(r"(?P<name>{name})\s*(?:,|-|–|\||\()\s*(?:the\s+)?(?P<title>{TITLE})\b"))
        .expect("name/title regex is valid")
});

static TITLE_THEN_NAME: Lazy<Regex> = Lazy::new(|| {
    let name = NAME.as_str();
    Regex::new(&format!(r"\b(?P<title>{TITLE})\s*(?::|-|–|,)\s*(?P<name>{name})"))
        .expect("title/name regex is valid")
});

/// Lower is more senior.
fn title_rank(title: &str) -> u8 {
    let t = title.to_lowercase();
    if t.contains("owner") || t.contains("founder") || t == "ceo" || t.contains("chief executive") {
        0
    } else if t.contains("president") || t.contains("managing director") {
        1
    } else if t.contains("director") {
        2
    } else {
        3
    }
}

/// `(name, title)` pairs found in visible page text, most senior first, then first seen.
pub(crate) fn find_people(text: &str) -> Vec<(String, String)> {
    let mut found: Vec<(String, String, u8, usize)> = Vec::new();
    let matches = NAME_THEN_TITLE
        .captures_iter(text)
        .chain(TITLE_THEN_NAME.captures_iter(text));
    for caps in matches {
        let (Some(name), Some(title)) = (caps.name("name"), caps.name("title")) else {
            continue;
        };
        let name = name.as_str().split_whitespace().collect::<Vec<_>>().join(" ");
        if found.iter().any(|(n, ..)| *n == name) {
            continue;
        }
        let title = title.as_str().to_string();
        let rank = title_rank(&title);
        let position = caps.get(0).map(|m| m.start()).unwrap_or(usize::MAX);
        found.push((name, title, rank, position));
    }
    found.sort_by_key(|(_, _, rank, position)| (*rank, *position));
    found.into_iter().map(|(name, title, ..)| (name, title)).collect()
}

fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    document
        .root_element()
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Looks for an owner/executive and, optionally, a confirmed personal mailbox.
#[derive(Clone)]
pub struct DecisionMakerFinder {
    config: Arc<Config>,
    client: reqwest::Client,
    verifier: Arc<dyn EmailVerifier>,
    base_url: Option<Url>,
}

impl DecisionMakerFinder {
    pub fn new(config: Arc<Config>, client: reqwest::Client, verifier: Arc<dyn EmailVerifier>) -> Self {
        Self {
            config,
            client,
            verifier,
            base_url: None,
        }
    }

    /// Read team pages from `base_url` instead of `https://<domain>/`.
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    fn page_url(&self, domain: &Domain, path: &str) -> Option<Url> {
        match &self.base_url {
            Some(base) => base.join(path.trim_start_matches('/')).ok(),
            None => site_url(domain.as_str(), path).ok(),
        }
    }

    /// Never fails: any problem simply yields `None`.
    pub async fn find(&self, domain: &Domain, verify: bool) -> Option<DecisionMaker> {
        let (name, title, source_url) = self.locate(domain).await?;
        tracing::info!(target: "decision_maker", "[{}] Found {} ({})", domain, name, title);

        let mut parts = name.split_whitespace();
        let first = parts.next().unwrap_or_default();
        let last = parts.last().unwrap_or_default();
        let patterns = generate_name_patterns(&self.config.email_regex, first, last, domain.as_str());

        let (email, email_verified) = if verify {
            match self.confirm(domain, &patterns).await {
                Some(address) => (Some(address), true),
                None => (None, false),
            }
        } else {
            (patterns.first().cloned(), false)
        };

        Some(DecisionMaker {
            name,
            title,
            email,
            email_verified,
            source_url: source_url.to_string(),
        })
    }

    async fn locate(&self, domain: &Domain) -> Option<(String, String, Url)> {
        for path in &self.config.decision_maker_pages {
            let Some(url) = self.page_url(domain, path) else {
                continue;
            };
            let html = match fetch_text(&self.client, &url).await {
                Ok(html) => html,
                Err(e) => {
                    tracing::debug!(target: "decision_maker", "[{}] Skipping {}: {}", domain, url, e);
                    continue;
                }
            };
            if let Some((name, title)) = find_people(&visible_text(&html)).into_iter().next() {
                return Some((name, title, url));
            }
        }
        tracing::debug!(target: "decision_maker", "[{}] No decision maker found", domain);
        None
    }

    /// First pattern the mail server confirms individually. Catch-all acceptance
    /// says nothing about a personal mailbox, so it stops the search.
    async fn confirm(&self, domain: &Domain, patterns: &[String]) -> Option<String> {
        for (i, address) in patterns.iter().take(MAX_VERIFIED_PATTERNS).enumerate() {
            if i > 0 {
                tokio::time::sleep(get_random_sleep_duration(&self.config)).await;
            }
            let outcome = self.verifier.verify(address).await;
            if outcome.is_confirmed() {
                return Some(address.clone());
            }
            if outcome.catch_all {
                tracing::debug!(target: "decision_maker",
                    "[{}] Catch-all server, personal mailbox cannot be confirmed", domain);
                return None;
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_name_comma_title() {
        let people = find_people("Meet the team. Jane Smith, Founder & CEO. Bob Jones - Sales Manager.");
        assert_eq!(people[0], ("Jane Smith".to_string(), "Founder".to_string()));
    }

    #[test]
    fn finds_title_colon_name_and_ranks_by_seniority() {
        let people = find_people("Office Manager: Carla Diaz. Owner: Tom O'Brien");
        assert_eq!(people[0].0, "Tom O'Brien");
        assert_eq!(people[1].0, "Carla Diaz");
    }

    #[test]
    fn ignores_text_without_people() {
        assert!(find_people("We have been serving the community since 1999.").is_empty());
    }

    #[test]
    fn visible_text_collapses_markup() {
        let text = visible_text("<div><h3>Jane   Smith</h3>,<p>Owner</p></div>");
        assert_eq!(text, "Jane Smith , Owner");
        assert_eq!(find_people(&text)[0].0, "Jane Smith");
    }
}
