//! Synthesizes common mailbox addresses. Needs no network access.

use super::{CandidateSource, DiscoveryContext, Strategy};
use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::models::Domain;
use crate::utils::patterns::generate_prefix_patterns;

use async_trait::async_trait;
use std::sync::Arc;

pub struct PatternSource {
    config: Arc<Config>,
}

impl PatternSource {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl CandidateSource for PatternSource {
    fn strategy(&self) -> Strategy {
        Strategy::Pattern
    }

    async fn discover(&self, domain: &Domain, ctx: &DiscoveryContext) -> Result<Vec<String>> {
        Ok(generate_prefix_patterns(
            &self.config.email_regex,
            &self.config.generic_email_prefixes,
            &ctx.custom_prefixes,
            domain.as_str(),
        ))
    }
}
