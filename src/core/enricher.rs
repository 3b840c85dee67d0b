//! Per-domain coordination: collect, filter, verify, select.

use crate::core::config::{get_random_sleep_duration, Config};
use crate::core::decision_maker::DecisionMakerFinder;
use crate::core::error::{AppError, Result};
use crate::core::models::{Candidate, Domain, EnrichOptions, EnrichmentResult, VerificationOutcome};
use crate::discovery::{Collector, DiscoveryContext};
use crate::utils::dns::{create_resolver, DnsLookup};
use crate::utils::filter::AddressFilter;
use crate::utils::smtp::{EmailVerifier, SmtpVerifier};

use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// Anything that can enrich one domain. The batch orchestrator is generic over this.
#[async_trait]
pub trait DomainEnricher: Send + Sync + 'static {
    /// Never fails: problems are reported inside the returned result.
    async fn enrich_domain(&self, domain: &str, options: &EnrichOptions) -> EnrichmentResult;
}

/// The main struct orchestrating discovery and verification for a domain.
#[derive(Clone)]
pub struct EmailEnricher {
    config: Arc<Config>,
    collector: Collector,
    filter: AddressFilter,
    verifier: Arc<dyn EmailVerifier>,
    decision_makers: DecisionMakerFinder,
}

impl EmailEnricher {
    /// Builds the HTTP client, DNS resolver and SMTP verifier from `config`.
    pub async fn new(config: Arc<Config>) -> Result<Self> {
        tracing::debug!("Initializing EmailEnricher components...");
        let http_client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AppError::Initialization(format!("Failed to build HTTP client: {}", e)))?;
        tracing::debug!("HTTP client initialized.");

        let resolver: Arc<dyn DnsLookup> = Arc::new(create_resolver(&config)?);
        tracing::debug!("DNS resolver initialized.");

        let verifier: Arc<dyn EmailVerifier> =
            Arc::new(SmtpVerifier::new(config.clone(), resolver.clone()));
        let collector = Collector::from_config(config.clone(), http_client.clone(), resolver);

        tracing::info!("EmailEnricher initialized successfully.");
        Ok(Self::from_parts(config, collector, verifier, http_client))
    }

    /// Assembles an enricher from explicit components.
    pub fn from_parts(
        config: Arc<Config>,
        collector: Collector,
        verifier: Arc<dyn EmailVerifier>,
        http_client: Client,
    ) -> Self {
        let decision_makers =
            DecisionMakerFinder::new(config.clone(), http_client, verifier.clone());
        Self {
            filter: AddressFilter::from_config(&config),
            config,
            collector,
            verifier,
            decision_makers,
        }
    }

    /// Replaces the decision-maker finder.
    pub fn with_decision_maker_finder(mut self, finder: DecisionMakerFinder) -> Self {
        self.decision_makers = finder;
        self
    }

    async fn run(&self, raw_domain: &str, options: &EnrichOptions) -> Result<EnrichmentResult> {
        let domain = Domain::parse(raw_domain)?;
        let start_time = Instant::now();
        tracing::info!(target: "enrich_task", "[{}] Starting enrichment", domain);

        let ctx = DiscoveryContext {
            custom_prefixes: options.custom_email_prefixes.clone().unwrap_or_default(),
        };
        let collected = self.collector.collect(&domain, &options.methods, &ctx).await;
        let collected_count = collected.len();
        let candidates = self.filter.apply(collected.into_vec());
        tracing::info!(target: "enrich_task",
            "[{}] {} candidate(s) after filtering ({} collected)", domain, candidates.len(), collected_count);

        let mut result = EnrichmentResult::empty(domain.as_str());
        result.all_emails_found = candidates.iter().map(|c| c.address.clone()).collect();

        if candidates.is_empty() {
            result.absence_reason = Some(if collected_count == 0 {
                format!(
                    "No candidate emails found using methods [{}]",
                    options.methods.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", ")
                )
            } else {
                format!("All {} candidate emails were filtered out", collected_count)
            });
        } else {
            let (attempts, selected) = if options.verify_emails {
                self.verify_in_order(&domain, &candidates).await
            } else {
                (Vec::new(), None)
            };
            self.select(&mut result, &candidates, attempts, selected);
        }

        if options.find_decision_maker {
            result.decision_maker = self.decision_makers.find(&domain, options.verify_emails).await;
        }

        result.candidates = candidates;
        tracing::info!(target: "enrich_task",
            "[{}] Finished in {:.2?}: email={:?}, verified={}, source={:?}",
            domain, start_time.elapsed(), result.email, result.email_verified, result.email_source);
        Ok(result)
    }

    /// Verifies candidates one at a time in source order, stopping at the first
    /// acceptable outcome. Returns every attempt and the index of the accepted candidate.
    async fn verify_in_order(
        &self,
        domain: &Domain,
        candidates: &[Candidate],
    ) -> (Vec<VerificationOutcome>, Option<usize>) {
        let mut attempts = Vec::new();
        let mut catch_all_domains: HashSet<String> = HashSet::new();

        for (index, candidate) in candidates.iter().enumerate() {
            let mail_domain = mail_domain(&candidate.address);
            if catch_all_domains.contains(&mail_domain) {
                tracing::debug!(target: "enrich_task",
                    "[{}] Skipping {}: {} is catch-all", domain, candidate.address, mail_domain);
                continue;
            }

            if !attempts.is_empty() {
                let pause = get_random_sleep_duration(&self.config);
                tracing::trace!(target: "enrich_task", "[{}] Sleeping {:?} before next SMTP attempt", domain, pause);
                tokio::time::sleep(pause).await;
            }

            let outcome = self.verifier.verify(&candidate.address).await;
            tracing::debug!(target: "enrich_task",
                "[{}] {} ({}) -> {:?} / {}", domain, candidate.address, candidate.source, outcome.status, outcome.reason);

            let accepted = outcome.is_confirmed() || (outcome.catch_all && self.config.accept_catch_all);
            if outcome.catch_all {
                catch_all_domains.insert(mail_domain);
            }
            attempts.push(outcome);
            if accepted {
                return (attempts, Some(index));
            }
        }
        (attempts, None)
    }

    fn select(
        &self,
        result: &mut EnrichmentResult,
        candidates: &[Candidate],
        attempts: Vec<VerificationOutcome>,
        selected: Option<usize>,
    ) {
        let (index, verified) = match selected {
            Some(index) => (index, true),
            None => (0, false),
        };
        let chosen = &candidates[index];
        let outcome = attempts
            .iter()
            .find(|o| o.address.eq_ignore_ascii_case(&chosen.address))
            .cloned();

        result.email = Some(chosen.address.clone());
        result.email_source = Some(chosen.source);
        result.email_verified = verified;
        result.email_catch_all = outcome.as_ref().map(|o| o.catch_all).unwrap_or(false);
        result.verification = outcome;
        result.verification_attempts = attempts;
    }
}

fn mail_domain(address: &str) -> String {
    address
        .rsplit_once('@')
        .map(|(_, d)| d.to_lowercase())
        .unwrap_or_default()
}

#[async_trait]
impl DomainEnricher for EmailEnricher {
    async fn enrich_domain(&self, domain: &str, options: &EnrichOptions) -> EnrichmentResult {
        match self.run(domain, options).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(target: "enrich_task", "[{}] Enrichment failed: {}", domain, e);
                EnrichmentResult::failed(domain.trim(), e.to_string())
            }
        }
    }
}
