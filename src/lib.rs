//! # Email Enricher Core Library
//!
//! Discovers candidate business email addresses for a domain and verifies them
//! with a protocol-level SMTP probe (no message is ever sent), detecting catch-all
//! mail servers along the way.
//!
//! It is designed to be used either directly as a library or via the
//! `email-enricher` command-line tool (which uses this library).

pub mod core;
pub mod discovery;
pub mod utils;

pub use crate::core::config::{Config, ConfigBuilder, ConfigFile};
pub use crate::core::decision_maker::DecisionMakerFinder;
pub use crate::core::enricher::{DomainEnricher, EmailEnricher};
pub use crate::core::error::{AppError, Result};
pub use crate::core::models::{
    Candidate, DecisionMaker, Domain, EnrichOptions, EnrichedLead, EnrichmentResult, Lead,
    VerificationOutcome, VerificationReason, VerificationStatus,
};
pub use crate::discovery::{CandidateSet, CandidateSource, Collector, DiscoveryContext, Strategy};
pub use crate::utils::dns::{DnsLookup, LookupFailure, MxRecord};
pub use crate::utils::filter::AddressFilter;
pub use crate::utils::smtp::{EmailVerifier, SmtpVerifier};

use crate::utils::smtp::test_smtp_connectivity;
use std::sync::Arc;
use tokio::task::{JoinError, JoinSet};

/// Builds the HTTP client, DNS resolver and verifier, ready to enrich domains.
pub async fn initialize_enricher(config: Arc<Config>) -> Result<EmailEnricher> {
    EmailEnricher::new(config).await
}

/// Performs an early check for outbound SMTP (port 25) connectivity.
pub async fn check_smtp_connectivity(config: &Config) -> Result<()> {
    test_smtp_connectivity(config).await
}

/// Enriches one lead. Leads whose inputs do not normalize to a domain never reach the enricher.
pub async fn enrich_single_lead<E>(enricher: &E, lead: Lead, options: &EnrichOptions) -> EnrichedLead
where
    E: DomainEnricher + ?Sized,
{
    let task_id = lead.label();
    let Some(domain) = lead.resolved_domain() else {
        tracing::warn!(target: "batch_task", "[{}] Skipping lead: no usable domain", task_id);
        return EnrichedLead::no_domain(lead);
    };

    tracing::debug!(target: "batch_task", "[{}] Enriching domain '{}'", task_id, domain);
    let result = enricher.enrich_domain(domain.as_str(), options).await;
    match (&result.email, &result.error) {
        (_, Some(error)) => {
            tracing::warn!(target: "batch_task", "[{}] Enrichment error: {}", task_id, error)
        }
        (Some(email), None) => tracing::info!(target: "batch_task",
            "[{}] Selected {} (verified: {})", task_id, email, result.email_verified),
        (None, None) => tracing::info!(target: "batch_task", "[{}] No email found", task_id),
    }
    EnrichedLead::from_result(lead, result)
}

/// Enriches `leads` with at most `options.max_concurrency` domains in flight.
///
/// The output has one entry per input lead, in input order. A failing lead (including
/// a panicking worker) yields an error entry without affecting the others. Dropping the
/// returned future aborts every in-flight worker.
pub async fn enrich_leads<E>(
    enricher: Arc<E>,
    leads: Vec<Lead>,
    options: &EnrichOptions,
) -> Vec<EnrichedLead>
where
    E: DomainEnricher,
{
    enrich_leads_with_progress(enricher, leads, options, |_, _| {}).await
}

/// Like [`enrich_leads`], calling `on_complete(index, result)` as each lead finishes.
///
/// Every lead is reported exactly once, including leads whose worker panicked.
pub async fn enrich_leads_with_progress<E, F>(
    enricher: Arc<E>,
    leads: Vec<Lead>,
    options: &EnrichOptions,
    mut on_complete: F,
) -> Vec<EnrichedLead>
where
    E: DomainEnricher,
    F: FnMut(usize, &EnrichedLead),
{
    let total_records = leads.len();
    if total_records == 0 {
        return Vec::new();
    }
    let max_concurrency = options.max_concurrency.max(1);
    tracing::info!(target: "batch_task",
        "Enriching {} lead(s) with concurrency {}", total_records, max_concurrency);

    let mut slots: Vec<Option<EnrichedLead>> = vec![None; total_records];
    let mut tasks: JoinSet<(usize, EnrichedLead)> = JoinSet::new();

    let mut store = |slots: &mut Vec<Option<EnrichedLead>>,
                     joined: std::result::Result<(usize, EnrichedLead), JoinError>| match joined {
        Ok((index, enriched)) => {
            on_complete(index, &enriched);
            slots[index] = Some(enriched);
        }
        Err(e) => {
            tracing::error!(target: "batch_task", "A processing task failed to join: {}", e);
        }
    };

    for (index, lead) in leads.iter().enumerate() {
        if lead.resolved_domain().is_none() {
            tracing::warn!(target: "batch_task", "Lead #{} ({}) has no usable domain; skipped", index, lead.label());
            store(&mut slots, Ok((index, EnrichedLead::no_domain(lead.clone()))));
            continue;
        }

        while tasks.len() >= max_concurrency {
            if let Some(joined) = tasks.join_next().await {
                store(&mut slots, joined);
            }
        }

        let enricher = Arc::clone(&enricher);
        let options = options.clone();
        let lead = lead.clone();
        tasks.spawn(async move {
            let enriched = enrich_single_lead(enricher.as_ref(), lead, &options).await;
            (index, enriched)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        store(&mut slots, joined);
    }

    slots
        .into_iter()
        .zip(leads)
        .enumerate()
        .map(|(index, (slot, lead))| {
            slot.unwrap_or_else(|| {
                let failed = EnrichedLead::error(lead, "Enrichment task failed unexpectedly");
                on_complete(index, &failed);
                failed
            })
        })
        .collect()
}
