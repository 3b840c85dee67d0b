//! DNS resolution: resolver construction and the lookup seam used by the verifier
//! and the TXT discovery strategy.

use crate::core::config::Config;
use crate::core::error::{AppError, Result};

use async_trait::async_trait;
use std::net::IpAddr;
use trust_dns_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::{ResolveError, ResolveErrorKind};
use trust_dns_resolver::proto::op::ResponseCode;
use trust_dns_resolver::TokioAsyncResolver;

/// One mail-exchange record. Lower `preference` is more preferred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MxRecord {
    pub preference: u16,
    pub exchange: String,
}

impl MxRecord {
    pub fn new(preference: u16, exchange: impl Into<String>) -> Self {
        Self {
            preference,
            exchange: exchange.into(),
        }
    }
}

/// Why a lookup produced no answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupFailure {
    /// The domain does not exist.
    NxDomain,
    /// Timeouts, SERVFAIL, network trouble. The domain may be transiently unreachable.
    Other(String),
}

/// Record lookups needed by the pipeline.
///
/// `Ok(vec![])` means the name exists but has no records of that type.
#[async_trait]
pub trait DnsLookup: Send + Sync {
    async fn lookup_mx(&self, domain: &str) -> std::result::Result<Vec<MxRecord>, LookupFailure>;

    async fn lookup_txt(&self, domain: &str) -> std::result::Result<Vec<String>, LookupFailure>;
}

/// Picks the most preferred exchange; the first listed wins a tie.
pub fn select_mail_server(records: &[MxRecord]) -> Option<&MxRecord> {
    records
        .iter()
        .filter(|r| !r.exchange.is_empty())
        .min_by_key(|r| r.preference)
}

/// Builds the async resolver from configured name servers, or the system configuration.
pub(crate) fn create_resolver(config: &Config) -> Result<TokioAsyncResolver> {
    let mut opts = ResolverOpts::default();
    opts.timeout = config.dns_timeout;
    opts.attempts = 2;
    opts.use_hosts_file = false;

    if config.dns_servers.is_empty() {
        tracing::debug!("Using system DNS configuration.");
        let (system_config, mut system_opts) =
            trust_dns_resolver::system_conf::read_system_conf().map_err(|e| {
                AppError::Initialization(format!("Failed to read system DNS config: {}", e))
            })?;
        system_opts.timeout = config.dns_timeout;
        return Ok(TokioAsyncResolver::tokio(system_config, system_opts));
    }

    let ips = config
        .dns_servers
        .iter()
        .map(|s| {
            s.parse::<IpAddr>()
                .map_err(|e| AppError::Config(format!("Invalid DNS server '{}': {}", s, e)))
        })
        .collect::<Result<Vec<_>>>()?;
    tracing::debug!("Using DNS servers: {:?}", ips);

    let group = NameServerConfigGroup::from_ips_clear(&ips, 53, true);
    let resolver_config = ResolverConfig::from_parts(None, vec![], group);
    Ok(TokioAsyncResolver::tokio(resolver_config, opts))
}

fn classify(error: &ResolveError) -> std::result::Result<(), LookupFailure> {
    match error.kind() {
        ResolveErrorKind::NoRecordsFound { response_code, .. }
            if *response_code == ResponseCode::NXDomain =>
        {
            Err(LookupFailure::NxDomain)
        }
        ResolveErrorKind::NoRecordsFound { .. } => Ok(()),
        _ => Err(LookupFailure::Other(error.to_string())),
    }
}

fn fqdn(domain: &str) -> String {
    format!("{}.", domain.trim_end_matches('.'))
}

#[async_trait]
impl DnsLookup for TokioAsyncResolver {
    async fn lookup_mx(&self, domain: &str) -> std::result::Result<Vec<MxRecord>, LookupFailure> {
        match self.mx_lookup(fqdn(domain)).await {
            Ok(lookup) => Ok(lookup
                .iter()
                .map(|mx| {
                    MxRecord::new(
                        mx.preference(),
                        mx.exchange().to_utf8().trim_end_matches('.'),
                    )
                })
                .collect()),
            Err(e) => classify(&e).map(|_| Vec::new()),
        }
    }

    async fn lookup_txt(&self, domain: &str) -> std::result::Result<Vec<String>, LookupFailure> {
        match self.txt_lookup(fqdn(domain)).await {
            Ok(lookup) => Ok(lookup
                .iter()
                .map(|txt| {
                    txt.txt_data()
                        .iter()
                        .map(|segment| String::from_utf8_lossy(segment))
                        .collect::<String>()
                })
                .collect()),
            Err(e) => classify(&e).map(|_| Vec::new()),
        }
    }
}
