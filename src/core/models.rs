//! Data structures shared between the discovery, verification and enrichment stages.

use crate::core::config::Config;
use crate::core::error::Result;
use crate::discovery::Strategy;
use crate::utils::domain::get_domain_from_url;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// A normalized hostname: lowercased, no scheme, no `www.`, no path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Domain(String);

impl Domain {
    /// Normalizes a website URL or raw domain string.
    pub fn parse(raw: &str) -> Result<Self> {
        get_domain_from_url(raw).map(Domain)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Domain {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// An email string discovered by a strategy, not yet verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub address: String,
    pub source: Strategy,
}

/// Terminal classification of one verification attempt.
///
/// `CatchAll` is kept apart from `Valid`: the mail server accepted the target *and*
/// a random probe, so the specific mailbox was never proven to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Valid,
    CatchAll,
    Invalid,
    Indeterminate,
}

/// Reason code attached to every verification outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationReason {
    InvalidSyntax,
    NoMxRecords,
    InvalidDomain,
    SystemError(String),
    GreetingRefused,
    HeloRefused,
    MailFromRefused,
    MailboxNotFound,
    ServerResponse(u16),
    CatchAllDetected,
    MailboxConfirmedSafe,
    Timeout,
    SocketError(String),
}

impl fmt::Display for VerificationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSyntax => f.write_str("invalid_syntax"),
            Self::NoMxRecords => f.write_str("no_mx_records"),
            Self::InvalidDomain => f.write_str("invalid_domain"),
            Self::SystemError(detail) => write!(f, "system_error:{}", detail),
            Self::GreetingRefused => f.write_str("greeting_refused"),
            Self::HeloRefused => f.write_str("helo_refused"),
            Self::MailFromRefused => f.write_str("mail_from_refused"),
            Self::MailboxNotFound => f.write_str("mailbox_not_found"),
            Self::ServerResponse(code) => write!(f, "server_response_{}", code),
            Self::CatchAllDetected => f.write_str("catch_all_detected"),
            Self::MailboxConfirmedSafe => f.write_str("mailbox_confirmed_safe"),
            Self::Timeout => f.write_str("timeout"),
            Self::SocketError(detail) => write!(f, "socket_error:{}", detail),
        }
    }
}

impl Serialize for VerificationReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Result of probing a single address. Produced per call and never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationOutcome {
    pub address: String,
    pub status: VerificationStatus,
    pub reason: VerificationReason,
    pub catch_all: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mail_server: Option<String>,
}

impl VerificationOutcome {
    pub fn confirmed(address: &str) -> Self {
        Self::new(address, VerificationStatus::Valid, VerificationReason::MailboxConfirmedSafe, false)
    }

    pub fn catch_all(address: &str) -> Self {
        Self::new(address, VerificationStatus::CatchAll, VerificationReason::CatchAllDetected, true)
    }

    pub fn invalid(address: &str, reason: VerificationReason) -> Self {
        Self::new(address, VerificationStatus::Invalid, reason, false)
    }

    pub fn indeterminate(address: &str, reason: VerificationReason) -> Self {
        Self::new(address, VerificationStatus::Indeterminate, reason, false)
    }

    fn new(
        address: &str,
        status: VerificationStatus,
        reason: VerificationReason,
        catch_all: bool,
    ) -> Self {
        Self {
            address: address.to_string(),
            status,
            reason,
            catch_all,
            mail_server: None,
        }
    }

    pub(crate) fn with_mail_server(mut self, mail_server: impl Into<String>) -> Self {
        self.mail_server = Some(mail_server.into());
        self
    }

    /// Whether the address was accepted: either confirmed, or accepted by a catch-all server.
    pub fn is_valid(&self) -> bool {
        matches!(
            self.status,
            VerificationStatus::Valid | VerificationStatus::CatchAll
        )
    }

    /// Whether this specific mailbox was shown to exist.
    pub fn is_confirmed(&self) -> bool {
        self.status == VerificationStatus::Valid
    }
}

/// A named person found on the business website.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionMaker {
    pub name: String,
    pub title: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub source_url: String,
}

/// Per-call settings for an enrichment run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichOptions {
    /// Strategies in the order they should be attributed. Duplicates are ignored.
    pub methods: Vec<Strategy>,
    pub verify_emails: bool,
    pub find_decision_maker: bool,
    pub max_concurrency: usize,
    pub custom_email_prefixes: Option<Vec<String>>,
}

impl EnrichOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            methods: config.default_methods.clone(),
            verify_emails: config.verify_emails,
            find_decision_maker: config.find_decision_maker,
            max_concurrency: config.max_concurrency,
            custom_email_prefixes: None,
        }
    }
}

/// Enrichment output for one domain. Immutable once returned by the enricher.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentResult {
    pub domain: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub email_catch_all: bool,
    pub email_source: Option<Strategy>,
    pub all_emails_found: Vec<String>,
    #[serde(skip)]
    pub candidates: Vec<Candidate>,
    pub verification: Option<VerificationOutcome>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub verification_attempts: Vec<VerificationOutcome>,
    pub decision_maker: Option<DecisionMaker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub absence_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub enriched_at: DateTime<Utc>,
}

impl EnrichmentResult {
    pub(crate) fn empty(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            email: None,
            email_verified: false,
            email_catch_all: false,
            email_source: None,
            all_emails_found: Vec::new(),
            candidates: Vec::new(),
            verification: None,
            verification_attempts: Vec::new(),
            decision_maker: None,
            absence_reason: None,
            error: None,
            enriched_at: Utc::now(),
        }
    }

    pub(crate) fn failed(domain: impl Into<String>, message: impl Into<String>) -> Self {
        let mut result = Self::empty(domain);
        result.error = Some(message.into());
        result
    }
}

/// A lead record handed over by the upstream lead source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(flatten)]
    pub other_fields: HashMap<String, serde_json::Value>,
}

impl Lead {
    pub fn new(business_name: impl Into<String>, website_or_domain: impl Into<String>) -> Self {
        Self {
            business_name: Some(business_name.into()),
            website: Some(website_or_domain.into()),
            ..Self::default()
        }
    }

    /// The raw domain input, preferring the explicit domain field over the website URL.
    pub fn domain_input(&self) -> Option<&str> {
        [self.domain.as_deref(), self.website.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
    }

    /// The first domain input that normalizes to a usable [`Domain`].
    pub fn resolved_domain(&self) -> Option<Domain> {
        [self.domain.as_deref(), self.website.as_deref()]
            .into_iter()
            .flatten()
            .find_map(|raw| Domain::parse(raw).ok())
    }

    pub fn label(&self) -> String {
        format!(
            "{} / {}",
            self.business_name.as_deref().unwrap_or("N/A"),
            self.domain_input().unwrap_or("N/A")
        )
    }
}

/// Keys written by [`EnrichedLead`]; passthrough fields with these names are dropped.
const OUTPUT_KEYS: [&str; 9] = [
    "email",
    "emailVerified",
    "emailCatchAll",
    "emailSource",
    "allEmailsFound",
    "decisionMaker",
    "enrichedAt",
    "emailVerification",
    "emailError",
];

fn without_output_keys(mut lead: Lead) -> Lead {
    for key in OUTPUT_KEYS {
        if lead.other_fields.remove(key).is_some() {
            tracing::debug!("Replacing input field '{}' of lead {}", key, lead.label());
        }
    }
    lead
}

/// An input lead augmented with its enrichment outcome.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedLead {
    #[serde(flatten)]
    pub lead: Lead,
    pub email: Option<String>,
    pub email_verified: bool,
    pub email_catch_all: bool,
    pub email_source: Option<Strategy>,
    pub all_emails_found: Vec<String>,
    pub decision_maker: Option<DecisionMaker>,
    pub enriched_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_verification: Option<VerificationOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_error: Option<String>,
}

impl EnrichedLead {
    pub fn from_result(lead: Lead, result: EnrichmentResult) -> Self {
        let email_error = result.error.or_else(|| {
            result
                .email
                .is_none()
                .then(|| result.absence_reason.clone())
                .flatten()
        });
        Self {
            lead: without_output_keys(lead),
            email: result.email,
            email_verified: result.email_verified,
            email_catch_all: result.email_catch_all,
            email_source: result.email_source,
            all_emails_found: result.all_emails_found,
            decision_maker: result.decision_maker,
            enriched_at: result.enriched_at,
            email_verification: result.verification,
            email_error,
        }
    }

    pub fn error(lead: Lead, message: impl Into<String>) -> Self {
        Self {
            lead: without_output_keys(lead),
            email: None,
            email_verified: false,
            email_catch_all: false,
            email_source: None,
            all_emails_found: Vec::new(),
            decision_maker: None,
            enriched_at: Utc::now(),
            email_verification: None,
            email_error: Some(message.into()),
        }
    }

    pub fn no_domain(lead: Lead) -> Self {
        Self::error(lead, "No domain could be derived from this lead's domain or website")
    }
}
