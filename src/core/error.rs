//! Defines the custom error types used throughout the library.

use thiserror::Error;

/// Errors surfaced by the enrichment library.
///
/// Discovery strategies return these through `Result` and the collector drops them;
/// the verifier never returns one (it folds every failure into a
/// [`VerificationOutcome`](crate::VerificationOutcome)). They only reach callers
/// through initialization and configuration.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Initialization error: {0}")]
    Initialization(String),

    #[error("Could not extract domain: {0}")]
    DomainExtraction(String),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("DNS lookup failed: {0}")]
    DnsLookup(String),

    #[error("WHOIS lookup failed: {0}")]
    Whois(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("SMTP connectivity check failed: {0}")]
    SmtpConnectivity(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
