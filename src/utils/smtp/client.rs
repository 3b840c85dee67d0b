//! Provides the SmtpVerifier client for validating email addresses via SMTP.

use super::error::classify_io_error;
use super::handshake::{run_handshake, Envelope, HandshakeOutcome};
use super::session::{describe, SmtpSession};
use crate::core::config::Config;
use crate::core::error::{AppError, Result};
use crate::core::models::{VerificationOutcome, VerificationReason, VerificationStatus};
use crate::utils::dns::{select_mail_server, DnsLookup, LookupFailure};

use async_trait::async_trait;
use lettre::transport::smtp::extension::ClientId;
use lettre::Address;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;

/// Length of the random local-part used for the catch-all probe.
const PROBE_LOCAL_PART_LEN: usize = 24;

/// Anything that can classify a single address.
///
/// Implementations never fail: every problem is reported through the outcome.
#[async_trait]
pub trait EmailVerifier: Send + Sync {
    async fn verify(&self, address: &str) -> VerificationOutcome;
}

/// Verifies addresses with a live RCPT probe against the domain's preferred mail server.
///
/// Each call opens its own connection; nothing is cached between calls.
#[derive(Clone)]
pub struct SmtpVerifier {
    config: Arc<Config>,
    resolver: Arc<dyn DnsLookup>,
}

impl SmtpVerifier {
    pub fn new(config: Arc<Config>, resolver: Arc<dyn DnsLookup>) -> Self {
        Self { config, resolver }
    }

    /// Full verification: syntax gate, MX lookup, then the RCPT handshake.
    pub async fn verify_email(&self, email: &str) -> VerificationOutcome {
        let email = email.trim();
        tracing::debug!(target: "smtp_task", "Starting SMTP check for <{}>", email);

        let target = match parse_address(email) {
            Some(addr) => addr,
            None => {
                tracing::debug!(target: "smtp_task", "Rejecting <{}>: invalid syntax", email);
                return VerificationOutcome::invalid(email, VerificationReason::InvalidSyntax);
            }
        };
        let domain = target.domain().to_lowercase();

        let mail_server = match self.resolve_mail_server(email, &domain).await {
            Ok(server) => server,
            Err(outcome) => return outcome,
        };

        let outcome = self.probe(email, &target, &domain, &mail_server).await;
        tracing::info!(target: "smtp_task",
            "SMTP result for <{}> via {}: status={:?}, reason={}",
            email, mail_server, outcome.status, outcome.reason
        );
        outcome
    }

    async fn resolve_mail_server(
        &self,
        email: &str,
        domain: &str,
    ) -> std::result::Result<String, VerificationOutcome> {
        // The resolver has its own per-query timeout; this also bounds retries.
        let budget = self.config.dns_timeout * 2;
        let lookup = tokio::time::timeout(budget, self.resolver.lookup_mx(domain)).await;

        let records = match lookup {
            Ok(Ok(records)) => records,
            Ok(Err(LookupFailure::NxDomain)) => {
                tracing::debug!(target: "smtp_task", "Domain {} does not exist", domain);
                return Err(VerificationOutcome::invalid(email, VerificationReason::InvalidDomain));
            }
            Ok(Err(LookupFailure::Other(detail))) => {
                tracing::warn!(target: "smtp_task", "MX lookup for {} failed: {}", domain, detail);
                return Err(VerificationOutcome::indeterminate(
                    email,
                    VerificationReason::SystemError(detail),
                ));
            }
            Err(_) => {
                tracing::warn!(target: "smtp_task", "MX lookup for {} exceeded {:?}", domain, budget);
                return Err(VerificationOutcome::indeterminate(
                    email,
                    VerificationReason::SystemError("dns lookup timed out".to_string()),
                ));
            }
        };

        match select_mail_server(&records) {
            Some(mx) => {
                tracing::debug!(target: "smtp_task",
                    "Selected MX {} (preference {}) for {}", mx.exchange, mx.preference, domain);
                Ok(mx.exchange.clone())
            }
            None => {
                tracing::debug!(target: "smtp_task", "No usable MX records for {}", domain);
                Err(VerificationOutcome::invalid(email, VerificationReason::NoMxRecords))
            }
        }
    }

    fn envelope(&self, target: &Address, domain: &str) -> Result<Envelope> {
        let sender = Address::from_str(&self.config.smtp_sender_email)
            .map_err(|e| AppError::Config(format!("Invalid sender email in config: {}", e)))?;
        let probe = Address::from_str(&probe_address(domain))
            .map_err(|e| AppError::Config(format!("Could not build probe address: {}", e)))?;
        Ok(Envelope {
            helo: ClientId::Domain(self.config.smtp_helo_name.clone()),
            sender,
            target: target.clone(),
            probe,
        })
    }

    async fn probe(
        &self,
        email: &str,
        target: &Address,
        domain: &str,
        mail_server: &str,
    ) -> VerificationOutcome {
        let envelope = match self.envelope(target, domain) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::error!(target: "smtp_task", "{}", e);
                return VerificationOutcome::indeterminate(
                    email,
                    VerificationReason::SystemError(e.to_string()),
                )
                .with_mail_server(mail_server);
            }
        };

        let port = self.config.smtp_port;
        let attempt = async {
            let stream = TcpStream::connect((mail_server, port)).await?;
            tracing::debug!(target: "smtp_task", "Connected to {}:{}", mail_server, port);
            let mut session = SmtpSession::new(stream);
            let result = run_handshake(&mut session, &envelope).await;
            session.close().await;
            result
        };

        // Dropping `attempt` on timeout drops the stream, which closes the socket.
        let outcome = match tokio::time::timeout(self.config.smtp_timeout, attempt).await {
            Ok(Ok(HandshakeOutcome {
                status,
                reason,
                last_reply,
            })) => {
                tracing::debug!(target: "smtp_task",
                    "Handshake for <{}> ended on reply {}", email, describe(&last_reply));
                outcome_from(email, status, reason)
            }
            Ok(Err(e)) => VerificationOutcome::invalid(email, classify_io_error(&e, mail_server)),
            Err(_) => {
                tracing::warn!(target: "smtp_task",
                    "SMTP session with {} exceeded {:?}", mail_server, self.config.smtp_timeout);
                VerificationOutcome::invalid(email, VerificationReason::Timeout)
            }
        };
        outcome.with_mail_server(mail_server)
    }
}

#[async_trait]
impl EmailVerifier for SmtpVerifier {
    async fn verify(&self, address: &str) -> VerificationOutcome {
        self.verify_email(address).await
    }
}

fn outcome_from(
    email: &str,
    status: VerificationStatus,
    reason: VerificationReason,
) -> VerificationOutcome {
    match status {
        VerificationStatus::Valid => VerificationOutcome::confirmed(email),
        VerificationStatus::CatchAll => VerificationOutcome::catch_all(email),
        VerificationStatus::Invalid => VerificationOutcome::invalid(email, reason),
        VerificationStatus::Indeterminate => VerificationOutcome::indeterminate(email, reason),
    }
}

/// Basic shape gate: must parse as an address and have a dotted domain.
fn parse_address(email: &str) -> Option<Address> {
    let address = Address::from_str(email).ok()?;
    let domain = address.domain();
    let plausible = domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.starts_with('[');
    plausible.then_some(address)
}

/// A fresh random mailbox at `domain` that should not exist anywhere.
fn probe_address(domain: &str) -> String {
    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(PROBE_LOCAL_PART_LEN)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect();
    format!("{}@{}", token, domain)
}

/// Tests basic SMTP connectivity to a known reliable server (Google).
/// This helps diagnose if outbound port 25 is generally blocked.
pub async fn test_smtp_connectivity(config: &Config) -> Result<()> {
    const TEST_SERVER: &str = "gmail-smtp-in.l.google.com";
    let timeout = Duration::from_secs(5).max(config.smtp_timeout);
    tracing::info!("Testing outbound SMTP (port 25) connectivity to {}...", TEST_SERVER);

    let check = async {
        let stream = TcpStream::connect((TEST_SERVER, 25u16)).await?;
        let mut session = SmtpSession::new(stream);
        let greeting = session.read_reply().await?;
        session.send("QUIT\r\n").await?;
        session.close().await;
        Ok::<_, std::io::Error>(greeting)
    };

    match tokio::time::timeout(timeout, check).await {
        Ok(Ok(greeting)) if greeting.has_code(220) => {
            tracing::info!("SMTP connectivity test successful (connected to {}).", TEST_SERVER);
            Ok(())
        }
        Ok(Ok(greeting)) => Err(AppError::SmtpConnectivity(format!(
            "{} answered with unexpected greeting: {}",
            TEST_SERVER,
            describe(&greeting)
        ))),
        Ok(Err(e)) => {
            tracing::error!("SMTP connectivity test failed: Error connecting to {}: {}", TEST_SERVER, e);
            Err(AppError::SmtpConnectivity(format!(
                "Connection to {} failed ({}). Check firewall or network settings.",
                TEST_SERVER, e
            )))
        }
        Err(_) => {
            tracing::error!(
                "SMTP connectivity test timed out connecting to {}. Outbound port 25 is likely blocked by ISP, firewall, or network provider.",
                TEST_SERVER
            );
            Err(AppError::SmtpConnectivity(
                "SMTP connection timed out - port 25 is likely blocked.".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::dns::MxRecord;

    struct FixedDns(std::result::Result<Vec<MxRecord>, LookupFailure>);

    #[async_trait]
    impl DnsLookup for FixedDns {
        async fn lookup_mx(&self, _domain: &str) -> std::result::Result<Vec<MxRecord>, LookupFailure> {
            self.0.clone()
        }

        async fn lookup_txt(&self, _domain: &str) -> std::result::Result<Vec<String>, LookupFailure> {
            Ok(Vec::new())
        }
    }

    fn verifier(dns: FixedDns) -> SmtpVerifier {
        SmtpVerifier::new(Arc::new(Config::default()), Arc::new(dns))
    }

    #[tokio::test]
    async fn malformed_addresses_never_touch_dns() {
        let v = verifier(FixedDns(Err(LookupFailure::Other("should not be called".into()))));
        for email in ["", "no-at-sign", "a@b", "@acme.co", "info@.co"] {
            let outcome = v.verify_email(email).await;
            assert_eq!(outcome.status, VerificationStatus::Invalid, "{email}");
            assert_eq!(outcome.reason, VerificationReason::InvalidSyntax, "{email}");
        }
    }

    #[tokio::test]
    async fn missing_mx_is_invalid() {
        let outcome = verifier(FixedDns(Ok(vec![]))).verify_email("info@acme.co").await;
        assert_eq!(outcome.status, VerificationStatus::Invalid);
        assert_eq!(outcome.reason, VerificationReason::NoMxRecords);
    }

    #[tokio::test]
    async fn nonexistent_domain_is_invalid_domain() {
        let outcome = verifier(FixedDns(Err(LookupFailure::NxDomain)))
            .verify_email("info@acme.co")
            .await;
        assert_eq!(outcome.reason, VerificationReason::InvalidDomain);
        assert!(!outcome.is_valid());
    }

    #[tokio::test]
    async fn resolver_trouble_is_indeterminate() {
        let outcome = verifier(FixedDns(Err(LookupFailure::Other("SERVFAIL".into()))))
            .verify_email("info@acme.co")
            .await;
        assert_eq!(outcome.status, VerificationStatus::Indeterminate);
        assert_eq!(outcome.reason, VerificationReason::SystemError("SERVFAIL".into()));
    }

    #[test]
    fn probe_addresses_are_fresh_and_parse() {
        let a = probe_address("acme.co");
        let b = probe_address("acme.co");
        assert_ne!(a, b);
        assert!(a.ends_with("@acme.co"));
        assert!(Address::from_str(&a).is_ok());
    }
}
