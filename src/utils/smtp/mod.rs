//! SMTP mailbox verification.

mod client;
mod error;
pub mod handshake;
pub mod session;

pub use client::{test_smtp_connectivity, EmailVerifier, SmtpVerifier};
