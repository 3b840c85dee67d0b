//! Supporting utilities: DNS, SMTP, address filtering and pattern generation.

pub mod dns;
pub mod domain;
pub mod filter;
pub mod patterns;
pub mod smtp;
