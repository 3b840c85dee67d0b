//! Maps transport failures during an SMTP attempt onto verification reasons.

use crate::core::models::VerificationReason;
use std::io;

/// Interprets an I/O error raised while talking to `server`.
pub(crate) fn classify_io_error(error: &io::Error, server: &str) -> VerificationReason {
    match error.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
            tracing::warn!(target: "smtp_task", "SMTP I/O with {} timed out: {}", server, error);
            VerificationReason::Timeout
        }
        io::ErrorKind::ConnectionRefused => {
            tracing::error!(target: "smtp_task",
                "SMTP connection to {} refused: {}. Port 25 may be blocked.", server, error);
            VerificationReason::SocketError(format!("connection refused by {}", server))
        }
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => {
            tracing::warn!(target: "smtp_task", "SMTP connection reset by {}: {}", server, error);
            VerificationReason::SocketError(format!("connection reset by {}", server))
        }
        io::ErrorKind::UnexpectedEof => {
            tracing::warn!(target: "smtp_task", "{} closed the connection mid-session", server);
            VerificationReason::SocketError("connection closed by mail server".to_string())
        }
        io::ErrorKind::InvalidData => {
            tracing::warn!(target: "smtp_task", "Unparseable SMTP reply from {}: {}", server, error);
            VerificationReason::SocketError(format!("protocol error: {}", error))
        }
        _ => {
            let text = error.to_string();
            if text.to_lowercase().contains("network is unreachable") {
                tracing::error!(target: "smtp_task",
                    "Network unreachable while contacting {}. Outbound port 25 may be blocked.", server);
            } else {
                tracing::error!(target: "smtp_task", "Unhandled SMTP I/O error for {}: {}", server, error);
            }
            VerificationReason::SocketError(text)
        }
    }
}
