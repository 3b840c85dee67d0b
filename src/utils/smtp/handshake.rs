//! The RCPT-probing handshake as an explicit finite-state machine.
//!
//! Every transition is a pure function of `(state, reply code)`; the I/O loop in
//! [`run_handshake`] only reads a reply, asks [`step`] what to do, and writes the
//! resulting command. States only move forward:
//! `Greeting -> Helo -> MailFrom -> RcptTarget -> RcptProbe`, then close.

use super::session::{describe, SmtpSession};
use crate::core::models::{VerificationReason, VerificationStatus};

use lettre::transport::smtp::commands::{Ehlo, Mail, Quit, Rcpt};
use lettre::transport::smtp::extension::ClientId;
use lettre::transport::smtp::response::{Code, Response, Severity};
use lettre::Address;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};

/// Which reply the machine is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Greeting,
    Helo,
    MailFrom,
    RcptTarget,
    RcptProbe,
}

/// Commands the client can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Ehlo,
    MailFrom,
    RcptTarget,
    RcptProbe,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Send `command`, then wait for the reply in `next`.
    Advance {
        next: HandshakeState,
        command: Command,
    },
    /// Terminal. Sends `QUIT` first when `quit` is set, then closes.
    Finish {
        status: VerificationStatus,
        reason: VerificationReason,
        quit: bool,
    },
}

/// Reply that moves the session past HELO, MAIL FROM and RCPT.
const OK: u16 = 250;
const SERVICE_READY: u16 = 220;
const MAILBOX_UNAVAILABLE: u16 = 550;

fn finish(status: VerificationStatus, reason: VerificationReason, quit: bool) -> Transition {
    Transition::Finish {
        status,
        reason,
        quit,
    }
}

/// Computes the next move for a reply `code` received in `state`.
pub fn step(state: HandshakeState, code: Code) -> Transition {
    use HandshakeState::*;
    use VerificationReason as R;
    use VerificationStatus as S;

    let value = u16::from(code);
    match state {
        Greeting if value == SERVICE_READY => Transition::Advance {
            next: Helo,
            command: Command::Ehlo,
        },
        Greeting => finish(S::Invalid, R::GreetingRefused, false),

        Helo if value == OK => Transition::Advance {
            next: MailFrom,
            command: Command::MailFrom,
        },
        Helo => finish(S::Invalid, R::HeloRefused, false),

        MailFrom if value == OK => Transition::Advance {
            next: RcptTarget,
            command: Command::RcptTarget,
        },
        MailFrom => finish(S::Invalid, R::MailFromRefused, false),

        RcptTarget if value == OK => Transition::Advance {
            next: RcptProbe,
            command: Command::RcptProbe,
        },
        RcptTarget if value == MAILBOX_UNAVAILABLE => finish(S::Invalid, R::MailboxNotFound, true),
        RcptTarget => finish(S::Invalid, R::ServerResponse(value), true),

        RcptProbe if value == OK => finish(S::CatchAll, R::CatchAllDetected, true),
        RcptProbe => finish(S::Valid, R::MailboxConfirmedSafe, true),
    }
}

/// Addresses and identity used to render commands for one attempt.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub helo: ClientId,
    pub sender: Address,
    pub target: Address,
    pub probe: Address,
}

impl Envelope {
    /// Wire form of `command`, CRLF-terminated.
    pub fn line(&self, command: Command) -> String {
        match command {
            Command::Ehlo => Ehlo::new(self.helo.clone()).to_string(),
            Command::MailFrom => Mail::new(Some(self.sender.clone()), vec![]).to_string(),
            Command::RcptTarget => Rcpt::new(self.target.clone(), vec![]).to_string(),
            Command::RcptProbe => Rcpt::new(self.probe.clone(), vec![]).to_string(),
            Command::Quit => Quit.to_string(),
        }
    }
}

/// Terminal result of a completed handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeOutcome {
    pub status: VerificationStatus,
    pub reason: VerificationReason,
    pub last_reply: Response,
}

/// Drives the machine over `session` until it reaches a terminal transition.
///
/// Transport errors are returned as-is; the caller owns the session and closes it.
pub async fn run_handshake<S>(
    session: &mut SmtpSession<S>,
    envelope: &Envelope,
) -> io::Result<HandshakeOutcome>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut state = HandshakeState::Greeting;
    loop {
        let reply = session.read_reply().await?;
        tracing::trace!(target: "smtp_task", "{:?} <- {}", state, describe(&reply));
        if reply.code().severity == Severity::TransientNegativeCompletion {
            tracing::debug!(target: "smtp_task", "Transient refusal in {:?}: {}", state, describe(&reply));
        }

        match step(state, reply.code()) {
            Transition::Advance { next, command } => {
                session.send(&envelope.line(command)).await?;
                state = next;
            }
            Transition::Finish {
                status,
                reason,
                quit,
            } => {
                if quit {
                    if let Err(e) = session.send(&envelope.line(Command::Quit)).await {
                        tracing::debug!(target: "smtp_task", "QUIT could not be sent: {}", e);
                    }
                }
                return Ok(HandshakeOutcome {
                    status,
                    reason,
                    last_reply: reply,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    fn code(value: u16) -> Code {
        Response::from_str(&format!("{} x\r\n", value)).unwrap().code()
    }

    fn envelope() -> Envelope {
        Envelope {
            helo: ClientId::Domain("verifier.test".to_string()),
            sender: Address::from_str("verify@verifier.test").unwrap(),
            target: Address::from_str("info@acme.co").unwrap(),
            probe: Address::from_str("zq8x0probe@acme.co").unwrap(),
        }
    }

    #[test]
    fn greeting_must_be_220() {
        assert_eq!(
            step(HandshakeState::Greeting, code(220)),
            Transition::Advance {
                next: HandshakeState::Helo,
                command: Command::Ehlo
            }
        );
        assert_eq!(
            step(HandshakeState::Greeting, code(554)),
            finish(VerificationStatus::Invalid, VerificationReason::GreetingRefused, false)
        );
    }

    #[test]
    fn helo_and_mail_from_refusals_close_without_quit() {
        assert_eq!(
            step(HandshakeState::Helo, code(502)),
            finish(VerificationStatus::Invalid, VerificationReason::HeloRefused, false)
        );
        assert_eq!(
            step(HandshakeState::MailFrom, code(553)),
            finish(VerificationStatus::Invalid, VerificationReason::MailFromRefused, false)
        );
    }

    #[test]
    fn rcpt_target_rejections_send_quit() {
        assert_eq!(
            step(HandshakeState::RcptTarget, code(550)),
            finish(VerificationStatus::Invalid, VerificationReason::MailboxNotFound, true)
        );
        assert_eq!(
            step(HandshakeState::RcptTarget, code(451)),
            finish(VerificationStatus::Invalid, VerificationReason::ServerResponse(451), true)
        );
        assert_eq!(
            step(HandshakeState::RcptTarget, code(250)),
            Transition::Advance {
                next: HandshakeState::RcptProbe,
                command: Command::RcptProbe
            }
        );
    }

    #[test]
    fn probe_reply_decides_catch_all() {
        assert_eq!(
            step(HandshakeState::RcptProbe, code(250)),
            finish(VerificationStatus::CatchAll, VerificationReason::CatchAllDetected, true)
        );
        assert_eq!(
            step(HandshakeState::RcptProbe, code(550)),
            finish(VerificationStatus::Valid, VerificationReason::MailboxConfirmedSafe, true)
        );
        assert_eq!(
            step(HandshakeState::RcptProbe, code(450)),
            finish(VerificationStatus::Valid, VerificationReason::MailboxConfirmedSafe, true)
        );
    }

    #[test]
    fn only_250_moves_past_ehlo_and_mail_from() {
        for value in [251, 252] {
            assert_eq!(
                step(HandshakeState::Helo, code(value)),
                finish(VerificationStatus::Invalid, VerificationReason::HeloRefused, false)
            );
            assert_eq!(
                step(HandshakeState::MailFrom, code(value)),
                finish(VerificationStatus::Invalid, VerificationReason::MailFromRefused, false)
            );
        }
        assert_eq!(
            step(HandshakeState::Greeting, code(221)),
            finish(VerificationStatus::Invalid, VerificationReason::GreetingRefused, false)
        );
    }

    #[test]
    fn forwarding_and_cannot_verify_replies_are_not_acceptance() {
        assert_eq!(
            step(HandshakeState::RcptTarget, code(251)),
            finish(VerificationStatus::Invalid, VerificationReason::ServerResponse(251), true)
        );
        assert_eq!(
            step(HandshakeState::RcptTarget, code(252)),
            finish(VerificationStatus::Invalid, VerificationReason::ServerResponse(252), true)
        );
        // Only a plain 250 for the random mailbox marks the domain catch-all.
        assert_eq!(
            step(HandshakeState::RcptProbe, code(251)),
            finish(VerificationStatus::Valid, VerificationReason::MailboxConfirmedSafe, true)
        );
        assert_eq!(
            step(HandshakeState::RcptProbe, code(252)),
            finish(VerificationStatus::Valid, VerificationReason::MailboxConfirmedSafe, true)
        );
    }

    #[tokio::test]
    async fn cannot_verify_reply_to_rcpt_ends_the_session() {
        let (client, server) = tokio::io::duplex(4096);
        let peer = tokio::spawn(scripted_peer(
            server,
            "220 mx.acme.co ESMTP\r\n",
            vec![
                "250 mx.acme.co\r\n",
                "250 2.1.0 Ok\r\n",
                "252 2.5.2 Cannot VRFY user, but will accept message\r\n",
            ],
        ));

        let mut session = SmtpSession::new(client);
        let outcome = run_handshake(&mut session, &envelope()).await.unwrap();
        session.close().await;

        assert_eq!(outcome.status, VerificationStatus::Invalid);
        assert_eq!(outcome.reason, VerificationReason::ServerResponse(252));
        assert!(outcome.last_reply.has_code(252));
        let seen = peer.await.unwrap();
        assert_eq!(seen.last().map(String::as_str), Some("QUIT"));
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn commands_render_as_smtp_lines() {
        let env = envelope();
        assert_eq!(env.line(Command::Ehlo), "EHLO verifier.test\r\n");
        assert_eq!(env.line(Command::MailFrom), "MAIL FROM:<verify@verifier.test>\r\n");
        assert_eq!(env.line(Command::RcptTarget), "RCPT TO:<info@acme.co>\r\n");
        assert_eq!(env.line(Command::RcptProbe), "RCPT TO:<zq8x0probe@acme.co>\r\n");
        assert_eq!(env.line(Command::Quit), "QUIT\r\n");
    }

    /// Plays the server side of a session over an in-memory duplex pipe, replying to
    /// each client command with the next scripted reply. Returns the commands seen.
    async fn scripted_peer(
        server: tokio::io::DuplexStream,
        greeting: &'static str,
        replies: Vec<&'static str>,
    ) -> Vec<String> {
        let (read_half, mut write_half) = tokio::io::split(server);
        let mut reader = BufReader::new(read_half);
        write_half.write_all(greeting.as_bytes()).await.unwrap();
        let mut seen = Vec::new();
        let mut replies = replies.into_iter();
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                break;
            }
            seen.push(line.trim_end().to_string());
            match replies.next() {
                Some(reply) => write_half.write_all(reply.as_bytes()).await.unwrap(),
                None => break,
            }
        }
        seen
    }

    #[tokio::test]
    async fn full_handshake_against_non_catch_all_server() {
        let (client, server) = tokio::io::duplex(4096);
        let peer = tokio::spawn(scripted_peer(
            server,
            "220 mx.acme.co ESMTP\r\n",
            vec![
                "250-mx.acme.co\r\n250-SIZE 1000000\r\n250 8BITMIME\r\n",
                "250 2.1.0 Ok\r\n",
                "250 2.1.5 Ok\r\n",
                "550 5.1.1 User unknown\r\n",
            ],
        ));

        let mut session = SmtpSession::new(client);
        let outcome = run_handshake(&mut session, &envelope()).await.unwrap();
        session.close().await;

        assert_eq!(outcome.status, VerificationStatus::Valid);
        assert_eq!(outcome.reason, VerificationReason::MailboxConfirmedSafe);
        let seen = peer.await.unwrap();
        assert_eq!(
            seen,
            vec![
                "EHLO verifier.test",
                "MAIL FROM:<verify@verifier.test>",
                "RCPT TO:<info@acme.co>",
                "RCPT TO:<zq8x0probe@acme.co>",
                "QUIT",
            ]
        );
    }

    #[tokio::test]
    async fn refused_greeting_stops_before_ehlo() {
        let (client, server) = tokio::io::duplex(1024);
        let peer = tokio::spawn(scripted_peer(server, "554 go away\r\n", vec![]));

        let mut session = SmtpSession::new(client);
        let outcome = run_handshake(&mut session, &envelope()).await.unwrap();
        session.close().await;

        assert_eq!(outcome.status, VerificationStatus::Invalid);
        assert_eq!(outcome.reason, VerificationReason::GreetingRefused);
        assert!(peer.await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn peer_hanging_up_mid_session_is_an_io_error() {
        let (client, server) = tokio::io::duplex(1024);
        let peer = tokio::spawn(scripted_peer(
            server,
            "220 hi\r\n",
            vec!["250 hello\r\n"],
        ));

        let mut session = SmtpSession::new(client);
        let err = run_handshake(&mut session, &envelope()).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        peer.await.unwrap();
    }
}
