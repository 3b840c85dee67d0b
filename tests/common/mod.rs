//! Shared fixtures for the integration tests: a scripted loopback SMTP server and
//! a static DNS table.

#![allow(dead_code)]

use async_trait::async_trait;
use email_enricher_core::{Config, ConfigBuilder, DnsLookup, LookupFailure, MxRecord};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// How the fake mail server answers `RCPT TO`.
#[derive(Debug, Clone)]
pub enum Mailboxes {
    /// Every recipient gets 250.
    AcceptAll,
    /// Only the listed recipients (lowercased) get 250; everything else 550.
    Only(Vec<String>),
    /// Accepts the connection and never says anything.
    Silent,
}

/// A loopback SMTP server that records every command it receives.
pub struct FakeSmtpServer {
    pub addr: SocketAddr,
    pub commands: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl FakeSmtpServer {
    pub async fn start(mailboxes: Mailboxes) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let commands = Arc::new(Mutex::new(Vec::new()));

        let log = commands.clone();
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let mailboxes = mailboxes.clone();
                let log = log.clone();
                tokio::spawn(async move {
                    let _ = serve(stream, mailboxes, log).await;
                });
            }
        });

        Self {
            addr,
            commands,
            handle,
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    /// Recipients that were offered in `RCPT TO`, in order.
    pub fn recipients(&self) -> Vec<String> {
        self.commands()
            .iter()
            .filter_map(|c| rcpt_address(c))
            .collect()
    }
}

impl Drop for FakeSmtpServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn rcpt_address(command: &str) -> Option<String> {
    let rest = command.strip_prefix("RCPT TO:")?;
    let start = rest.find('<')? + 1;
    let end = rest.find('>')?;
    Some(rest[start..end].to_lowercase())
}

async fn serve(
    stream: TcpStream,
    mailboxes: Mailboxes,
    log: Arc<Mutex<Vec<String>>>,
) -> std::io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    if let Mailboxes::Silent = mailboxes {
        // Hold the connection open without a greeting until the client gives up.
        let mut sink = String::new();
        while reader.read_line(&mut sink).await? > 0 {
            sink.clear();
        }
        return Ok(());
    }

    write_half.write_all(b"220 mx.test ESMTP ready\r\n").await?;

    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(());
        }
        let command = line.trim_end().to_string();
        log.lock().unwrap().push(command.clone());

        let upper = command.to_uppercase();
        let reply: &[u8] = if upper.starts_with("EHLO") || upper.starts_with("HELO") {
            b"250-mx.test greets you\r\n250-PIPELINING\r\n250 8BITMIME\r\n"
        } else if upper.starts_with("MAIL FROM") {
            b"250 2.1.0 Sender OK\r\n"
        } else if upper.starts_with("RCPT TO") {
            let accepted = match (&mailboxes, rcpt_address(&command)) {
                (Mailboxes::AcceptAll, _) => true,
                (Mailboxes::Only(allowed), Some(address)) => allowed.contains(&address),
                _ => false,
            };
            if accepted {
                b"250 2.1.5 Recipient OK\r\n"
            } else {
                b"550 5.1.1 No such user here\r\n"
            }
        } else if upper.starts_with("QUIT") {
            write_half.write_all(b"221 2.0.0 Bye\r\n").await?;
            return Ok(());
        } else {
            b"502 5.5.2 Command not recognized\r\n"
        };
        write_half.write_all(reply).await?;
    }
}

/// DNS answers from fixed tables. Unknown names are NXDOMAIN.
#[derive(Debug, Default, Clone)]
pub struct StaticDns {
    pub mx: HashMap<String, Vec<MxRecord>>,
    pub txt: HashMap<String, Vec<String>>,
}

impl StaticDns {
    /// Points the MX of each domain at the loopback server.
    pub fn loopback(domains: &[&str]) -> Self {
        let mx = domains
            .iter()
            .map(|d| (d.to_string(), vec![MxRecord::new(10, "127.0.0.1")]))
            .collect();
        Self {
            mx,
            txt: HashMap::new(),
        }
    }

    pub fn with_txt(mut self, name: &str, records: &[&str]) -> Self {
        self.txt
            .insert(name.to_string(), records.iter().map(|r| r.to_string()).collect());
        self
    }
}

#[async_trait]
impl DnsLookup for StaticDns {
    async fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, LookupFailure> {
        self.mx.get(domain).cloned().ok_or(LookupFailure::NxDomain)
    }

    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, LookupFailure> {
        // A name with MX but no TXT exists; it just has no TXT records.
        match self.txt.get(name) {
            Some(records) => Ok(records.clone()),
            None if self.mx.contains_key(name) => Ok(Vec::new()),
            None => Err(LookupFailure::NxDomain),
        }
    }
}

/// Fast, file-independent configuration aimed at a loopback SMTP port.
pub fn test_config(smtp_port: u16) -> Config {
    ConfigBuilder::new()
        .skip_default_files()
        .smtp_port(smtp_port)
        .smtp_timeout(Duration::from_millis(1500))
        .dns_timeout(Duration::from_millis(500))
        .request_timeout(Duration::from_secs(2))
        .sleep_between_requests(0.0, 0.0)
        .build()
        .unwrap()
}
