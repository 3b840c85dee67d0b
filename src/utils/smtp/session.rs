//! Line-level SMTP transport: reading (possibly multi-line) replies and writing commands.

use lettre::transport::smtp::response::Response;
use std::io;
use std::str::FromStr;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Upper bound on continuation lines accepted for a single reply.
const MAX_REPLY_LINES: usize = 64;

/// Upper bound on the length of one reply line, CRLF included.
const MAX_LINE_LEN: u64 = 4096;

/// Whether `line` ends a reply: `250 OK` or a bare `250` does, `250-PIPELINING` does not.
///
/// `None` when the line does not start with a 3-digit code.
fn is_final_line(line: &str) -> Option<bool> {
    let code = line.get(..3)?;
    if !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match line.as_bytes().get(3) {
        None | Some(b' ') => Some(true),
        Some(b'-') => Some(false),
        Some(_) => None,
    }
}

/// Code and text of a reply on one line, for logs.
pub(crate) fn describe(response: &Response) -> String {
    format!(
        "{} {}",
        response.code(),
        response.message().collect::<Vec<_>>().join(" ")
    )
}

fn invalid_data(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

/// An SMTP conversation over any byte stream.
pub struct SmtpSession<S> {
    stream: BufReader<S>,
}

impl<S> SmtpSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream: BufReader::new(stream),
        }
    }

    /// Reads one raw line. Non-UTF-8 text is replaced; only the code has to be ASCII.
    async fn read_line(&mut self) -> io::Result<String> {
        let mut raw = Vec::new();
        let read = (&mut self.stream)
            .take(MAX_LINE_LEN)
            .read_until(b'\n', &mut raw)
            .await?;
        if read == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed by mail server",
            ));
        }
        if raw.last() != Some(&b'\n') && read as u64 >= MAX_LINE_LEN {
            return Err(invalid_data(format!(
                "SMTP reply line exceeded {} bytes",
                MAX_LINE_LEN
            )));
        }
        Ok(String::from_utf8_lossy(&raw)
            .trim_end_matches(['\r', '\n'])
            .to_string())
    }

    /// Reads lines until the final line of a reply and parses them as one response.
    pub async fn read_reply(&mut self) -> io::Result<Response> {
        let mut text = String::new();
        let mut lines = 0usize;
        loop {
            let line = self.read_line().await?;
            let is_final = is_final_line(&line).ok_or_else(|| {
                invalid_data(format!("malformed SMTP reply line: {:?}", line))
            })?;
            text.push_str(&line);
            text.push_str("\r\n");
            lines += 1;

            if is_final {
                break;
            }
            if lines >= MAX_REPLY_LINES {
                return Err(invalid_data(
                    "SMTP reply exceeded the continuation line limit".to_string(),
                ));
            }
        }

        Response::from_str(&text)
            .map_err(|e| invalid_data(format!("unparseable SMTP reply {:?}: {}", text.trim_end(), e)))
    }

    /// Writes a CRLF-terminated command line and flushes it.
    pub async fn send(&mut self, line: &str) -> io::Result<()> {
        tracing::trace!(target: "smtp_task", "-> {}", line.trim_end());
        let stream = self.stream.get_mut();
        stream.write_all(line.as_bytes()).await?;
        stream.flush().await
    }

    /// Shuts the write half down and releases the stream.
    pub async fn close(mut self) {
        if let Err(e) = self.stream.get_mut().shutdown().await {
            tracing::trace!(target: "smtp_task", "Shutdown after session failed: {}", e);
        }
    }
}
