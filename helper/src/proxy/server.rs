//! Unix Socket Server
//!
//! Listens on `~/.postern/postern.sock` and hands each request line to the
//! [`Dispatcher`]. Lines on one connection are handled concurrently; replies
//! are written as they complete and correlated by id.

use std::path::PathBuf;
use std::sync::Arc;

use postern_protocol::{DecodeError, JsonRpcResponse};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use super::handlers::Dispatcher;
use super::protocol::rejection;

/// Replies queued per connection before request tasks wait on the writer.
const REPLY_QUEUE: usize = 64;

/// Longest request line accepted, newline excluded.
const MAX_LINE_BYTES: usize = 4 * 1024 * 1024;

pub struct ProxyServer {
    socket_path: PathBuf,
    dispatcher: Arc<Dispatcher>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ProxyServer {
    pub fn new(socket_path: PathBuf, dispatcher: Arc<Dispatcher>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            socket_path,
            dispatcher,
            shutdown_tx,
        }
    }

    /// Signal shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Bind the socket (owner-only), replacing a stale socket file.
    pub fn bind(&self) -> Result<UnixListener, std::io::Error> {
        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        info!("Listening on {:?}", self.socket_path);
        Ok(listener)
    }

    pub async fn serve(&self, listener: UnixListener) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, _addr)) => {
                            let dispatcher = Arc::clone(&self.dispatcher);
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, dispatcher).await {
                                    error!("Connection error: {}", e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }

                _ = shutdown_rx.recv() => {
                    info!("Server shutting down");
                    break;
                }
            }
        }

        if self.socket_path.exists() {
            let _ = std::fs::remove_file(&self.socket_path);
        }
    }
}

/// Only processes owned by our own user may talk to us.
fn peer_allowed(stream: &UnixStream) -> bool {
    let cred = match stream.peer_cred() {
        Ok(cred) => cred,
        Err(e) => {
            warn!("Could not retrieve peer credentials, rejecting connection: {}", e);
            return false;
        }
    };
    debug!("Connection from PID: {:?}, UID: {:?}", cred.pid(), cred.uid());

    #[cfg(unix)]
    {
        let my_uid = unsafe { libc::getuid() };
        if cred.uid() != my_uid {
            warn!(
                "Rejecting connection from UID {} (expected {})",
                cred.uid(),
                my_uid
            );
            return false;
        }
    }
    true
}

async fn handle_connection(
    stream: UnixStream,
    dispatcher: Arc<Dispatcher>,
) -> Result<(), std::io::Error> {
    if !peer_allowed(&stream) {
        return Ok(());
    }

    let (reader, writer) = stream.into_split();
    let (reply_tx, reply_rx) = mpsc::channel::<JsonRpcResponse>(REPLY_QUEUE);
    let writer_task = tokio::spawn(write_replies(writer, reply_rx));

    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    while let Some(inbound) = read_request_line(&mut reader, &mut buf, MAX_LINE_BYTES).await? {
        let line = match inbound {
            Inbound::Line(line) => line,
            Inbound::Rejected(err) => {
                warn!("Rejecting request: {}", err);
                if reply_tx.send(rejection(Value::Null, &err)).await.is_err() {
                    break;
                }
                continue;
            }
        };
        let dispatcher = Arc::clone(&dispatcher);
        let reply_tx = reply_tx.clone();
        tokio::spawn(async move {
            let reply = dispatcher.handle_line(&line).await;
            if reply_tx.send(reply).await.is_err() {
                debug!("Connection closed before reply was written");
            }
        });
    }
    debug!("Client disconnected");

    // In-flight requests still hold senders; the writer drains until they finish.
    drop(reply_tx);
    if let Err(e) = writer_task.await {
        warn!("Reply writer ended abnormally: {}", e);
    }
    Ok(())
}

/// One request line off the wire.
#[derive(Debug, PartialEq)]
enum Inbound {
    Line(String),
    /// The line could not even be read as text; no id is recoverable.
    Rejected(DecodeError),
}

/// Read the next non-blank line. Lines longer than `limit` are skipped up to
/// their newline and rejected, as are lines that are not UTF-8. `None` at EOF.
async fn read_request_line<R>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    limit: usize,
) -> Result<Option<Inbound>, std::io::Error>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        buf.clear();
        let read = (&mut *reader)
            .take(limit as u64 + 1)
            .read_until(b'\n', buf)
            .await?;
        if read == 0 {
            return Ok(None);
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
        } else if buf.len() > limit {
            skip_line(reader).await?;
            return Ok(Some(Inbound::Rejected(DecodeError::InvalidEnvelope(format!(
                "request line exceeds {} bytes",
                limit
            )))));
        }
        if buf.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        return Ok(Some(match String::from_utf8(std::mem::take(buf)) {
            Ok(line) => Inbound::Line(line),
            Err(e) => Inbound::Rejected(DecodeError::Malformed(e.to_string())),
        }));
    }
}

/// Discard input through the next newline.
async fn skip_line<R>(reader: &mut R) -> Result<(), std::io::Error>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(());
        }
        match available.iter().position(|b| *b == b'\n') {
            Some(end) => {
                reader.consume(end + 1);
                return Ok(());
            }
            None => {
                let len = available.len();
                reader.consume(len);
            }
        }
    }
}

async fn write_replies(mut writer: OwnedWriteHalf, mut replies: mpsc::Receiver<JsonRpcResponse>) {
    while let Some(reply) = replies.recv().await {
        let mut json = match serde_json::to_vec(&reply) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize response: {}", e);
                continue;
            }
        };
        json.push(b'\n');

        if let Err(e) = writer.write_all(&json).await {
            warn!("Failed to write response: {}", e);
            break;
        }
        if let Err(e) = writer.flush().await {
            warn!("Failed to flush: {}", e);
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use postern_protocol::ErrorCode;
    use pretty_assertions::assert_eq;

    async fn read_all(input: &[u8], limit: usize) -> Vec<Inbound> {
        let mut reader = input;
        let mut buf = Vec::new();
        let mut out = Vec::new();
        while let Some(inbound) = read_request_line(&mut reader, &mut buf, limit).await.unwrap() {
            out.push(inbound);
        }
        out
    }

    fn line(text: &str) -> Inbound {
        Inbound::Line(text.to_string())
    }

    #[tokio::test]
    async fn test_lines_split_and_blank_lines_skipped() {
        let read = read_all(b"{\"a\":1}\n\n   \n{\"b\":2}", 64).await;
        assert_eq!(read, vec![line("{\"a\":1}"), line("{\"b\":2}")]);
    }

    #[tokio::test]
    async fn test_invalid_utf8_rejected_and_reading_continues() {
        let read = read_all(b"{\"method\":\"\xff\"}\nnext\n", 64).await;
        assert_eq!(read.len(), 2);
        let Inbound::Rejected(err) = &read[0] else {
            panic!("expected a rejection, got {:?}", read[0]);
        };
        assert_eq!(err.error_code(), ErrorCode::ParseError);
        assert_eq!(read[1], line("next"));
    }

    #[tokio::test]
    async fn test_oversized_line_skipped_to_newline() {
        let read = read_all(b"0123456789abcdef\nok\n", 8).await;
        assert_eq!(read.len(), 2);
        let Inbound::Rejected(err) = &read[0] else {
            panic!("expected a rejection, got {:?}", read[0]);
        };
        assert_eq!(err.error_code(), ErrorCode::InvalidRequest);
        assert_eq!(read[1], line("ok"));
    }

    #[tokio::test]
    async fn test_line_at_limit_accepted() {
        let read = read_all(b"12345678\n12345678", 8).await;
        assert_eq!(read, vec![line("12345678"), line("12345678")]);
    }
}
