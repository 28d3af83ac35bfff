use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use crate::{JsonRpcRequest, JsonRpcResponse, Request, Response};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("could not determine home directory")]
    NoHomeDir,

    #[error("could not connect to Postern socket at {path} (is the helper running?): {source}")]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("socket I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON on socket: {0}")]
    Json(#[from] serde_json::Error),

    #[error("socket closed while waiting for response")]
    Closed,

    #[error("reply carried no result")]
    MissingResult,
}

/// Line-oriented client for the helper socket. One request in flight at a time.
pub struct SocketClient {
    reader: BufReader<tokio::io::ReadHalf<UnixStream>>,
    writer: tokio::io::WriteHalf<UnixStream>,
    next_id: u64,
}

impl SocketClient {
    pub async fn connect() -> Result<Self, ClientError> {
        let path = crate::default_socket_path().ok_or(ClientError::NoHomeDir)?;
        Self::connect_to(&path).await
    }

    pub async fn connect_to(path: &Path) -> Result<Self, ClientError> {
        let stream = UnixStream::connect(path)
            .await
            .map_err(|source| ClientError::Connect {
                path: path.to_path_buf(),
                source,
            })?;
        let (r, w) = tokio::io::split(stream);
        Ok(Self {
            reader: BufReader::new(r),
            writer: w,
            next_id: 1,
        })
    }

    /// Send one request and return the full reply envelope.
    pub async fn call(&mut self, request: &Request) -> Result<JsonRpcResponse, ClientError> {
        let id = self.next_id;
        self.next_id += 1;

        let envelope = JsonRpcRequest::new(id, request.method(), request.params()?);
        let payload = serde_json::to_string(&envelope)?;
        self.send_line(&payload).await?;

        loop {
            let response = self.read_reply().await?;
            // Replies may arrive out of order; anything else belongs to no one here.
            if response.id == Value::from(id) || response.id.is_null() {
                return Ok(response);
            }
        }
    }

    /// Send one request and return just its [`Response`].
    pub async fn send(&mut self, request: &Request) -> Result<Response, ClientError> {
        self.call(request)
            .await?
            .result
            .ok_or(ClientError::MissingResult)
    }

    /// Write a raw line; used to exercise the helper with arbitrary input.
    pub async fn send_line(&mut self, line: &str) -> Result<(), ClientError> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    pub async fn read_reply(&mut self) -> Result<JsonRpcResponse, ClientError> {
        let mut line = String::new();
        let bytes = self.reader.read_line(&mut line).await?;
        if bytes == 0 {
            return Err(ClientError::Closed);
        }
        Ok(serde_json::from_str(line.trim())?)
    }
}
