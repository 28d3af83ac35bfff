//! Wire protocol shared by the Postern helper and its callers.
//!
//! Newline-delimited JSON-RPC 2.0 over a Unix socket. The `method` field is the
//! request discriminator and every reply carries a [`Response`] as its result.

pub mod client;
pub mod jsonrpc;
pub mod request;
pub mod response;

use std::path::PathBuf;

pub use client::{ClientError, SocketClient};
pub use jsonrpc::{ErrorCode, JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use request::{
    methods, CapabilityKind, DecodeError, EnsurePermissionsParams, NotifyParams, Request,
    RunShellParams, ScreenshotParams,
};
pub use response::Response;

/// Directory name under the user's home holding the socket and settings.
pub const POSTERN_DIR: &str = ".postern";

/// Socket file name inside [`POSTERN_DIR`].
pub const SOCKET_FILE: &str = "postern.sock";

/// Default socket path (`~/.postern/postern.sock`), if a home directory exists.
pub fn default_socket_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(POSTERN_DIR).join(SOCKET_FILE))
}
