//! Socket Proxy for Postern
//!
//! Exposes the command dispatcher to local callers.
//!
//! Protocol: JSON-RPC 2.0 over Unix socket at `~/.postern/postern.sock`

pub mod handlers;
pub mod protocol;
pub mod server;

pub use handlers::Dispatcher;
pub use protocol::decode_line;
pub use server::ProxyServer;
