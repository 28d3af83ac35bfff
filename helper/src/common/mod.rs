//! Common Utilities
//!
//! Shared error types, path resolution, and the one-shot delivery bridge.

pub mod delivery;
pub mod error;
pub mod paths;
pub mod result;

pub use delivery::{delivery, DeliveryReceiver, DeliverySender};
pub use error::AppError;
pub use paths::{config_path, postern_dir, postern_path, settings_path, socket_path};
pub use result::AppResult;
