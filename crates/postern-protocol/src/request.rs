//! Typed requests
//!
//! The request set is closed: decoding maps the JSON-RPC `method` onto exactly
//! one [`Request`] variant or fails with a [`DecodeError`], so routing on the
//! helper side is an exhaustive match.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::jsonrpc::ErrorCode;

pub mod methods {
    pub const NOTIFY: &str = "notify";
    pub const ENSURE_PERMISSIONS: &str = "ensurePermissions";
    pub const STATUS: &str = "status";
    pub const SCREENSHOT: &str = "screenshot";
    pub const RUN_SHELL: &str = "runShell";
}

/// OS-mediated capability gating specific operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CapabilityKind {
    Notifications,
    Accessibility,
    ScreenRecording,
}

impl CapabilityKind {
    pub const ALL: [CapabilityKind; 3] = [
        CapabilityKind::Notifications,
        CapabilityKind::Accessibility,
        CapabilityKind::ScreenRecording,
    ];

    /// Name used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityKind::Notifications => "notifications",
            CapabilityKind::Accessibility => "accessibility",
            CapabilityKind::ScreenRecording => "screenRecording",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyParams {
    pub title: String,
    pub body: String,
    /// Overrides the configured default sound; an empty string means silent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsurePermissionsParams {
    pub capabilities: BTreeSet<CapabilityKind>,
    #[serde(default)]
    pub interactive: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_id: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunShellParams {
    pub command: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    /// Replaces the helper's environment entirely when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<f64>,
    #[serde(default)]
    pub requires_screen_capture_permission: bool,
}

/// A decoded request.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Notify(NotifyParams),
    EnsurePermissions(EnsurePermissionsParams),
    Status,
    Screenshot(ScreenshotParams),
    RunShell(RunShellParams),
}

impl Request {
    /// Decode a method name and its params into a request.
    pub fn decode(method: &str, params: Value) -> Result<Self, DecodeError> {
        match method {
            methods::NOTIFY => Ok(Request::Notify(from_params(method, params)?)),
            methods::ENSURE_PERMISSIONS => {
                let params: EnsurePermissionsParams = from_params(method, params)?;
                if params.capabilities.is_empty() {
                    return Err(DecodeError::InvalidParams {
                        method: method.to_string(),
                        reason: "capabilities must not be empty".to_string(),
                    });
                }
                Ok(Request::EnsurePermissions(params))
            }
            methods::STATUS => Ok(Request::Status),
            methods::SCREENSHOT => Ok(Request::Screenshot(from_params(method, params)?)),
            methods::RUN_SHELL => Ok(Request::RunShell(from_params(method, params)?)),
            other => Err(DecodeError::UnknownMethod(other.to_string())),
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            Request::Notify(_) => methods::NOTIFY,
            Request::EnsurePermissions(_) => methods::ENSURE_PERMISSIONS,
            Request::Status => methods::STATUS,
            Request::Screenshot(_) => methods::SCREENSHOT,
            Request::RunShell(_) => methods::RUN_SHELL,
        }
    }

    /// Params as they travel on the wire.
    pub fn params(&self) -> serde_json::Result<Value> {
        match self {
            Request::Notify(p) => serde_json::to_value(p),
            Request::EnsurePermissions(p) => serde_json::to_value(p),
            Request::Status => Ok(Value::Null),
            Request::Screenshot(p) => serde_json::to_value(p),
            Request::RunShell(p) => serde_json::to_value(p),
        }
    }
}

fn from_params<T: DeserializeOwned>(method: &str, params: Value) -> Result<T, DecodeError> {
    // Absent params decode like an empty object so optional-only variants work.
    let params = match params {
        Value::Null => Value::Object(serde_json::Map::new()),
        other => other,
    };
    serde_json::from_value(params).map_err(|e| DecodeError::InvalidParams {
        method: method.to_string(),
        reason: e.to_string(),
    })
}

/// Why an inbound message could not become a [`Request`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),

    #[error("unknown method: {0}")]
    UnknownMethod(String),

    #[error("invalid params for {method}: {reason}")]
    InvalidParams { method: String, reason: String },
}

impl DecodeError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            DecodeError::Malformed(_) => ErrorCode::ParseError,
            DecodeError::InvalidEnvelope(_) => ErrorCode::InvalidRequest,
            DecodeError::UnknownMethod(_) => ErrorCode::MethodNotFound,
            DecodeError::InvalidParams { .. } => ErrorCode::InvalidParams,
        }
    }

    /// Message carried by the best-effort response.
    pub fn response_message(&self) -> String {
        format!("decode error: {}", self)
    }
}
