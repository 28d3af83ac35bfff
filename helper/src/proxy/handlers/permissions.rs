//! Permissions Handler

use postern_protocol::{EnsurePermissionsParams, Response};
use serde_json::{Map, Value};
use tracing::warn;

use crate::permissions::{missing, settings_pane, Capabilities, CapabilityMap};

pub async fn handle(params: EnsurePermissionsParams, capabilities: &Capabilities) -> Response {
    let granted = capabilities
        .ensure(&params.capabilities, params.interactive)
        .await;
    let payload = payload(&granted);

    let missing = missing(&granted);
    if missing.is_empty() {
        return Response::success().with_payload(payload);
    }

    for kind in &missing {
        warn!(capability = %kind, pane = settings_pane(*kind), "Capability not granted");
    }
    let names: Vec<&str> = missing.iter().map(|k| k.as_str()).collect();
    Response::failure(format!("missing: {}", names.join(", "))).with_payload(payload)
}

/// `{"notifications": true, ...}` as JSON bytes
fn payload(map: &CapabilityMap) -> Vec<u8> {
    let object: Map<String, Value> = map
        .iter()
        .map(|(kind, granted)| (kind.as_str().to_string(), Value::Bool(*granted)))
        .collect();
    Value::Object(object).to_string().into_bytes()
}
