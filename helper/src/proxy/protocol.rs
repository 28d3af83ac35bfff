//! Inbound line decoding
//!
//! One line holds one JSON-RPC 2.0 request object. The request id is recovered
//! from the raw JSON before anything else is checked, so every failure past
//! the JSON parse can still be correlated by the client.

use postern_protocol::{
    DecodeError, JsonRpcError, JsonRpcRequest, JsonRpcResponse, Request, Response,
};
use serde_json::Value;

pub type Decoded = Result<(Value, Request), (Value, DecodeError)>;

/// Decode a request line into its id and [`Request`].
pub fn decode_line(line: &str) -> Decoded {
    let value: Value = serde_json::from_str(line.trim())
        .map_err(|e| (Value::Null, DecodeError::Malformed(e.to_string())))?;

    let id = match &value {
        Value::Object(map) => map.get("id").cloned().unwrap_or(Value::Null),
        Value::Array(_) => {
            return Err((
                Value::Null,
                DecodeError::InvalidEnvelope("batch requests are not supported".to_string()),
            ))
        }
        _ => {
            return Err((
                Value::Null,
                DecodeError::InvalidEnvelope("expected a JSON object".to_string()),
            ))
        }
    };

    let envelope: JsonRpcRequest = serde_json::from_value(value)
        .map_err(|e| (id.clone(), DecodeError::InvalidEnvelope(e.to_string())))?;
    if let Err(reason) = envelope.validate() {
        return Err((id, DecodeError::InvalidEnvelope(reason)));
    }

    match Request::decode(&envelope.method, envelope.params) {
        Ok(request) => Ok((id, request)),
        Err(e) => Err((id, e)),
    }
}

/// Reply for a line that never became a [`Request`]: a failed `result` for
/// clients that only read responses, plus the JSON-RPC `error`.
pub fn rejection(id: Value, err: &DecodeError) -> JsonRpcResponse {
    JsonRpcResponse::rejected(
        id,
        Response::failure(err.response_message()),
        JsonRpcError::new(err.error_code(), err.to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use postern_protocol::{ErrorCode, RunShellParams};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn code(decoded: Decoded) -> (Value, ErrorCode) {
        let (id, err) = decoded.unwrap_err();
        (id, err.error_code())
    }

    #[test]
    fn test_decodes_run_shell() {
        let (id, request) = decode_line(
            r#"{"jsonrpc":"2.0","id":7,"method":"runShell","params":{"command":["echo","hi"]}}"#,
        )
        .unwrap();
        assert_eq!(id, json!(7));
        assert_eq!(
            request,
            Request::RunShell(RunShellParams {
                command: vec!["echo".to_string(), "hi".to_string()],
                ..RunShellParams::default()
            })
        );
    }

    #[test]
    fn test_missing_id_is_null() {
        let (id, request) = decode_line(r#"{"jsonrpc":"2.0","method":"status"}"#).unwrap();
        assert_eq!(id, Value::Null);
        assert_eq!(request, Request::Status);
    }

    #[test]
    fn test_garbage_is_parse_error() {
        assert_eq!(code(decode_line("not json")), (Value::Null, ErrorCode::ParseError));
    }

    #[test]
    fn test_batch_is_rejected() {
        assert_eq!(
            code(decode_line(r#"[{"jsonrpc":"2.0","id":1,"method":"status"}]"#)),
            (Value::Null, ErrorCode::InvalidRequest)
        );
    }

    #[test]
    fn test_id_survives_envelope_errors() {
        assert_eq!(
            code(decode_line(r#"{"jsonrpc":"1.0","id":"a","method":"status"}"#)),
            (json!("a"), ErrorCode::InvalidRequest)
        );
        assert_eq!(
            code(decode_line(r#"{"jsonrpc":"2.0","id":"b","method":"reboot"}"#)),
            (json!("b"), ErrorCode::MethodNotFound)
        );
        assert_eq!(
            code(decode_line(
                r#"{"jsonrpc":"2.0","id":3,"method":"notify","params":{"title":1}}"#
            )),
            (json!(3), ErrorCode::InvalidParams)
        );
    }
}
