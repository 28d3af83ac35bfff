//! The single reply shape every request resolves to.

use serde::{Deserialize, Serialize};

/// Outcome of one request: `message` carries failure or status detail,
/// `payload` carries binary results (image bytes, process output).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", with = "payload")]
    pub payload: Option<Vec<u8>>,
}

impl Response {
    pub fn success() -> Self {
        Self {
            ok: true,
            message: None,
            payload: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: Some(message.into()),
            payload: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Payload decoded as lossy UTF-8, for text output.
    pub fn payload_text(&self) -> Option<String> {
        self.payload
            .as_deref()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }
}

/// Payload bytes travel as standard base64 strings.
mod payload {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => s.serialize_str(&STANDARD.encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(d)?;
        encoded
            .map(|text| STANDARD.decode(text).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_payload_is_base64_on_the_wire() {
        let resp = Response::success().with_payload(b"hello".to_vec());
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value, json!({"ok": true, "payload": "aGVsbG8="}));
    }

    #[test]
    fn test_absent_fields_are_omitted() {
        let value = serde_json::to_value(Response::failure("paused")).unwrap();
        assert_eq!(value, json!({"ok": false, "message": "paused"}));
    }

    #[test]
    fn test_invalid_base64_is_rejected() {
        let parsed = serde_json::from_value::<Response>(json!({"ok": true, "payload": "%%%"}));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_payload_text_is_lossy() {
        let resp = Response::success().with_payload(vec![b'h', b'i', 0xff]);
        assert_eq!(resp.payload_text().as_deref(), Some("hi\u{fffd}"));
    }
}
