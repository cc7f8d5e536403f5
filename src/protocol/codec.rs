//! JSON codec for sensor hub payloads
//!
//! Decoding is strict about JSON syntax but lenient about alarm body shape:
//! every alarm field is optional. Command responses have no fallback form, so
//! a missing field is a [`DecodeError`].

use super::messages::{AlarmBody, CommandRequest, CommandResponse, DeviceCommand};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not valid UTF-8")]
    NotUtf8(#[from] std::str::Utf8Error),
    #[error("malformed JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected a JSON object, found {0}")]
    NotAnObject(&'static str),
}

/// Stateless encode/decode functions
pub struct MessageCodec;

impl MessageCodec {
    /// Encode `{"command": ..., "source": ...}`
    pub fn encode_command(
        command: DeviceCommand,
        source: &str,
    ) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&CommandRequest {
            command,
            source: source.to_string(),
        })
    }

    /// Only a JSON object counts as a structured body. Serde would otherwise
    /// accept an array positionally.
    pub fn decode_alarm_body(payload: &str) -> Result<AlarmBody, DecodeError> {
        match serde_json::from_str::<Value>(payload)? {
            Value::Object(fields) => Ok(serde_json::from_value(Value::Object(fields))?),
            other => Err(DecodeError::NotAnObject(json_kind(&other))),
        }
    }

    pub fn decode_command_response(payload: &[u8]) -> Result<CommandResponse, DecodeError> {
        let text = std::str::from_utf8(payload)?;
        Ok(serde_json::from_str::<CommandResponse>(text)?)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
