//! Command and Reply message types.
//!
//! Defines the frames exchanged on the control socket and the rules for
//! turning a reply into a payload or an error.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::identifiers::CommandId;

// ============================================================================
// Constants
// ============================================================================

/// Scheme prefixed to every service path in an outbound `uri`.
pub const URI_SCHEME: &str = "ssap://";

/// Error text the appliance uses for an unknown service or method.
pub const SERVICE_NOT_FOUND: &str = "404 no such service or method";

// ============================================================================
// RequestType
// ============================================================================

/// Outbound frame type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    /// One-shot request answered by a single reply.
    Request,
    /// Subscription answered by an acknowledgement and repeated updates.
    Subscribe,
    /// Pairing handshake.
    Register,
}

// ============================================================================
// Command
// ============================================================================

/// A command frame from local end to appliance.
///
/// # Format
///
/// ```json
/// {
///   "id": 12,
///   "type": "request",
///   "uri": "ssap://audio/getVolume",
///   "payload": {}
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Command {
    /// Correlation id echoed by the reply.
    pub id: CommandId,

    /// Frame type.
    #[serde(rename = "type")]
    pub request_type: RequestType,

    /// `ssap://` URI of the target service.
    pub uri: String,

    /// Service arguments (empty object when none).
    pub payload: Value,
}

impl Command {
    /// Creates a command for a catalogue service path.
    ///
    /// A missing payload is sent as `{}`.
    #[must_use]
    pub fn new(
        id: CommandId,
        request_type: RequestType,
        service: &str,
        payload: Option<Value>,
    ) -> Self {
        Self {
            id,
            request_type,
            uri: format!("{URI_SCHEME}{service}"),
            payload: payload.unwrap_or_else(|| Value::Object(Map::new())),
        }
    }
}

// ============================================================================
// ReplyType
// ============================================================================

/// Inbound frame type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyType {
    /// Reply to a request or subscription.
    Response,
    /// Pairing accepted.
    Registered,
    /// Appliance-reported error.
    Error,
    /// Anything else, including a missing `type`.
    #[default]
    #[serde(other)]
    Other,
}

// ============================================================================
// Reply
// ============================================================================

/// A frame from appliance to local end.
///
/// # Format
///
/// Success:
/// ```json
/// {"id": 12, "type": "response", "payload": {"returnValue": true, "volume": 9}}
/// ```
///
/// Error:
/// ```json
/// {"id": 12, "type": "error", "error": "404 no such service or method", "payload": {}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    /// Raw id. Command replies carry a number; the handshake uses a string.
    #[serde(default)]
    pub id: Option<Value>,

    /// Frame type.
    #[serde(rename = "type", default)]
    pub reply_type: ReplyType,

    /// Result data.
    #[serde(default)]
    pub payload: Option<Value>,

    /// Error text (for `error` frames). Non-string values are kept as JSON text.
    #[serde(default, deserialize_with = "error_text")]
    pub error: Option<String>,
}

fn error_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text),
        Some(other) => Some(other.to_string()),
    })
}

impl Reply {
    /// Parses a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the frame is not a JSON object.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Returns the correlation id, if the frame carries a numeric one.
    #[inline]
    #[must_use]
    pub fn command_id(&self) -> Option<CommandId> {
        self.id.as_ref().and_then(Value::as_u64).map(CommandId::new)
    }

    /// Returns `true` if this is an error frame.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.reply_type == ReplyType::Error
    }

    /// Gets a string value from the payload.
    #[inline]
    #[must_use]
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload
            .as_ref()
            .and_then(|v| v.get(key))
            .and_then(Value::as_str)
    }

    /// Interprets the reply to a `request` or `subscribe` frame.
    ///
    /// # Errors
    ///
    /// - [`Error::ServiceNotFound`] for `404 no such service or method`
    /// - [`Error::Command`] for any other error frame
    /// - [`Error::Protocol`] if the payload is missing
    /// - [`Error::CommandFailure`] if `returnValue`/`subscribed` is false or absent
    pub fn into_payload(self) -> Result<Value> {
        if self.is_error() {
            return match self.error.as_deref() {
                Some(SERVICE_NOT_FOUND) => Err(Error::service_not_found(SERVICE_NOT_FOUND)),
                _ => Err(Error::command(self)),
            };
        }

        let Some(payload) = self.payload.as_ref() else {
            return Err(Error::protocol(format!("Reply without payload: {self:?}")));
        };

        let return_value = payload.get("returnValue").and_then(Value::as_bool);
        let subscribed = payload.get("subscribed").and_then(Value::as_bool);

        match (return_value, subscribed) {
            (Some(true), _) | (_, Some(true)) => {}
            (None, None) => {
                return Err(Error::command_failure("reply carries no result flag", self));
            }
            _ => return Err(Error::command_failure("appliance reported failure", self)),
        }

        Ok(self.payload.unwrap_or(Value::Null))
    }
}

// ============================================================================
// Tests
// ============================================================================
