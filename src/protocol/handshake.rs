//! Registration frame and pairing replies.
//!
//! The first frame on every control socket is a `register` frame carrying the
//! application manifest and, when one is known, the stored client key.
//!
//! # Exchange
//!
//! ```text
//! Local                                    Appliance
//!   │ register {client-key?}                  │
//!   │────────────────────────────────────────►│
//!   │ response {pairingType: "PROMPT"}        │  (unknown key: prompt on screen)
//!   │◄────────────────────────────────────────│
//!   │ registered {client-key}                 │  (user accepted)
//!   │◄────────────────────────────────────────│
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde_json::{Value, json};

use crate::error::Result;

use super::message::{Reply, ReplyType, RequestType};

// ============================================================================
// Constants
// ============================================================================

/// Application manifest presented to the appliance.
const MANIFEST: &str = include_str!("manifest.json");

/// Id of the registration frame.
pub const REGISTER_ID: &str = "register_0";

/// `pairingType` value announcing an on-screen confirmation prompt.
pub const PAIRING_PROMPT: &str = "PROMPT";

// ============================================================================
// Registration Frame
// ============================================================================

/// Builds the registration frame.
///
/// # Errors
///
/// Returns [`Error::Json`](crate::Error::Json) if the embedded manifest is malformed.
pub fn registration_message(client_key: Option<&str>) -> Result<Value> {
    let manifest: Value = serde_json::from_str(MANIFEST)?;

    let mut payload = json!({
        "forcePairing": false,
        "pairingType": PAIRING_PROMPT,
        "manifest": manifest,
    });

    if let Some(key) = client_key {
        payload["client-key"] = Value::String(key.to_string());
    }

    Ok(json!({
        "id": REGISTER_ID,
        "type": RequestType::Register,
        "payload": payload,
    }))
}

// ============================================================================
// RegistrationStep
// ============================================================================

/// Meaning of one reply received during the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationStep {
    /// The appliance shows a confirmation prompt; one more frame follows.
    Prompt,
    /// Registration accepted with this key.
    Registered(String),
    /// The appliance refused the registration.
    Rejected(String),
    /// A frame with no meaning for the handshake.
    Other,
}

impl RegistrationStep {
    /// Classifies a handshake reply.
    #[must_use]
    pub fn from_reply(reply: &Reply) -> Self {
        match reply.reply_type {
            ReplyType::Response if reply.payload_str("pairingType") == Some(PAIRING_PROMPT) => {
                Self::Prompt
            }
            ReplyType::Registered => match reply.payload_str("client-key") {
                Some(key) if !key.is_empty() => Self::Registered(key.to_string()),
                _ => Self::Other,
            },
            ReplyType::Error => Self::Rejected(
                reply
                    .error
                    .clone()
                    .unwrap_or_else(|| "registration rejected".to_string()),
            ),
            _ => Self::Other,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(value: Value) -> Reply {
        serde_json::from_value(value).expect("parse")
    }

    #[test]
    fn test_manifest_parses() {
        let manifest: Value = serde_json::from_str(MANIFEST).expect("manifest");
        assert_eq!(manifest["manifestVersion"], 1);
        assert!(manifest["permissions"].as_array().is_some_and(|p| !p.is_empty()));
    }

    #[test]
    fn test_registration_without_key() {
        let message = registration_message(None).expect("message");
        assert_eq!(message["type"], "register");
        assert_eq!(message["id"], REGISTER_ID);
        assert_eq!(message["payload"]["pairingType"], "PROMPT");
        assert!(message["payload"].get("client-key").is_none());
    }

    #[test]
    fn test_registration_embeds_key() {
        let message = registration_message(Some("abc123")).expect("message");
        assert_eq!(message["payload"]["client-key"], "abc123");
    }

    #[test]
    fn test_prompt_step() {
        let step = RegistrationStep::from_reply(&reply(
            json!({"type": "response", "payload": {"pairingType": "PROMPT"}}),
        ));
        assert_eq!(step, RegistrationStep::Prompt);
    }

    #[test]
    fn test_registered_step() {
        let step = RegistrationStep::from_reply(&reply(
            json!({"type": "registered", "payload": {"client-key": "abc123"}}),
        ));
        assert_eq!(step, RegistrationStep::Registered("abc123".to_string()));
    }

    #[test]
    fn test_registered_without_key_is_other() {
        let step = RegistrationStep::from_reply(&reply(json!({"type": "registered", "payload": {}})));
        assert_eq!(step, RegistrationStep::Other);
    }

    #[test]
    fn test_error_step() {
        let step = RegistrationStep::from_reply(&reply(
            json!({"type": "error", "error": "403 cancelled"}),
        ));
        assert_eq!(step, RegistrationStep::Rejected("403 cancelled".to_string()));
    }
}
