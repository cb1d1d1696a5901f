//! Wire format: inbound `{"type", "payload"}` frames and outbound notices.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which endpoint a connection arrived on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// Counted while connected (`/client`).
    Viewer,
    /// Watches the count of one token (`/server`).
    Observer,
}

impl Role {
    /// Lowercase name used in logs and metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Observer => "observer",
        }
    }

    /// Encode a human-readable notice the way this role's clients expect it.
    ///
    /// Viewers get the bare text; observers get a `MESSAGE` frame.
    pub fn encode_notice(self, message: &str) -> String {
        match self {
            Self::Viewer => message.to_string(),
            Self::Observer => ServerMessage::Message {
                message: message.to_string(),
            }
            .to_json(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors decoding an inbound frame.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The frame is not a JSON object with a string `type`.
    #[error("invalid frame: {0}")]
    InvalidFrame(#[source] serde_json::Error),
    /// The payload does not match the frame type.
    #[error("invalid {kind} payload: {source}")]
    InvalidPayload {
        /// Frame type.
        kind: String,
        /// Decode failure.
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
struct Frame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

/// INIT payload. Observers also send `idToken`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitRequest {
    /// Resource token to bind to.
    pub token: String,
    /// Observer identity token.
    #[serde(default)]
    pub id_token: Option<String>,
}

/// A decoded inbound frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    /// Bind the connection to a token.
    Init(InitRequest),
    /// Liveness signal.
    Ping,
}

/// Decode one text frame.
///
/// Returns `Ok(None)` for well-formed frames of an unknown type.
pub fn parse_request(text: &str) -> Result<Option<Request>, ProtocolError> {
    let frame: Frame = serde_json::from_str(text).map_err(ProtocolError::InvalidFrame)?;
    match frame.kind.as_str() {
        "INIT" => {
            let init = serde_json::from_value(frame.payload).map_err(|source| {
                ProtocolError::InvalidPayload {
                    kind: frame.kind.clone(),
                    source,
                }
            })?;
            Ok(Some(Request::Init(init)))
        }
        "PING" => Ok(Some(Request::Ping)),
        _ => Ok(None),
    }
}

/// Outbound frames.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum ServerMessage {
    /// Current viewer count for the observer's token.
    Users {
        /// Live viewer count.
        users: u64,
    },
    /// Notice sent before the server closes the connection.
    Message {
        /// Human-readable reason.
        message: String,
    },
}

impl ServerMessage {
    /// Serialize to a JSON text frame.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to serialize server message");
            String::new()
        })
    }
}
