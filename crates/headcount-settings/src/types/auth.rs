//! Identity and resource service settings.

use serde::{Deserialize, Serialize};

/// Where observer credentials and resource tokens are checked.
///
/// When `base_url` is set the HTTP service is used; otherwise the static
/// tables below are served from memory.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// Root URL of the identity and resource service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Resources served when no service is configured.
    pub static_resources: Vec<StaticResource>,
    /// Identity tokens accepted when no service is configured.
    pub static_credentials: Vec<StaticCredential>,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: 10_000,
            static_resources: Vec::new(),
            static_credentials: Vec::new(),
        }
    }
}

/// A resource entry for the in-memory directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticResource {
    /// Public resource token.
    pub token: String,
    /// Owner user ID.
    pub owner_uid: String,
}

/// An accepted identity token for the in-memory directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticCredential {
    /// Identity token as sent by the observer.
    pub id_token: String,
    /// User ID it resolves to.
    pub uid: String,
}
