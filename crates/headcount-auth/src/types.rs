//! Records exchanged with the identity and resource service.

use serde::{Deserialize, Serialize};

/// A verified caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable user ID.
    pub uid: String,
}

/// A monitored resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// The resource's public token.
    pub token: String,
    /// User ID of the owner.
    pub owner_uid: String,
}
