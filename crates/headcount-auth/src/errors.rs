//! Auth error types.

/// Errors returned by the external identity and resource service.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The service answered with an unexpected status.
    #[error("auth service error ({status}): {message}")]
    Service {
        /// HTTP status code.
        status: u16,
        /// Response body or description.
        message: String,
    },

    /// The identity token was rejected.
    #[error("credential rejected: {0}")]
    Rejected(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
