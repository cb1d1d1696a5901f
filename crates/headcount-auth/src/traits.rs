//! Collaborator interfaces consumed by relay sessions.

use async_trait::async_trait;

use crate::errors::AuthError;
use crate::types::{Identity, Resource};

/// Verifies an identity token presented by an observer.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Resolve `id_token` to the identity it was issued for.
    async fn verify(&self, id_token: &str) -> Result<Identity, AuthError>;
}

/// Looks up a monitored resource by its public token.
#[async_trait]
pub trait ResourceLookup: Send + Sync {
    /// `Ok(None)` when no resource carries `token`.
    async fn find_by_token(&self, token: &str) -> Result<Option<Resource>, AuthError>;
}
