//! In-memory identity and resource table.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::errors::AuthError;
use crate::traits::{CredentialVerifier, ResourceLookup};
use crate::types::{Identity, Resource};

/// Fixed table of accepted identity tokens and known resources.
///
/// Used for local runs without an identity service, and in tests.
#[derive(Clone, Debug, Default)]
pub struct StaticDirectory {
    credentials: HashMap<String, Identity>,
    resources: HashMap<String, Resource>,
}

impl StaticDirectory {
    /// Create an empty directory that rejects everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `id_token` as identifying `uid`.
    #[must_use]
    pub fn with_credential(mut self, id_token: impl Into<String>, uid: impl Into<String>) -> Self {
        let _ = self
            .credentials
            .insert(id_token.into(), Identity { uid: uid.into() });
        self
    }

    /// Register a resource reachable by `token`.
    #[must_use]
    pub fn with_resource(mut self, token: impl Into<String>, owner_uid: impl Into<String>) -> Self {
        let token = token.into();
        let _ = self.resources.insert(
            token.clone(),
            Resource {
                token,
                owner_uid: owner_uid.into(),
            },
        );
        self
    }

    /// Number of registered resources.
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }
}

#[async_trait]
impl CredentialVerifier for StaticDirectory {
    async fn verify(&self, id_token: &str) -> Result<Identity, AuthError> {
        self.credentials
            .get(id_token)
            .cloned()
            .ok_or_else(|| AuthError::Rejected("unknown identity token".into()))
    }
}

#[async_trait]
impl ResourceLookup for StaticDirectory {
    async fn find_by_token(&self, token: &str) -> Result<Option<Resource>, AuthError> {
        Ok(self.resources.get(token).cloned())
    }
}
