//! HTTP client for the identity and resource service.
//!
//! - `POST {base}/verify` with `{"idToken": ...}` → `200 {"uid": ...}`
//! - `GET {base}/resources?token=...` → `200` record, `404` when unknown

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use tracing::debug;

use crate::errors::AuthError;
use crate::traits::{CredentialVerifier, ResourceLookup};
use crate::types::{Identity, Resource};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyRequest<'a> {
    id_token: &'a str,
}

/// [`CredentialVerifier`] and [`ResourceLookup`] backed by an HTTP service.
#[derive(Clone, Debug)]
pub struct HttpAuthService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAuthService {
    /// Create a client for the service at `base_url`.
    ///
    /// Every request is bounded by `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    /// Service root, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl CredentialVerifier for HttpAuthService {
    #[tracing::instrument(skip_all)]
    async fn verify(&self, id_token: &str) -> Result<Identity, AuthError> {
        let resp = self
            .client
            .post(format!("{}/verify", self.base_url))
            .json(&VerifyRequest { id_token })
            .send()
            .await?;

        match resp.status() {
            StatusCode::OK => Ok(resp.json().await?),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                let text = resp.text().await.unwrap_or_default();
                Err(AuthError::Rejected(text))
            }
            status => {
                let text = resp.text().await.unwrap_or_default();
                Err(AuthError::Service {
                    status: status.as_u16(),
                    message: text,
                })
            }
        }
    }
}

#[async_trait]
impl ResourceLookup for HttpAuthService {
    #[tracing::instrument(skip_all)]
    async fn find_by_token(&self, token: &str) -> Result<Option<Resource>, AuthError> {
        let resp = self
            .client
            .get(format!("{}/resources", self.base_url))
            .query(&[("token", token)])
            .send()
            .await?;

        match resp.status() {
            StatusCode::OK => {
                let resource: Resource = resp.json().await?;
                debug!(owner = %resource.owner_uid, "resource found");
                Ok(Some(resource))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => {
                let text = resp.text().await.unwrap_or_default();
                Err(AuthError::Service {
                    status: status.as_u16(),
                    message: text,
                })
            }
        }
    }
}
