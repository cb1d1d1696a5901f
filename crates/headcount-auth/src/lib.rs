//! # headcount-auth
//!
//! The relay's boundary to the external identity and resource service.
//!
//! - [`CredentialVerifier`]: checks an observer's identity token
//! - [`ResourceLookup`]: resolves a monitored-resource token to its record
//! - [`HttpAuthService`]: both traits over HTTP
//! - [`StaticDirectory`]: both traits over an in-memory table

#![deny(unsafe_code)]

pub mod directory;
pub mod errors;
pub mod http;
pub mod traits;
pub mod types;

pub use directory::StaticDirectory;
pub use errors::AuthError;
pub use http::HttpAuthService;
pub use traits::{CredentialVerifier, ResourceLookup};
pub use types::{Identity, Resource};
