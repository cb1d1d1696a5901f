//! # headcount-settings
//!
//! Configuration for the headcount relay, loaded from three layers (in
//! priority order):
//! 1. **Compiled defaults**: [`HeadcountSettings::default()`]
//! 2. **Settings file**: JSON, deep-merged over defaults
//! 3. **Environment variables**: `PORT` and `HEADCOUNT_*` overrides

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
