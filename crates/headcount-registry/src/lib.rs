//! # headcount-registry
//!
//! The shared token → live viewer count store.
//!
//! - Counts are non-negative; decrementing an absent or zero entry clamps to 0
//! - Every change is published to the subscribers of that token only
//! - Mutation and publish happen under one lock, so a subscriber sees the
//!   changes of its token exactly once and in the order they were applied
//! - Zero-count entries can optionally be evicted after an idle period

#![deny(unsafe_code)]

pub mod registry;
pub mod subscription;

pub use registry::Registry;
pub use subscription::{CountUpdate, SubscriberId, Subscription};
