//! Notification delivery: transport seams, payloads and multicast dispatch.
//!
//! # Responsibility
//! - Define the opaque transports the core sends through.
//! - Partition endpoints by channel and account per-endpoint outcomes.
//!
//! # Invariants
//! - Every transport call is bounded by the configured timeout.
//! - A failure on one channel never prevents the other channel's attempt.

pub mod dispatcher;
pub mod payload;
pub mod transport;
