//! broker core: transport-agnostic envelopes, payloads, and the gateway error
//! taxonomy.
//!
//! This crate defines the inbound/outbound wire contracts and the mapping from
//! failures to client-visible kinds and statuses. It carries no transport or
//! runtime dependencies so adapters, the HTTP surface, and tests can share it.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Malformed input surfaces as `GatewayError`, never as a crash.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{ErrorKind, GatewayError, Result};
