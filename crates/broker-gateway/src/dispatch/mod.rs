//! Dispatch module exports.
//!
//! Re-exports the action router and the adapter trait so adapters and tests
//! can depend on this module directly.

pub mod router;

pub use router::{ActionRouter, Adapter, Protocol};
