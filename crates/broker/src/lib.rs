//! Top-level facade crate for the broker gateway.
//!
//! Re-exports core types and the gateway library so users can depend on a single crate.

pub mod core {
    pub use broker_core::*;
}

pub mod gateway {
    pub use broker_gateway::*;
}
