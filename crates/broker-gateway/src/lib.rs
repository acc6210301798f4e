//! broker gateway library entry.
//!
//! This crate wires the protocol adapters, the action router, the config
//! loader, and the HTTP surface into one gateway. It is intended to be
//! consumed by the binary (`main.rs`) and by integration tests.

pub mod adapters;
pub mod app_state;
pub mod config;
pub mod dispatch;
pub mod error_map;
pub mod ops;
pub mod router;
pub mod transport;
