//! Inbound HTTP surface.
//!
//! Decodes the body once into a `RequestEnvelope`, hands it to the action
//! router, and writes the resulting `Reply` back as JSON.

pub mod handlers;
