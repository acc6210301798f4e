//! Wire contracts exchanged with the external caller.
//!
//! - Inbound: `RequestEnvelope` (JSON), one payload variant per action.
//! - Outbound: `ResponseEnvelope` (JSON) plus the status that accompanies it.
//!
//! Decoding never panics; malformed bodies surface as `GatewayError::Decode`.

pub mod request;
pub mod response;

pub use request::{AuthPayload, LogPayload, MailPayload, Payload, PayloadKind, RequestEnvelope};
pub use response::{Delivery, Reply, ResponseEnvelope};
