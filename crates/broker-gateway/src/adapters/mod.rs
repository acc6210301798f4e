//! Protocol adapters, one per downstream transport.
//!
//! All of them implement `dispatch::Adapter`. Each call acquires its own
//! connection (for the queue, a channel on the shared bus connection) and
//! drops it on every exit path.

pub mod gob;
pub mod http;
pub mod proto;
pub mod queue;
pub mod raw_rpc;
pub mod streaming_rpc;

pub use http::HttpAdapter;
pub use queue::{AmqpBus, Emitter, MessageBus, QueueAdapter};
pub use raw_rpc::RawRpcAdapter;
pub use streaming_rpc::{GrpcConnector, LogClient, LogConnector, StreamingRpcAdapter};
