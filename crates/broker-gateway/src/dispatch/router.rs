use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use broker_core::error::{GatewayError, Result};
use broker_core::protocol::{Delivery, Payload, PayloadKind, Reply, RequestEnvelope};

/// Downstream wire protocol, for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Http,
    RawRpc,
    StreamingRpc,
    Queue,
}

impl Protocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::RawRpc => "raw_rpc",
            Protocol::StreamingRpc => "streaming_rpc",
            Protocol::Queue => "queue",
        }
    }
}

/// One downstream transport. Owns its serialization and its error rules.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Binding name, used in error messages and logs.
    fn target(&self) -> &str;
    fn protocol(&self) -> Protocol;
    /// The envelope variant this adapter consumes.
    fn payload_kind(&self) -> PayloadKind;
    async fn call(&self, payload: Payload) -> Result<Delivery>;
}

/// Registry from action (and log variant) to adapter.
///
/// Built once at startup. Every dispatch calls at most one adapter, once.
#[derive(Default)]
pub struct ActionRouter {
    actions: DashMap<String, Arc<dyn Adapter>>,
    log_variants: DashMap<String, Arc<dyn Adapter>>,
}

impl ActionRouter {
    pub fn new() -> Self {
        Self {
            actions: DashMap::new(),
            log_variants: DashMap::new(),
        }
    }

    pub fn bind(&self, action: impl Into<String>, adapter: Arc<dyn Adapter>) {
        self.actions.insert(action.into(), adapter);
    }

    pub fn bind_log_variant(&self, variant: impl Into<String>, adapter: Arc<dyn Adapter>) {
        self.log_variants.insert(variant.into(), adapter);
    }

    pub fn actions(&self) -> Vec<String> {
        let mut out: Vec<String> = self.actions.iter().map(|e| e.key().clone()).collect();
        out.sort();
        out
    }

    pub fn log_variants(&self) -> Vec<String> {
        let mut out: Vec<String> = self.log_variants.iter().map(|e| e.key().clone()).collect();
        out.sort();
        out
    }

    /// Route by `envelope.action`.
    pub async fn dispatch(&self, envelope: RequestEnvelope) -> Reply {
        let action = envelope.action.clone();
        let adapter = self.actions.get(&action).map(|e| Arc::clone(e.value()));
        invoke(&action, adapter, envelope).await
    }

    /// Named log operation: the variant picks the adapter, the action is ignored.
    pub async fn dispatch_log(&self, variant: &str, envelope: RequestEnvelope) -> Reply {
        let adapter = self.log_variants.get(variant).map(|e| Arc::clone(e.value()));
        invoke(&format!("log/{variant}"), adapter, envelope).await
    }
}

async fn invoke(route: &str, adapter: Option<Arc<dyn Adapter>>, envelope: RequestEnvelope) -> Reply {
    let Some(adapter) = adapter else {
        tracing::warn!(route = %route, "no binding for action");
        return Reply::from_error(&GatewayError::UnknownAction(route.to_string()));
    };

    let payload = envelope.take_payload(adapter.payload_kind());
    tracing::debug!(
        route = %route,
        downstream = %adapter.target(),
        protocol = adapter.protocol().as_str(),
        "dispatching"
    );

    match adapter.call(payload).await {
        Ok(delivery) => {
            tracing::info!(route = %route, downstream = %adapter.target(), "downstream accepted");
            Reply::accepted(delivery)
        }
        Err(err) => {
            tracing::warn!(
                route = %route,
                downstream = %adapter.target(),
                protocol = adapter.protocol().as_str(),
                kind = %err.kind(),
                error = %err,
                "downstream call failed"
            );
            Reply::from_error(&err)
        }
    }
}
