//! Shared application state for the broker gateway.
//!
//! Builds one adapter per configured target, then binds actions and log
//! variants to them. Startup errors are explicit (Result instead of panic).

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::adapters::{AmqpBus, HttpAdapter, MessageBus, QueueAdapter, RawRpcAdapter, StreamingRpcAdapter};
use crate::config::{ConfigError, GatewayConfig, Result, TargetConfig};
use crate::dispatch::{ActionRouter, Adapter};

#[derive(Clone)]
pub struct AppState {
    cfg: Arc<GatewayConfig>,
    router: Arc<ActionRouter>,
}

impl AppState {
    pub fn new(cfg: GatewayConfig) -> Result<Self> {
        let bus: Option<Arc<dyn MessageBus>> = cfg
            .bus
            .as_ref()
            .map(|b| Arc::new(AmqpBus::new(b.url.clone(), b.connect_timeout())) as Arc<dyn MessageBus>);

        // 1) One adapter per target
        let mut adapters: BTreeMap<&str, Arc<dyn Adapter>> = BTreeMap::new();
        for (name, target) in &cfg.targets {
            let adapter: Arc<dyn Adapter> = match target {
                TargetConfig::Http(t) => Arc::new(
                    HttpAdapter::new(name.clone(), t.clone())
                        .map_err(|e| ConfigError::Invalid(format!("target `{name}`: {e}")))?,
                ),
                TargetConfig::RawRpc(t) => Arc::new(RawRpcAdapter::new(name.clone(), t.clone())),
                TargetConfig::StreamingRpc(t) => Arc::new(StreamingRpcAdapter::new(name.clone(), t)),
                TargetConfig::Queue(t) => {
                    let bus = bus.clone().ok_or_else(|| {
                        ConfigError::Invalid(format!("target `{name}` needs a bus"))
                    })?;
                    Arc::new(QueueAdapter::new(name.clone(), t.clone(), bus))
                }
            };
            adapters.insert(name.as_str(), adapter);
        }

        // 2) Bind routes and log variants
        let router = ActionRouter::new();
        let lookup = |name: &str| {
            adapters
                .get(name)
                .cloned()
                .ok_or_else(|| ConfigError::Invalid(format!("unknown target `{name}`")))
        };
        for (action, target) in &cfg.routes {
            router.bind(action.clone(), lookup(target)?);
        }
        for (variant, target) in &cfg.log_variants {
            router.bind_log_variant(variant.clone(), lookup(target)?);
        }

        for (action, target) in &cfg.routes {
            tracing::info!(action = %action, downstream = %target, "route bound");
        }
        for (variant, target) in &cfg.log_variants {
            tracing::info!(variant = %variant, downstream = %target, "log variant bound");
        }

        Ok(Self::with_router(cfg, router))
    }

    /// Assemble state around an already-populated router.
    pub fn with_router(cfg: GatewayConfig, router: ActionRouter) -> Self {
        Self {
            cfg: Arc::new(cfg),
            router: Arc::new(router),
        }
    }

    pub fn cfg(&self) -> &GatewayConfig {
        &self.cfg
    }

    pub fn router(&self) -> Arc<ActionRouter> {
        Arc::clone(&self.router)
    }
}
