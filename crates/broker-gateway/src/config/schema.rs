use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use broker_core::protocol::PayloadKind;

use super::{ConfigError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    pub version: u32,

    #[serde(default)]
    pub gateway: GatewaySection,

    /// Shared message bus. Required once any queue target exists.
    #[serde(default)]
    pub bus: Option<BusConfig>,

    /// Downstream bindings by name.
    #[serde(default)]
    pub targets: BTreeMap<String, TargetConfig>,

    /// action -> target name (for `/handle`).
    #[serde(default)]
    pub routes: BTreeMap<String, String>,

    /// log variant -> target name (for `/log/{variant}`).
    #[serde(default)]
    pub log_variants: BTreeMap<String, String>,
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(ConfigError::UnsupportedVersion(self.version));
        }
        if self.routes.is_empty() {
            return Err(ConfigError::Invalid("routes must not be empty".into()));
        }

        self.gateway.validate()?;

        for (name, target) in &self.targets {
            target.validate(name)?;
        }

        for (action, target) in &self.routes {
            if action.is_empty() {
                return Err(ConfigError::Invalid("route action must not be empty".into()));
            }
            self.target(target).ok_or_else(|| {
                ConfigError::Invalid(format!("route `{action}` references unknown target `{target}`"))
            })?;
        }

        for (variant, target) in &self.log_variants {
            let t = self.target(target).ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "log variant `{variant}` references unknown target `{target}`"
                ))
            })?;
            if t.payload_kind() != PayloadKind::Log {
                return Err(ConfigError::Invalid(format!(
                    "log variant `{variant}` must point at a log target, `{target}` takes {}",
                    t.payload_kind().as_str()
                )));
            }
        }

        let has_queue = self
            .targets
            .values()
            .any(|t| matches!(t, TargetConfig::Queue(_)));
        if has_queue && self.bus.is_none() {
            return Err(ConfigError::Invalid("queue targets require a `bus` section".into()));
        }
        if self.bus.as_ref().is_some_and(|b| b.connect_timeout_ms == 0) {
            return Err(ConfigError::Invalid("bus.connect_timeout_ms must be greater than 0".into()));
        }

        Ok(())
    }

    pub fn target(&self, name: &str) -> Option<&TargetConfig> {
        self.targets.get(name)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewaySection {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl GatewaySection {
    pub fn validate(&self) -> Result<()> {
        if !(1024..=16 * 1024 * 1024).contains(&self.max_body_bytes) {
            return Err(ConfigError::Invalid(
                "gateway.max_body_bytes must be between 1024 and 16777216".into(),
            ));
        }
        Ok(())
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".into()
}
fn default_max_body_bytes() -> usize {
    1024 * 1024
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BusConfig {
    pub url: String,

    /// Bounds the connection handshake and each channel open.
    #[serde(default = "default_bus_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl BusConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

fn default_bus_connect_timeout_ms() -> u64 {
    5_000
}

/// One downstream binding, tagged by protocol.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "protocol", rename_all = "snake_case")]
pub enum TargetConfig {
    Http(HttpTarget),
    RawRpc(RawRpcTarget),
    StreamingRpc(StreamingRpcTarget),
    Queue(QueueTarget),
}

impl TargetConfig {
    pub fn payload_kind(&self) -> PayloadKind {
        match self {
            TargetConfig::Http(t) => t.payload,
            TargetConfig::RawRpc(_) | TargetConfig::StreamingRpc(_) | TargetConfig::Queue(_) => {
                PayloadKind::Log
            }
        }
    }

    fn validate(&self, name: &str) -> Result<()> {
        match self {
            TargetConfig::Http(t) => {
                if !t.url.starts_with("http://") {
                    return Err(ConfigError::Invalid(format!(
                        "target `{name}`: url must start with http:// (TLS is not enabled)"
                    )));
                }
                for status in [t.accepted_status, t.unauthorized_status] {
                    if !(100..=599).contains(&status) {
                        return Err(ConfigError::Invalid(format!(
                            "target `{name}`: {status} is not an HTTP status"
                        )));
                    }
                }
                if t.accepted_status == t.unauthorized_status {
                    return Err(ConfigError::Invalid(format!(
                        "target `{name}`: accepted and unauthorized status must differ"
                    )));
                }
            }
            TargetConfig::RawRpc(t) => {
                if t.addr.is_empty() || t.method.is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "target `{name}`: addr and method are required"
                    )));
                }
            }
            TargetConfig::StreamingRpc(t) => {
                if !t.endpoint.starts_with("http://") {
                    return Err(ConfigError::Invalid(format!(
                        "target `{name}`: endpoint must start with http:// (TLS is not enabled)"
                    )));
                }
                if t.deadline_ms == 0 {
                    return Err(ConfigError::Invalid(format!(
                        "target `{name}`: deadline_ms must be greater than 0"
                    )));
                }
            }
            TargetConfig::Queue(t) => {
                if t.exchange.is_empty() || t.routing_key.is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "target `{name}`: exchange and routing_key are required"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpTarget {
    pub url: String,
    pub payload: PayloadKind,

    /// `{field}` placeholders are filled from the payload.
    #[serde(default = "default_http_message")]
    pub success_message: String,

    #[serde(default = "default_accepted_status")]
    pub accepted_status: u16,

    #[serde(default = "default_unauthorized_status")]
    pub unauthorized_status: u16,

    /// 0 disables the bound.
    #[serde(default = "default_http_timeout_ms")]
    pub timeout_ms: u64,
}

impl HttpTarget {
    pub fn timeout(&self) -> Option<Duration> {
        bounded(self.timeout_ms)
    }
}

fn default_http_message() -> String {
    "ok".into()
}
fn default_accepted_status() -> u16 {
    202
}
fn default_unauthorized_status() -> u16 {
    401
}
fn default_http_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawRpcTarget {
    /// host:port
    pub addr: String,

    #[serde(default = "default_rpc_method")]
    pub method: String,

    /// 0 disables the bound.
    #[serde(default = "default_rpc_timeout_ms")]
    pub timeout_ms: u64,
}

impl RawRpcTarget {
    pub fn timeout(&self) -> Option<Duration> {
        bounded(self.timeout_ms)
    }
}

fn default_rpc_method() -> String {
    "RPCServer.LogInfo".into()
}
fn default_rpc_timeout_ms() -> u64 {
    5_000
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamingRpcTarget {
    pub endpoint: String,

    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl StreamingRpcTarget {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

fn default_deadline_ms() -> u64 {
    1_000
}
fn default_connect_timeout_ms() -> u64 {
    5_000
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueueTarget {
    #[serde(default = "default_exchange")]
    pub exchange: String,

    #[serde(default = "default_routing_key")]
    pub routing_key: String,

    #[serde(default = "default_queue_message")]
    pub success_message: String,
}

fn default_exchange() -> String {
    "logs_topic".into()
}
fn default_routing_key() -> String {
    "log.INFO".into()
}
fn default_queue_message() -> String {
    "logged via RabbitMQ".into()
}

fn bounded(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}
