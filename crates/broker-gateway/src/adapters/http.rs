//! Synchronous JSON POST to a downstream HTTP service.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;

use broker_core::error::{GatewayError, Result};
use broker_core::protocol::{Delivery, Payload, PayloadKind, ResponseEnvelope};

use crate::config::HttpTarget;
use crate::dispatch::{Adapter, Protocol};
use crate::error_map;

pub struct HttpAdapter {
    name: String,
    target: HttpTarget,
    client: reqwest::Client,
}

impl HttpAdapter {
    /// Idle pooling is off, so every call opens its own connection. Downstreams
    /// are addressed directly, never through an environment proxy.
    pub fn new(name: impl Into<String>, target: HttpTarget) -> Result<Self> {
        let name = name.into();
        let mut builder = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .no_proxy();
        if let Some(bound) = target.timeout() {
            builder = builder.timeout(bound);
        }
        let client = builder
            .build()
            .map_err(|e| error_map::unreachable(&name, &e))?;
        Ok(Self { name, target, client })
    }
}

#[async_trait]
impl Adapter for HttpAdapter {
    fn target(&self) -> &str {
        &self.name
    }

    fn protocol(&self) -> Protocol {
        Protocol::Http
    }

    fn payload_kind(&self) -> PayloadKind {
        self.target.payload
    }

    async fn call(&self, payload: Payload) -> Result<Delivery> {
        let fields = serde_json::to_value(&payload)
            .map_err(|e| GatewayError::Decode(format!("encode payload: {e}")))?;
        let body = serde_json::to_vec(&fields)
            .map_err(|e| GatewayError::Decode(format!("encode payload: {e}")))?;

        let bound = self.target.timeout();
        let response = self
            .client
            .post(&self.target.url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| error_map::http_send(&self.name, &e, bound))?;

        let status = response.status().as_u16();
        if status != self.target.accepted_status {
            tracing::debug!(downstream = %self.name, status, "downstream refused");
            return Err(error_map::http_status(
                &self.name,
                status,
                self.target.unauthorized_status,
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| error_map::http_send(&self.name, &e, bound))?;
        let data = relay_data(&self.name, self.target.payload, &bytes)?;

        Ok(Delivery::message(render_message(&self.target.success_message, &fields)).with_data(data))
    }
}

/// Decode the downstream envelope and hand back its `data`. An error envelope
/// means rejected credentials only for auth targets.
fn relay_data(target: &str, kind: PayloadKind, body: &[u8]) -> Result<Option<Value>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let env: ResponseEnvelope = serde_json::from_slice(body)
        .map_err(|e| GatewayError::Decode(format!("{target} response: {e}")))?;
    if env.error {
        return Err(match kind {
            PayloadKind::Auth => GatewayError::DownstreamUnauthorized {
                target: target.to_string(),
            },
            _ => error_map::call_failed(target, env.message),
        });
    }
    Ok(env.data)
}

/// Fill `{field}` placeholders from the payload's string fields.
/// Unknown placeholders are left as written.
fn render_message(template: &str, fields: &Value) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };
        let key = &after[..close];
        match fields.get(key).and_then(Value::as_str) {
            Some(v) => out.push_str(v),
            None => {
                out.push('{');
                out.push_str(key);
                out.push('}');
            }
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    out
}
