//! Publish to a topic exchange on a shared AMQP connection.
//!
//! The connection is process-wide and opened lazily. Each publish gets its own
//! channel ("emitter"), which is closed whether or not the publish succeeded.
//! Only the publish itself is awaited, never consumption. Connecting and
//! opening a channel are each bounded by the bus connect timeout.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, ExchangeDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use tokio::sync::Mutex;

use broker_core::error::{GatewayError, Result};
use broker_core::protocol::{Delivery, Payload, PayloadKind};

use crate::config::QueueTarget;
use crate::dispatch::{Adapter, Protocol};
use crate::error_map;

/// Something that can hand out short-lived emitters.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Open an emitter bound to `exchange`. Failure means the bus is unreachable.
    async fn emitter(&self, target: &str, exchange: &str) -> Result<Box<dyn Emitter>>;
}

#[async_trait]
pub trait Emitter: Send + Sync {
    async fn push(&self, routing_key: &str, body: Vec<u8>) -> Result<()>;
    /// Release the emitter. Errors are logged, not returned.
    async fn close(self: Box<Self>);
}

/// `lapin`-backed bus.
///
/// The lock guarding the shared connection is only ever held for a bounded
/// handshake; channel opens happen outside it.
pub struct AmqpBus {
    url: String,
    connect_timeout: Duration,
    conn: Mutex<Option<Arc<Connection>>>,
}

impl AmqpBus {
    /// Does no I/O; the connection opens on first use.
    pub fn new(url: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            connect_timeout,
            conn: Mutex::new(None),
        }
    }

    async fn connection(&self, target: &str) -> Result<Arc<Connection>> {
        let mut slot = self.conn.lock().await;
        if let Some(conn) = slot.as_ref() {
            if conn.status().connected() {
                return Ok(Arc::clone(conn));
            }
            tracing::info!(downstream = %target, "bus connection lost, reconnecting");
        }
        let connect = Connection::connect(&self.url, ConnectionProperties::default());
        let conn = tokio::time::timeout(self.connect_timeout, connect)
            .await
            .map_err(|_| error_map::timeout(target, self.connect_timeout))?
            .map_err(|e| error_map::amqp_emitter(target, &e))?;
        let conn = Arc::new(conn);
        *slot = Some(Arc::clone(&conn));
        Ok(conn)
    }
}

/// Open a channel and declare the exchange on it. The channel is closed
/// again if the declare fails.
async fn open_emitter(conn: &Connection, target: &str, exchange: &str) -> Result<AmqpEmitter> {
    let channel = conn
        .create_channel()
        .await
        .map_err(|e| error_map::amqp_emitter(target, &e))?;

    let declared = channel
        .exchange_declare(
            exchange,
            ExchangeKind::Topic,
            ExchangeDeclareOptions {
                durable: true,
                ..ExchangeDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await;
    let emitter = AmqpEmitter {
        channel,
        exchange: exchange.to_string(),
    };
    if let Err(e) = declared {
        Box::new(emitter).close().await;
        return Err(error_map::amqp_emitter(target, &e));
    }
    Ok(emitter)
}

#[async_trait]
impl MessageBus for AmqpBus {
    async fn emitter(&self, target: &str, exchange: &str) -> Result<Box<dyn Emitter>> {
        let conn = self.connection(target).await?;
        let emitter = tokio::time::timeout(self.connect_timeout, open_emitter(&conn, target, exchange))
            .await
            .map_err(|_| error_map::timeout(target, self.connect_timeout))??;
        Ok(Box::new(emitter))
    }
}

struct AmqpEmitter {
    channel: Channel,
    exchange: String,
}

#[async_trait]
impl Emitter for AmqpEmitter {
    async fn push(&self, routing_key: &str, body: Vec<u8>) -> Result<()> {
        self.channel
            .basic_publish(
                &self.exchange,
                routing_key,
                BasicPublishOptions::default(),
                &body,
                BasicProperties::default().with_content_type("text/plain".into()),
            )
            .await
            .map_err(|e| error_map::amqp_publish(&e))?;
        Ok(())
    }

    async fn close(self: Box<Self>) {
        if let Err(e) = self.channel.close(200, "OK").await {
            tracing::debug!(error = %e, "closing emitter channel failed");
        }
    }
}

pub struct QueueAdapter {
    name: String,
    target: QueueTarget,
    bus: Arc<dyn MessageBus>,
}

impl QueueAdapter {
    pub fn new(name: impl Into<String>, target: QueueTarget, bus: Arc<dyn MessageBus>) -> Self {
        Self {
            name: name.into(),
            target,
            bus,
        }
    }
}

#[async_trait]
impl Adapter for QueueAdapter {
    fn target(&self) -> &str {
        &self.name
    }

    fn protocol(&self) -> Protocol {
        Protocol::Queue
    }

    fn payload_kind(&self) -> PayloadKind {
        PayloadKind::Log
    }

    async fn call(&self, payload: Payload) -> Result<Delivery> {
        let entry = payload.into_log()?;
        let body = serde_json::to_vec(&entry)
            .map_err(|e| GatewayError::QueuePublishFailed(format!("encode entry: {e}")))?;

        let emitter = self.bus.emitter(&self.name, &self.target.exchange).await?;
        let pushed = emitter.push(&self.target.routing_key, body).await;
        emitter.close().await;
        pushed?;

        Ok(Delivery::message(self.target.success_message.clone()))
    }
}
