//! Shared mock downstreams and fake adapters for gateway tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

use broker_core::error::{GatewayError, Result};
use broker_core::protocol::{Delivery, LogPayload, Payload, PayloadKind};
use broker_gateway::adapters::gob::{self, Message, StructType};
use broker_gateway::adapters::{Emitter, MessageBus};
use broker_gateway::dispatch::{Adapter, Protocol};

/// Serve an axum router on an ephemeral port.
pub async fn spawn_http(app: axum::Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// An address nothing listens on.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// What the `net/rpc` double answers with.
pub enum RpcAnswer {
    Result(String),
    Error(String),
    Hang,
}

/// Go-style `net/rpc` server speaking gob, one call per connection.
///
/// Records `(ServiceMethod, entry)` for every call it decodes.
pub async fn spawn_gob_rpc<F>(answer: F) -> (SocketAddr, Arc<Mutex<Vec<(String, LogPayload)>>>)
where
    F: Fn(&str, &LogPayload) -> RpcAnswer + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let answer = Arc::new(answer);

    let seen_srv = Arc::clone(&seen);
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let seen = Arc::clone(&seen_srv);
            let answer = Arc::clone(&answer);
            tokio::spawn(async move {
                let mut types = HashMap::new();
                let mut values: Vec<BTreeMap<String, gob::Value>> = Vec::new();
                while values.len() < 2 {
                    let Ok(Some(msg)) = gob::read_message(&mut socket).await else {
                        return;
                    };
                    match gob::parse_message(msg).unwrap() {
                        Message::TypeDef { id, ty } => {
                            types.insert(id, ty.unwrap());
                        }
                        Message::Value { id, body } => {
                            values.push(gob::decode_struct(body, &types[&id]).unwrap());
                        }
                    }
                }
                let text = |fields: &BTreeMap<String, gob::Value>, key: &str| {
                    fields
                        .get(key)
                        .and_then(gob::Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                };
                let method = text(&values[0], "ServiceMethod");
                let entry = LogPayload {
                    name: text(&values[1], "Name"),
                    data: text(&values[1], "Data"),
                };
                seen.lock().unwrap().push((method.clone(), entry.clone()));

                let (result, error) = match answer(&method, &entry) {
                    RpcAnswer::Result(r) => (Some(r), String::new()),
                    RpcAnswer::Error(e) => (None, e),
                    RpcAnswer::Hang => {
                        tokio::time::sleep(Duration::from_secs(30)).await;
                        return;
                    }
                };

                let response = StructType::new(
                    "Response",
                    &[
                        ("ServiceMethod", gob::STRING_ID),
                        ("Seq", gob::UINT_ID),
                        ("Error", gob::STRING_ID),
                    ],
                );
                let mut out = BytesMut::new();
                gob::put_type_def(&mut out, gob::FIRST_USER_ID, &response);
                gob::put_struct_value(
                    &mut out,
                    gob::FIRST_USER_ID,
                    &[gob::Value::Str(method), gob::Value::Uint(0), gob::Value::Str(error)],
                );
                match result {
                    Some(r) => gob::put_singleton(&mut out, &gob::Value::Str(r)),
                    // net/rpc sends an empty struct body alongside an error
                    None => {
                        gob::put_type_def(&mut out, gob::FIRST_USER_ID + 1, &StructType::default());
                        gob::put_struct_value(&mut out, gob::FIRST_USER_ID + 1, &[]);
                    }
                }
                let _ = socket.write_all(&out).await;
            });
        }
    });
    (addr, seen)
}

/// Accepts connections and never writes a byte.
pub async fn spawn_silent() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

/// Adapter that records every payload and answers with a fixed outcome.
pub struct RecordingAdapter {
    name: String,
    kind: PayloadKind,
    outcome: Result<Delivery>,
    calls: AtomicUsize,
    payloads: Mutex<Vec<Payload>>,
}

impl RecordingAdapter {
    pub fn ok(name: &str, kind: PayloadKind) -> Arc<Self> {
        Self::with_outcome(name, kind, Ok(Delivery::message(format!("{name} ok"))))
    }

    pub fn with_outcome(name: &str, kind: PayloadKind, outcome: Result<Delivery>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            kind,
            outcome,
            calls: AtomicUsize::new(0),
            payloads: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn payloads(&self) -> Vec<Payload> {
        self.payloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl Adapter for RecordingAdapter {
    fn target(&self) -> &str {
        &self.name
    }

    fn protocol(&self) -> Protocol {
        Protocol::Http
    }

    fn payload_kind(&self) -> PayloadKind {
        self.kind
    }

    async fn call(&self, payload: Payload) -> Result<Delivery> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.payloads.lock().unwrap().push(payload);
        self.outcome.clone()
    }
}

/// In-memory bus; records publishes and channel closes.
#[derive(Clone, Default)]
pub struct RecordingBus {
    state: Arc<BusState>,
}

#[derive(Default)]
struct BusState {
    published: Mutex<Vec<(String, String, Vec<u8>)>>,
    opened: AtomicUsize,
    closed: AtomicUsize,
    fail_push: bool,
}

impl RecordingBus {
    pub fn failing_push() -> Self {
        Self {
            state: Arc::new(BusState {
                fail_push: true,
                ..BusState::default()
            }),
        }
    }

    /// `(exchange, routing_key, body)` per successful publish.
    pub fn published(&self) -> Vec<(String, String, Vec<u8>)> {
        self.state.published.lock().unwrap().clone()
    }

    pub fn opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }
}

struct RecordingEmitter {
    state: Arc<BusState>,
    exchange: String,
}

#[async_trait]
impl MessageBus for RecordingBus {
    async fn emitter(&self, _target: &str, exchange: &str) -> Result<Box<dyn Emitter>> {
        self.state.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordingEmitter {
            state: Arc::clone(&self.state),
            exchange: exchange.to_string(),
        }))
    }
}

#[async_trait]
impl Emitter for RecordingEmitter {
    async fn push(&self, routing_key: &str, body: Vec<u8>) -> Result<()> {
        if self.state.fail_push {
            return Err(GatewayError::QueuePublishFailed("channel closed by broker".into()));
        }
        self.state
            .published
            .lock()
            .unwrap()
            .push((self.exchange.clone(), routing_key.to_string(), body));
        Ok(())
    }

    async fn close(self: Box<Self>) {
        self.state.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Bus that cannot be reached.
pub struct DownBus;

#[async_trait]
impl MessageBus for DownBus {
    async fn emitter(&self, target: &str, _exchange: &str) -> Result<Box<dyn Emitter>> {
        Err(GatewayError::DownstreamUnreachable {
            target: target.to_string(),
            detail: "connection refused".into(),
        })
    }
}
