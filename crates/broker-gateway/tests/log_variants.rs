#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};

use broker_core::error::Result;
use broker_core::protocol::{LogPayload, PayloadKind, RequestEnvelope};
use broker_gateway::adapters::proto::{LogRequest, LogResponse};
use broker_gateway::adapters::{
    HttpAdapter, LogClient, LogConnector, QueueAdapter, RawRpcAdapter, StreamingRpcAdapter,
};
use broker_gateway::config::{HttpTarget, QueueTarget, RawRpcTarget};
use broker_gateway::dispatch::ActionRouter;
use common::{RecordingBus, RpcAnswer};

#[derive(Clone, Default)]
struct CapturingConnector {
    seen: Arc<Mutex<Vec<Value>>>,
}

#[async_trait]
impl LogConnector for CapturingConnector {
    type Client = CapturingConnector;

    async fn connect(&self, _target: &str) -> Result<CapturingConnector> {
        Ok(self.clone())
    }
}

#[async_trait]
impl LogClient for CapturingConnector {
    async fn write_log(
        &mut self,
        request: tonic::Request<LogRequest>,
    ) -> std::result::Result<tonic::Response<LogResponse>, tonic::Status> {
        let log = request.into_inner().log_entry.unwrap_or_default();
        self.seen
            .lock()
            .unwrap()
            .push(json!({ "name": log.name, "data": log.data }));
        Ok(tonic::Response::new(LogResponse { result: "logged".into() }))
    }
}

#[tokio::test]
async fn entry_arrives_intact_through_every_variant() {
    let http_seen: Arc<Mutex<Vec<Value>>> = Arc::default();
    let record = Arc::clone(&http_seen);
    let logger = Router::new().route(
        "/log",
        post(move |Json(body): Json<Value>| {
            let record = Arc::clone(&record);
            async move {
                record.lock().unwrap().push(body);
                (StatusCode::ACCEPTED, Json(json!({ "error": false, "message": "logged" })))
            }
        }),
    );
    let http_addr = common::spawn_http(logger).await;
    let (rpc_addr, rpc_seen) = common::spawn_gob_rpc(|_, _| {
        RpcAnswer::Result("Processed payload via RPC".into())
    })
    .await;
    let grpc = CapturingConnector::default();
    let bus = RecordingBus::default();

    let router = ActionRouter::new();
    router.bind_log_variant(
        "http",
        Arc::new(
            HttpAdapter::new(
                "logger-http",
                HttpTarget {
                    url: format!("http://{http_addr}/log"),
                    payload: PayloadKind::Log,
                    success_message: "logged".into(),
                    accepted_status: 202,
                    unauthorized_status: 401,
                    timeout_ms: 2_000,
                },
            )
            .unwrap(),
        ),
    );
    router.bind_log_variant(
        "rpc",
        Arc::new(RawRpcAdapter::new(
            "logger-rpc",
            RawRpcTarget {
                addr: rpc_addr.to_string(),
                method: "RPCServer.LogInfo".into(),
                timeout_ms: 2_000,
            },
        )),
    );
    router.bind_log_variant(
        "grpc",
        Arc::new(StreamingRpcAdapter::with_connector(
            "logger-grpc",
            Duration::from_secs(1),
            grpc.clone(),
        )),
    );
    router.bind_log_variant(
        "queue",
        Arc::new(QueueAdapter::new(
            "logger-queue",
            QueueTarget {
                exchange: "logs_topic".into(),
                routing_key: "log.INFO".into(),
                success_message: "logged via RabbitMQ".into(),
            },
            Arc::new(bus.clone()),
        )),
    );

    let body = br#"{"action":"log","log":{"name":"test","data":"x"}}"#;
    let expected = json!({ "name": "test", "data": "x" });
    let mut messages = Vec::new();
    for variant in ["http", "rpc", "grpc", "queue"] {
        let reply = router
            .dispatch_log(variant, RequestEnvelope::from_json(body).unwrap())
            .await;
        assert_eq!(reply.status, 202, "variant {variant}: {:?}", reply.body);
        messages.push(reply.body.message);
    }
    assert_eq!(
        messages,
        vec!["logged", "Processed payload via RPC", "logged", "logged via RabbitMQ"]
    );

    assert_eq!(*http_seen.lock().unwrap(), vec![expected.clone()]);
    assert_eq!(
        rpc_seen.lock().unwrap()[0].1,
        LogPayload { name: "test".into(), data: "x".into() }
    );
    assert_eq!(*grpc.seen.lock().unwrap(), vec![expected.clone()]);
    let published = bus.published();
    assert_eq!(published.len(), 1);
    let queued: Value = serde_json::from_slice(&published[0].2).unwrap();
    assert_eq!(queued, expected);
}
