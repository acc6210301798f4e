//! Typed unary call over a gRPC channel, bounded by a per-call deadline.
//!
//! The channel is opened with a blocking handshake for each call and dropped
//! (closed) when the call returns, on every path.

use std::time::Duration;

use async_trait::async_trait;
use tonic::transport::Endpoint;

use broker_core::error::Result;
use broker_core::protocol::{Delivery, Payload, PayloadKind};

use crate::adapters::proto::{Log, LogRequest, LogResponse, LogServiceClient};
use crate::config::StreamingRpcTarget;
use crate::dispatch::{Adapter, Protocol};
use crate::error_map;

/// A connected `LogService` client.
#[async_trait]
pub trait LogClient: Send {
    async fn write_log(
        &mut self,
        request: tonic::Request<LogRequest>,
    ) -> std::result::Result<tonic::Response<LogResponse>, tonic::Status>;
}

#[async_trait]
impl LogClient for LogServiceClient {
    async fn write_log(
        &mut self,
        request: tonic::Request<LogRequest>,
    ) -> std::result::Result<tonic::Response<LogResponse>, tonic::Status> {
        LogServiceClient::write_log(self, request).await
    }
}

/// Establishes a channel. Returns only once it is ready or has failed.
#[async_trait]
pub trait LogConnector: Send + Sync {
    type Client: LogClient;
    async fn connect(&self, target: &str) -> Result<Self::Client>;
}

/// Real connector: plaintext HTTP/2 to a static endpoint.
#[derive(Debug, Clone)]
pub struct GrpcConnector {
    endpoint: String,
    connect_timeout: Duration,
}

impl GrpcConnector {
    pub fn new(endpoint: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            connect_timeout,
        }
    }
}

#[async_trait]
impl LogConnector for GrpcConnector {
    type Client = LogServiceClient;

    async fn connect(&self, target: &str) -> Result<LogServiceClient> {
        let endpoint = Endpoint::from_shared(self.endpoint.clone())
            .map_err(|e| error_map::grpc_transport(target, &e))?
            .connect_timeout(self.connect_timeout);
        let channel = endpoint
            .connect()
            .await
            .map_err(|e| error_map::grpc_transport(target, &e))?;
        Ok(LogServiceClient::new(channel))
    }
}

pub struct StreamingRpcAdapter<C = GrpcConnector> {
    name: String,
    deadline: Duration,
    connector: C,
}

impl StreamingRpcAdapter<GrpcConnector> {
    pub fn new(name: impl Into<String>, target: &StreamingRpcTarget) -> Self {
        let connector = GrpcConnector::new(target.endpoint.clone(), target.connect_timeout());
        Self::with_connector(name, target.deadline(), connector)
    }
}

impl<C: LogConnector> StreamingRpcAdapter<C> {
    pub fn with_connector(name: impl Into<String>, deadline: Duration, connector: C) -> Self {
        Self {
            name: name.into(),
            deadline,
            connector,
        }
    }
}

#[async_trait]
impl<C: LogConnector> Adapter for StreamingRpcAdapter<C> {
    fn target(&self) -> &str {
        &self.name
    }

    fn protocol(&self) -> Protocol {
        Protocol::StreamingRpc
    }

    fn payload_kind(&self) -> PayloadKind {
        PayloadKind::Log
    }

    async fn call(&self, payload: Payload) -> Result<Delivery> {
        let entry = payload.into_log()?;
        let mut client = self.connector.connect(&self.name).await?;

        let mut request = tonic::Request::new(LogRequest {
            log_entry: Some(Log {
                name: entry.name,
                data: entry.data,
            }),
        });
        // grpc-timeout for the server; the local bound below is what we rely on.
        request.set_timeout(self.deadline);

        match tokio::time::timeout(self.deadline, client.write_log(request)).await {
            Err(_) => Err(error_map::timeout(&self.name, self.deadline)),
            Ok(Err(status)) => Err(error_map::grpc_status(&self.name, &status, self.deadline)),
            Ok(Ok(_)) => Ok(Delivery::message("logged")),
        }
    }
}
