//! `logs.LogService` messages and client.
//!
//! Mirrors `proto/logs.proto`. Written out rather than generated so the build
//! does not need `protoc`; keep the tags in sync with the proto file.

use http::uri::PathAndQuery;
use tonic::transport::Channel;

#[derive(Clone, PartialEq, prost::Message)]
pub struct Log {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub data: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct LogRequest {
    #[prost(message, optional, tag = "1")]
    pub log_entry: Option<Log>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct LogResponse {
    #[prost(string, tag = "1")]
    pub result: String,
}

const WRITE_LOG_PATH: &str = "/logs.LogService/WriteLog";

/// Unary client for `logs.LogService` over one channel.
#[derive(Debug, Clone)]
pub struct LogServiceClient {
    inner: tonic::client::Grpc<Channel>,
}

impl LogServiceClient {
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: tonic::client::Grpc::new(channel),
        }
    }

    pub async fn write_log(
        &mut self,
        request: tonic::Request<LogRequest>,
    ) -> Result<tonic::Response<LogResponse>, tonic::Status> {
        self.inner
            .ready()
            .await
            .map_err(|e| tonic::Status::unavailable(format!("service was not ready: {e}")))?;
        let codec = tonic::codec::ProstCodec::default();
        let path = PathAndQuery::from_static(WRITE_LOG_PATH);
        self.inner.unary(request, path, codec).await
    }
}
