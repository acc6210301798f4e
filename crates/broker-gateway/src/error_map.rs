//! Classify transport failures into the gateway taxonomy.
//!
//! Every function here is pure: it inspects an error value and builds a
//! `GatewayError`. No I/O, no logging. The kind/message projection that
//! follows lives in `broker_core::error::describe`.

use std::error::Error as StdError;
use std::time::Duration;

use broker_core::error::GatewayError;

/// Render an error with its source chain (`outer: inner: root`).
pub fn chain(err: &dyn StdError) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let msg = cause.to_string();
        if !out.ends_with(&msg) {
            out.push_str(": ");
            out.push_str(&msg);
        }
        source = cause.source();
    }
    out
}

pub fn timeout(target: &str, after: Duration) -> GatewayError {
    GatewayError::DownstreamTimeout {
        target: target.to_string(),
        after_ms: u64::try_from(after.as_millis()).unwrap_or(u64::MAX),
    }
}

pub fn unreachable(target: &str, err: &dyn StdError) -> GatewayError {
    GatewayError::DownstreamUnreachable {
        target: target.to_string(),
        detail: chain(err),
    }
}

pub fn call_failed(target: &str, detail: impl Into<String>) -> GatewayError {
    GatewayError::DownstreamCallFailed {
        target: target.to_string(),
        detail: detail.into(),
    }
}

/// HTTP status handling: accepted is not an error, unauthorized is kept apart.
pub fn http_status(target: &str, status: u16, unauthorized: u16) -> GatewayError {
    if status == unauthorized {
        GatewayError::DownstreamUnauthorized {
            target: target.to_string(),
        }
    } else {
        GatewayError::DownstreamBadStatus {
            target: target.to_string(),
            status,
        }
    }
}

/// `reqwest` send/body errors. Timeouts stay distinct; everything else is
/// connection-level.
pub fn http_send(target: &str, err: &reqwest::Error, bound: Option<Duration>) -> GatewayError {
    match bound {
        Some(after) if err.is_timeout() => timeout(target, after),
        _ => unreachable(target, err),
    }
}

/// gRPC call status.
pub fn grpc_status(target: &str, status: &tonic::Status, deadline: Duration) -> GatewayError {
    match status.code() {
        tonic::Code::DeadlineExceeded => timeout(target, deadline),
        tonic::Code::Unavailable => GatewayError::DownstreamUnreachable {
            target: target.to_string(),
            detail: status.message().to_string(),
        },
        code => call_failed(target, format!("{code:?}: {}", status.message())),
    }
}

/// gRPC channel establishment.
pub fn grpc_transport(target: &str, err: &tonic::transport::Error) -> GatewayError {
    unreachable(target, err)
}

/// Emitter (channel) creation against the bus.
pub fn amqp_emitter(target: &str, err: &lapin::Error) -> GatewayError {
    unreachable(target, err)
}

/// Publish on an already open channel.
pub fn amqp_publish(err: &lapin::Error) -> GatewayError {
    GatewayError::QueuePublishFailed(chain(err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use broker_core::error::ErrorKind;

    #[test]
    fn http_status_distinguishes_unauthorized() {
        assert_eq!(
            http_status("auth", 401, 401).kind(),
            ErrorKind::DownstreamUnauthorized
        );
        assert_eq!(
            http_status("auth", 500, 401),
            GatewayError::DownstreamBadStatus { target: "auth".into(), status: 500 }
        );
    }

    #[test]
    fn grpc_codes_map_to_kinds() {
        let d = Duration::from_secs(1);
        let cases = [
            (tonic::Status::deadline_exceeded("late"), ErrorKind::DownstreamTimeout),
            (tonic::Status::unavailable("down"), ErrorKind::DownstreamUnreachable),
            (tonic::Status::internal("boom"), ErrorKind::DownstreamCallFailed),
            (tonic::Status::invalid_argument("bad"), ErrorKind::DownstreamCallFailed),
        ];
        for (status, kind) in cases {
            assert_eq!(grpc_status("logger-grpc", &status, d).kind(), kind);
        }
    }

    #[test]
    fn timeout_reports_millis() {
        let err = timeout("logger-rpc", Duration::from_millis(250));
        assert_eq!(err.to_string(), "logger-rpc timed out after 250ms");
    }

    #[test]
    fn chain_includes_io_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused");
        let err = unreachable("logger-rpc", &io);
        assert_eq!(err.kind(), ErrorKind::DownstreamUnreachable);
        assert!(err.to_string().contains("connection refused"));
    }
}
