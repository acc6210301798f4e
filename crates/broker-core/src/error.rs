//! Gateway error taxonomy and its projection onto the client surface.

use thiserror::Error;

/// HTTP status sent for a successful dispatch.
pub const STATUS_ACCEPTED: u16 = 202;
/// HTTP status forwarded when a downstream rejected the credentials.
pub const STATUS_UNAUTHORIZED: u16 = 401;
/// HTTP status for every other failure.
pub const STATUS_FAILURE: u16 = 400;

/// Client-facing error kinds (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Inbound body (or downstream envelope) did not decode.
    DecodeError,
    /// Action or log variant has no binding.
    UnknownAction,
    /// Connection-level failure for any adapter.
    DownstreamUnreachable,
    /// Downstream explicitly rejected the credentials (HTTP only).
    DownstreamUnauthorized,
    /// Downstream answered with neither the accepted nor the unauthorized status.
    DownstreamBadStatus,
    /// Call-level error reported by the downstream: an RPC error, or an error
    /// envelope from a non-auth HTTP target.
    DownstreamCallFailed,
    /// Call exceeded its deadline.
    DownstreamTimeout,
    /// Message bus refused the publish.
    QueuePublishFailed,
}

impl ErrorKind {
    /// String representation used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::DecodeError => "DECODE_ERROR",
            ErrorKind::UnknownAction => "UNKNOWN_ACTION",
            ErrorKind::DownstreamUnreachable => "DOWNSTREAM_UNREACHABLE",
            ErrorKind::DownstreamUnauthorized => "DOWNSTREAM_UNAUTHORIZED",
            ErrorKind::DownstreamBadStatus => "DOWNSTREAM_BAD_STATUS",
            ErrorKind::DownstreamCallFailed => "DOWNSTREAM_CALL_FAILED",
            ErrorKind::DownstreamTimeout => "DOWNSTREAM_TIMEOUT",
            ErrorKind::QueuePublishFailed => "QUEUE_PUBLISH_FAILED",
        }
    }

    /// Only unauthorized is distinguished at the boundary.
    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::DownstreamUnauthorized => STATUS_UNAUTHORIZED,
            _ => STATUS_FAILURE,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Every failure a dispatch can end in. Each one is terminal for its request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("invalid request body: {0}")]
    Decode(String),
    #[error("unknown action")]
    UnknownAction(String),
    #[error("{target} unreachable: {detail}")]
    DownstreamUnreachable { target: String, detail: String },
    #[error("invalid credentials")]
    DownstreamUnauthorized { target: String },
    #[error("error calling {target} service: status {status}")]
    DownstreamBadStatus { target: String, status: u16 },
    #[error("{target} call failed: {detail}")]
    DownstreamCallFailed { target: String, detail: String },
    #[error("{target} timed out after {after_ms}ms")]
    DownstreamTimeout { target: String, after_ms: u64 },
    #[error("queue publish failed: {0}")]
    QueuePublishFailed(String),
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::Decode(_) => ErrorKind::DecodeError,
            GatewayError::UnknownAction(_) => ErrorKind::UnknownAction,
            GatewayError::DownstreamUnreachable { .. } => ErrorKind::DownstreamUnreachable,
            GatewayError::DownstreamUnauthorized { .. } => ErrorKind::DownstreamUnauthorized,
            GatewayError::DownstreamBadStatus { .. } => ErrorKind::DownstreamBadStatus,
            GatewayError::DownstreamCallFailed { .. } => ErrorKind::DownstreamCallFailed,
            GatewayError::DownstreamTimeout { .. } => ErrorKind::DownstreamTimeout,
            GatewayError::QueuePublishFailed(_) => ErrorKind::QueuePublishFailed,
        }
    }
}

/// Project an error onto its kind and the human-readable message the caller sees.
///
/// Pure: no I/O, no logging.
pub fn describe(err: &GatewayError) -> (ErrorKind, String) {
    (err.kind(), err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unauthorized_keeps_its_status() {
        let unauthorized = GatewayError::DownstreamUnauthorized { target: "auth".into() };
        assert_eq!(unauthorized.kind().http_status(), 401);

        let others = [
            GatewayError::Decode("eof".into()),
            GatewayError::UnknownAction("nope".into()),
            GatewayError::DownstreamBadStatus { target: "auth".into(), status: 500 },
            GatewayError::DownstreamTimeout { target: "logger-grpc".into(), after_ms: 1000 },
            GatewayError::QueuePublishFailed("channel closed".into()),
        ];
        for err in others {
            assert_eq!(err.kind().http_status(), 400, "{err}");
        }
    }

    #[test]
    fn describe_uses_display_message() {
        let (kind, msg) = describe(&GatewayError::UnknownAction("shout".into()));
        assert_eq!(kind, ErrorKind::UnknownAction);
        assert_eq!(msg, "unknown action");

        let (kind, msg) = describe(&GatewayError::DownstreamBadStatus {
            target: "mailer".into(),
            status: 500,
        });
        assert_eq!(kind.as_str(), "DOWNSTREAM_BAD_STATUS");
        assert_eq!(msg, "error calling mailer service: status 500");
    }
}
