//! Outbound envelope codec.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{describe, GatewayError, STATUS_ACCEPTED};

/// Uniform outbound shape. Also what downstream HTTP services answer with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ResponseEnvelope {
    pub fn ok(message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            error: false,
            message: message.into(),
            data,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            error: true,
            message: message.into(),
            data: None,
        }
    }
}

/// What an adapter hands back when the downstream accepted the call.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub message: String,
    pub data: Option<Value>,
}

impl Delivery {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Option<Value>) -> Self {
        self.data = data;
        self
    }
}

/// Envelope plus the HTTP status the boundary should send with it.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub body: ResponseEnvelope,
}

impl Reply {
    pub fn accepted(delivery: Delivery) -> Self {
        Self {
            status: STATUS_ACCEPTED,
            body: ResponseEnvelope::ok(delivery.message, delivery.data),
        }
    }

    pub fn from_error(err: &GatewayError) -> Self {
        let (kind, message) = describe(err);
        Self {
            status: kind.http_status(),
            body: ResponseEnvelope::failure(message),
        }
    }

    pub fn is_error(&self) -> bool {
        self.body.error
    }
}

impl From<crate::error::Result<Delivery>> for Reply {
    fn from(outcome: crate::error::Result<Delivery>) -> Self {
        match outcome {
            Ok(delivery) => Reply::accepted(delivery),
            Err(err) => Reply::from_error(&err),
        }
    }
}
