//! Inbound envelope and payload variants.
//!
//! Payload variants travel as sibling fields (`auth`, `log`, `mail`). Only the
//! one selected by the action is meaningful; the rest default to empty.

use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result};

/// Credentials forwarded verbatim to the authentication service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthPayload {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// A log entry. Shared by every log-delivery variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogPayload {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub data: String,
}

/// An outgoing mail, opaque to the gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailPayload {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub message: String,
}

/// Which payload variant an adapter consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    Auth,
    Log,
    Mail,
}

impl PayloadKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PayloadKind::Auth => "auth",
            PayloadKind::Log => "log",
            PayloadKind::Mail => "mail",
        }
    }
}

/// A payload extracted from the envelope. Serializes as the bare inner object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Auth(AuthPayload),
    Log(LogPayload),
    Mail(MailPayload),
}

impl Payload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Auth(_) => PayloadKind::Auth,
            Payload::Log(_) => PayloadKind::Log,
            Payload::Mail(_) => PayloadKind::Mail,
        }
    }

    /// Unwrap a log entry, for adapters that only speak log delivery.
    pub fn into_log(self) -> Result<LogPayload> {
        match self {
            Payload::Log(entry) => Ok(entry),
            other => Err(GatewayError::Decode(format!(
                "expected a log payload, got {}",
                other.kind().as_str()
            ))),
        }
    }
}

/// Inbound request envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Discriminator. Missing decodes as empty, which routes nowhere.
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub auth: AuthPayload,
    #[serde(default)]
    pub log: LogPayload,
    #[serde(default)]
    pub mail: MailPayload,
}

impl RequestEnvelope {
    /// Decode an inbound JSON body.
    pub fn from_json(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(|e| GatewayError::Decode(e.to_string()))
    }

    /// Move the requested variant out of the envelope.
    pub fn take_payload(self, kind: PayloadKind) -> Payload {
        match kind {
            PayloadKind::Auth => Payload::Auth(self.auth),
            PayloadKind::Log => Payload::Log(self.log),
            PayloadKind::Mail => Payload::Mail(self.mail),
        }
    }
}
