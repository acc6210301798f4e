//! Named-procedure call over a dedicated TCP connection.
//!
//! Speaks Go `net/rpc` with its default gob codec. The call is
//! `Request{ServiceMethod, Seq}` followed by the args struct; the reply is
//! `Response{ServiceMethod, Seq, Error}` followed by the string result.
//! Seq is always 0 since every call has its own connection.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use broker_core::error::{GatewayError, Result};
use broker_core::protocol::{Delivery, LogPayload, Payload, PayloadKind};

use crate::adapters::gob::{self, Message, StructType, Value};
use crate::config::RawRpcTarget;
use crate::dispatch::{Adapter, Protocol};
use crate::error_map;

const REQUEST_TYPE_ID: i64 = gob::FIRST_USER_ID;
const ARGS_TYPE_ID: i64 = gob::FIRST_USER_ID + 1;

fn request_type() -> StructType {
    StructType::new("Request", &[("ServiceMethod", gob::STRING_ID), ("Seq", gob::UINT_ID)])
}

fn args_type() -> StructType {
    StructType::new("RPCPayload", &[("Name", gob::STRING_ID), ("Data", gob::STRING_ID)])
}

/// Encode one complete call: both descriptors and both values.
pub fn encode_call(method: &str, entry: &LogPayload) -> Bytes {
    let mut out = BytesMut::new();
    gob::put_type_def(&mut out, REQUEST_TYPE_ID, &request_type());
    gob::put_struct_value(
        &mut out,
        REQUEST_TYPE_ID,
        &[Value::Str(method.to_string()), Value::Uint(0)],
    );
    gob::put_type_def(&mut out, ARGS_TYPE_ID, &args_type());
    gob::put_struct_value(
        &mut out,
        ARGS_TYPE_ID,
        &[Value::Str(entry.name.clone()), Value::Str(entry.data.clone())],
    );
    out.freeze()
}

pub struct RawRpcAdapter {
    name: String,
    target: RawRpcTarget,
}

impl RawRpcAdapter {
    pub fn new(name: impl Into<String>, target: RawRpcTarget) -> Self {
        Self {
            name: name.into(),
            target,
        }
    }

    async fn invoke(&self, entry: &LogPayload) -> Result<String> {
        let stream = TcpStream::connect(&self.target.addr)
            .await
            .map_err(|e| error_map::unreachable(&self.name, &e))?;
        let (read, mut write) = stream.into_split();

        write
            .write_all(&encode_call(&self.target.method, entry))
            .await
            .map_err(|e| error_map::call_failed(&self.name, error_map::chain(&e)))?;

        self.read_reply(&mut BufReader::new(read)).await
    }

    async fn read_reply<R: AsyncRead + Unpin>(&self, reader: &mut R) -> Result<String> {
        let mut types: HashMap<i64, StructType> = HashMap::new();
        let mut header_seen = false;
        loop {
            let msg = gob::read_message(&mut *reader)
                .await
                .map_err(|e| error_map::call_failed(&self.name, error_map::chain(&e)))?
                .ok_or_else(|| error_map::call_failed(&self.name, "connection closed before reply"))?;

            match gob::parse_message(msg).map_err(|e| self.malformed(&e))? {
                Message::TypeDef { id, ty } => {
                    if let Some(ty) = ty {
                        types.insert(id, ty);
                    }
                }
                Message::Value { id, body } if !header_seen => {
                    let ty = types
                        .get(&id)
                        .ok_or_else(|| error_map::call_failed(&self.name, "reply header without descriptor"))?;
                    let header = gob::decode_struct(body, ty).map_err(|e| self.malformed(&e))?;
                    if header.get("Seq").and_then(Value::as_uint).is_some_and(|seq| seq != 0) {
                        return Err(error_map::call_failed(&self.name, "reply seq does not match request"));
                    }
                    let error = header.get("Error").and_then(Value::as_str).unwrap_or_default();
                    if !error.is_empty() {
                        return Err(error_map::call_failed(&self.name, error));
                    }
                    header_seen = true;
                }
                Message::Value { id, body } => {
                    if id != gob::STRING_ID {
                        return Err(error_map::call_failed(
                            &self.name,
                            format!("reply body has type {id}, expected string"),
                        ));
                    }
                    return gob::decode_singleton(body, id)
                        .map_err(|e| self.malformed(&e))?
                        .into_string()
                        .ok_or_else(|| error_map::call_failed(&self.name, "reply body is not a string"));
                }
            }
        }
    }

    fn malformed(&self, err: &gob::GobError) -> GatewayError {
        error_map::call_failed(&self.name, format!("malformed reply: {err}"))
    }
}

#[async_trait]
impl Adapter for RawRpcAdapter {
    fn target(&self) -> &str {
        &self.name
    }

    fn protocol(&self) -> Protocol {
        Protocol::RawRpc
    }

    fn payload_kind(&self) -> PayloadKind {
        PayloadKind::Log
    }

    async fn call(&self, payload: Payload) -> Result<Delivery> {
        let entry = payload.into_log()?;
        let result = match self.target.timeout() {
            Some(bound) => tokio::time::timeout(bound, self.invoke(&entry))
                .await
                .map_err(|_| error_map::timeout(&self.name, bound))??,
            None => self.invoke(&entry).await?,
        };
        Ok(Delivery::message(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_carries_method_and_entry() {
        let entry = LogPayload {
            name: "test".into(),
            data: "x".into(),
        };
        let mut wire = encode_call("RPCServer.LogInfo", &entry);

        let mut values = Vec::new();
        let mut types = HashMap::new();
        while !wire.is_empty() {
            let len = usize::try_from(gob::get_uint(&mut wire).unwrap()).unwrap();
            match gob::parse_message(wire.split_to(len)).unwrap() {
                Message::TypeDef { id, ty } => {
                    types.insert(id, ty.unwrap());
                }
                Message::Value { id, body } => {
                    values.push(gob::decode_struct(body, &types[&id]).unwrap());
                }
            }
        }

        assert_eq!(types[&REQUEST_TYPE_ID], request_type());
        assert_eq!(values.len(), 2);
        assert_eq!(
            values[0].get("ServiceMethod"),
            Some(&Value::Str("RPCServer.LogInfo".into()))
        );
        // zero seq is omitted on the wire
        assert_eq!(values[0].get("Seq"), None);
        assert_eq!(values[1].get("Name"), Some(&Value::Str("test".into())));
        assert_eq!(values[1].get("Data"), Some(&Value::Str("x".into())));
    }
}
