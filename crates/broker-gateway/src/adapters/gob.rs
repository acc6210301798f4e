//! Minimal gob codec for Go `net/rpc` exchanges (panic-free).
//!
//! Covers what a unary `net/rpc` call needs: struct type descriptors, struct
//! values with bool/int/uint/string fields, and top-level (singleton) values.
//!
//! Parsing rules:
//! - Every message on the stream is prefixed by its byte count.
//! - A message starts with a signed type id. Negative ids carry a type
//!   descriptor, positive ids a value of that type.
//! - Struct fields travel as (field-number delta, value); zero values are
//!   omitted and a zero delta ends the struct.

use std::collections::BTreeMap;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

pub const BOOL_ID: i64 = 1;
pub const INT_ID: i64 = 2;
pub const UINT_ID: i64 = 3;
pub const STRING_ID: i64 = 6;
/// First id free for user-defined types.
pub const FIRST_USER_ID: i64 = 65;

/// Field number of `StructT` inside gob's own `wireType`.
const WIRE_STRUCT_FIELD: u64 = 2;

/// Upper bound on a single inbound message.
pub const MAX_MESSAGE_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GobError {
    #[error("gob message truncated")]
    Truncated,
    #[error("gob: {0}")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, GobError>;

/// A field value of one of the supported basic types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Str(String),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Value::Uint(u) => Some(*u),
            _ => None,
        }
    }

    pub fn into_string(self) -> Option<String> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    fn is_zero(&self) -> bool {
        match self {
            Value::Bool(b) => !b,
            Value::Int(i) => *i == 0,
            Value::Uint(u) => *u == 0,
            Value::Str(s) => s.is_empty(),
        }
    }

    fn type_id(&self) -> i64 {
        match self {
            Value::Bool(_) => BOOL_ID,
            Value::Int(_) => INT_ID,
            Value::Uint(_) => UINT_ID,
            Value::Str(_) => STRING_ID,
        }
    }
}

/// A struct type as carried by a descriptor: `(field name, type id)` in
/// field-number order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructType {
    pub name: String,
    pub fields: Vec<(String, i64)>,
}

impl StructType {
    pub fn new(name: &str, fields: &[(&str, i64)]) -> Self {
        Self {
            name: name.to_string(),
            fields: fields.iter().map(|(n, id)| (n.to_string(), *id)).collect(),
        }
    }
}

/// One parsed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// `ty` is `None` for non-struct descriptors, which are skipped.
    TypeDef { id: i64, ty: Option<StructType> },
    Value { id: i64, body: Bytes },
}

// ---- encoding ----

pub fn put_uint(out: &mut BytesMut, v: u64) {
    if v < 0x80 {
        out.put_u8(v as u8);
        return;
    }
    let raw = v.to_be_bytes();
    let skip = raw.iter().take_while(|b| **b == 0).count();
    let width = (raw.len() - skip) as u8;
    out.put_u8(width.wrapping_neg());
    if let Some(tail) = raw.get(skip..) {
        out.put_slice(tail);
    }
}

pub fn put_int(out: &mut BytesMut, v: i64) {
    let u = if v < 0 {
        ((!v as u64) << 1) | 1
    } else {
        (v as u64) << 1
    };
    put_uint(out, u);
}

fn put_str(out: &mut BytesMut, s: &str) {
    put_uint(out, s.len() as u64);
    out.put_slice(s.as_bytes());
}

fn put_value(out: &mut BytesMut, v: &Value) {
    match v {
        Value::Bool(b) => put_uint(out, u64::from(*b)),
        Value::Int(i) => put_int(out, *i),
        Value::Uint(u) => put_uint(out, *u),
        Value::Str(s) => put_str(out, s),
    }
}

fn frame(out: &mut BytesMut, msg: BytesMut) {
    put_uint(out, msg.len() as u64);
    out.put(msg);
}

/// Append the descriptor for a struct type under `id`.
pub fn put_type_def(out: &mut BytesMut, id: i64, ty: &StructType) {
    let mut msg = BytesMut::new();
    put_int(&mut msg, -id);
    put_uint(&mut msg, WIRE_STRUCT_FIELD + 1);

    // structType.CommonType {Name, Id}
    put_uint(&mut msg, 1);
    put_uint(&mut msg, 1);
    put_str(&mut msg, &ty.name);
    put_uint(&mut msg, 1);
    put_int(&mut msg, id);
    put_uint(&mut msg, 0);

    // structType.Field []fieldType{Name, Id}
    if !ty.fields.is_empty() {
        put_uint(&mut msg, 1);
        put_uint(&mut msg, ty.fields.len() as u64);
        for (name, type_id) in &ty.fields {
            put_uint(&mut msg, 1);
            put_str(&mut msg, name);
            put_uint(&mut msg, 1);
            put_int(&mut msg, *type_id);
            put_uint(&mut msg, 0);
        }
    }

    put_uint(&mut msg, 0); // end structType
    put_uint(&mut msg, 0); // end wireType
    frame(out, msg);
}

/// Append a struct value. `fields` follow the descriptor's order.
pub fn put_struct_value(out: &mut BytesMut, id: i64, fields: &[Value]) {
    let mut msg = BytesMut::new();
    put_int(&mut msg, id);
    let mut last: i64 = -1;
    for (idx, v) in (0_i64..).zip(fields) {
        if v.is_zero() {
            continue;
        }
        put_uint(&mut msg, (idx - last) as u64);
        put_value(&mut msg, v);
        last = idx;
    }
    put_uint(&mut msg, 0);
    frame(out, msg);
}

/// Append a top-level non-struct value.
pub fn put_singleton(out: &mut BytesMut, v: &Value) {
    let mut msg = BytesMut::new();
    put_int(&mut msg, v.type_id());
    put_uint(&mut msg, 0);
    put_value(&mut msg, v);
    frame(out, msg);
}

// ---- decoding ----

pub fn get_uint(buf: &mut Bytes) -> Result<u64> {
    if !buf.has_remaining() {
        return Err(GobError::Truncated);
    }
    let first = buf.get_u8();
    if first < 0x80 {
        return Ok(u64::from(first));
    }
    let width = usize::from(first.wrapping_neg());
    if width > 8 {
        return Err(GobError::Malformed(format!("uint prefix {first:#04x}")));
    }
    if buf.remaining() < width {
        return Err(GobError::Truncated);
    }
    let mut v = 0_u64;
    for _ in 0..width {
        v = (v << 8) | u64::from(buf.get_u8());
    }
    Ok(v)
}

pub fn get_int(buf: &mut Bytes) -> Result<i64> {
    let u = get_uint(buf)?;
    if u & 1 == 1 {
        Ok(!((u >> 1) as i64))
    } else {
        Ok((u >> 1) as i64)
    }
}

fn get_string(buf: &mut Bytes) -> Result<String> {
    let len = usize::try_from(get_uint(buf)?)
        .map_err(|_| GobError::Malformed("string length overflow".into()))?;
    if buf.remaining() < len {
        return Err(GobError::Truncated);
    }
    String::from_utf8(buf.copy_to_bytes(len).to_vec())
        .map_err(|_| GobError::Malformed("string is not utf-8".into()))
}

fn get_value(buf: &mut Bytes, type_id: i64) -> Result<Value> {
    match type_id {
        BOOL_ID => Ok(Value::Bool(get_uint(buf)? != 0)),
        INT_ID => Ok(Value::Int(get_int(buf)?)),
        UINT_ID => Ok(Value::Uint(get_uint(buf)?)),
        STRING_ID => Ok(Value::Str(get_string(buf)?)),
        other => Err(GobError::Malformed(format!("unsupported field type {other}"))),
    }
}

/// Move the field number on by `delta`.
fn advance(field: &mut i64, delta: u64) -> Result<i64> {
    let delta = i64::try_from(delta).map_err(|_| GobError::Malformed("field delta".into()))?;
    *field = field
        .checked_add(delta)
        .ok_or_else(|| GobError::Malformed("field delta".into()))?;
    Ok(*field)
}

/// Split one message (length prefix already removed) into id and payload.
pub fn parse_message(mut buf: Bytes) -> Result<Message> {
    let id = get_int(&mut buf)?;
    match id {
        0 => Err(GobError::Malformed("type id 0".into())),
        id if id < 0 => Ok(Message::TypeDef {
            id: -id,
            ty: parse_wire_type(&mut buf)?,
        }),
        id => Ok(Message::Value { id, body: buf }),
    }
}

fn parse_wire_type(buf: &mut Bytes) -> Result<Option<StructType>> {
    if get_uint(buf)? != WIRE_STRUCT_FIELD + 1 {
        return Ok(None);
    }
    let mut ty = StructType::default();
    let mut field = -1;
    loop {
        let delta = get_uint(buf)?;
        if delta == 0 {
            return Ok(Some(ty));
        }
        match advance(&mut field, delta)? {
            0 => ty.name = parse_common_type(buf)?,
            1 => {
                let count = usize::try_from(get_uint(buf)?)
                    .map_err(|_| GobError::Malformed("field count overflow".into()))?;
                // every element takes at least its terminator byte
                if count > buf.remaining() {
                    return Err(GobError::Truncated);
                }
                for _ in 0..count {
                    ty.fields.push(parse_field_type(buf)?);
                }
            }
            n => return Err(GobError::Malformed(format!("structType field {n}"))),
        }
    }
}

fn parse_common_type(buf: &mut Bytes) -> Result<String> {
    let mut name = String::new();
    let mut field = -1;
    loop {
        let delta = get_uint(buf)?;
        if delta == 0 {
            return Ok(name);
        }
        match advance(&mut field, delta)? {
            0 => name = get_string(buf)?,
            1 => {
                get_int(buf)?;
            }
            n => return Err(GobError::Malformed(format!("CommonType field {n}"))),
        }
    }
}

fn parse_field_type(buf: &mut Bytes) -> Result<(String, i64)> {
    let (mut name, mut id) = (String::new(), 0);
    let mut field = -1;
    loop {
        let delta = get_uint(buf)?;
        if delta == 0 {
            return Ok((name, id));
        }
        match advance(&mut field, delta)? {
            0 => name = get_string(buf)?,
            1 => id = get_int(buf)?,
            n => return Err(GobError::Malformed(format!("fieldType field {n}"))),
        }
    }
}

/// Decode a struct value. Omitted (zero) fields are absent from the map.
pub fn decode_struct(mut body: Bytes, ty: &StructType) -> Result<BTreeMap<String, Value>> {
    let mut out = BTreeMap::new();
    let mut field = -1;
    loop {
        let delta = get_uint(&mut body)?;
        if delta == 0 {
            return Ok(out);
        }
        let idx = advance(&mut field, delta)?;
        let (name, type_id) = usize::try_from(idx)
            .ok()
            .and_then(|i| ty.fields.get(i))
            .ok_or_else(|| GobError::Malformed(format!("field {idx} not in `{}`", ty.name)))?;
        out.insert(name.clone(), get_value(&mut body, *type_id)?);
    }
}

/// Decode a top-level non-struct value of `type_id`.
pub fn decode_singleton(mut body: Bytes, type_id: i64) -> Result<Value> {
    if get_uint(&mut body)? != 0 {
        return Err(GobError::Malformed("singleton without zero delta".into()));
    }
    get_value(&mut body, type_id)
}

/// Read one length-prefixed message. `Ok(None)` on a clean end of stream.
pub async fn read_message<R: AsyncRead + Unpin>(r: &mut R) -> std::io::Result<Option<Bytes>> {
    let first = match r.read_u8().await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    };
    let len = if first < 0x80 {
        usize::from(first)
    } else {
        let width = usize::from(first.wrapping_neg());
        let mut raw = [0_u8; 8];
        let Some(tail) = raw.get_mut(8_usize.saturating_sub(width)..).filter(|_| width <= 8) else {
            return Err(invalid("bad message length prefix"));
        };
        r.read_exact(tail).await?;
        usize::try_from(u64::from_be_bytes(raw)).map_err(|_| invalid("message too large"))?
    };
    if len > MAX_MESSAGE_BYTES {
        return Err(invalid("message too large"));
    }
    let mut body = vec![0_u8; len];
    r.read_exact(&mut body).await?;
    Ok(Some(Bytes::from(body)))
}

fn invalid(msg: &str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, msg.to_string())
}
