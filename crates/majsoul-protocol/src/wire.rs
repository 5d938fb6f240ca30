//! Protobuf wire encoding driven by a runtime [`Schema`].
//!
//! Payloads are `serde_json::Value` objects keyed by field name. Decoding
//! only produces fields that were present on the wire; typed views fill
//! proto3 defaults with `#[serde(default)]`. Encoding writes every field
//! present in the object, defaults included, so a value survives
//! encode → decode unchanged.
//!
//! The field-level work is `prost::encoding`; this module only walks the
//! schema to pick the right codec for each field. Integers are range
//! checked against their declared width before they are written.
//!
//! `bytes` fields are JSON arrays of integers on both sides.

use prost::encoding::{self, DecodeContext, WireType};
use prost::DecodeError;
use serde_json::{Map, Number, Value};

use crate::schema::{Field, FieldKind, MessageType, Scalar, Schema};
use crate::ProtocolError;

fn malformed(err: DecodeError) -> ProtocolError {
    ProtocolError::malformed(err.to_string())
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

struct Reader<'a> {
    rest: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { rest: buf }
    }

    fn is_empty(&self) -> bool {
        self.rest.is_empty()
    }

    /// Reads a field key, returning `(field number, wire type)`.
    fn key(&mut self) -> Result<(u32, WireType), ProtocolError> {
        encoding::decode_key(&mut self.rest).map_err(malformed)
    }

    fn len_delimited(&mut self) -> Result<&'a [u8], ProtocolError> {
        let len = encoding::decode_varint(&mut self.rest).map_err(malformed)?;
        let len = usize::try_from(len)
            .ok()
            .filter(|&len| len <= self.rest.len())
            .ok_or_else(|| ProtocolError::malformed("truncated field"))?;
        let (head, tail) = self.rest.split_at(len);
        self.rest = tail;
        Ok(head)
    }

    fn skip(&mut self, number: u32, wire: WireType) -> Result<(), ProtocolError> {
        encoding::skip_field(wire, number, &mut self.rest, DecodeContext::default())
            .map_err(malformed)
    }
}

fn wire_type(kind: &FieldKind) -> WireType {
    match kind {
        FieldKind::Scalar(s) => match s {
            Scalar::Double | Scalar::Fixed64 | Scalar::Sfixed64 => WireType::SixtyFourBit,
            Scalar::Float | Scalar::Fixed32 | Scalar::Sfixed32 => WireType::ThirtyTwoBit,
            Scalar::String | Scalar::Bytes => WireType::LengthDelimited,
            _ => WireType::Varint,
        },
        FieldKind::Enum(_) => WireType::Varint,
        FieldKind::Message(_) => WireType::LengthDelimited,
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decodes `buf` as the message `type_name` into a JSON object.
pub fn decode(
    schema: &Schema,
    type_name: &str,
    buf: &[u8],
) -> Result<Value, ProtocolError> {
    let msg = schema.message(type_name)?;
    decode_message(schema, msg, buf).map(Value::Object)
}

fn decode_message(
    schema: &Schema,
    msg: &MessageType,
    buf: &[u8],
) -> Result<Map<String, Value>, ProtocolError> {
    let mut out = Map::new();
    let mut reader = Reader::new(buf);
    while !reader.is_empty() {
        let (number, wire) = reader.key()?;
        let Some(field) = msg.field_by_number(number) else {
            reader.skip(number, wire)?;
            continue;
        };

        if let Some(key_type) = field.map_key {
            let entry = reader.len_delimited()?;
            let (k, v) = decode_map_entry(schema, field, key_type, entry)?;
            let slot = out
                .entry(field.name.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(map) = slot {
                map.insert(k, v);
            }
            continue;
        }

        if field.repeated {
            let slot = out
                .entry(field.name.clone())
                .or_insert_with(|| Value::Array(Vec::new()));
            let Value::Array(items) = slot else {
                continue;
            };
            if wire == WireType::LengthDelimited && field.kind.is_packable() {
                let mut packed = Reader::new(reader.len_delimited()?);
                let inner = wire_type(&field.kind);
                while !packed.is_empty() {
                    items.push(decode_value(schema, field, inner, &mut packed)?);
                }
            } else {
                items.push(decode_value(schema, field, wire, &mut reader)?);
            }
        } else {
            let value = decode_value(schema, field, wire, &mut reader)?;
            out.insert(field.name.clone(), value);
        }
    }
    Ok(out)
}

fn decode_map_entry(
    schema: &Schema,
    field: &Field,
    key_type: Scalar,
    buf: &[u8],
) -> Result<(String, Value), ProtocolError> {
    let key_field = Field {
        name: format!("{}.key", field.name),
        number: 1,
        kind: FieldKind::Scalar(key_type),
        repeated: false,
        map_key: None,
    };
    let mut key = Value::String(String::new());
    let mut value = Value::Null;
    let mut reader = Reader::new(buf);
    while !reader.is_empty() {
        match reader.key()? {
            (1, wire) => key = decode_value(schema, &key_field, wire, &mut reader)?,
            (2, wire) => value = decode_value(schema, field, wire, &mut reader)?,
            (number, wire) => reader.skip(number, wire)?,
        }
    }
    let key = match key {
        Value::String(s) => s,
        other => other.to_string(),
    };
    Ok((key, value))
}

fn decode_value(
    schema: &Schema,
    field: &Field,
    wire: WireType,
    reader: &mut Reader<'_>,
) -> Result<Value, ProtocolError> {
    macro_rules! merge {
        ($codec:ident, $init:expr) => {{
            let mut value = $init;
            encoding::$codec::merge(wire, &mut value, &mut reader.rest, DecodeContext::default())
                .map_err(malformed)?;
            value
        }};
    }

    let scalar = match &field.kind {
        FieldKind::Message(name) => {
            if wire != WireType::LengthDelimited {
                return Err(ProtocolError::malformed(format!(
                    "field {} has wire type {wire:?}, expected a message",
                    field.name
                )));
            }
            let msg = schema.message(name)?;
            let body = reader.len_delimited()?;
            return decode_message(schema, msg, body).map(Value::Object);
        }
        FieldKind::Enum(_) => return Ok(Value::from(merge!(int32, 0i32))),
        FieldKind::Scalar(s) => *s,
    };
    Ok(match scalar {
        Scalar::Int32 => Value::from(merge!(int32, 0i32)),
        Scalar::Int64 => Value::from(merge!(int64, 0i64)),
        Scalar::Uint32 => Value::from(merge!(uint32, 0u32)),
        Scalar::Uint64 => Value::from(merge!(uint64, 0u64)),
        Scalar::Sint32 => Value::from(merge!(sint32, 0i32)),
        Scalar::Sint64 => Value::from(merge!(sint64, 0i64)),
        Scalar::Bool => Value::Bool(merge!(bool, false)),
        Scalar::Fixed32 => Value::from(merge!(fixed32, 0u32)),
        Scalar::Sfixed32 => Value::from(merge!(sfixed32, 0i32)),
        Scalar::Fixed64 => Value::from(merge!(fixed64, 0u64)),
        Scalar::Sfixed64 => Value::from(merge!(sfixed64, 0i64)),
        Scalar::Float => float(f64::from(merge!(float, 0f32))),
        Scalar::Double => float(merge!(double, 0f64)),
        Scalar::String => Value::String(merge!(string, String::new())),
        Scalar::Bytes => Value::Array(
            merge!(bytes, Vec::<u8>::new())
                .into_iter()
                .map(Value::from)
                .collect(),
        ),
    })
}

fn float(f: f64) -> Value {
    Number::from_f64(f).map_or(Value::Null, Value::Number)
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encodes a JSON object as the message `type_name`.
///
/// # Errors
/// [`ProtocolError::Encode`] if the value is not an object, names a field
/// the message doesn't have, holds a value of the wrong shape, or holds an
/// integer that doesn't fit the field's declared width.
pub fn encode(
    schema: &Schema,
    type_name: &str,
    value: &Value,
) -> Result<Vec<u8>, ProtocolError> {
    let msg = schema.message(type_name)?;
    let mut out = Vec::new();
    encode_message(schema, msg, value, &mut out)?;
    Ok(out)
}

fn encode_message(
    schema: &Schema,
    msg: &MessageType,
    value: &Value,
    out: &mut Vec<u8>,
) -> Result<(), ProtocolError> {
    let obj = value
        .as_object()
        .ok_or_else(|| ProtocolError::encode(msg.name(), "expected an object"))?;
    if let Some(unknown) = obj.keys().find(|k| msg.field(k).is_none()) {
        return Err(ProtocolError::encode(
            &format!("{}.{unknown}", msg.name()),
            "no such field",
        ));
    }

    for field in msg.fields() {
        let Some(v) = obj.get(&field.name) else {
            continue;
        };
        if v.is_null() {
            continue;
        }

        if let Some(key_type) = field.map_key {
            let entries = v
                .as_object()
                .ok_or_else(|| ProtocolError::encode(&field.name, "expected a map"))?;
            let key_kind = FieldKind::Scalar(key_type);
            for (k, item) in entries {
                let key = map_key_value(key_type, k);
                let mut entry = Vec::new();
                encode_values(schema, &key_kind, &field.name, 1, &[&key], false, &mut entry)?;
                encode_values(schema, &field.kind, &field.name, 2, &[item], false, &mut entry)?;
                encoding::bytes::encode(field.number, &entry, out);
            }
            continue;
        }

        if field.repeated {
            let items: Vec<&Value> = v
                .as_array()
                .ok_or_else(|| ProtocolError::encode(&field.name, "expected an array"))?
                .iter()
                .collect();
            let packed = field.kind.is_packable();
            encode_values(schema, &field.kind, &field.name, field.number, &items, packed, out)?;
        } else {
            encode_values(schema, &field.kind, &field.name, field.number, &[v], false, out)?;
        }
    }
    Ok(())
}

fn map_key_value(key_type: Scalar, key: &str) -> Value {
    match key_type {
        Scalar::String => Value::String(key.to_string()),
        Scalar::Bool => Value::Bool(key == "true"),
        _ => key
            .parse::<i64>()
            .map(Value::from)
            .or_else(|_| key.parse::<u64>().map(Value::from))
            .unwrap_or_else(|_| Value::String(key.to_string())),
    }
}

/// Writes every occurrence of one field, keyed by `number`.
fn encode_values(
    schema: &Schema,
    kind: &FieldKind,
    name: &str,
    number: u32,
    items: &[&Value],
    packed: bool,
    out: &mut Vec<u8>,
) -> Result<(), ProtocolError> {
    macro_rules! emit {
        ($codec:ident, $convert:expr) => {{
            let values = items
                .iter()
                .map(|v| ($convert)(*v, name))
                .collect::<Result<Vec<_>, ProtocolError>>()?;
            if packed {
                encoding::$codec::encode_packed(number, &values, out);
            } else {
                encoding::$codec::encode_repeated(number, &values, out);
            }
        }};
    }

    let scalar = match kind {
        FieldKind::Message(type_name) => {
            let msg = schema.message(type_name)?;
            for item in items {
                let mut body = Vec::new();
                encode_message(schema, msg, item, &mut body)?;
                encoding::bytes::encode(number, &body, out);
            }
            return Ok(());
        }
        FieldKind::Enum(type_name) => {
            emit!(int32, |v: &Value, name: &str| enum_number(schema, type_name, v, name));
            return Ok(());
        }
        FieldKind::Scalar(s) => *s,
    };
    match scalar {
        Scalar::Int32 => emit!(int32, to_i32),
        Scalar::Int64 => emit!(int64, to_i64),
        Scalar::Uint32 => emit!(uint32, to_u32),
        Scalar::Uint64 => emit!(uint64, to_u64),
        Scalar::Sint32 => emit!(sint32, to_i32),
        Scalar::Sint64 => emit!(sint64, to_i64),
        Scalar::Bool => emit!(bool, to_bool),
        Scalar::Fixed32 => emit!(fixed32, to_u32),
        Scalar::Sfixed32 => emit!(sfixed32, to_i32),
        Scalar::Fixed64 => emit!(fixed64, to_u64),
        Scalar::Sfixed64 => emit!(sfixed64, to_i64),
        Scalar::Float => emit!(float, to_f32),
        Scalar::Double => emit!(double, to_f64),
        Scalar::String => {
            let values = items
                .iter()
                .map(|v| to_string(v, name))
                .collect::<Result<Vec<_>, _>>()?;
            encoding::string::encode_repeated(number, &values, out);
        }
        Scalar::Bytes => {
            let values = items
                .iter()
                .map(|v| to_bytes(v, name))
                .collect::<Result<Vec<_>, _>>()?;
            encoding::bytes::encode_repeated(number, &values, out);
        }
    }
    Ok(())
}

fn enum_number(
    schema: &Schema,
    type_name: &str,
    value: &Value,
    name: &str,
) -> Result<i32, ProtocolError> {
    match value {
        Value::String(s) => schema
            .enum_type(type_name)
            .and_then(|e| e.value(s))
            .ok_or_else(|| ProtocolError::encode(name, format!("unknown enum value {s}"))),
        other => to_i32(other, name),
    }
}

fn to_i64(value: &Value, name: &str) -> Result<i64, ProtocolError> {
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(i),
            None if n.as_u64().is_some() => {
                Err(ProtocolError::encode(name, format!("{n} is out of range")))
            }
            None => Err(ProtocolError::encode(name, "expected an integer")),
        },
        Value::String(s) => s
            .parse()
            .map_err(|_| ProtocolError::encode(name, "expected an integer")),
        _ => Err(ProtocolError::encode(name, "expected an integer")),
    }
}

fn to_i32(value: &Value, name: &str) -> Result<i32, ProtocolError> {
    let wide = to_i64(value, name)?;
    i32::try_from(wide)
        .map_err(|_| ProtocolError::encode(name, format!("{wide} is out of range for 32 bits")))
}

fn to_u64(value: &Value, name: &str) -> Result<u64, ProtocolError> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| ProtocolError::encode(name, "expected an unsigned integer")),
        Value::String(s) => s
            .parse()
            .map_err(|_| ProtocolError::encode(name, "expected an unsigned integer")),
        _ => Err(ProtocolError::encode(name, "expected an unsigned integer")),
    }
}

fn to_u32(value: &Value, name: &str) -> Result<u32, ProtocolError> {
    let wide = to_u64(value, name)?;
    u32::try_from(wide)
        .map_err(|_| ProtocolError::encode(name, format!("{wide} is out of range for 32 bits")))
}

fn to_bool(value: &Value, name: &str) -> Result<bool, ProtocolError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(n.as_u64() != Some(0)),
        _ => Err(ProtocolError::encode(name, "expected a bool")),
    }
}

fn to_f64(value: &Value, name: &str) -> Result<f64, ProtocolError> {
    value
        .as_f64()
        .ok_or_else(|| ProtocolError::encode(name, "expected a number"))
}

fn to_f32(value: &Value, name: &str) -> Result<f32, ProtocolError> {
    to_f64(value, name).map(|f| f as f32)
}

fn to_string(value: &Value, name: &str) -> Result<String, ProtocolError> {
    value
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| ProtocolError::encode(name, "expected a string"))
}

fn to_bytes(value: &Value, name: &str) -> Result<Vec<u8>, ProtocolError> {
    let items = value
        .as_array()
        .ok_or_else(|| ProtocolError::encode(name, "expected an array of byte values"))?;
    items
        .iter()
        .map(|b| {
            b.as_u64()
                .and_then(|b| u8::try_from(b).ok())
                .ok_or_else(|| ProtocolError::encode(name, "expected byte values"))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Wrapper
// ---------------------------------------------------------------------------

/// Encodes the liqi `Wrapper { string name = 1; bytes data = 2; }`.
pub fn encode_wrapper(name: &str, data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(name.len() + data.len() + 8);
    if !name.is_empty() {
        put_len_delimited(&mut out, 1, name.as_bytes());
    }
    put_len_delimited(&mut out, 2, data);
    out
}

fn put_len_delimited(out: &mut Vec<u8>, number: u32, data: &[u8]) {
    encoding::encode_key(number, WireType::LengthDelimited, out);
    encoding::encode_varint(data.len() as u64, out);
    out.extend_from_slice(data);
}

/// Decodes a liqi `Wrapper` into `(name, data)`.
pub fn decode_wrapper(buf: &[u8]) -> Result<(String, Vec<u8>), ProtocolError> {
    let mut name = String::new();
    let mut data = Vec::new();
    let mut reader = Reader::new(buf);
    while !reader.is_empty() {
        match reader.key()? {
            (1, WireType::LengthDelimited) => {
                name = String::from_utf8(reader.len_delimited()?.to_vec())
                    .map_err(|_| ProtocolError::malformed("wrapper name is not UTF-8"))?;
            }
            (2, WireType::LengthDelimited) => data = reader.len_delimited()?.to_vec(),
            (number, wire) => reader.skip(number, wire)?,
        }
    }
    Ok((name, data))
}
