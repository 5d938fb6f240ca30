//! Frame codec: turns method calls into tagged liqi frames and back.
//!
//! Every frame starts with a one-byte kind tag. Requests and responses
//! follow it with a little-endian `u16` sequence index; the rest of the
//! frame is a `Wrapper { name, data }`:
//!
//! ```text
//! NOTIFY   | 0x01 | Wrapper { name: ".lq.NotifyXxx",      data }
//! REQUEST  | 0x02 | index u16 LE | Wrapper { name: ".lq.Lobby.method", data }
//! RESPONSE | 0x03 | index u16 LE | Wrapper { name: "",                 data }
//! ```
//!
//! Responses don't name their type, so the codec remembers which method
//! each outstanding index was issued for.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::schema::Schema;
use crate::{wire, ProtocolError};

/// The three kinds of frame sharing one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Notify,
    Request,
    Response,
}

impl MessageKind {
    /// The wire tag byte for this kind.
    pub fn tag(self) -> u8 {
        match self {
            Self::Notify => 1,
            Self::Request => 2,
            Self::Response => 3,
        }
    }

    /// Parses a wire tag byte.
    pub fn from_tag(tag: u8) -> Result<Self, ProtocolError> {
        match tag {
            1 => Ok(Self::Notify),
            2 => Ok(Self::Request),
            3 => Ok(Self::Response),
            other => Err(ProtocolError::UnknownKind(other)),
        }
    }
}

/// One decoded protocol message.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub kind: MessageKind,
    /// Present for requests and responses only.
    pub index: Option<u16>,
    /// `.lq.Lobby.method` for requests/responses, the type name for notifies.
    pub method: String,
    pub payload: Value,
}

impl Envelope {
    /// Reads the payload into a typed view.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        Ok(T::deserialize(&self.payload)?)
    }
}

/// A self-describing record pulled out of a `Wrapper`.
#[derive(Debug, Clone, PartialEq)]
pub struct WrappedRecord {
    /// Short type name, e.g. `RecordDiscardTile`.
    pub type_name: String,
    pub payload: Value,
}

/// Reads the kind tag and (for requests/responses) the index without
/// touching the body.
pub fn peek_header(frame: &[u8]) -> Result<(MessageKind, Option<u16>), ProtocolError> {
    let tag = *frame
        .first()
        .ok_or_else(|| ProtocolError::malformed("empty frame"))?;
    let kind = MessageKind::from_tag(tag)?;
    match kind {
        MessageKind::Notify => Ok((kind, None)),
        MessageKind::Request | MessageKind::Response => {
            let index = frame
                .get(1..3)
                .map(|b| u16::from_le_bytes([b[0], b[1]]))
                .ok_or_else(|| ProtocolError::malformed("frame shorter than header"))?;
            Ok((kind, Some(index)))
        }
    }
}

/// Schema-driven encoder/decoder for one connection.
///
/// Cheap to share: wrap it in an `Arc`. The index counter and the
/// in-flight table are internally synchronised.
#[derive(Debug)]
pub struct MessageCodec {
    schema: Arc<Schema>,
    next_index: AtomicU16,
    inflight: Mutex<HashMap<u16, String>>,
}

impl MessageCodec {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            next_index: AtomicU16::new(1),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Encodes a request, allocating a fresh sequence index.
    ///
    /// # Errors
    /// [`ProtocolError::UnknownMethod`] if the schema has no such method,
    /// [`ProtocolError::Encode`] if the payload doesn't fit its request type.
    pub fn encode_request(
        &self,
        method: &str,
        payload: &Value,
    ) -> Result<(Vec<u8>, u16), ProtocolError> {
        let request_type = &self.schema.method(method)?.request_type;
        let data = wire::encode(&self.schema, request_type, payload)?;
        // Wraps at u16::MAX; a session never gets near that many
        // outstanding calls.
        let index = self.next_index.fetch_add(1, Ordering::Relaxed);

        self.inflight_table().insert(index, method.to_string());

        let mut frame = Vec::with_capacity(data.len() + method.len() + 8);
        frame.push(MessageKind::Request.tag());
        frame.extend_from_slice(&index.to_le_bytes());
        frame.extend_from_slice(&wire::encode_wrapper(method, &data));
        Ok((frame, index))
    }

    /// Encodes a response to `method` under `index` (the server's side of
    /// an exchange; used by test peers and tooling).
    pub fn encode_response(
        &self,
        index: u16,
        method: &str,
        payload: &Value,
    ) -> Result<Vec<u8>, ProtocolError> {
        let response_type = &self.schema.method(method)?.response_type;
        let data = wire::encode(&self.schema, response_type, payload)?;
        let mut frame = vec![MessageKind::Response.tag()];
        frame.extend_from_slice(&index.to_le_bytes());
        frame.extend_from_slice(&wire::encode_wrapper("", &data));
        Ok(frame)
    }

    /// Encodes a notification of type `type_name` (`.lq.NotifyXxx`).
    pub fn encode_notify(
        &self,
        type_name: &str,
        payload: &Value,
    ) -> Result<Vec<u8>, ProtocolError> {
        let data = wire::encode(&self.schema, type_name, payload)?;
        let mut frame = vec![MessageKind::Notify.tag()];
        frame.extend_from_slice(&wire::encode_wrapper(type_name, &data));
        Ok(frame)
    }

    /// Decodes one frame.
    ///
    /// # Errors
    /// - [`ProtocolError::UnknownMethod`]/[`ProtocolError::UnknownType`] for
    ///   names the schema doesn't know (SchemaLookup class)
    /// - [`ProtocolError::UnsolicitedResponse`] for a response whose index
    ///   this codec never issued (or already consumed)
    /// - [`ProtocolError::Malformed`] for corrupt frames
    pub fn decode_message(&self, frame: &[u8]) -> Result<Envelope, ProtocolError> {
        let (kind, index) = peek_header(frame)?;
        let body = match kind {
            MessageKind::Notify => &frame[1..],
            _ => &frame[3..],
        };
        let (name, data) = wire::decode_wrapper(body)?;

        let (method, type_name) = match kind {
            MessageKind::Notify => {
                self.schema.message(&name)?;
                (name.clone(), name)
            }
            MessageKind::Request => {
                let request_type = self.schema.method(&name)?.request_type.clone();
                (name, request_type)
            }
            MessageKind::Response => {
                let index = index.unwrap_or_default();
                let method = self
                    .inflight_table()
                    .remove(&index)
                    .ok_or(ProtocolError::UnsolicitedResponse(index))?;
                let response_type = self.schema.method(&method)?.response_type.clone();
                (method, response_type)
            }
        };

        let payload = wire::decode(&self.schema, &type_name, &data)?;
        Ok(Envelope {
            kind,
            index,
            method,
            payload,
        })
    }

    /// Drops the in-flight entry for `index` (the call was abandoned).
    pub fn forget(&self, index: u16) {
        self.inflight_table().remove(&index);
    }

    /// Number of requests issued but not yet answered.
    pub fn inflight(&self) -> usize {
        self.inflight_table().len()
    }

    /// Decodes a message body of a known type (e.g. a nested `bytes` field).
    pub fn decode_type(&self, type_name: &str, data: &[u8]) -> Result<Value, ProtocolError> {
        wire::decode(&self.schema, type_name, data)
    }

    /// Unwraps a self-describing `Wrapper` whose name is `.lq.<Type>` and
    /// decodes its data as that type.
    pub fn unwrap_record(&self, bytes: &[u8]) -> Result<WrappedRecord, ProtocolError> {
        let (name, data) = wire::decode_wrapper(bytes)?;
        let type_name = name
            .split('.')
            .nth(2)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ProtocolError::malformed(format!("wrapper name {name:?} has no type component"))
            })?
            .to_string();
        let msg = self.schema.record_type(&type_name)?;
        let payload = wire::decode(&self.schema, msg.name(), &data)?;
        Ok(WrappedRecord { type_name, payload })
    }

    fn inflight_table(&self) -> std::sync::MutexGuard<'_, HashMap<u16, String>> {
        self.inflight.lock().unwrap_or_else(|e| e.into_inner())
    }
}
