//! Error types for the protocol layer.
//!
//! A `ProtocolError` always means the bytes or the schema were the problem,
//! never the network. The RPC layer logs and drops frames that fail here;
//! the connection itself carries on.

/// Errors that can occur while encoding or decoding liqi messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The schema document itself could not be understood.
    #[error("invalid schema: {0}")]
    Schema(String),

    /// A request or notification named a method the schema doesn't have.
    #[error("unknown method: {0}")]
    UnknownMethod(String),

    /// A message type name could not be resolved in the schema.
    #[error("unknown message type: {0}")]
    UnknownType(String),

    /// A response arrived for an index with no outstanding request.
    #[error("response for unknown request index {0}")]
    UnsolicitedResponse(u16),

    /// The frame's leading tag byte is not NOTIFY, REQUEST or RESPONSE.
    #[error("unknown message kind tag {0}")]
    UnknownKind(u8),

    /// The frame or a message body is truncated or otherwise corrupt.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// A payload value doesn't fit the schema-declared field.
    #[error("cannot encode {field}: {reason}")]
    Encode { field: String, reason: String },

    /// A decoded payload didn't match the typed view it was read into.
    #[error("payload conversion failed: {0}")]
    View(#[from] serde_json::Error),
}

impl ProtocolError {
    /// Whether this error is a schema lookup miss rather than corrupt data.
    pub fn is_schema_lookup(&self) -> bool {
        matches!(self, Self::UnknownMethod(_) | Self::UnknownType(_))
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    pub(crate) fn encode(field: &str, reason: impl Into<String>) -> Self {
        Self::Encode {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}
