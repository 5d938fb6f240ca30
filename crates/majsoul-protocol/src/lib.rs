//! Wire protocol for majsoul-link.
//!
//! This crate knows how liqi frames look on the wire and nothing about
//! connections:
//!
//! - **Schema** ([`Schema`]) — the game's protobufjs-style JSON protocol
//!   definition, flattened into lookup tables.
//! - **Wire codec** ([`wire`]) — schema-driven protobuf encoding of
//!   `serde_json::Value` payloads.
//! - **Frame codec** ([`MessageCodec`], [`Envelope`]) — the one-byte kind
//!   tag, request index and `Wrapper` envelope around each payload.
//! - **Lobby views** ([`lobby`]) — typed structs for the lobby messages the
//!   client reads.
//! - **Ids** ([`ids`]) — the obfuscated account-id and log-id forms used in
//!   replay links.
//! - **Ranks** ([`rank`]) — level-id decoding and room labels.
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → RPC (correlated calls)
//! ```
//!
//! # Feature Flags
//!
//! - `test-fixtures` — exposes [`fixtures`], a trimmed liqi schema for tests

mod codec;
mod error;
pub mod ids;
pub mod lobby;
pub mod rank;
mod schema;
pub mod wire;

#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures;

pub use codec::{peek_header, Envelope, MessageCodec, MessageKind, WrappedRecord};
pub use error::ProtocolError;
pub use schema::{EnumType, Field, FieldKind, MessageType, Method, Scalar, Schema};
