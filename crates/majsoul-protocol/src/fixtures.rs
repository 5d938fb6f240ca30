//! A trimmed liqi schema for tests in this and downstream crates.
//!
//! Field numbers match the live schema for every message the client
//! touches; everything else is left out.

use std::sync::Arc;

use crate::{MessageCodec, Schema};

/// The raw schema document.
pub const LIQI_SUBSET: &str = include_str!("../fixtures/liqi.json");

/// Parses [`LIQI_SUBSET`].
///
/// # Panics
/// If the bundled document fails to parse, which is a bug in the fixture.
pub fn schema() -> Arc<Schema> {
    Arc::new(Schema::from_json(LIQI_SUBSET).expect("bundled liqi fixture must parse"))
}

/// A fresh codec over [`schema`].
pub fn codec() -> Arc<MessageCodec> {
    Arc::new(MessageCodec::new(schema()))
}
