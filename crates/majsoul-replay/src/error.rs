//! Error types for the replay layer.

use majsoul_protocol::ProtocolError;
use majsoul_rpc::RpcError;

/// Errors that can occur while fetching or transcoding a match record.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    /// The match id string could not be split into its parts.
    #[error("invalid match id {0:?}")]
    InvalidMatchId(String),

    /// The `fetchGameRecord` call failed.
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// One of the nested envelopes didn't decode against the schema.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A decoded record didn't fit its typed view.
    #[error("record view mismatch: {0}")]
    View(#[from] serde_json::Error),

    /// The server answered without inline record data.
    #[error("match {uuid} has no inline record data")]
    MissingData { uuid: String },

    /// A tile string that isn't `<digit><m|p|s|z>`.
    #[error("unrecognized tile {0:?}")]
    BadTile(String),

    /// A record names a seat past the end of the table.
    #[error("seat {0} out of range")]
    BadSeat(u32),
}
