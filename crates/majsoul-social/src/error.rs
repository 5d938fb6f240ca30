//! Error types for the social layer.

use std::path::PathBuf;

use majsoul_protocol::ProtocolError;
use majsoul_rpc::RpcError;

/// Errors that can occur while handling a notification.
///
/// None of these are fatal to the connection; the notification worker logs
/// them and moves on.
#[derive(Debug, thiserror::Error)]
pub enum SocialError {
    /// The notification payload didn't match its expected shape.
    #[error("bad notification payload: {0}")]
    Payload(#[from] ProtocolError),

    /// A follow-up lobby call (profile lookup, accept) failed.
    #[error("lobby call failed: {0}")]
    Rpc(#[from] RpcError),

    /// The attribution file couldn't be written.
    #[error("cannot write {}: {source}", path.display())]
    Attribution {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
