//! Unified error type for the majsoul client.

use majsoul_protocol::ProtocolError;
use majsoul_replay::ReplayError;
use majsoul_rpc::RpcError;
use majsoul_session::SessionError;
use majsoul_social::SocialError;
use majsoul_transport::TransportError;

/// Top-level error that wraps every layer's error.
///
/// Each variant is `#[error(transparent)]`, so the message a user sees is
/// the layer's own human-readable one.
#[derive(Debug, thiserror::Error)]
pub enum MajsoulError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Social(#[from] SocialError),

    #[error(transparent)]
    Replay(#[from] ReplayError),

    /// An operation needed a running session and there is none.
    #[error("no session is running; start the client first")]
    NotStarted,

    /// The event channel was already handed out.
    #[error("social events are already being consumed")]
    EventsTaken,
}

/// A sink refused or failed to deliver a message.
#[derive(Debug, thiserror::Error)]
#[error("delivery to {target} failed: {reason}")]
pub struct DeliveryError {
    pub target: String,
    pub reason: String,
}
