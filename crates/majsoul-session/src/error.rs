//! Error types for the session layer.

use majsoul_protocol::ProtocolError;
use majsoul_rpc::RpcError;
use majsoul_transport::TransportError;

/// Errors that can occur while establishing or running a session.
///
/// Everything here is terminal for the attempt that produced it: a
/// session is either fully established or torn down, never half-built.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A bootstrap document couldn't be fetched or didn't have the
    /// expected shape.
    #[error("bootstrap failed at {step}: {reason}")]
    Bootstrap { step: &'static str, reason: String },

    /// The server refused the access token, or login didn't complete.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The credential store holds no access tokens.
    #[error("no valid access token stored; add an account first")]
    NoCredentials,

    /// The gateway connection couldn't be opened.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A call on an established connection failed.
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// The protocol schema document didn't parse.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl SessionError {
    pub(crate) fn bootstrap(step: &'static str, reason: impl ToString) -> Self {
        Self::Bootstrap {
            step,
            reason: reason.to_string(),
        }
    }
}
