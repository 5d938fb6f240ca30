/// Errors that can occur in the transport layer.
///
/// Every variant is fatal to the connection that produced it: the RPC layer
/// marks the connection broken as soon as one of these surfaces.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Opening the connection failed (DNS, TCP, TLS or upgrade handshake).
    #[error("connect to {endpoint} failed: {source}")]
    ConnectFailed {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// The transport was shut down.
    #[error("transport shut down")]
    Shutdown,
}
