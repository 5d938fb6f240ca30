use std::time::Duration;

/// Tunables for an [`RpcConnection`](crate::RpcConnection).
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// How long a call waits for its response. `None` waits until the
    /// response arrives or the connection breaks.
    pub call_timeout: Option<Duration>,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            call_timeout: Some(Duration::from_secs(30)),
        }
    }
}
