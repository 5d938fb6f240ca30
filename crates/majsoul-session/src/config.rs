//! Session configuration.

use std::time::Duration;

use majsoul_rpc::RpcConfig;
use majsoul_social::SocialConfig;

/// Where the web client's bootstrap documents live.
pub const DEFAULT_BASE_URL: &str = "https://game.maj-soul.com/1/";

/// Configuration for session behavior. Sensible defaults are provided.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base interval between keep-alive rounds.
    pub heartbeat_interval: Duration,
    /// Up to this much is added to each interval so sessions started
    /// together don't beat in lockstep.
    pub heartbeat_jitter: Duration,
    /// Pause before the single `oauth2Check` retry.
    pub login_retry_delay: Duration,
    pub rpc: RpcConfig,
    pub social: SocialConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(360),
            heartbeat_jitter: Duration::from_secs(30),
            login_retry_delay: Duration::from_secs(2),
            rpc: RpcConfig::default(),
            social: SocialConfig::default(),
        }
    }
}

/// The version string the web client reports, e.g. `web-0.11.8` for
/// resource version `0.11.8.w`.
pub fn client_version_string(version: &str) -> String {
    format!("web-{}", version.replace(".w", ""))
}
