//! `MajsoulClient` builder and the client itself.
//!
//! This is the entry point for the whole stack. It ties the layers
//! together: bootstrap → session → social routing → delivery, with match
//! records fetched over whichever session is up.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use majsoul_protocol::lobby::GameLiveHead;
use majsoul_replay::{GameRecord, ReplayFetcher};
use majsoul_rpc::{LobbyExt, RpcConnection};
use majsoul_session::{
    client_version_string, Bootstrap, CredentialStore, HttpBootstrap, SessionConfig,
    SessionManager,
};
use majsoul_transport::{Connector, WebSocketConnector};
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::delivery::{spawn_delivery, Delivery, DeliveryConfig, EventSink, PushPreferences};
use crate::MajsoulError;

/// Builder for a [`MajsoulClient`].
///
/// # Example
///
/// ```rust,no_run
/// use majsoul::prelude::*;
///
/// # async fn run() -> Result<(), MajsoulError> {
/// let mut client = MajsoulClient::builder()
///     .auto_accept_applications(true)
///     .build(StaticCredentials::new(["my-access-token"]));
/// client.start().await?;
/// # Ok(())
/// # }
/// ```
pub struct MajsoulClientBuilder {
    base_url: Option<String>,
    session_config: SessionConfig,
    delivery_config: DeliveryConfig,
}

impl MajsoulClientBuilder {
    pub fn new() -> Self {
        Self {
            base_url: None,
            session_config: SessionConfig::default(),
            delivery_config: DeliveryConfig::default(),
        }
    }

    /// Where the bootstrap documents are fetched from.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.session_config.heartbeat_interval = interval;
        self
    }

    pub fn call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.session_config.rpc.call_timeout = timeout;
        self
    }

    pub fn auto_accept_applications(mut self, enabled: bool) -> Self {
        self.session_config.social.auto_accept_applications = enabled;
        self
    }

    pub fn attribution_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_config.social.attribution_path = path.into();
        self
    }

    pub fn delivery_config(mut self, config: DeliveryConfig) -> Self {
        self.delivery_config = config;
        self
    }

    /// Builds a client that bootstraps over HTTPS and connects over
    /// WebSockets.
    pub fn build<S: CredentialStore>(
        self,
        credentials: S,
    ) -> MajsoulClient<HttpBootstrap, WebSocketConnector, S> {
        let bootstrap = match &self.base_url {
            Some(url) => HttpBootstrap::new(url.clone()),
            None => HttpBootstrap::default(),
        };
        self.build_with(bootstrap, WebSocketConnector, credentials)
    }

    /// Builds a client over caller-supplied bootstrap and transport.
    pub fn build_with<B, K, S>(
        self,
        bootstrap: B,
        connector: K,
        credentials: S,
    ) -> MajsoulClient<B, K, S>
    where
        B: Bootstrap,
        K: Connector,
        S: CredentialStore,
    {
        MajsoulClient {
            manager: SessionManager::new(bootstrap, connector, credentials, self.session_config),
            delivery_config: self.delivery_config,
            delivery: None,
        }
    }
}

impl Default for MajsoulClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A client tracking one or more Mahjong Soul accounts.
pub struct MajsoulClient<B, K, S>
where
    B: Bootstrap,
    K: Connector,
    S: CredentialStore,
{
    manager: SessionManager<B, K, S>,
    delivery_config: DeliveryConfig,
    delivery: Option<JoinHandle<()>>,
}

impl MajsoulClient<HttpBootstrap, WebSocketConnector, majsoul_session::StaticCredentials> {
    pub fn builder() -> MajsoulClientBuilder {
        MajsoulClientBuilder::new()
    }
}

impl<B, K, S> MajsoulClient<B, K, S>
where
    B: Bootstrap,
    K: Connector,
    S: CredentialStore,
{
    /// Logs every stored account in. Already running sessions are left
    /// alone.
    pub async fn start(&mut self) -> Result<usize, MajsoulError> {
        Ok(self.manager.start().await?)
    }

    /// Tears everything down and logs in again.
    pub async fn restart(&mut self) -> Result<usize, MajsoulError> {
        Ok(self.manager.restart().await?)
    }

    pub async fn shutdown(&mut self) {
        self.manager.shutdown().await;
        if let Some(task) = self.delivery.take() {
            task.abort();
        }
    }

    pub async fn is_online(&self) -> bool {
        self.manager.is_online().await
    }

    /// The account id `token` logs in as.
    pub async fn check_access_token(&self, token: &str) -> Result<u32, MajsoulError> {
        Ok(self.manager.check_access_token(token).await?)
    }

    /// Starts delivering social events from every session, now and after
    /// restarts.
    ///
    /// # Errors
    /// [`MajsoulError::EventsTaken`] if delivery was already started or the
    /// events were taken with [`MajsoulClient::events`].
    pub fn start_delivery<P, E>(&mut self, preferences: P, sink: E) -> Result<(), MajsoulError>
    where
        P: PushPreferences,
        E: EventSink,
    {
        let events = self.manager.take_events().ok_or(MajsoulError::EventsTaken)?;
        let delivery = Delivery::new(self.delivery_config.clone(), preferences, sink);
        self.delivery = Some(spawn_delivery(events, delivery));
        Ok(())
    }

    /// The raw event channel, for hosts that do their own delivery.
    pub fn events(
        &mut self,
    ) -> Result<tokio::sync::mpsc::UnboundedReceiver<majsoul_social::SocialEvent>, MajsoulError>
    {
        self.manager.take_events().ok_or(MajsoulError::EventsTaken)
    }

    pub fn manager(&self) -> &SessionManager<B, K, S> {
        &self.manager
    }

    /// Fetches a match record by log id.
    pub async fn fetch_record(&self, log_id: &str) -> Result<GameRecord, MajsoulError> {
        Ok(self.replay()?.fetch(log_id).await?)
    }

    /// Fetches a match by the id out of a replay link and converts it to
    /// tenhou.net/6 JSON.
    pub async fn fetch_tenhou(&self, match_id: &str) -> Result<Value, MajsoulError> {
        Ok(self.replay()?.fetch_tenhou(match_id).await?)
    }

    /// Games currently being played in the watched live filters.
    pub async fn fetch_live_games(&self) -> Result<Vec<GameLiveHead>, MajsoulError> {
        let session = self.manager.primary().ok_or(MajsoulError::NotStarted)?;
        Ok(session.rpc().fetch_live_games().await?)
    }

    fn replay(&self) -> Result<ReplayFetcher<RpcConnection<K::Connection>>, MajsoulError> {
        let session = self.manager.primary().ok_or(MajsoulError::NotStarted)?;
        let rpc = session.rpc().clone();
        let codec = Arc::clone(rpc.codec());
        Ok(ReplayFetcher::new(
            rpc,
            codec,
            client_version_string(session.version()),
        ))
    }
}
