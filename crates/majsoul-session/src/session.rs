//! One authenticated account on one gateway connection.
//!
//! A [`Session`] owns everything that belongs to that account: the RPC
//! connection, the keep-alive task and (once [`Session::start_social`]
//! runs) the notification worker with its router. Nothing is shared
//! between sessions, and [`Session::close`] takes all of it down together.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use majsoul_protocol::MessageCodec;
use majsoul_rpc::{
    spawn_notification_worker, LobbyExt, Notifications, RpcConnection,
};
use majsoul_social::{AccountLabel, Router, SocialConfig, SocialEvent};
use majsoul_transport::{Connection, Connector};
use rand::Rng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::auth::authenticate;
use crate::{BootstrapInfo, SessionConfig, SessionError};

/// A logged-in account.
pub struct Session<C: Connection> {
    rpc: RpcConnection<C>,
    account: AccountLabel,
    version: String,
    tasks: Vec<JoinHandle<()>>,
    /// Taken by [`Session::start_social`].
    notifications: Option<Notifications>,
    last_heartbeat: Arc<Mutex<Instant>>,
}

impl<C: Connection> Session<C> {
    /// Connects to the gateway, checks the link with one heartbeat, logs
    /// in with `token` and starts the keep-alive task.
    ///
    /// On any failure the connection is closed before returning, so a
    /// session either exists fully or not at all.
    pub async fn establish<K>(
        connector: &K,
        info: &BootstrapInfo,
        token: &str,
        config: &SessionConfig,
    ) -> Result<Self, SessionError>
    where
        K: Connector<Connection = C>,
    {
        tracing::info!(endpoint = %info.endpoint, "connecting");
        let conn = connector.connect(&info.endpoint).await?;
        let codec = Arc::new(MessageCodec::new(Arc::clone(&info.schema)));
        let (rpc, notifications) = RpcConnection::connect(conn, codec, config.rpc.clone());

        let handshake = async {
            rpc.heartbeat().await?;
            authenticate(&rpc, token, &info.version, config.login_retry_delay).await
        };
        let account = match handshake.await {
            Ok(account) => account,
            Err(e) => {
                rpc.close().await;
                return Err(e);
            }
        };

        let last_heartbeat = Arc::new(Mutex::new(Instant::now()));
        let keep_alive = spawn_keep_alive(
            rpc.clone(),
            config.heartbeat_interval,
            config.heartbeat_jitter,
            Arc::clone(&last_heartbeat),
        );

        Ok(Self {
            rpc,
            account,
            version: info.version.clone(),
            tasks: vec![keep_alive],
            notifications: Some(notifications),
            last_heartbeat,
        })
    }

    /// Loads the friend roster and starts routing this session's
    /// notifications into `events`.
    ///
    /// Calling it a second time does nothing: the notification queue has
    /// only one consumer.
    pub async fn start_social(
        &mut self,
        config: SocialConfig,
        events: mpsc::UnboundedSender<SocialEvent>,
    ) -> Result<(), SessionError> {
        if self.notifications.is_none() {
            tracing::warn!(account_id = self.account.account_id, "social routing already started");
            return Ok(());
        }

        let info = self.rpc.fetch_info().await?;
        let Some(notifications) = self.notifications.take() else {
            return Ok(());
        };
        let mut router = Router::new(self.rpc.clone(), self.account.clone(), config, events);
        router.seed(&info);
        self.tasks.push(spawn_notification_worker(notifications, router));
        Ok(())
    }

    pub fn rpc(&self) -> &RpcConnection<C> {
        &self.rpc
    }

    pub fn account(&self) -> &AccountLabel {
        &self.account
    }

    pub fn account_id(&self) -> u32 {
        self.account.account_id
    }

    /// Resource version the session logged in with.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// When the last keep-alive round (or the login) completed.
    pub fn last_heartbeat(&self) -> Instant {
        *self.last_heartbeat.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Whether a heartbeat round-trip succeeds right now.
    pub async fn is_alive(&self) -> bool {
        self.rpc.check_alive().await
    }

    /// Stops the background tasks and closes the connection. Calls still
    /// in flight fail with `ConnectionBroken`.
    pub async fn close(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.rpc.close().await;
        tracing::info!(account_id = self.account.account_id, "session closed");
    }
}

impl<C: Connection> Drop for Session<C> {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Every `interval` (plus up to `jitter`): `fetchServerTime`, then a
/// heartbeat. Stops once the connection is gone.
fn spawn_keep_alive<C: Connection>(
    rpc: RpcConnection<C>,
    interval: Duration,
    jitter: Duration,
    last_heartbeat: Arc<Mutex<Instant>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval + random_jitter(jitter)).await;

            let round = async {
                rpc.fetch_server_time().await?;
                rpc.heartbeat().await
            };
            match round.await {
                Ok(_) => {
                    *last_heartbeat.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
                    tracing::debug!(conn = %rpc.id(), "heartbeat");
                }
                Err(e) if e.is_fatal() => {
                    tracing::warn!(conn = %rpc.id(), error = %e, "keep-alive stopped");
                    break;
                }
                Err(e) => {
                    tracing::warn!(conn = %rpc.id(), error = %e, "heartbeat failed");
                }
            }
        }
    })
}

fn random_jitter(max: Duration) -> Duration {
    if max.is_zero() {
        return Duration::ZERO;
    }
    let millis = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(rand::rng().random_range(0..=millis))
}
