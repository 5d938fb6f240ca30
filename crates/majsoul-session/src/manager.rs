//! The session manager: one [`Session`] per stored access token.
//!
//! ```text
//! start() ──→ tokens? ──none──→ NoCredentials
//!               │
//!               └─→ bootstrap ──→ establish + start_social per token ──→ [Running]
//!
//! restart() = close every session, forget them, start()
//! ```
//!
//! Recovery is always a full rebuild. There is no attempt to repair a
//! single broken connection in place.

use majsoul_social::SocialEvent;
use majsoul_transport::Connector;
use tokio::sync::mpsc;

use crate::{Bootstrap, BootstrapInfo, CredentialStore, Session, SessionConfig, SessionError};

/// Owns every session and the channel their social events flow into.
pub struct SessionManager<B, K, S>
where
    B: Bootstrap,
    K: Connector,
    S: CredentialStore,
{
    bootstrap: B,
    connector: K,
    credentials: S,
    config: SessionConfig,
    sessions: Vec<Session<K::Connection>>,
    events_tx: mpsc::UnboundedSender<SocialEvent>,
    events_rx: Option<mpsc::UnboundedReceiver<SocialEvent>>,
}

impl<B, K, S> SessionManager<B, K, S>
where
    B: Bootstrap,
    K: Connector,
    S: CredentialStore,
{
    pub fn new(bootstrap: B, connector: K, credentials: S, config: SessionConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            bootstrap,
            connector,
            credentials,
            config,
            sessions: Vec::new(),
            events_tx,
            events_rx: Some(events_rx),
        }
    }

    /// The receiving end of every session's social events. Survives
    /// restarts; `None` once taken.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<SocialEvent>> {
        self.events_rx.take()
    }

    /// Brings up one session per stored token.
    ///
    /// Does nothing if sessions are already running. Returns the number
    /// of running sessions.
    ///
    /// # Errors
    /// - [`SessionError::NoCredentials`] if the store is empty
    /// - whatever bootstrap or the first failing login returned; sessions
    ///   brought up earlier in the same attempt are closed again
    pub async fn start(&mut self) -> Result<usize, SessionError> {
        if !self.sessions.is_empty() {
            return Ok(self.sessions.len());
        }

        let tokens = self.credentials.tokens().await;
        if tokens.is_empty() {
            return Err(SessionError::NoCredentials);
        }

        let info = self.bootstrap.resolve().await?;
        let mut started = Vec::with_capacity(tokens.len());
        for token in &tokens {
            match self.bring_up(&info, token).await {
                Ok(session) => started.push(session),
                Err(e) => {
                    tracing::error!(error = %e, "session start failed");
                    for mut session in started {
                        session.close().await;
                    }
                    return Err(e);
                }
            }
        }

        tracing::info!(sessions = started.len(), "sessions running");
        self.sessions = started;
        Ok(self.sessions.len())
    }

    async fn bring_up(
        &self,
        info: &BootstrapInfo,
        token: &str,
    ) -> Result<Session<K::Connection>, SessionError> {
        let mut session = Session::establish(&self.connector, info, token, &self.config).await?;
        if let Err(e) = session
            .start_social(self.config.social.clone(), self.events_tx.clone())
            .await
        {
            session.close().await;
            return Err(e);
        }
        Ok(session)
    }

    /// Tears every session down and starts from scratch.
    pub async fn restart(&mut self) -> Result<usize, SessionError> {
        self.shutdown().await;
        tracing::info!("restarting sessions");
        self.start().await
    }

    /// Closes and forgets every session.
    pub async fn shutdown(&mut self) {
        for mut session in self.sessions.drain(..) {
            session.close().await;
        }
    }

    /// Whether the primary session answers a heartbeat. `false` when
    /// nothing is running.
    pub async fn is_online(&self) -> bool {
        match self.sessions.first() {
            Some(session) => session.is_alive().await,
            None => false,
        }
    }

    /// Logs in with `token` on a throwaway connection and returns the
    /// account id it belongs to.
    pub async fn check_access_token(&self, token: &str) -> Result<u32, SessionError> {
        let info = self.bootstrap.resolve().await?;
        let mut session = Session::establish(&self.connector, &info, token, &self.config).await?;
        let account_id = session.account_id();
        session.close().await;
        Ok(account_id)
    }

    pub fn sessions(&self) -> &[Session<K::Connection>] {
        &self.sessions
    }

    /// The first session, which liveness checks and replay fetches use.
    pub fn primary(&self) -> Option<&Session<K::Connection>> {
        self.sessions.first()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}
