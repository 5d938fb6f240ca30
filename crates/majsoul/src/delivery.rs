//! Getting social events to people.
//!
//! The router decides *what* happened and whether it concerns the operator
//! ([`Destination::Meta`]) or whoever follows a friend
//! ([`Destination::Owner`]). This module decides *where* that goes:
//!
//! ```text
//! Meta            ──→ meta target (warn if none configured)
//! Owner(account)  ──→ meta target too, if push_active_to_master
//!                 ──→ owner's preference: off → dropped
//!                                         on  → direct to the owner
//!                                         id  → that group
//! ```
//!
//! Both the preference lookup ([`PushPreferences`]) and the actual sending
//! ([`EventSink`]) belong to whatever hosts the client.

use std::future::Future;

use majsoul_social::{Destination, SocialEvent};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::DeliveryError;

/// Private message or group chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Direct,
    Group,
}

/// One place a message can be sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub kind: TargetKind,
    pub id: String,
    /// Which bot should send it, when the host runs several.
    #[serde(default)]
    pub bot_id: Option<String>,
}

impl Target {
    pub fn direct(id: impl Into<String>) -> Self {
        Self {
            kind: TargetKind::Direct,
            id: id.into(),
            bot_id: None,
        }
    }

    pub fn group(id: impl Into<String>) -> Self {
        Self {
            kind: TargetKind::Group,
            id: id.into(),
            bot_id: None,
        }
    }

    fn via(mut self, bot_id: &str) -> Self {
        if !bot_id.is_empty() {
            self.bot_id = Some(bot_id.to_string());
        }
        self
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            TargetKind::Direct => write!(f, "direct:{}", self.id),
            TargetKind::Group => write!(f, "group:{}", self.id),
        }
    }
}

/// The operator's broadcast target.
pub type MetaTarget = Target;

/// Where operator-facing messages go.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeliveryConfig {
    pub meta_target: Option<MetaTarget>,
    /// Also copy every friend event to the meta target.
    pub push_active_to_master: bool,
}

/// What the host stored for a followed account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushRecord {
    /// `"off"`, `"on"` or a group id.
    pub push_id: String,
    /// The user who registered the account.
    pub user_id: String,
    #[serde(default)]
    pub bot_id: String,
}

/// A decoded [`PushRecord::push_id`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushPreference {
    Off,
    Direct,
    Group(String),
}

impl PushPreference {
    pub fn parse(push_id: &str) -> Self {
        match push_id {
            "off" => Self::Off,
            "on" => Self::Direct,
            group => Self::Group(group.to_string()),
        }
    }
}

impl PushRecord {
    /// The target this record asks for, or `None` when pushing is off.
    pub fn target(&self) -> Option<Target> {
        let target = match PushPreference::parse(&self.push_id) {
            PushPreference::Off => return None,
            PushPreference::Direct => Target::direct(&self.user_id),
            PushPreference::Group(group) => Target::group(group),
        };
        Some(target.via(&self.bot_id))
    }
}

/// Looks up the stored push preference for a followed account.
pub trait PushPreferences: Send + Sync + 'static {
    fn lookup(&self, account_id: u32) -> impl Future<Output = Option<PushRecord>> + Send;
}

/// Sends rendered text to a target.
pub trait EventSink: Send + Sync + 'static {
    fn deliver(
        &self,
        target: &Target,
        text: &str,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

/// Routes events to targets according to a [`DeliveryConfig`].
pub struct Delivery<P: PushPreferences, S: EventSink> {
    config: DeliveryConfig,
    preferences: P,
    sink: S,
}

impl<P: PushPreferences, S: EventSink> Delivery<P, S> {
    pub fn new(config: DeliveryConfig, preferences: P, sink: S) -> Self {
        Self {
            config,
            preferences,
            sink,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Delivers one event. Sink failures are logged, never returned: one
    /// unreachable chat shouldn't stop the rest.
    pub async fn deliver(&self, event: &SocialEvent) {
        let text = event.to_string();
        match event.destination() {
            Destination::Meta => self.send_meta(&text).await,
            Destination::Owner(account_id) => self.send_to_owner(account_id, &text).await,
        }
    }

    /// Sends `text` to the meta target, if one is configured.
    pub async fn send_meta(&self, text: &str) {
        match &self.config.meta_target {
            Some(target) => self.send(target, text).await,
            None => tracing::warn!("no meta target configured, dropping message"),
        }
    }

    async fn send_to_owner(&self, account_id: u32, text: &str) {
        if self.config.push_active_to_master {
            self.send_meta(text).await;
        }
        let Some(record) = self.preferences.lookup(account_id).await else {
            tracing::debug!(account_id, "no push preference stored");
            return;
        };
        match record.target() {
            Some(target) => self.send(&target, text).await,
            None => tracing::debug!(account_id, "push is off"),
        }
    }

    async fn send(&self, target: &Target, text: &str) {
        if let Err(e) = self.sink.deliver(target, text).await {
            tracing::warn!(%target, error = %e, "delivery failed");
        }
    }
}

/// Drains `events` into `delivery` until the channel closes.
pub fn spawn_delivery<P, S>(
    mut events: mpsc::UnboundedReceiver<SocialEvent>,
    delivery: Delivery<P, S>,
) -> JoinHandle<()>
where
    P: PushPreferences,
    S: EventSink,
{
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            delivery.deliver(&event).await;
        }
        tracing::debug!("delivery stopped");
    })
}
