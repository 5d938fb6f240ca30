//! The notification router: decoded notifications in, [`SocialEvent`]s out.
//!
//! Each handler diffs the notification against what the [`FriendRegistry`]
//! last saw, emits events for the edges it finds, and then overwrites the
//! stored snapshot. Replaying the same notification is therefore harmless:
//! the second copy finds no edge.
//!
//! | Notification               | Effect                                          |
//! |----------------------------|-------------------------------------------------|
//! | `NotifyFriendStateChange`  | online/offline, match start/finish, attribution |
//! | `NotifyFriendViewChange`   | rank tier and score changes per track           |
//! | `NotifyFriendChange`       | roster add (1), remove (2), refresh (other)     |
//! | `NotifyNewFriendApply`     | pending application, optional auto-accept       |
//! | `NotifyAnotherLogin`       | credential warning                              |

use majsoul_protocol::lobby::{
    self, notify, NotifyFriendChange, NotifyFriendStateChange, NotifyFriendViewChange,
    NotifyNewFriendApply,
};
use majsoul_protocol::rank::PlayerLevel;
use majsoul_protocol::Envelope;
use majsoul_rpc::{Caller, LobbyExt, NotificationHandler};
use tokio::sync::mpsc;

use crate::events::Track;
use crate::registry::playing_from;
use crate::{
    AttributionStore, Friend, FriendRegistry, MatchCategory, SocialConfig, SocialError,
    SocialEvent,
};

const FRIEND_ADDED: u32 = 1;
const FRIEND_REMOVED: u32 = 2;

/// Our own account, for messages about the session itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountLabel {
    pub account_id: u32,
    pub nickname: String,
}

/// Routes one session's notifications.
///
/// `P` issues the follow-up lobby calls (applicant lookup, auto-accept).
pub struct Router<P: Caller> {
    caller: P,
    account: AccountLabel,
    registry: FriendRegistry,
    store: AttributionStore,
    config: SocialConfig,
    events: mpsc::UnboundedSender<SocialEvent>,
}

impl<P: Caller> Router<P> {
    pub fn new(
        caller: P,
        account: AccountLabel,
        config: SocialConfig,
        events: mpsc::UnboundedSender<SocialEvent>,
    ) -> Self {
        let store = AttributionStore::new(config.attribution_path.clone());
        Self {
            caller,
            account,
            registry: FriendRegistry::new(),
            store,
            config,
            events,
        }
    }

    /// Loads the roster and pending applications from `fetchInfo`.
    pub fn seed(&mut self, info: &lobby::ResFetchInfo) {
        self.registry.seed(info);
        tracing::info!(
            account_id = self.account.account_id,
            friends = self.registry.len(),
            "friend roster loaded"
        );
    }

    pub fn registry(&self) -> &FriendRegistry {
        &self.registry
    }

    pub fn store(&self) -> &AttributionStore {
        &self.store
    }

    /// Routes one notification by its type name.
    ///
    /// Unknown notifications are logged and ignored.
    pub async fn route(&mut self, envelope: Envelope) -> Result<(), SocialError> {
        match envelope.method.as_str() {
            notify::FRIEND_STATE_CHANGE => self.on_state_change(envelope.payload_as()?).await,
            notify::FRIEND_VIEW_CHANGE => {
                self.on_view_change(envelope.payload_as()?);
                Ok(())
            }
            notify::FRIEND_CHANGE => {
                self.on_friend_change(envelope.payload_as()?);
                Ok(())
            }
            notify::NEW_FRIEND_APPLY => self.on_new_application(envelope.payload_as()?).await,
            notify::ANOTHER_LOGIN => {
                self.emit(SocialEvent::AnotherLogin {
                    account_id: self.account.account_id,
                    nickname: self.account.nickname.clone(),
                });
                Ok(())
            }
            other => {
                tracing::warn!(method = other, "unhandled notification");
                Ok(())
            }
        }
    }

    async fn on_state_change(&mut self, n: NotifyFriendStateChange) -> Result<(), SocialError> {
        let Some(friend) = self.registry.get_mut(n.target_id) else {
            tracing::debug!(target_id = n.target_id, "state change for non-friend");
            return Ok(());
        };

        let state = &n.active_state;
        let before = friend.clone();
        let now_playing = playing_from(state);
        friend.apply_state(state);

        let mut events = Vec::new();
        let mut attribution = None;
        match (state.is_online, before.online) {
            (true, false) => events.push(SocialEvent::CameOnline {
                account_id: before.account_id,
                nickname: before.nickname.clone(),
            }),
            (false, true) => events.push(SocialEvent::WentOffline {
                account_id: before.account_id,
                nickname: before.nickname.clone(),
            }),
            _ => {}
        }
        match (&now_playing, &before.playing) {
            (Some(game), None) => {
                events.push(SocialEvent::MatchStarted {
                    account_id: before.account_id,
                    nickname: before.nickname.clone(),
                    game_uuid: game.game_uuid.clone(),
                    category: MatchCategory::from_code(game.category),
                    mode_id: game.mode_id,
                });
                attribution = Some(game.game_uuid.clone());
            }
            (None, Some(game)) => {
                events.push(SocialEvent::MatchFinished {
                    account_id: before.account_id,
                    nickname: before.nickname.clone(),
                    game_uuid: game.game_uuid.clone(),
                    mode_id: game.mode_id,
                });
                attribution = Some(game.game_uuid.clone());
            }
            _ => {}
        }

        for event in events {
            self.emit(event);
        }
        if let Some(game_uuid) = attribution {
            self.store.record(&game_uuid, before.account_id).await?;
        }
        Ok(())
    }

    fn on_view_change(&mut self, n: NotifyFriendViewChange) {
        let Some(friend) = self.registry.get_mut(n.target_id) else {
            tracing::debug!(target_id = n.target_id, "view change for non-friend");
            return;
        };

        let before = friend.clone();
        friend.apply_base(&n.base);
        let (new4, new3) = (n.base.level, n.base.level3);

        let mut events = Vec::new();
        for (track, old, new) in [
            (Track::FourPlayer, before.level, new4),
            (Track::ThreePlayer, before.level3, new3),
        ] {
            if old.id != new.id {
                events.push(SocialEvent::TierChanged {
                    account_id: before.account_id,
                    nickname: before.nickname.clone(),
                    track,
                    level: PlayerLevel::new(new.id, new.score),
                });
            }
        }

        // The 3-player score only gets a look when the 4-player one held.
        let score_change = if new4.score != before.level.score {
            Some((Track::FourPlayer, before.level, new4))
        } else if new3.score != before.level3.score {
            Some((Track::ThreePlayer, before.level3, new3))
        } else {
            None
        };
        if let Some((track, old, new)) = score_change {
            events.push(SocialEvent::ScoreChanged {
                account_id: before.account_id,
                nickname: before.nickname.clone(),
                track,
                level: PlayerLevel::new(new.id, new.score),
                delta: i64::from(new.score) - i64::from(old.score),
            });
        }

        for event in events {
            self.emit(event);
        }
    }

    fn on_friend_change(&mut self, n: NotifyFriendChange) {
        let account_id = n.account_id;
        let mut friend = Friend::from(&n.friend);
        if friend.account_id == 0 {
            friend.account_id = account_id;
        }

        match n.kind {
            FRIEND_ADDED => {
                self.registry.clear_application(account_id);
                if self.registry.contains(account_id) {
                    tracing::warn!(account_id, "added friend is already on the roster");
                    return;
                }
                let nickname = friend.nickname.clone();
                self.registry.insert(friend);
                self.emit(SocialEvent::FriendAdded {
                    account_id,
                    nickname,
                });
            }
            FRIEND_REMOVED => {
                if let Some(old) = self.registry.remove(account_id) {
                    self.emit(SocialEvent::FriendRemoved {
                        account_id,
                        nickname: old.nickname,
                    });
                }
            }
            kind => {
                if !self.registry.contains(account_id) {
                    tracing::debug!(account_id, kind, "refresh for non-friend");
                    return;
                }
                let nickname = friend.nickname.clone();
                self.registry.insert(friend);
                self.emit(SocialEvent::FriendRefreshed {
                    account_id,
                    nickname,
                });
            }
        }
    }

    async fn on_new_application(&mut self, n: NotifyNewFriendApply) -> Result<(), SocialError> {
        let account_id = n.account_id;
        self.registry.add_application(account_id);

        let nickname = match self.caller.fetch_account_briefs(&[account_id]).await {
            Ok(res) => res.players.into_iter().next().map(|p| p.nickname),
            Err(e) => {
                tracing::error!(account_id, error = %e, "applicant lookup failed");
                None
            }
        };
        self.emit(SocialEvent::FriendApplication {
            account_id,
            nickname,
        });

        if self.config.auto_accept_applications {
            self.caller.accept_friend_application(account_id).await?;
            self.registry.clear_application(account_id);
            tracing::info!(account_id, "friend application accepted");
        }
        Ok(())
    }

    fn emit(&self, event: SocialEvent) {
        tracing::info!(destination = ?event.destination(), %event, "social event");
        if self.events.send(event).is_err() {
            tracing::debug!("event receiver dropped");
        }
    }
}

impl<P: Caller + 'static> NotificationHandler for Router<P> {
    type Error = SocialError;

    async fn handle(&mut self, envelope: Envelope) -> Result<(), SocialError> {
        self.route(envelope).await
    }
}
