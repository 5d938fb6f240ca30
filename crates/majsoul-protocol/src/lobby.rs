//! Typed views over the lobby messages this client exercises.
//!
//! Payloads decode to `serde_json::Value`; these structs are read out of
//! them with [`Envelope::payload_as`](crate::Envelope::payload_as) or
//! `serde_json::from_value`. proto3 omits default values on the wire, so
//! every field is `#[serde(default)]`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fully-qualified lobby method names.
pub mod methods {
    pub const HEARTBEAT: &str = ".lq.Lobby.heatbeat";
    pub const OAUTH2_CHECK: &str = ".lq.Lobby.oauth2Check";
    pub const OAUTH2_LOGIN: &str = ".lq.Lobby.oauth2Login";
    pub const LOGIN_BEAT: &str = ".lq.Lobby.loginBeat";
    pub const FETCH_SERVER_TIME: &str = ".lq.Lobby.fetchServerTime";
    pub const FETCH_INFO: &str = ".lq.Lobby.fetchInfo";
    pub const FETCH_MULTI_ACCOUNT_BRIEF: &str = ".lq.Lobby.fetchMultiAccountBrief";
    pub const HANDLE_FRIEND_APPLY: &str = ".lq.Lobby.handleFriendApply";
    pub const FETCH_GAME_RECORD: &str = ".lq.Lobby.fetchGameRecord";
    pub const FETCH_GAME_LIVE_LIST: &str = ".lq.Lobby.fetchGameLiveList";
}

/// Notification type names.
pub mod notify {
    pub const FRIEND_STATE_CHANGE: &str = ".lq.NotifyFriendStateChange";
    pub const FRIEND_VIEW_CHANGE: &str = ".lq.NotifyFriendViewChange";
    pub const NEW_FRIEND_APPLY: &str = ".lq.NotifyNewFriendApply";
    pub const FRIEND_CHANGE: &str = ".lq.NotifyFriendChange";
    pub const ANOTHER_LOGIN: &str = ".lq.NotifyAnotherLogin";
}

/// The `error.code` of a lobby response, `0` when absent.
pub fn error_code(payload: &Value) -> u32 {
    payload
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(Value::as_u64)
        .map_or(0, |c| c as u32)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorInfo {
    pub code: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResCommon {
    pub error: ErrorInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResServerTime {
    pub error: ErrorInfo,
    pub server_time: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResOauth2Check {
    pub error: ErrorInfo,
    pub has_account: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Account {
    pub account_id: u32,
    pub nickname: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResLogin {
    pub error: ErrorInfo,
    pub account_id: u32,
    pub account: Account,
}

/// A rank on one track: tier id plus points within it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountLevel {
    pub id: u32,
    pub score: u32,
}

/// Public profile snapshot, carrying both rank tracks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerBaseView {
    pub account_id: u32,
    pub avatar_id: u32,
    pub title: u32,
    pub nickname: String,
    /// 4-player rank.
    pub level: AccountLevel,
    /// 3-player rank.
    pub level3: AccountLevel,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameMetaData {
    pub room_id: u32,
    pub mode_id: u32,
    pub contest_uid: u32,
}

/// A match a friend is currently sitting in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountPlayingGame {
    pub game_uuid: String,
    pub category: u32,
    pub meta: GameMetaData,
}

/// Presence snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountActiveState {
    pub account_id: u32,
    pub login_time: u32,
    pub logout_time: u32,
    pub is_online: bool,
    pub playing: Option<AccountPlayingGame>,
}

impl AccountActiveState {
    /// The current match, if the snapshot names one.
    ///
    /// The server sometimes sends an empty `playing` message instead of
    /// omitting it; that counts as "not playing".
    pub fn current_game(&self) -> Option<&AccountPlayingGame> {
        self.playing.as_ref().filter(|p| !p.game_uuid.is_empty())
    }
}

/// One roster entry from `fetchInfo` or `NotifyFriendChange`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Friend {
    pub base: PlayerBaseView,
    pub state: AccountActiveState,
    pub remark: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FriendApply {
    pub account_id: u32,
    pub apply_time: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResFriendList {
    pub error: ErrorInfo,
    pub friends: Vec<Friend>,
    pub friend_max_count: u32,
    pub friend_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResFriendApplyList {
    pub error: ErrorInfo,
    pub applies: Vec<FriendApply>,
}

/// The parts of `ResFetchInfo` the social layer seeds itself from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResFetchInfo {
    pub error: ErrorInfo,
    pub server_time: ResServerTime,
    pub friend_list: ResFriendList,
    pub friend_apply_list: ResFriendApplyList,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResMultiAccountBrief {
    pub error: ErrorInfo,
    pub players: Vec<PlayerBaseView>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerGameView {
    pub account_id: u32,
    pub avatar_id: u32,
    pub nickname: String,
    pub level: AccountLevel,
    pub level3: AccountLevel,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameLiveHead {
    pub uuid: String,
    pub start_time: u32,
    pub players: Vec<PlayerGameView>,
    pub seat_list: Vec<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResGameLiveList {
    pub error: ErrorInfo,
    pub live_list: Vec<GameLiveHead>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyFriendStateChange {
    pub target_id: u32,
    pub active_state: AccountActiveState,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyFriendViewChange {
    pub target_id: u32,
    pub base: PlayerBaseView,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyFriendChange {
    pub account_id: u32,
    pub friend: Friend,
    #[serde(rename = "type")]
    pub kind: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyNewFriendApply {
    pub account_id: u32,
    pub apply_time: u32,
}
