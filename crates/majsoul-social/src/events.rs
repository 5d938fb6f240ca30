//! Outbound events produced by the router.
//!
//! The router doesn't deliver anything itself. Each event names where it
//! should go ([`Destination`]) and renders its own text through `Display`;
//! whoever drains the event channel does the delivery.

use std::fmt;

use majsoul_protocol::ids::encode_account_id;
use majsoul_protocol::rank::{room_label, PlayerLevel};

use crate::MatchCategory;

/// Base URL of shareable replay links.
pub const REPLAY_HOST: &str = "https://game.maj-soul.com/1/?paipu=";

/// Builds the replay link for `game_uuid` seen from `account_id`'s seat.
pub fn replay_url(game_uuid: &str, account_id: u32) -> String {
    format!(
        "{REPLAY_HOST}{game_uuid}_a{}",
        encode_account_id(u64::from(account_id))
    )
}

/// Where an event should be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// The operator's broadcast channel.
    Meta,
    /// Whoever follows this friend's account.
    Owner(u32),
}

/// Which rank track a change happened on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Track {
    FourPlayer,
    ThreePlayer,
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FourPlayer => write!(f, "4-player"),
            Self::ThreePlayer => write!(f, "3-player"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocialEvent {
    CameOnline {
        account_id: u32,
        nickname: String,
    },
    WentOffline {
        account_id: u32,
        nickname: String,
    },
    MatchStarted {
        account_id: u32,
        nickname: String,
        game_uuid: String,
        category: MatchCategory,
        mode_id: u32,
    },
    MatchFinished {
        account_id: u32,
        nickname: String,
        game_uuid: String,
        mode_id: u32,
    },
    TierChanged {
        account_id: u32,
        nickname: String,
        track: Track,
        level: PlayerLevel,
    },
    ScoreChanged {
        account_id: u32,
        nickname: String,
        track: Track,
        level: PlayerLevel,
        delta: i64,
    },
    FriendAdded {
        account_id: u32,
        nickname: String,
    },
    FriendRemoved {
        account_id: u32,
        nickname: String,
    },
    FriendRefreshed {
        account_id: u32,
        nickname: String,
    },
    FriendApplication {
        account_id: u32,
        /// `None` when the profile lookup failed.
        nickname: Option<String>,
    },
    /// Our own account was logged in from somewhere else.
    AnotherLogin {
        account_id: u32,
        nickname: String,
    },
}

impl SocialEvent {
    pub fn destination(&self) -> Destination {
        match self {
            Self::CameOnline { account_id, .. }
            | Self::WentOffline { account_id, .. }
            | Self::MatchStarted { account_id, .. }
            | Self::MatchFinished { account_id, .. }
            | Self::TierChanged { account_id, .. }
            | Self::ScoreChanged { account_id, .. } => Destination::Owner(*account_id),
            Self::FriendAdded { .. }
            | Self::FriendRemoved { .. }
            | Self::FriendRefreshed { .. }
            | Self::FriendApplication { .. }
            | Self::AnotherLogin { .. } => Destination::Meta,
        }
    }

    /// Whether this is one of the match start/finish transitions.
    pub fn is_match_event(&self) -> bool {
        matches!(self, Self::MatchStarted { .. } | Self::MatchFinished { .. })
    }
}

impl fmt::Display for SocialEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CameOnline { nickname, .. } => write!(f, "{nickname} came online"),
            Self::WentOffline { nickname, .. } => write!(f, "{nickname} went offline"),
            Self::MatchStarted {
                nickname,
                game_uuid,
                category,
                mode_id,
                ..
            } => {
                match category {
                    MatchCategory::Unknown(code) => {
                        write!(f, "{nickname} started a match of unknown category {code}")?
                    }
                    known => write!(f, "{nickname} started a {known} match")?,
                }
                if let Some(room) = room_label(*mode_id) {
                    write!(f, " in {room}")?;
                }
                write!(f, " (mode {mode_id})\nmatch id: {game_uuid}")
            }
            Self::MatchFinished {
                account_id,
                nickname,
                game_uuid,
                mode_id,
            } => {
                write!(f, "{nickname} finished a match")?;
                if let Some(room) = room_label(*mode_id) {
                    write!(f, " in {room}")?;
                }
                write!(f, "\nreplay: {}", replay_url(game_uuid, *account_id))
            }
            Self::TierChanged {
                nickname,
                track,
                level,
                ..
            } => write!(f, "{nickname}'s {track} rank is now {}", level.tag()),
            Self::ScoreChanged {
                nickname,
                track,
                level,
                delta,
                ..
            } => {
                let sign = if *delta >= 0 { "+" } else { "-" };
                write!(f, "{nickname} {track} rank: {level}\n{sign}{}", delta.unsigned_abs())
            }
            Self::FriendAdded { nickname, .. } => write!(f, "Now friends with {nickname}"),
            Self::FriendRemoved { nickname, .. } => write!(f, "Removed friend {nickname}"),
            Self::FriendRefreshed { nickname, .. } => {
                write!(f, "Refreshed friend data for {nickname}")
            }
            Self::FriendApplication {
                account_id,
                nickname,
            } => match nickname {
                Some(name) => write!(f, "Friend application from {name} ({account_id})"),
                None => write!(f, "Friend application from {account_id}"),
            },
            Self::AnotherLogin {
                account_id,
                nickname,
            } => write!(
                f,
                "Account {nickname} ({account_id}) logged in elsewhere\n\
                 the access token may have expired"
            ),
        }
    }
}
