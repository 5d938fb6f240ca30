//! The in-memory friend registry.
//!
//! Owned by the router and touched only from the notification worker, so
//! it needs no locking.

use std::collections::{BTreeMap, BTreeSet};

use majsoul_protocol::lobby::{self, AccountActiveState, AccountLevel, PlayerBaseView};

/// The match a friend is currently sitting in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayingGame {
    pub game_uuid: String,
    pub category: u32,
    pub mode_id: u32,
}

/// What we last saw of one friend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Friend {
    pub account_id: u32,
    pub nickname: String,
    pub online: bool,
    /// 4-player rank.
    pub level: AccountLevel,
    /// 3-player rank.
    pub level3: AccountLevel,
    pub playing: Option<PlayingGame>,
}

impl Friend {
    /// Replaces the presence half of the snapshot.
    pub fn apply_state(&mut self, state: &AccountActiveState) {
        self.online = state.is_online;
        self.playing = playing_from(state);
    }

    /// Replaces the profile half of the snapshot.
    pub fn apply_base(&mut self, base: &PlayerBaseView) {
        if !base.nickname.is_empty() {
            self.nickname = base.nickname.clone();
        }
        self.level = base.level;
        self.level3 = base.level3;
    }
}

impl From<&lobby::Friend> for Friend {
    fn from(f: &lobby::Friend) -> Self {
        Self {
            account_id: f.base.account_id,
            nickname: f.base.nickname.clone(),
            online: f.state.is_online,
            level: f.base.level,
            level3: f.base.level3,
            playing: playing_from(&f.state),
        }
    }
}

pub(crate) fn playing_from(state: &AccountActiveState) -> Option<PlayingGame> {
    state.current_game().map(|g| PlayingGame {
        game_uuid: g.game_uuid.clone(),
        category: g.category,
        mode_id: g.meta.mode_id,
    })
}

/// Friends by account id, plus pending applications.
#[derive(Debug, Clone, Default)]
pub struct FriendRegistry {
    friends: BTreeMap<u32, Friend>,
    applications: BTreeSet<u32>,
}

impl FriendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the registry from a `fetchInfo` response.
    pub fn seed(&mut self, info: &lobby::ResFetchInfo) {
        for f in &info.friend_list.friends {
            let friend = Friend::from(f);
            self.friends.insert(friend.account_id, friend);
        }
        self.applications
            .extend(info.friend_apply_list.applies.iter().map(|a| a.account_id));
    }

    pub fn get(&self, account_id: u32) -> Option<&Friend> {
        self.friends.get(&account_id)
    }

    pub fn get_mut(&mut self, account_id: u32) -> Option<&mut Friend> {
        self.friends.get_mut(&account_id)
    }

    pub fn contains(&self, account_id: u32) -> bool {
        self.friends.contains_key(&account_id)
    }

    /// Inserts or replaces a friend, returning the previous entry.
    pub fn insert(&mut self, friend: Friend) -> Option<Friend> {
        self.friends.insert(friend.account_id, friend)
    }

    pub fn remove(&mut self, account_id: u32) -> Option<Friend> {
        self.friends.remove(&account_id)
    }

    pub fn friends(&self) -> impl Iterator<Item = &Friend> {
        self.friends.values()
    }

    pub fn len(&self) -> usize {
        self.friends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.friends.is_empty()
    }

    pub fn add_application(&mut self, account_id: u32) {
        self.applications.insert(account_id);
    }

    /// Drops a pending application; `true` if there was one.
    pub fn clear_application(&mut self, account_id: u32) -> bool {
        self.applications.remove(&account_id)
    }

    pub fn applications(&self) -> impl Iterator<Item = u32> + '_ {
        self.applications.iter().copied()
    }

    pub fn has_application(&self, account_id: u32) -> bool {
        self.applications.contains(&account_id)
    }
}
