//! Social layer configuration and match classification.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SocialConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`Router`](crate::Router).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialConfig {
    /// Accept incoming friend applications as soon as they arrive.
    pub auto_accept_applications: bool,

    /// Where match attributions are persisted.
    pub attribution_path: PathBuf,
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self {
            auto_accept_applications: false,
            attribution_path: PathBuf::from("game_record.json"),
        }
    }
}

// ---------------------------------------------------------------------------
// MatchCategory
// ---------------------------------------------------------------------------

/// What kind of match a friend sat down in.
///
/// ```text
/// 1 → Casual   2 → Ranked   4 → Tournament   other → Unknown(code)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchCategory {
    Casual,
    Ranked,
    Tournament,
    Unknown(u32),
}

impl MatchCategory {
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => Self::Casual,
            2 => Self::Ranked,
            4 => Self::Tournament,
            other => Self::Unknown(other),
        }
    }
}

impl std::fmt::Display for MatchCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Casual => write!(f, "casual"),
            Self::Ranked => write!(f, "ranked"),
            Self::Tournament => write!(f, "tournament"),
            Self::Unknown(code) => write!(f, "unknown category {code}"),
        }
    }
}
