//! Match records for majsoul-link.
//!
//! Given the match id out of a replay link, this crate:
//!
//! 1. **Parses** the link form ([`MatchId`]): rotated log ids and the
//!    obfuscated viewer account
//! 2. **Fetches** the record and peels its nested envelopes into an ordered
//!    transcript ([`ReplayFetcher`], [`GameRecord`])
//! 3. **Transcodes** the transcript into tenhou.net/6 JSON ([`to_tenhou`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Facade (above)  ← exposes fetch_tenhou on the client
//!     ↕
//! Replay Layer (this crate)
//!     ↕
//! RPC Layer (below)  ← fetchGameRecord; Protocol codec for the envelopes
//! ```

mod error;
mod fetch;
mod match_id;
pub mod record;
mod tenhou;

pub use error::ReplayError;
pub use fetch::{GameRecord, ReplayFetcher, ACTION_FORMAT_VERSION};
pub use match_id::MatchId;
pub use record::Action;
pub use tenhou::{tile_code, to_tenhou};
