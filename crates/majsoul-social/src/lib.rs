//! Social state for majsoul-link.
//!
//! This crate turns the server's friend notifications into something a
//! person wants to read:
//!
//! 1. **Registry** — what we last saw of each friend ([`FriendRegistry`])
//! 2. **Routing** — diffing notifications against the registry and emitting
//!    [`SocialEvent`]s ([`Router`])
//! 3. **Attribution** — remembering which friend led us to which match,
//!    across restarts ([`AttributionStore`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Session Layer (above)  ← spawns the router as the notification worker
//!     ↕
//! Social Layer (this crate)  ← registry, diffing, events
//!     ↕
//! RPC Layer (below)  ← notification queue, lobby calls
//! ```

mod attribution;
mod config;
mod error;
mod events;
mod registry;
mod router;

pub use majsoul_protocol::rank;

pub use attribution::{AttributionStore, Attributions};
pub use config::{MatchCategory, SocialConfig};
pub use error::SocialError;
pub use events::{replay_url, Destination, SocialEvent, Track, REPLAY_HOST};
pub use registry::{Friend, FriendRegistry, PlayingGame};
pub use router::{AccountLabel, Router};
