//! Request/response correlation for majsoul-link.
//!
//! A liqi connection carries three kinds of frame on one stream. This crate
//! turns that stream into:
//!
//! - a **call primitive** ([`RpcConnection::call`]) that sends a request and
//!   waits for the response with the same index, with any number of calls
//!   in flight at once;
//! - a **notification queue** ([`Notifications`]) fed by the read-dispatch
//!   loop and drained by a single [worker](spawn_notification_worker);
//! - **typed lobby helpers** ([`LobbyExt`]) over any [`Caller`].
//!
//! # How it fits in the stack
//!
//! ```text
//! Session / Social / Replay (above)  ← issue calls, consume notifications
//!     ↕
//! RPC Layer (this crate)             ← correlation table, dispatch loop
//!     ↕
//! Protocol (below)                   ← frame codec
//! ```
//!
//! # Failure model
//!
//! When the transport closes or errors, the dispatch loop exits and every
//! outstanding call resolves with [`RpcError::ConnectionBroken`]. Later
//! calls fail with the same error immediately.

mod config;
mod connection;
mod correlation;
mod error;
mod lobby;
mod worker;

pub use config::RpcConfig;
pub use connection::{Notifications, RpcConnection};
pub use error::RpcError;
pub use lobby::{Caller, LobbyExt, LIVE_GAME_FILTERS};
pub use worker::{spawn_notification_worker, NotificationHandler};
