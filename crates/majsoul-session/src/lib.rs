//! Session management for majsoul-link.
//!
//! This crate gets from "a list of access tokens" to "logged-in accounts
//! with their friend notifications flowing":
//!
//! 1. **Bootstrap** — find the schema and a gateway ([`Bootstrap`])
//! 2. **Authentication** — `oauth2Check` / `oauth2Login` / `loginBeat`
//!    ([`authenticate`])
//! 3. **Sessions** — one connection per account with its keep-alive and
//!    notification worker ([`Session`])
//! 4. **Management** — start, restart and health checks across every
//!    stored account ([`SessionManager`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Facade (above)          ← owns the manager, delivers events
//!     ↕
//! Session Layer (this crate)  ← bootstrap, login, keep-alive
//!     ↕
//! RPC + Social (below)    ← calls, notification routing
//! ```

mod auth;
mod bootstrap;
mod config;
mod credentials;
mod error;
mod manager;
mod session;

pub use auth::{authenticate, LOGIN_BEAT_CONTRACT};
pub use bootstrap::{gateway_endpoint, Bootstrap, BootstrapInfo, HttpBootstrap, StaticBootstrap};
pub use config::{client_version_string, SessionConfig, DEFAULT_BASE_URL};
pub use credentials::{CredentialStore, StaticCredentials};
pub use error::SessionError;
pub use manager::SessionManager;
pub use session::Session;
