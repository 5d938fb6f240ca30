//! # majsoul
//!
//! A client for the Mahjong Soul lobby.
//!
//! It keeps one logged-in session per stored access token, turns the
//! server's friend notifications into readable [`SocialEvent`]s, routes
//! them to the right chat, and fetches match records as tenhou.net/6 JSON.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use majsoul::prelude::*;
//!
//! # async fn run() -> Result<(), MajsoulError> {
//! let mut client = MajsoulClient::builder()
//!     .build(StaticCredentials::new(["my-access-token"]));
//! client.start().await?;
//!
//! let mut events = client.events()?;
//! while let Some(event) = events.recv().await {
//!     println!("{event}");
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod delivery;
mod error;

pub use client::{MajsoulClient, MajsoulClientBuilder};
pub use delivery::{
    spawn_delivery, Delivery, DeliveryConfig, EventSink, MetaTarget, PushPreference,
    PushPreferences, PushRecord, Target, TargetKind,
};
pub use error::{DeliveryError, MajsoulError};

pub use majsoul_protocol as protocol;
pub use majsoul_replay as replay;
pub use majsoul_rpc as rpc;
pub use majsoul_session as session;
pub use majsoul_social as social;
pub use majsoul_social::SocialEvent;
pub use majsoul_transport as transport;

/// The types most hosts need.
pub mod prelude {
    pub use crate::{
        Delivery, DeliveryConfig, DeliveryError, EventSink, MajsoulClient, MajsoulError,
        PushPreferences, PushRecord, Target, TargetKind,
    };
    pub use majsoul_replay::MatchId;
    pub use majsoul_session::{CredentialStore, SessionConfig, StaticCredentials};
    pub use majsoul_social::{Destination, SocialEvent};
}
