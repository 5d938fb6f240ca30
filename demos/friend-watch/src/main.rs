//! Watches the friends of every account in `MAJSOUL_TOKENS` and prints what
//! they do.
//!
//! ```text
//! MAJSOUL_TOKENS=tok1,tok2 RUST_LOG=info cargo run -p friend-watch
//! MAJSOUL_TOKENS=tok1 cargo run -p friend-watch -- <match id>   # print a replay
//! ```

use std::time::Duration;

use majsoul::prelude::*;
use tracing_subscriber::EnvFilter;

/// How often the primary session is probed, and the client rebuilt if it
/// stopped answering.
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(300);

// ---------------------------------------------------------------------------
// Console delivery
// ---------------------------------------------------------------------------

struct Console;

impl EventSink for Console {
    async fn deliver(&self, target: &Target, text: &str) -> Result<(), DeliveryError> {
        println!("[{target}] {text}");
        Ok(())
    }
}

/// Every followed account pushes straight to the console user.
struct ConsolePush;

impl PushPreferences for ConsolePush {
    async fn lookup(&self, _account_id: u32) -> Option<PushRecord> {
        Some(PushRecord {
            push_id: "on".into(),
            user_id: "console".into(),
            bot_id: String::new(),
        })
    }
}

fn tokens_from_env() -> StaticCredentials {
    let raw = std::env::var("MAJSOUL_TOKENS").unwrap_or_default();
    StaticCredentials::new(raw.split(',').map(str::trim))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut client = MajsoulClient::builder()
        .delivery_config(DeliveryConfig {
            meta_target: Some(Target::direct("operator")),
            push_active_to_master: false,
        })
        .build(tokens_from_env());

    if let Err(e) = client.start().await {
        eprintln!("could not start: {e}");
        std::process::exit(1);
    }

    if let Some(match_id) = std::env::args().nth(1) {
        match client.fetch_tenhou(&match_id).await {
            Ok(log) => println!("{log}"),
            Err(e) => eprintln!("could not fetch {match_id}: {e}"),
        }
        client.shutdown().await;
        return;
    }

    if let Err(e) = client.start_delivery(ConsolePush, Console) {
        eprintln!("{e}");
        std::process::exit(1);
    }

    let mut health = tokio::time::interval(HEALTH_CHECK_INTERVAL);
    health.tick().await;
    loop {
        tokio::select! {
            _ = health.tick() => {
                if client.is_online().await {
                    continue;
                }
                tracing::warn!("lobby connection lost, restarting");
                if let Err(e) = client.restart().await {
                    tracing::error!(error = %e, "restart failed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                client.shutdown().await;
                break;
            }
        }
    }
}
