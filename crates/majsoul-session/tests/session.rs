//! Session and manager tests against a scripted in-memory lobby.
//!
//! The far side of every memory link is served by [`Lobby`]: it decodes
//! requests with its own codec and answers from a small account table.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use majsoul_protocol::lobby::{methods, notify};
use majsoul_protocol::{fixtures, Envelope, MessageCodec};
use majsoul_session::{
    BootstrapInfo, SessionConfig, SessionError, SessionManager, StaticBootstrap,
    StaticCredentials,
};
use majsoul_social::SocialEvent;
use majsoul_transport::memory::{self, MemoryConnection, MemoryConnector, MemoryTransport};
use majsoul_transport::{Connection, Transport};
use serde_json::{json, Value};
use tempfile::TempDir;

const FRIEND_ID: u32 = 42;

/// Server side: account table, call log, open links.
struct Lobby {
    accounts: HashMap<String, (u32, String)>,
    /// How many `oauth2Check` calls answer "no account" before the real answer.
    unlinked_checks: AtomicU32,
    calls: Mutex<Vec<String>>,
    links: Mutex<Vec<Arc<MemoryConnection>>>,
}

impl Lobby {
    fn new(accounts: &[(&str, u32, &str)]) -> Arc<Self> {
        Arc::new(Self {
            accounts: accounts
                .iter()
                .map(|(token, id, name)| (token.to_string(), (*id, name.to_string())))
                .collect(),
            unlinked_checks: AtomicU32::new(0),
            calls: Mutex::new(Vec::new()),
            links: Mutex::new(Vec::new()),
        })
    }

    fn count(&self, method: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|m| *m == method).count()
    }

    fn link_count(&self) -> usize {
        self.links.lock().unwrap().len()
    }

    fn answer(&self, request: &Envelope) -> Value {
        self.calls.lock().unwrap().push(request.method.clone());
        let token = request.payload["access_token"].as_str().unwrap_or_default();
        match request.method.as_str() {
            methods::OAUTH2_CHECK => {
                if !self.accounts.contains_key(token) {
                    return json!({"error": {"code": 1003}});
                }
                let unlinked = self
                    .unlinked_checks
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok();
                json!({"has_account": !unlinked})
            }
            methods::OAUTH2_LOGIN => match self.accounts.get(token) {
                Some((id, name)) => {
                    json!({"account_id": id, "account": {"account_id": id, "nickname": name}})
                }
                None => json!({"error": {"code": 1003}}),
            },
            methods::FETCH_INFO => json!({
                "friend_list": {"friends": [{
                    "base": {"account_id": FRIEND_ID, "nickname": "Tomo"},
                    "state": {"account_id": FRIEND_ID, "is_online": false}
                }]}
            }),
            methods::FETCH_SERVER_TIME => json!({"server_time": 1_700_000_000u32}),
            _ => json!({}),
        }
    }

    /// Pushes a notification down every open link.
    async fn broadcast(&self, type_name: &str, payload: Value) {
        let codec = MessageCodec::new(fixtures::schema());
        let frame = codec.encode_notify(type_name, &payload).unwrap();
        let links: Vec<_> = self.links.lock().unwrap().clone();
        for link in links {
            let _ = link.send(&frame).await;
        }
    }
}

fn serve(mut transport: MemoryTransport, lobby: Arc<Lobby>) {
    tokio::spawn(async move {
        while let Ok(link) = transport.accept().await {
            let link = Arc::new(link);
            lobby.links.lock().unwrap().push(Arc::clone(&link));
            let lobby = Arc::clone(&lobby);
            tokio::spawn(async move {
                let codec = MessageCodec::new(fixtures::schema());
                while let Ok(Some(frame)) = link.recv().await {
                    let Ok(request) = codec.decode_message(&frame) else {
                        continue;
                    };
                    let Some(index) = request.index else {
                        continue;
                    };
                    let reply = lobby.answer(&request);
                    let frame = codec.encode_response(index, &request.method, &reply).unwrap();
                    if link.send(&frame).await.is_err() {
                        break;
                    }
                }
            });
        }
    });
}

fn bootstrap() -> StaticBootstrap {
    StaticBootstrap(BootstrapInfo {
        schema: fixtures::schema(),
        endpoint: "wss://gateway.test/gateway".into(),
        version: "0.11.8.w".into(),
    })
}

fn config(dir: &TempDir) -> SessionConfig {
    let mut config = SessionConfig::default();
    config.social.attribution_path = dir.path().join("game_record.json");
    config
}

fn setup(
    lobby: &Arc<Lobby>,
    dir: &TempDir,
    tokens: &[&str],
) -> SessionManager<StaticBootstrap, MemoryConnector, StaticCredentials> {
    let (connector, transport) = memory::listener();
    serve(transport, Arc::clone(lobby));
    SessionManager::new(
        bootstrap(),
        connector,
        StaticCredentials::new(tokens.iter().copied()),
        config(dir),
    )
}

#[tokio::test]
async fn test_start_one_session_per_token() {
    let lobby = Lobby::new(&[("tok-a", 1001, "Aki"), ("tok-b", 1002, "Ban")]);
    let dir = TempDir::new().unwrap();
    let mut manager = setup(&lobby, &dir, &["tok-a", "tok-b"]);

    assert_eq!(manager.start().await.unwrap(), 2);

    let ids: Vec<u32> = manager.sessions().iter().map(|s| s.account_id()).collect();
    assert_eq!(ids, [1001, 1002]);
    assert_eq!(manager.sessions()[0].account().nickname, "Aki");
    assert_eq!(lobby.link_count(), 2);
    // One liveness heartbeat per link before login, one roster fetch after.
    assert_eq!(lobby.count(methods::HEARTBEAT), 2);
    assert_eq!(lobby.count(methods::LOGIN_BEAT), 2);
    assert_eq!(lobby.count(methods::FETCH_INFO), 2);
    assert!(manager.is_online().await);
}

#[tokio::test]
async fn test_start_twice_is_idempotent() {
    let lobby = Lobby::new(&[("tok-a", 1001, "Aki")]);
    let dir = TempDir::new().unwrap();
    let mut manager = setup(&lobby, &dir, &["tok-a"]);

    manager.start().await.unwrap();
    assert_eq!(manager.start().await.unwrap(), 1);
    assert_eq!(lobby.link_count(), 1);
}

#[tokio::test]
async fn test_start_without_tokens_returns_no_credentials() {
    let lobby = Lobby::new(&[]);
    let dir = TempDir::new().unwrap();
    let mut manager = setup(&lobby, &dir, &["", " "]);

    let err = manager.start().await.unwrap_err();

    assert!(matches!(err, SessionError::NoCredentials));
    assert!(err.to_string().contains("no valid access token"));
    assert_eq!(lobby.link_count(), 0);
    assert!(!manager.is_online().await);
}

#[tokio::test(start_paused = true)]
async fn test_start_unlinked_account_retries_once_after_pause() {
    let lobby = Lobby::new(&[("tok-a", 1001, "Aki")]);
    lobby.unlinked_checks.store(1, Ordering::SeqCst);
    let dir = TempDir::new().unwrap();
    let mut manager = setup(&lobby, &dir, &["tok-a"]);
    let started = tokio::time::Instant::now();

    assert_eq!(manager.start().await.unwrap(), 1);

    assert_eq!(lobby.count(methods::OAUTH2_CHECK), 2);
    assert_eq!(lobby.count(methods::OAUTH2_LOGIN), 1);
    assert!(started.elapsed() >= Duration::from_secs(2));
}

#[tokio::test]
async fn test_start_rejected_token_closes_sessions_from_same_attempt() {
    let lobby = Lobby::new(&[("tok-a", 1001, "Aki")]);
    let dir = TempDir::new().unwrap();
    let mut manager = setup(&lobby, &dir, &["tok-a", "tok-unknown"]);

    let err = manager.start().await.unwrap_err();

    match err {
        SessionError::Authentication(reason) => assert!(reason.contains("1003")),
        other => panic!("unexpected error: {other}"),
    }
    assert!(manager.sessions().is_empty());
    assert!(!manager.is_online().await);
}

#[tokio::test]
async fn test_restart_replaces_every_session() {
    let lobby = Lobby::new(&[("tok-a", 1001, "Aki")]);
    let dir = TempDir::new().unwrap();
    let mut manager = setup(&lobby, &dir, &["tok-a"]);
    manager.start().await.unwrap();
    let old = manager.primary().unwrap().rpc().clone();

    assert_eq!(manager.restart().await.unwrap(), 1);

    assert!(old.is_broken());
    assert_eq!(lobby.link_count(), 2);
    assert!(!manager.primary().unwrap().rpc().is_broken());
    assert!(manager.is_online().await);
}

#[tokio::test]
async fn test_check_access_token_returns_account_without_keeping_session() {
    let lobby = Lobby::new(&[("tok-a", 1001, "Aki")]);
    let dir = TempDir::new().unwrap();
    let manager = setup(&lobby, &dir, &[]);

    assert_eq!(manager.check_access_token("tok-a").await.unwrap(), 1001);
    assert!(manager.sessions().is_empty());

    let err = manager.check_access_token("nope").await.unwrap_err();
    assert!(matches!(err, SessionError::Authentication(_)));
}

#[tokio::test]
async fn test_notifications_reach_event_channel() {
    let lobby = Lobby::new(&[("tok-a", 1001, "Aki")]);
    let dir = TempDir::new().unwrap();
    let mut manager = setup(&lobby, &dir, &["tok-a"]);
    let mut events = manager.take_events().unwrap();
    manager.start().await.unwrap();

    lobby
        .broadcast(
            notify::FRIEND_STATE_CHANGE,
            json!({"target_id": FRIEND_ID, "active_state": {"account_id": FRIEND_ID, "is_online": true}}),
        )
        .await;

    let event = events.recv().await.unwrap();
    assert_eq!(
        event,
        SocialEvent::CameOnline {
            account_id: FRIEND_ID,
            nickname: "Tomo".into(),
        }
    );
    assert!(manager.take_events().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_keep_alive_fetches_time_then_heartbeats() {
    let lobby = Lobby::new(&[("tok-a", 1001, "Aki")]);
    let dir = TempDir::new().unwrap();
    let mut manager = setup(&lobby, &dir, &["tok-a"]);
    manager.start().await.unwrap();
    let logged_in_at = manager.primary().unwrap().last_heartbeat();
    assert_eq!(lobby.count(methods::FETCH_SERVER_TIME), 0);

    // Past the longest possible first interval (360 s + 30 s jitter).
    tokio::time::sleep(Duration::from_secs(400)).await;

    assert_eq!(lobby.count(methods::FETCH_SERVER_TIME), 1);
    assert_eq!(lobby.count(methods::HEARTBEAT), 2);
    assert!(manager.primary().unwrap().last_heartbeat() > logged_in_at);
}
