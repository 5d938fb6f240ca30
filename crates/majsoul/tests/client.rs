//! Integration tests for the client: start, delivery and record access
//! against a scripted in-memory lobby.

use std::sync::{Arc, Mutex};

use majsoul::prelude::*;
use majsoul::protocol::lobby::{methods, notify};
use majsoul::protocol::{fixtures, MessageCodec};
use majsoul::session::{BootstrapInfo, StaticBootstrap};
use majsoul::transport::memory::{self, MemoryConnection, MemoryConnector, MemoryTransport};
use majsoul::transport::{Connection, Transport};
use majsoul::{replay::ReplayError, rpc::RpcError};
use serde_json::{json, Value};
use tempfile::TempDir;

const ME: u32 = 1001;
const FRIEND: u32 = 42;

// =========================================================================
// Scripted lobby
// =========================================================================

#[derive(Default)]
struct Lobby {
    links: Mutex<Vec<Arc<MemoryConnection>>>,
    record_requests: Mutex<Vec<Value>>,
}

impl Lobby {
    fn answer(&self, method: &str, payload: &Value) -> Value {
        match method {
            methods::OAUTH2_CHECK => json!({"has_account": true}),
            methods::OAUTH2_LOGIN => {
                json!({"account_id": ME, "account": {"account_id": ME, "nickname": "Aki"}})
            }
            methods::FETCH_INFO => json!({
                "friend_list": {"friends": [{
                    "base": {"account_id": FRIEND, "nickname": "Tomo"},
                    "state": {"account_id": FRIEND, "is_online": false}
                }]}
            }),
            methods::FETCH_GAME_LIVE_LIST => {
                let filter = payload["filter_id"].as_u64().unwrap_or_default();
                json!({"live_list": [{"uuid": format!("live-{filter}")}]})
            }
            methods::FETCH_GAME_RECORD => {
                self.record_requests.lock().unwrap().push(payload.clone());
                json!({"error": {"code": 1203}})
            }
            _ => json!({}),
        }
    }

    async fn push(&self, type_name: &str, payload: Value) {
        let frame = MessageCodec::new(fixtures::schema())
            .encode_notify(type_name, &payload)
            .unwrap();
        let links: Vec<_> = self.links.lock().unwrap().clone();
        for link in links {
            link.send(&frame).await.unwrap();
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
                    let reply = lobby.answer(&request.method, &request.payload);
                    let frame = codec.encode_response(index, &request.method, &reply).unwrap();
                    if link.send(&frame).await.is_err() {
                        break;
                    }
                }
            });
        }
    });
}

// =========================================================================
// Host side: sink and preferences
// =========================================================================

#[derive(Clone, Default)]
struct Outbox(Arc<Mutex<Vec<(Target, String)>>>);

impl EventSink for Outbox {
    async fn deliver(&self, target: &Target, text: &str) -> Result<(), DeliveryError> {
        self.0.lock().unwrap().push((target.clone(), text.to_string()));
        Ok(())
    }
}

struct GroupPush;

impl PushPreferences for GroupPush {
    async fn lookup(&self, account_id: u32) -> Option<PushRecord> {
        (account_id == FRIEND).then(|| PushRecord {
            push_id: "group-7".into(),
            user_id: "owner".into(),
            bot_id: String::new(),
        })
    }
}

fn client(
    dir: &TempDir,
    tokens: &[&str],
    delivery: DeliveryConfig,
) -> (
    MajsoulClient<StaticBootstrap, MemoryConnector, StaticCredentials>,
    Arc<Lobby>,
) {
    let (connector, transport) = memory::listener();
    let lobby = Arc::new(Lobby::default());
    serve(transport, Arc::clone(&lobby));
    let bootstrap = StaticBootstrap(BootstrapInfo {
        schema: fixtures::schema(),
        endpoint: "wss://gateway.test/gateway".into(),
        version: "0.11.8.w".into(),
    });
    let client = MajsoulClient::builder()
        .attribution_path(dir.path().join("game_record.json"))
        .delivery_config(delivery)
        .build_with(
            bootstrap,
            connector,
            StaticCredentials::new(tokens.iter().copied()),
        );
    (client, lobby)
}

async fn wait_for_outbox(outbox: &Outbox, count: usize) -> Vec<(Target, String)> {
    for _ in 0..100 {
        let sent = outbox.0.lock().unwrap().clone();
        if sent.len() >= count {
            return sent;
        }
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    panic!("expected {count} deliveries");
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_start_without_tokens_reports_readable_error() {
    let dir = TempDir::new().unwrap();
    let (mut client, _lobby) = client(&dir, &[], DeliveryConfig::default());

    let err = client.start().await.unwrap_err();

    assert_eq!(
        err.to_string(),
        "no valid access token stored; add an account first"
    );
    assert!(!client.is_online().await);
}

#[tokio::test]
async fn test_calls_before_start_return_not_started() {
    let dir = TempDir::new().unwrap();
    let (client, _lobby) = client(&dir, &["tok"], DeliveryConfig::default());

    assert!(matches!(
        client.fetch_tenhou("231114-abc").await,
        Err(MajsoulError::NotStarted)
    ));
    assert!(matches!(
        client.fetch_live_games().await,
        Err(MajsoulError::NotStarted)
    ));
}

#[tokio::test]
async fn test_friend_event_delivered_to_owner_group_and_master() {
    let config = DeliveryConfig {
        meta_target: Some(Target::direct("admin")),
        push_active_to_master: true,
    };
    let dir = TempDir::new().unwrap();
    let (mut client, lobby) = client(&dir, &["tok"], config);
    let outbox = Outbox::default();
    client.start_delivery(GroupPush, outbox.clone()).unwrap();
    client.start().await.unwrap();

    lobby
        .push(
            notify::FRIEND_STATE_CHANGE,
            json!({"target_id": FRIEND, "active_state": {"account_id": FRIEND, "is_online": true}}),
        )
        .await;

    let sent = wait_for_outbox(&outbox, 2).await;
    assert_eq!(sent[0], (Target::direct("admin"), "Tomo came online".to_string()));
    assert_eq!(sent[1], (Target::group("group-7"), "Tomo came online".to_string()));
}

#[tokio::test]
async fn test_another_login_goes_to_meta_only() {
    let config = DeliveryConfig {
        meta_target: Some(Target::group("ops")),
        push_active_to_master: false,
    };
    let dir = TempDir::new().unwrap();
    let (mut client, lobby) = client(&dir, &["tok"], config);
    let outbox = Outbox::default();
    client.start_delivery(GroupPush, outbox.clone()).unwrap();
    client.start().await.unwrap();

    lobby.push(notify::ANOTHER_LOGIN, json!({})).await;

    let sent = wait_for_outbox(&outbox, 1).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, Target::group("ops"));
    assert!(sent[0].1.contains("Aki"));
}

#[tokio::test]
async fn test_events_can_only_be_taken_once() {
    let dir = TempDir::new().unwrap();
    let (mut client, _lobby) = client(&dir, &["tok"], DeliveryConfig::default());
    client.events().unwrap();
    assert!(matches!(
        client.start_delivery(GroupPush, Outbox::default()),
        Err(MajsoulError::EventsTaken)
    ));
}

#[tokio::test]
async fn test_fetch_live_games_concatenates_filters() {
    let dir = TempDir::new().unwrap();
    let (mut client, _lobby) = client(&dir, &["tok"], DeliveryConfig::default());
    client.start().await.unwrap();

    let games = client.fetch_live_games().await.unwrap();

    let uuids: Vec<_> = games.iter().map(|g| g.uuid.as_str()).collect();
    assert_eq!(uuids, ["live-216", "live-209", "live-212"]);
}

#[tokio::test]
async fn test_fetch_tenhou_surfaces_remote_error_with_client_version() {
    let dir = TempDir::new().unwrap();
    let (mut client, lobby) = client(&dir, &["tok"], DeliveryConfig::default());
    client.start().await.unwrap();

    let err = client.fetch_tenhou("231114-abc").await.unwrap_err();

    assert!(matches!(
        err,
        MajsoulError::Replay(ReplayError::Rpc(RpcError::Remote { code: 1203, .. }))
    ));
    let requests = lobby.record_requests.lock().unwrap();
    assert_eq!(requests[0]["game_uuid"], "231114-abc");
    assert_eq!(requests[0]["client_version_string"], "web-0.11.8");
}

#[tokio::test]
async fn test_check_access_token_and_restart() {
    let dir = TempDir::new().unwrap();
    let (mut client, lobby) = client(&dir, &["tok"], DeliveryConfig::default());
    assert_eq!(client.check_access_token("tok").await.unwrap(), ME);

    client.start().await.unwrap();
    assert_eq!(client.restart().await.unwrap(), 1);

    // Token check, first start, restart.
    assert_eq!(lobby.links.lock().unwrap().len(), 3);
    assert!(client.is_online().await);
    client.shutdown().await;
    assert!(!client.is_online().await);
}

#[tokio::test]
async fn test_match_attribution_written_under_configured_path() {
    let dir = TempDir::new().unwrap();
    let (mut client, lobby) = client(&dir, &["tok"], DeliveryConfig::default());
    let mut events = client.events().unwrap();
    client.start().await.unwrap();

    lobby
        .push(
            notify::FRIEND_STATE_CHANGE,
            json!({"target_id": FRIEND, "active_state": {
                "account_id": FRIEND, "is_online": true,
                "playing": {"game_uuid": "g-77", "category": 2, "meta": {"mode_id": 12}}
            }}),
        )
        .await;
    // Came online, then started a match.
    events.recv().await.unwrap();
    events.recv().await.unwrap();

    // The event goes out before the write lands.
    let path = dir.path().join("game_record.json");
    let mut stored = Value::Null;
    for _ in 0..100 {
        if let Ok(raw) = std::fs::read(&path) {
            stored = serde_json::from_slice(&raw).unwrap_or(Value::Null);
            if !stored.is_null() {
                break;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    assert_eq!(stored, json!({"g-77": FRIEND}));
    client.shutdown().await;
}
