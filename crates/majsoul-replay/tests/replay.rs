//! Integration tests for record fetching and tenhou.net/6 output.
//!
//! Records are built the way the server builds them: each action encoded
//! against the fixture schema and wrapped, the list wrapped again, and the
//! whole response round-tripped through the schema.

use std::sync::{Arc, Mutex};

use majsoul_protocol::ids::{encode_account_id, encode_log_id};
use majsoul_protocol::lobby::methods;
use majsoul_protocol::{fixtures, wire, MessageCodec};
use majsoul_replay::record::{
    NoTileScoreInfo, RecordAnGangAddGang, RecordChiPengGang, RecordGame, RecordLiuJu,
    RecordNewRound, RecordNoTile,
};
use majsoul_replay::{to_tenhou, Action, GameRecord, ReplayError, ReplayFetcher};
use majsoul_rpc::{Caller, RpcError};
use serde_json::{json, Value};

// =========================================================================
// Helpers
// =========================================================================

#[derive(Clone)]
struct RecordServer {
    response: Value,
    calls: Arc<Mutex<Vec<Value>>>,
}

impl RecordServer {
    fn new(response: Value) -> Self {
        Self {
            response,
            calls: Arc::default(),
        }
    }

    fn requested_uuids(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|p| p["game_uuid"].as_str().unwrap().to_string())
            .collect()
    }
}

impl Caller for RecordServer {
    async fn call(&self, method: &str, payload: Value) -> Result<Value, RpcError> {
        assert_eq!(method, methods::FETCH_GAME_RECORD);
        self.calls.lock().unwrap().push(payload);
        Ok(self.response.clone())
    }
}

fn wrapped(codec: &MessageCodec, type_name: &str, payload: Value) -> Vec<u8> {
    let full = format!(".lq.{type_name}");
    let body = wire::encode(codec.schema(), &full, &payload).unwrap();
    wire::encode_wrapper(&full, &body)
}

fn hand(tiles: &[&str]) -> Vec<String> {
    tiles.iter().map(|t| t.to_string()).collect()
}

/// One east-1 round: dealer riichi, a pon with a red five, then a ron.
fn east_one(codec: &MessageCodec) -> Vec<Vec<u8>> {
    let dealer = hand(&[
        "1m", "2m", "3m", "4m", "5m", "6m", "7m", "8m", "9m", "1p", "2p", "3p", "4p", "7z",
    ]);
    let other = hand(&[
        "1s", "2s", "3s", "4s", "5s", "6s", "7s", "8s", "9s", "1z", "2z", "3z", "4z",
    ]);
    vec![
        wrapped(
            codec,
            "RecordNewRound",
            json!({
                "chang": 0, "ju": 0, "ben": 0,
                "tiles0": dealer, "tiles1": other, "tiles2": other, "tiles3": other,
                "doras": ["1m"], "scores": [25000, 25000, 25000, 25000], "liqibang": 0
            }),
        ),
        wrapped(
            codec,
            "RecordDiscardTile",
            json!({"seat": 0, "tile": "9m", "is_liqi": true}),
        ),
        wrapped(codec, "RecordDealTile", json!({"seat": 1, "tile": "5p"})),
        wrapped(
            codec,
            "RecordDiscardTile",
            json!({"seat": 1, "tile": "5p", "moqie": true}),
        ),
        wrapped(
            codec,
            "RecordChiPengGang",
            json!({"seat": 3, "type": 1, "tiles": ["0p", "5p", "5p"], "froms": [3, 3, 1]}),
        ),
        wrapped(
            codec,
            "RecordDiscardTile",
            json!({"seat": 3, "tile": "1z"}),
        ),
        wrapped(
            codec,
            "RecordHule",
            json!({
                "hules": [{
                    "seat": 0, "zimo": false, "qinjia": true, "liqi": true,
                    "li_doras": ["2s"], "count": 2, "fu": 40, "point_rong": 3900,
                    "fans": [
                        {"name": "Riichi", "val": 1, "id": 2},
                        {"name": "White Dragon", "val": 1, "id": 7},
                        {"name": "Ura Dora", "val": 0, "id": 33}
                    ]
                }],
                "delta_scores": [4900, 0, 0, -3900]
            }),
        ),
    ]
}

fn head() -> Value {
    json!({
        "uuid": "231014-abc",
        "start_time": 1_700_000_000u32,
        "config": {"category": 2, "mode": {"mode": 2}, "meta": {"mode_id": 12}},
        "accounts": [
            {"account_id": 100, "seat": 0, "nickname": "Aki", "level": {"id": 10302, "score": 900}},
            {"account_id": 101, "seat": 1, "nickname": "Ren", "level": {"id": 10401, "score": 10}},
            {"account_id": 102, "seat": 2, "nickname": "Mio", "level": {"id": 10203, "score": 0}},
            {"account_id": 103, "seat": 3, "nickname": "Kai", "level": {"id": 10301, "score": 50}}
        ],
        "result": {"players": [
            {"seat": 1, "total_point": -5000, "part_point_1": 25000},
            {"seat": 0, "total_point": 45000, "part_point_1": 29900},
            {"seat": 3, "total_point": -25000, "part_point_1": 21100},
            {"seat": 2, "total_point": -15000, "part_point_1": 24000}
        ]}
    })
}

/// A `fetchGameRecord` response as it comes off the wire.
fn response(codec: &MessageCodec, details: Value) -> Value {
    let body = wire::encode(codec.schema(), ".lq.GameDetailRecords", &details).unwrap();
    let data = wire::encode_wrapper(".lq.GameDetailRecords", &body);
    let res = json!({"head": head(), "data": data});
    let bytes = wire::encode(codec.schema(), ".lq.ResGameRecord", &res).unwrap();
    codec.decode_type(".lq.ResGameRecord", &bytes).unwrap()
}

fn action_format(codec: &MessageCodec) -> Value {
    let mut actions: Vec<Value> = east_one(codec)
        .into_iter()
        .map(|r| json!({"type": 1, "result": r}))
        .collect();
    // Player-input-only actions carry no result.
    actions.insert(2, json!({"type": 2, "passed": 1200}));
    response(codec, json!({"version": 210715, "actions": actions}))
}

fn record_format(codec: &MessageCodec) -> Value {
    response(codec, json!({"version": 210000, "records": east_one(codec)}))
}

// =========================================================================
// Unwrapping
// =========================================================================

#[test]
fn test_action_format_skips_empty_results() {
    let codec = fixtures::codec();
    let record = GameRecord::from_response(&codec, &action_format(&codec)).unwrap();

    let types: Vec<&str> = record.records.iter().map(|r| r.type_name.as_str()).collect();
    assert_eq!(
        types,
        [
            "RecordNewRound",
            "RecordDiscardTile",
            "RecordDealTile",
            "RecordDiscardTile",
            "RecordChiPengGang",
            "RecordDiscardTile",
            "RecordHule"
        ]
    );
    assert_eq!(record.head.uuid, "231014-abc");
}

#[test]
fn test_record_format_matches_action_format() {
    let codec = fixtures::codec();
    let old = GameRecord::from_response(&codec, &record_format(&codec)).unwrap();
    let new = GameRecord::from_response(&codec, &action_format(&codec)).unwrap();
    assert_eq!(old.records, new.records);
}

#[test]
fn test_missing_data_is_an_error() {
    let codec = fixtures::codec();
    let res = json!({"head": {"uuid": "231014-abc"}, "data_url": "https://example.invalid/rec"});
    let err = GameRecord::from_response(&codec, &res).unwrap_err();
    assert!(matches!(err, ReplayError::MissingData { ref uuid } if uuid == "231014-abc"));
}

#[test]
fn test_unknown_record_type_fails_the_record() {
    let codec = fixtures::codec();
    let mystery = wire::encode_wrapper(".lq.RecordMystery", &[]);
    let res = response(&codec, json!({"version": 210715, "actions": [{"result": mystery}]}));
    let err = GameRecord::from_response(&codec, &res).unwrap_err();
    assert!(matches!(err, ReplayError::Protocol(_)));
}

// =========================================================================
// Fetching
// =========================================================================

#[tokio::test]
async fn test_fetch_tenhou_focuses_viewer_seat() {
    let codec = fixtures::codec();
    let server = RecordServer::new(action_format(&codec));
    let fetcher = ReplayFetcher::new(server.clone(), codec, "web-0.11.8");

    let link = format!("231014-abc_a{}", encode_account_id(101));
    let log = fetcher.fetch_tenhou(&link).await.unwrap();

    assert_eq!(server.requested_uuids(), ["231014-abc"]);
    assert_eq!(log["_target_actor"], 1);
    assert_eq!(log["ref"], "231014-abc");
}

#[tokio::test]
async fn test_fetch_tenhou_decodes_rotated_log_id() {
    let codec = fixtures::codec();
    let server = RecordServer::new(action_format(&codec));
    let fetcher = ReplayFetcher::new(server.clone(), codec, "web-0.11.8");

    let link = format!("{}_a{}_2", encode_log_id("231014-abc"), encode_account_id(103));
    let log = fetcher.fetch_tenhou(&link).await.unwrap();

    assert_eq!(server.requested_uuids(), ["231014-abc"]);
    assert_eq!(log["_target_actor"], 3);
}

#[tokio::test]
async fn test_fetch_tenhou_without_viewer_has_no_focus() {
    let codec = fixtures::codec();
    let fetcher = ReplayFetcher::new(RecordServer::new(action_format(&codec)), codec, "v");

    let log = fetcher.fetch_tenhou("231014-abc").await.unwrap();
    assert!(log.get("_target_actor").is_none());

    // A viewer who didn't play leaves no focus either.
    let log = fetcher.fetch_tenhou("231014-abc_555").await.unwrap();
    assert!(log.get("_target_actor").is_none());
}

#[tokio::test]
async fn test_fetch_passes_client_version() {
    let codec = fixtures::codec();
    let server = RecordServer::new(action_format(&codec));
    let fetcher = ReplayFetcher::new(server.clone(), codec, "web-0.11.8");
    fetcher.fetch("231014-abc").await.unwrap();

    let calls = server.calls.lock().unwrap().clone();
    assert_eq!(calls[0]["client_version_string"], "web-0.11.8");
}

#[tokio::test]
async fn test_fetch_remote_error_surfaces() {
    let codec = fixtures::codec();
    let server = RecordServer::new(json!({"error": {"code": 1203}}));
    let fetcher = ReplayFetcher::new(server, codec, "v");

    let err = fetcher.fetch("231014-abc").await.unwrap_err();
    assert!(matches!(err, ReplayError::Rpc(RpcError::Remote { code: 1203, .. })));
}

#[tokio::test]
async fn test_fetch_rejects_bad_match_id() {
    let codec = fixtures::codec();
    let server = RecordServer::new(json!({}));
    let fetcher = ReplayFetcher::new(server.clone(), codec, "v");

    let err = fetcher.fetch_tenhou("_a12").await.unwrap_err();
    assert!(matches!(err, ReplayError::InvalidMatchId(_)));
    assert!(server.requested_uuids().is_empty());
}

// =========================================================================
// tenhou.net/6 output
// =========================================================================

#[test]
fn test_tenhou_header() {
    let codec = fixtures::codec();
    let record = GameRecord::from_response(&codec, &action_format(&codec)).unwrap();
    let log = record.to_tenhou(None).unwrap();

    assert_eq!(log["title"], json!(["Jade South (4P)", "2023/11/14 22:13:20"]));
    assert_eq!(log["name"], json!(["Aki", "Ren", "Mio", "Kai"]));
    assert_eq!(log["ratingc"], "PF4");
    assert_eq!(log["dan"][0], "Expert 2");
    assert_eq!(log["dan"][1], "Master 1");
    assert_eq!(
        log["sc"],
        json!([29900, 45.0, 25000, -5.0, 24000, -15.0, 21100, -25.0])
    );
    assert_eq!(log["rule"]["aka51"], 1);
}

#[test]
fn test_tenhou_round_body() {
    let codec = fixtures::codec();
    let record = GameRecord::from_response(&codec, &action_format(&codec)).unwrap();
    let log = record.to_tenhou(None).unwrap();

    let rounds = log["log"].as_array().unwrap();
    assert_eq!(rounds.len(), 1);
    let round = &rounds[0];

    assert_eq!(round[0], json!([0, 0, 0]));
    assert_eq!(round[1], json!([25000, 25000, 25000, 25000]));
    assert_eq!(round[2], json!([11]));
    assert_eq!(round[3], json!([32]));

    // Dealer: thirteen dealt, the fourteenth as first draw.
    assert_eq!(round[4].as_array().unwrap().len(), 13);
    assert_eq!(round[5], json!([47]));
    assert_eq!(round[6], json!(["r19"]));

    // Seat 1 draws and throws it straight back.
    assert_eq!(round[8], json!([25]));
    assert_eq!(round[9], json!([60]));

    // Seat 3 pons seat 1's five from across.
    assert_eq!(round[14], json!(["52p2525"]));
    assert_eq!(round[15], json!([41]));

    assert_eq!(
        round[16],
        json!([
            "和了",
            [4900, 0, 0, -3900],
            [0, 3, 0, "40符2飜3900点", "立直(1飜)", "役牌 白(1飜)"]
        ])
    );
}

fn kan_round() -> Vec<Action> {
    let four = |tile: &str| vec![tile.to_string(); 13];
    vec![
        Action::NewRound(RecordNewRound {
            chang: 1,
            ju: 2,
            ben: 1,
            tiles0: four("1z"),
            tiles1: four("2z"),
            tiles2: [four("3z"), vec!["3z".to_string()]].concat(),
            tiles3: four("4z"),
            dora: "5z".into(),
            scores: vec![30000, 20000, 25000, 25000],
            liqibang: 1,
            ..Default::default()
        }),
        Action::ChiPengGang(RecordChiPengGang {
            seat: 3,
            kind: 1,
            tiles: hand(&["6z", "6z", "6z"]),
            froms: vec![3, 3, 2],
        }),
        Action::AnGangAddGang(RecordAnGangAddGang {
            seat: 3,
            kind: 2,
            tiles: "6z".into(),
            doras: hand(&["5z", "1p"]),
        }),
        Action::AnGangAddGang(RecordAnGangAddGang {
            seat: 0,
            kind: 3,
            tiles: "0s".into(),
            doras: vec![],
        }),
        Action::ChiPengGang(RecordChiPengGang {
            seat: 1,
            kind: 2,
            tiles: hand(&["7z", "7z", "7z", "7z"]),
            froms: vec![1, 1, 1, 0],
        }),
        Action::ChiPengGang(RecordChiPengGang {
            seat: 2,
            kind: 0,
            tiles: hand(&["3m", "4m", "2m"]),
            froms: vec![2, 2, 1],
        }),
        Action::LiuJu(RecordLiuJu {
            kind: 3,
            gameend: false,
        }),
    ]
}

#[test]
fn test_tenhou_calls_and_kans() {
    let head: RecordGame = serde_json::from_value(head()).unwrap();
    let log = to_tenhou(&head, &kan_round()).unwrap();
    let round = &log["log"][0];

    assert_eq!(round[0], json!([6, 1, 1]));
    assert_eq!(round[2], json!([45, 21]));

    // South 3: seat 2 deals.
    assert_eq!(round[10].as_array().unwrap().len(), 13);
    assert_eq!(round[11], json!([43, "c121314"]));

    // Seat 3's pon from the left, later upgraded.
    assert_eq!(round[14], json!(["p464646"]));
    assert_eq!(round[15], json!(["k46464646"]));

    // Closed kan with the red five shown last.
    assert_eq!(round[6], json!(["353535a53"]));

    // Open kan on the discard of seat 0, which sits on seat 1's left.
    assert_eq!(round[8], json!(["m47474747"]));
    assert_eq!(round[9], json!([0]));

    assert_eq!(round[16], json!(["四槓散了"]));
}

#[test]
fn test_tenhou_exhaustive_draw_sums_payments() {
    let head: RecordGame = serde_json::from_value(head()).unwrap();
    let mut actions = kan_round();
    actions.truncate(1);
    actions.push(Action::NoTile(RecordNoTile {
        liujumanguan: false,
        scores: vec![NoTileScoreInfo {
            seat: 0,
            delta_scores: vec![1500, -1500, 1500, -1500],
        }],
        gameend: false,
    }));

    let log = to_tenhou(&head, &actions).unwrap();
    assert_eq!(log["log"][0][16], json!(["流局", [1500, -1500, 1500, -1500]]));
}
