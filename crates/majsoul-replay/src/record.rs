//! Typed views of a fetched match record.
//!
//! The header is read straight out of `ResGameRecord.head`. The body is a
//! list of [`WrappedRecord`]s that [`Action::from_record`] sorts into the
//! handful of record types the transcoder understands.

use majsoul_protocol::lobby::{AccountLevel, GameMetaData};
use majsoul_protocol::WrappedRecord;
use serde::{Deserialize, Serialize};

use crate::ReplayError;

/// The raw `fetchGameRecord` answer: header plus the enveloped body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ResGameRecord {
    pub head: RecordGame,
    pub data: Vec<u8>,
    pub data_url: String,
}

/// `GameDetailRecords`: the body once both wrappers are peeled.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct GameDetailRecords {
    pub records: Vec<Vec<u8>>,
    pub version: u32,
    pub actions: Vec<GameAction>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct GameAction {
    pub result: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordGame {
    pub uuid: String,
    pub start_time: u32,
    pub end_time: u32,
    pub config: GameConfig,
    pub accounts: Vec<AccountInfo>,
    pub result: GameEndResult,
}

impl RecordGame {
    /// The seat `account_id` sat in, if they played this match.
    pub fn seat_of(&self, account_id: u64) -> Option<u32> {
        self.accounts
            .iter()
            .find(|a| u64::from(a.account_id) == account_id)
            .map(|a| a.seat)
    }

    /// Seats at the table: 3 for sanma, otherwise 4.
    pub fn player_count(&self) -> usize {
        if self.config.mode.mode / 10 == 1 || self.accounts.len() == 3 {
            3
        } else {
            4
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub category: u32,
    pub mode: GameMode,
    pub meta: GameMetaData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameMode {
    pub mode: u32,
    pub detail_rule: GameDetailRule,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameDetailRule {
    pub dora_count: u32,
    pub init_point: u32,
    pub fandian: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountInfo {
    pub account_id: u32,
    pub seat: u32,
    pub nickname: String,
    pub level: AccountLevel,
    pub level3: AccountLevel,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameEndResult {
    pub players: Vec<PlayerItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerItem {
    pub seat: u32,
    pub total_point: i32,
    pub part_point_1: i32,
    pub grading_score: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RecordNewRound {
    pub chang: u32,
    pub ju: u32,
    pub ben: u32,
    pub tiles0: Vec<String>,
    pub tiles1: Vec<String>,
    pub tiles2: Vec<String>,
    pub tiles3: Vec<String>,
    /// Single indicator, as written by older clients.
    pub dora: String,
    pub doras: Vec<String>,
    pub scores: Vec<i32>,
    pub liqibang: u32,
}

impl RecordNewRound {
    pub fn hand(&self, seat: usize) -> &[String] {
        match seat {
            0 => &self.tiles0,
            1 => &self.tiles1,
            2 => &self.tiles2,
            3 => &self.tiles3,
            _ => &[],
        }
    }

    pub fn dora_indicators(&self) -> Vec<String> {
        if !self.doras.is_empty() {
            self.doras.clone()
        } else if !self.dora.is_empty() {
            vec![self.dora.clone()]
        } else {
            Vec::new()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RecordDealTile {
    pub seat: u32,
    pub tile: String,
    pub doras: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RecordDiscardTile {
    pub seat: u32,
    pub tile: String,
    pub is_liqi: bool,
    pub is_wliqi: bool,
    pub moqie: bool,
    pub doras: Vec<String>,
}

/// Chi (0), pon (1) or open kan (2) on another player's discard.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RecordChiPengGang {
    pub seat: u32,
    #[serde(rename = "type")]
    pub kind: u32,
    pub tiles: Vec<String>,
    pub froms: Vec<u32>,
}

/// Added kan (2) or closed kan (3).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RecordAnGangAddGang {
    pub seat: u32,
    #[serde(rename = "type")]
    pub kind: u32,
    pub tiles: String,
    pub doras: Vec<String>,
}

/// North tile set aside in 3-player.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RecordBaBei {
    pub seat: u32,
    pub moqie: bool,
    pub doras: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FanInfo {
    pub name: String,
    pub val: u32,
    pub id: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct HuleInfo {
    pub seat: u32,
    pub zimo: bool,
    /// Winner is the dealer.
    pub qinjia: bool,
    pub liqi: bool,
    pub li_doras: Vec<String>,
    pub yiman: bool,
    pub count: u32,
    pub fans: Vec<FanInfo>,
    pub fu: u32,
    pub point_rong: u32,
    pub point_zimo_qin: u32,
    pub point_zimo_xian: u32,
    /// Seat plus one of the player liable for a yakuman, zero when none.
    pub baopai: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RecordHule {
    pub hules: Vec<HuleInfo>,
    pub delta_scores: Vec<i32>,
    pub scores: Vec<i32>,
    pub gameend: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct NoTileScoreInfo {
    pub seat: u32,
    pub delta_scores: Vec<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RecordNoTile {
    pub liujumanguan: bool,
    pub scores: Vec<NoTileScoreInfo>,
    pub gameend: bool,
}

/// Abortive draw.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RecordLiuJu {
    #[serde(rename = "type")]
    pub kind: u32,
    pub gameend: bool,
}

/// One transcript entry, sorted by record type.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    NewRound(RecordNewRound),
    DealTile(RecordDealTile),
    DiscardTile(RecordDiscardTile),
    ChiPengGang(RecordChiPengGang),
    AnGangAddGang(RecordAnGangAddGang),
    BaBei(RecordBaBei),
    Hule(RecordHule),
    NoTile(RecordNoTile),
    LiuJu(RecordLiuJu),
    /// A record type the transcoder has no use for.
    Other(String),
}

impl Action {
    pub fn from_record(record: &WrappedRecord) -> Result<Self, ReplayError> {
        let payload = record.payload.clone();
        Ok(match record.type_name.as_str() {
            "RecordNewRound" => Self::NewRound(serde_json::from_value(payload)?),
            "RecordDealTile" => Self::DealTile(serde_json::from_value(payload)?),
            "RecordDiscardTile" => Self::DiscardTile(serde_json::from_value(payload)?),
            "RecordChiPengGang" => Self::ChiPengGang(serde_json::from_value(payload)?),
            "RecordAnGangAddGang" => Self::AnGangAddGang(serde_json::from_value(payload)?),
            "RecordBaBei" => Self::BaBei(serde_json::from_value(payload)?),
            "RecordHule" => Self::Hule(serde_json::from_value(payload)?),
            "RecordNoTile" => Self::NoTile(serde_json::from_value(payload)?),
            "RecordLiuJu" => Self::LiuJu(serde_json::from_value(payload)?),
            other => Self::Other(other.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_from_record_sorts_by_type() {
        let record = WrappedRecord {
            type_name: "RecordDiscardTile".into(),
            payload: json!({"seat": 2, "tile": "0p", "moqie": true}),
        };
        let Action::DiscardTile(discard) = Action::from_record(&record).unwrap() else {
            panic!("expected a discard");
        };
        assert_eq!(discard.seat, 2);
        assert_eq!(discard.tile, "0p");
        assert!(discard.moqie);
        assert!(!discard.is_liqi);
    }

    #[test]
    fn test_from_record_keeps_unknown_types() {
        let record = WrappedRecord {
            type_name: "RecordSelectGap".into(),
            payload: json!({}),
        };
        assert_eq!(
            Action::from_record(&record).unwrap(),
            Action::Other("RecordSelectGap".into())
        );
    }

    #[test]
    fn test_old_single_dora_field() {
        let round = RecordNewRound {
            dora: "3m".into(),
            ..Default::default()
        };
        assert_eq!(round.dora_indicators(), vec!["3m".to_string()]);
    }

    #[test]
    fn test_seat_of_and_player_count() {
        let head: RecordGame = serde_json::from_value(json!({
            "config": {"mode": {"mode": 12}},
            "accounts": [
                {"account_id": 7, "seat": 2},
                {"account_id": 8, "seat": 0},
                {"account_id": 9, "seat": 1}
            ]
        }))
        .unwrap();
        assert_eq!(head.seat_of(7), Some(2));
        assert_eq!(head.seat_of(70), None);
        assert_eq!(head.player_count(), 3);
    }
}
