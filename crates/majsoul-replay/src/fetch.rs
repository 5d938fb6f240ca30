//! Fetching a match record and peeling its envelopes.
//!
//! `ResGameRecord.data` is a `Wrapper` around `GameDetailRecords`, whose
//! entries are themselves self-describing `Wrapper`s. Older records keep
//! them in a flat `records` list; newer ones hang them off
//! `actions[].result`, leaving `result` empty for actions that only carry
//! player input.

use std::sync::Arc;

use majsoul_protocol::{wire, MessageCodec, WrappedRecord};
use majsoul_rpc::{Caller, LobbyExt};
use serde_json::Value;

use crate::record::{Action, GameDetailRecords, RecordGame, ResGameRecord};
use crate::{tenhou, MatchId, ReplayError};

/// First `GameDetailRecords.version` that stores records under `actions`.
pub const ACTION_FORMAT_VERSION: u32 = 210_715;

const DETAIL_RECORDS: &str = ".lq.GameDetailRecords";

/// A fetched match: its header and the ordered transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct GameRecord {
    pub head: RecordGame,
    pub records: Vec<WrappedRecord>,
}

impl GameRecord {
    /// Unpacks a `fetchGameRecord` response.
    pub fn from_response(codec: &MessageCodec, response: &Value) -> Result<Self, ReplayError> {
        let res: ResGameRecord = serde_json::from_value(response.clone())?;
        if res.data.is_empty() {
            if !res.data_url.is_empty() {
                tracing::warn!(uuid = %res.head.uuid, url = %res.data_url, "record stored off-line");
            }
            return Err(ReplayError::MissingData {
                uuid: res.head.uuid,
            });
        }

        let (_, inner) = wire::decode_wrapper(&res.data)?;
        let details: GameDetailRecords =
            serde_json::from_value(codec.decode_type(DETAIL_RECORDS, &inner)?)?;

        let records = if details.version < ACTION_FORMAT_VERSION && !details.records.is_empty() {
            details
                .records
                .iter()
                .map(|r| codec.unwrap_record(r))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            details
                .actions
                .iter()
                .filter(|a| !a.result.is_empty())
                .map(|a| codec.unwrap_record(&a.result))
                .collect::<Result<Vec<_>, _>>()?
        };
        tracing::debug!(
            uuid = %res.head.uuid,
            version = details.version,
            records = records.len(),
            "game record unpacked"
        );

        Ok(Self {
            head: res.head,
            records,
        })
    }

    /// The transcript sorted into typed actions.
    pub fn actions(&self) -> Result<Vec<Action>, ReplayError> {
        self.records.iter().map(Action::from_record).collect()
    }

    /// Transcodes to tenhou.net/6, focusing `target_account`'s seat if they
    /// played.
    pub fn to_tenhou(&self, target_account: Option<u64>) -> Result<Value, ReplayError> {
        let mut log = tenhou::to_tenhou(&self.head, &self.actions()?)?;
        if let Some(seat) = target_account.and_then(|id| self.head.seat_of(id)) {
            log["_target_actor"] = seat.into();
        }
        Ok(log)
    }
}

/// Fetches match records over a lobby connection.
pub struct ReplayFetcher<P> {
    caller: P,
    codec: Arc<MessageCodec>,
    client_version_string: String,
}

impl<P: Caller> ReplayFetcher<P> {
    pub fn new(caller: P, codec: Arc<MessageCodec>, client_version_string: impl Into<String>) -> Self {
        Self {
            caller,
            codec,
            client_version_string: client_version_string.into(),
        }
    }

    /// Fetches and unpacks one record by its real log id.
    pub async fn fetch(&self, log_id: &str) -> Result<GameRecord, ReplayError> {
        let response = self
            .caller
            .fetch_game_record(log_id, &self.client_version_string)
            .await?;
        GameRecord::from_response(&self.codec, &response)
    }

    /// Resolves a replay-link match id and returns the tenhou.net/6 log.
    pub async fn fetch_tenhou(&self, match_id: &str) -> Result<Value, ReplayError> {
        let id = MatchId::parse(match_id)?;
        tracing::info!(%id, "fetching game record");
        let record = self.fetch(&id.log_id).await?;
        record.to_tenhou(id.target_account)
    }
}
