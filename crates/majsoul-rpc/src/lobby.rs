//! Typed lobby calls layered over any [`Caller`].

use std::future::Future;

use majsoul_protocol::lobby::{
    self, methods, GameLiveHead, ResCommon, ResFetchInfo, ResGameLiveList, ResMultiAccountBrief,
    ResServerTime,
};
use majsoul_transport::Connection;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::{RpcConnection, RpcError};

/// Live-game filters polled by [`LobbyExt::fetch_live_games`].
pub const LIVE_GAME_FILTERS: [u32; 3] = [216, 209, 212];

/// Anything that can issue a lobby call and wait for the raw response.
///
/// [`RpcConnection`] is the real implementation; tests substitute scripted
/// callers.
pub trait Caller: Send + Sync {
    fn call(
        &self,
        method: &str,
        payload: Value,
    ) -> impl Future<Output = Result<Value, RpcError>> + Send;
}

impl<C: Connection> Caller for RpcConnection<C> {
    fn call(
        &self,
        method: &str,
        payload: Value,
    ) -> impl Future<Output = Result<Value, RpcError>> + Send {
        RpcConnection::call(self, method, payload)
    }
}

/// Typed helpers for the lobby methods the client uses.
///
/// Every helper checks `error.code` and turns a non-zero code into
/// [`RpcError::Remote`].
pub trait LobbyExt: Caller {
    /// Calls `method` and reads the response into `T`.
    fn call_checked<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: Value,
    ) -> impl Future<Output = Result<T, RpcError>> + Send {
        async move {
            let response = self.call(method, payload).await?;
            let code = lobby::error_code(&response);
            if code != 0 {
                return Err(RpcError::Remote {
                    method: method.to_string(),
                    code,
                });
            }
            serde_json::from_value(response)
                .map_err(|e| RpcError::Protocol(e.into()))
        }
    }

    fn heartbeat(&self) -> impl Future<Output = Result<ResCommon, RpcError>> + Send {
        self.call_checked(methods::HEARTBEAT, json!({ "no_operation_counter": 0 }))
    }

    fn fetch_server_time(&self) -> impl Future<Output = Result<ResServerTime, RpcError>> + Send {
        self.call_checked(methods::FETCH_SERVER_TIME, json!({}))
    }

    /// Friend roster and pending applications.
    fn fetch_info(&self) -> impl Future<Output = Result<ResFetchInfo, RpcError>> + Send {
        self.call_checked(methods::FETCH_INFO, json!({}))
    }

    fn fetch_account_briefs(
        &self,
        account_ids: &[u32],
    ) -> impl Future<Output = Result<ResMultiAccountBrief, RpcError>> + Send {
        self.call_checked(
            methods::FETCH_MULTI_ACCOUNT_BRIEF,
            json!({ "account_id_list": account_ids }),
        )
    }

    fn accept_friend_application(
        &self,
        account_id: u32,
    ) -> impl Future<Output = Result<ResCommon, RpcError>> + Send {
        self.call_checked(
            methods::HANDLE_FRIEND_APPLY,
            json!({ "method": 1, "target_id": account_id }),
        )
    }

    /// Live games across the watched filters, concatenated in filter order.
    fn fetch_live_games(&self) -> impl Future<Output = Result<Vec<GameLiveHead>, RpcError>> + Send {
        async move {
            let mut games = Vec::new();
            for filter_id in LIVE_GAME_FILTERS {
                let list: ResGameLiveList = self
                    .call_checked(methods::FETCH_GAME_LIVE_LIST, json!({ "filter_id": filter_id }))
                    .await?;
                games.extend(list.live_list);
            }
            Ok(games)
        }
    }

    /// Raw `ResGameRecord`; the replay crate does the unwrapping.
    fn fetch_game_record(
        &self,
        game_uuid: &str,
        client_version_string: &str,
    ) -> impl Future<Output = Result<Value, RpcError>> + Send {
        let payload = json!({
            "game_uuid": game_uuid,
            "client_version_string": client_version_string,
        });
        async move {
            let response = self.call(methods::FETCH_GAME_RECORD, payload).await?;
            match lobby::error_code(&response) {
                0 => Ok(response),
                code => Err(RpcError::Remote {
                    method: methods::FETCH_GAME_RECORD.to_string(),
                    code,
                }),
            }
        }
    }
}

impl<T: Caller + ?Sized> LobbyExt for T {}
