//! The login handshake.
//!
//! ```text
//! oauth2Check ──has_account──→ oauth2Login ──account_id──→ loginBeat
//!      │                                                       │
//!      └─ no account: wait, check once more, then give up      └─ done
//! ```
//!
//! Runs over any [`Caller`], so it can be driven by a scripted caller in
//! tests without a live connection.

use std::time::Duration;

use majsoul_protocol::lobby::{methods, ResCommon, ResLogin, ResOauth2Check};
use majsoul_rpc::{Caller, LobbyExt, RpcError};
use majsoul_social::AccountLabel;
use rand::Rng;
use serde_json::{json, Value};

use crate::config::client_version_string;
use crate::SessionError;

/// Fixed contract string the web client acknowledges after login.
pub const LOGIN_BEAT_CONTRACT: &str = "DF2vkXCnfeXp4WoGSBGNcJBufZiMN3UP";

/// Logs in with `token` and returns the account it belongs to.
///
/// `version` is the resource version from bootstrap. If the server says
/// the token has no account yet, waits `retry_delay` and checks exactly
/// once more.
///
/// # Errors
/// [`SessionError::Authentication`] if any step is refused, or
/// [`SessionError::Rpc`] if the connection fails underneath.
pub async fn authenticate<P: Caller>(
    caller: &P,
    token: &str,
    version: &str,
    retry_delay: Duration,
) -> Result<AccountLabel, SessionError> {
    if !check_token(caller, token).await? {
        tracing::info!(?retry_delay, "token has no account yet, retrying once");
        tokio::time::sleep(retry_delay).await;
        if !check_token(caller, token).await? {
            return Err(SessionError::Authentication(
                "access token has no linked account".into(),
            ));
        }
    }

    let login: ResLogin = caller
        .call_checked(methods::OAUTH2_LOGIN, login_request(token, version))
        .await
        .map_err(refused("oauth2Login"))?;
    if login.account_id == 0 {
        return Err(SessionError::Authentication(
            "login returned no account id".into(),
        ));
    }

    let _: ResCommon = caller
        .call_checked(
            methods::LOGIN_BEAT,
            json!({ "contract": LOGIN_BEAT_CONTRACT }),
        )
        .await
        .map_err(refused("loginBeat"))?;

    let account = AccountLabel {
        account_id: login.account_id,
        nickname: login.account.nickname,
    };
    tracing::info!(
        account_id = account.account_id,
        nickname = %account.nickname,
        "logged in"
    );
    Ok(account)
}

async fn check_token<P: Caller>(caller: &P, token: &str) -> Result<bool, SessionError> {
    let check: ResOauth2Check = caller
        .call_checked(
            methods::OAUTH2_CHECK,
            json!({ "type": 0, "access_token": token }),
        )
        .await
        .map_err(refused("oauth2Check"))?;
    Ok(check.has_account)
}

/// Server refusals become authentication failures; connection trouble
/// stays an RPC error.
fn refused(step: &'static str) -> impl Fn(RpcError) -> SessionError {
    move |e| match e {
        RpcError::Remote { code, .. } => {
            SessionError::Authentication(format!("{step} refused with error code {code}"))
        }
        other => SessionError::Rpc(other),
    }
}

fn login_request(token: &str, version: &str) -> Value {
    json!({
        "type": 0,
        "access_token": token,
        "reconnect": false,
        "device": {
            "platform": "pc",
            "hardware": "pc",
            "os": "windows",
            "os_version": "win10",
            "is_browser": true,
            "software": "Chrome",
            "sale_platform": "web",
        },
        "random_key": generate_nonce(),
        "client_version": { "resource": version },
        "currency_platforms": [],
        "client_version_string": client_version_string(version),
    })
}

/// 16 random bytes as 32 lowercase hex characters.
fn generate_nonce() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
