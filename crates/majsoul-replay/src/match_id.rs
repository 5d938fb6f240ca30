//! Parsing of the composite match ids found in replay links.
//!
//! ```text
//! 231014-5e3f…          plain log id
//! 231014-5e3f…_a12345   plus the obfuscated account id of the viewer
//! 231014-5e3f…_a12345_2 log id itself rotated (link format version 2)
//! ```

use std::fmt;
use std::str::FromStr;

use majsoul_protocol::ids::{decode_account_id, decode_log_id};

use crate::ReplayError;

/// Link format flag marking a rotated log id.
const ROTATED_LOG_ID: &str = "2";

/// A parsed match id: the real log id plus an optional viewer account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchId {
    /// The log id as the server knows it (already un-rotated).
    pub log_id: String,
    /// Account whose seat the replay should focus on.
    ///
    /// Obfuscated ids are garbage-in garbage-out, so this stays `u64`
    /// rather than assuming the decoded value fits an account id.
    pub target_account: Option<u64>,
}

impl MatchId {
    pub fn parse(raw: &str) -> Result<Self, ReplayError> {
        let invalid = || ReplayError::InvalidMatchId(raw.to_string());

        let mut segments = raw.trim().split('_');
        let head = segments.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
        let marker = segments.next();
        let flag = segments.next();

        let log_id = if flag == Some(ROTATED_LOG_ID) {
            decode_log_id(head)
        } else {
            head.to_string()
        };

        let target_account = match marker {
            None | Some("") => None,
            Some(m) => Some(match m.strip_prefix('a') {
                Some(encoded) => decode_account_id(encoded.parse().map_err(|_| invalid())?),
                None => m.parse().map_err(|_| invalid())?,
            }),
        };

        Ok(Self {
            log_id,
            target_account,
        })
    }
}

impl FromStr for MatchId {
    type Err = ReplayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.log_id)?;
        if let Some(account) = self.target_account {
            write!(f, " (viewer {account})")?;
        }
        Ok(())
    }
}
