//! Where access tokens come from.
//!
//! The session layer doesn't persist tokens. It asks a [`CredentialStore`]
//! for them whenever it (re)starts, so whatever owns the tokens (a config
//! file, a database, environment variables) can change them between
//! restarts.

use std::future::Future;

/// Yields the access tokens of every tracked account.
///
/// # Example
///
/// ```rust
/// use majsoul_session::CredentialStore;
///
/// struct EnvCredentials;
///
/// impl CredentialStore for EnvCredentials {
///     async fn tokens(&self) -> Vec<String> {
///         std::env::var("MAJSOUL_TOKENS")
///             .map(|v| v.split(',').map(str::to_string).collect())
///             .unwrap_or_default()
///     }
/// }
/// ```
pub trait CredentialStore: Send + Sync + 'static {
    /// All stored tokens, one per account. An empty list is not an error
    /// here; the manager decides what that means.
    fn tokens(&self) -> impl Future<Output = Vec<String>> + Send;
}

/// A fixed token list.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials(pub Vec<String>);

impl StaticCredentials {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(tokens.into_iter().map(Into::into).collect())
    }
}

impl CredentialStore for StaticCredentials {
    async fn tokens(&self) -> Vec<String> {
        self.0
            .iter()
            .filter(|t| !t.trim().is_empty())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_credentials_skips_blank_tokens() {
        let store = StaticCredentials::new(["abc", "", "  ", "def"]);
        assert_eq!(store.tokens().await, vec!["abc", "def"]);
    }
}
