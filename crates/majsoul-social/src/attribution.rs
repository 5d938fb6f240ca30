//! Persistent match attribution: which friend led us to which match.
//!
//! The file is a flat JSON object, `{"<game uuid>": <account id>, ...}`.
//! Every update re-reads the file, amends one key and writes the whole map
//! back through a temporary file and a rename, so a crash mid-write leaves
//! the previous version intact. A missing or unparsable file reads as an
//! empty map.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::SocialError;

/// Match uuid → account id.
pub type Attributions = BTreeMap<String, u32>;

#[derive(Debug, Clone)]
pub struct AttributionStore {
    path: PathBuf,
}

impl AttributionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the current map, treating a missing or corrupt file as empty.
    pub async fn load(&self) -> Attributions {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Attributions::new(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "attribution file unreadable");
                return Attributions::new();
            }
        };
        serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            tracing::warn!(path = %self.path.display(), error = %e, "attribution file corrupt, starting over");
            Attributions::new()
        })
    }

    /// Records `game_uuid → account_id`, keeping every other entry.
    pub async fn record(&self, game_uuid: &str, account_id: u32) -> Result<(), SocialError> {
        let mut map = self.load().await;
        if map.get(game_uuid) == Some(&account_id) {
            return Ok(());
        }
        map.insert(game_uuid.to_string(), account_id);

        let body = serde_json::to_vec(&map).map_err(|e| self.io_error(e.into()))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &body)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        tracing::debug!(game_uuid, account_id, "attribution recorded");
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> SocialError {
        SocialError::Attribution {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = AttributionStore::new(dir.path().join("game_record.json"));
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_loads_empty_and_is_overwritten() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("game_record.json");
        std::fs::write(&path, b"{not json").unwrap();
        let store = AttributionStore::new(&path);

        assert!(store.load().await.is_empty());
        store.record("g-1", 5).await.unwrap();
        assert_eq!(store.load().await.get("g-1"), Some(&5));
    }

    #[tokio::test]
    async fn test_record_amends_existing_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("game_record.json");
        std::fs::write(&path, br#"{"old": 1}"#).unwrap();
        let store = AttributionStore::new(&path);

        store.record("new", 2).await.unwrap();
        let map = store.load().await;
        assert_eq!(map.get("old"), Some(&1));
        assert_eq!(map.get("new"), Some(&2));
    }

    #[tokio::test]
    async fn test_record_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let once = dir.path().join("once.json");
        let twice = dir.path().join("twice.json");

        AttributionStore::new(&once).record("g", 7).await.unwrap();
        let store = AttributionStore::new(&twice);
        store.record("g", 7).await.unwrap();
        store.record("g", 7).await.unwrap();

        assert_eq!(std::fs::read(&once).unwrap(), std::fs::read(&twice).unwrap());
    }
}
