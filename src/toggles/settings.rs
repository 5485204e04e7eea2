use std::sync::Arc;

use async_trait::async_trait;

use super::{KeyValueStore, ToggleError};
use crate::db::SettingsStore;

/// Keeps flags in the `settings` table under a fixed key prefix.
pub struct SettingsKvStore {
    settings: Arc<dyn SettingsStore>,
    prefix: String,
}

impl SettingsKvStore {
    pub fn new(settings: Arc<dyn SettingsStore>, prefix: impl Into<String>) -> Self {
        Self {
            settings,
            prefix: prefix.into(),
        }
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[async_trait]
impl KeyValueStore for SettingsKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, ToggleError> {
        self.settings
            .get_setting(&self.key(key))
            .await
            .map_err(|e| ToggleError::Storage(e.to_string()))
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), ToggleError> {
        self.settings
            .put_setting(&self.key(key), value)
            .await
            .map_err(|e| ToggleError::Storage(e.to_string()))
    }
}
