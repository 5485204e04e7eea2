use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

use crate::config::{ToggleBackend, TogglesConfig};
use crate::db::SettingsStore;

pub mod file;
pub mod settings;

pub use self::file::FileKvStore;
pub use self::settings::SettingsKvStore;

#[derive(Debug, Error)]
pub enum ToggleError {
    #[error("unknown subsystem {0:?}")]
    UnknownSubsystem(String),
    #[error("toggle storage failed: {0}")]
    Storage(String),
}

/// String key/value persistence shared by flag backends.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, ToggleError>;
    async fn put(&self, key: &str, value: &str) -> Result<(), ToggleError>;
}

/// On/off switches for bot subsystems. Only names listed in config are accepted.
pub struct ToggleStore {
    store: Arc<dyn KeyValueStore>,
    defaults: BTreeMap<String, bool>,
    write_lock: Mutex<()>,
}

impl ToggleStore {
    pub fn new(store: Arc<dyn KeyValueStore>, defaults: BTreeMap<String, bool>) -> Self {
        Self {
            store,
            defaults,
            write_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &TogglesConfig, settings: Arc<dyn SettingsStore>) -> Self {
        let store: Arc<dyn KeyValueStore> = match config.backend {
            ToggleBackend::File => Arc::new(FileKvStore::new(&config.path)),
            ToggleBackend::Database => Arc::new(SettingsKvStore::new(settings, "subsystem.")),
        };
        info!(
            "toggle store backend={:?} subsystems={:?}",
            config.backend,
            config.subsystems.keys().collect::<Vec<_>>()
        );
        Self::new(store, config.subsystems.clone())
    }

    pub async fn status(&self) -> Result<BTreeMap<String, bool>, ToggleError> {
        let mut flags = BTreeMap::new();
        for (name, default) in &self.defaults {
            flags.insert(name.clone(), self.read(name, *default).await?);
        }
        Ok(flags)
    }

    pub async fn get(&self, name: &str) -> Result<bool, ToggleError> {
        let default = self.default_for(name)?;
        self.read(name, default).await
    }

    pub async fn toggle(&self, name: &str) -> Result<bool, ToggleError> {
        let default = self.default_for(name)?;
        let _guard = self.write_lock.lock().await;
        let enabled = !self.read(name, default).await?;
        self.store.put(name, bool_str(enabled)).await?;
        info!("subsystem toggled name={} enabled={}", name, enabled);
        Ok(enabled)
    }

    pub async fn set(&self, name: &str, enabled: bool) -> Result<bool, ToggleError> {
        self.default_for(name)?;
        let _guard = self.write_lock.lock().await;
        self.store.put(name, bool_str(enabled)).await?;
        info!("subsystem set name={} enabled={}", name, enabled);
        Ok(enabled)
    }

    fn default_for(&self, name: &str) -> Result<bool, ToggleError> {
        self.defaults
            .get(name)
            .copied()
            .ok_or_else(|| ToggleError::UnknownSubsystem(name.to_string()))
    }

    async fn read(&self, name: &str, default: bool) -> Result<bool, ToggleError> {
        Ok(match self.store.get(name).await?.as_deref() {
            Some("true") => true,
            Some("false") => false,
            _ => default,
        })
    }
}

fn bool_str(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}
