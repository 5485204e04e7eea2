use super::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub toggles: TogglesConfig,
    #[serde(default)]
    pub live: LiveConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Sliding session lifetime, renewed on every authenticated request.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    #[serde(default = "default_session_sweep_secs")]
    pub session_sweep_secs: u64,
    #[serde(default)]
    pub cookie_secure: bool,
    #[serde(default = "default_post_login_redirect")]
    pub post_login_redirect: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            session_ttl_secs: default_session_ttl_secs(),
            session_sweep_secs: default_session_sweep_secs(),
            cookie_secure: false,
            post_login_redirect: default_post_login_redirect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    pub bot_token: String,
    pub guild_id: u64,
    /// Staff role ids, highest privilege first. Order is informational only.
    #[serde(default)]
    pub allowed_roles: Vec<u64>,
    pub webhook_secret: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub expose_denial_details: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(alias = "console", default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub max_connections: Option<u32>,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl DatabaseConfig {
    pub fn connection_string(&self) -> String {
        if let Some(ref url) = self.url {
            url.clone()
        } else if let Some(ref file) = self.filename {
            format!("sqlite://{}", file)
        } else {
            String::new()
        }
    }

    pub fn sqlite_path(&self) -> Option<String> {
        let url = self.connection_string();
        if url.is_empty() {
            return None;
        }
        Some(url.strip_prefix("sqlite://").unwrap_or(&url).to_string())
    }

    pub fn max_connections(&self) -> u32 {
        self.max_connections.unwrap_or(1).max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToggleBackend {
    #[default]
    File,
    Database,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TogglesConfig {
    #[serde(default)]
    pub backend: ToggleBackend,
    #[serde(default = "default_toggles_path")]
    pub path: String,
    /// Known subsystems and the state they report before anyone flips them.
    #[serde(default = "default_subsystems")]
    pub subsystems: BTreeMap<String, bool>,
}

impl Default for TogglesConfig {
    fn default() -> Self {
        Self {
            backend: ToggleBackend::default(),
            path: default_toggles_path(),
            subsystems: default_subsystems(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LiveConfig {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Config = serde_yaml::from_str(content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.client_id.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "auth.client_id cannot be empty".to_string(),
            ));
        }

        if self.auth.bot_token.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "auth.bot_token cannot be empty".to_string(),
            ));
        }

        if self.auth.webhook_secret.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "auth.webhook_secret cannot be empty".to_string(),
            ));
        }

        if self.auth.guild_id == 0 {
            return Err(ConfigError::InvalidConfig(
                "auth.guild_id must be set".to_string(),
            ));
        }

        if self.auth.allowed_roles.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "auth.allowed_roles must list at least one role".to_string(),
            ));
        }

        if self.database.connection_string().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "database connection string cannot be empty".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigError::InvalidConfig(
                "server.port must be between 1 and 65535".to_string(),
            ));
        }

        if self.server.session_ttl_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "server.session_ttl_secs must be positive".to_string(),
            ));
        }

        if self.live.channel_capacity == 0 {
            return Err(ConfigError::InvalidConfig(
                "live.channel_capacity must be positive".to_string(),
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("DISCORD_CLIENT_ID") {
            self.auth.client_id = value;
        }
        if let Ok(value) = std::env::var("DISCORD_CLIENT_SECRET") {
            self.auth.client_secret = value;
        }
        if let Ok(value) = std::env::var("DISCORD_TOKEN") {
            self.auth.bot_token = value;
        }
        if let Ok(value) = std::env::var("DASHBOARD_WEBHOOK_SECRET") {
            self.auth.webhook_secret = value;
        }
        if let Ok(value) = std::env::var("DATABASE_URL") {
            self.database.url = Some(value);
        }
    }
}

fn default_port() -> u16 {
    5000
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_session_ttl_secs() -> u64 {
    3600
}

fn default_session_sweep_secs() -> u64 {
    300
}

fn default_post_login_redirect() -> String {
    "/api/me".to_string()
}

fn default_redirect_uri() -> String {
    "http://localhost:5000/callback".to_string()
}

fn default_api_base_url() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_toggles_path() -> String {
    "subsystems.json".to_string()
}

fn default_subsystems() -> BTreeMap<String, bool> {
    BTreeMap::from([
        ("autorole".to_string(), true),
        ("welcome".to_string(), true),
    ])
}

fn default_channel_capacity() -> usize {
    256
}
