use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serenity::all::{ChannelId, GuildId, Http};
use serenity::builder::CreateMessage;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::AuthConfig;
use crate::db::{Category, Panel};

pub mod panel;

pub use self::panel::PanelLayout;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("discord request timed out during {0}")]
    Timeout(&'static str),
    #[error("discord api error: {0}")]
    Api(String),
    #[error("invalid discord id {0:?}")]
    InvalidId(String),
    #[error("panel {0} has no target channel")]
    MissingChannel(i64),
}

/// Posts a ticket panel and returns the created message id.
#[async_trait]
pub trait PanelPublisher: Send + Sync {
    async fn post_panel(&self, panel: &Panel, categories: &[Category])
    -> Result<String, PlatformError>;
}

/// Bot-credential calls against the Discord REST API. No gateway connection.
#[derive(Clone)]
pub struct DiscordClient {
    http: Arc<Http>,
    guild_id: GuildId,
    timeout: Duration,
}

impl DiscordClient {
    pub fn new(config: &AuthConfig) -> Self {
        info!("initializing discord client guild_id={}", config.guild_id);
        Self {
            http: Arc::new(Http::new(&config.bot_token)),
            guild_id: GuildId::new(config.guild_id),
            timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }

    pub async fn guild_owner_id(&self) -> Result<u64, PlatformError> {
        let guild = tokio::time::timeout(self.timeout, self.http.get_guild(self.guild_id))
            .await
            .map_err(|_| PlatformError::Timeout("guild lookup"))?
            .map_err(|e| PlatformError::Api(e.to_string()))?;

        debug!("guild {} is owned by {}", self.guild_id, guild.owner_id);
        Ok(guild.owner_id.get())
    }
}

#[async_trait]
impl PanelPublisher for DiscordClient {
    async fn post_panel(
        &self,
        panel: &Panel,
        categories: &[Category],
    ) -> Result<String, PlatformError> {
        let channel_id = panel
            .channel_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or(PlatformError::MissingChannel(panel.id))?;
        let channel_id_num: u64 = channel_id
            .trim()
            .parse()
            .ok()
            .filter(|id| *id != 0)
            .ok_or_else(|| PlatformError::InvalidId(channel_id.to_string()))?;

        let layout = PanelLayout::build(panel, categories);
        let message = CreateMessage::new()
            .embed(layout.to_embed())
            .components(layout.to_components());

        let sent = tokio::time::timeout(
            self.timeout,
            ChannelId::new(channel_id_num).send_message(self.http.as_ref(), message),
        )
        .await
        .map_err(|_| PlatformError::Timeout("panel post"))?
        .map_err(|e| PlatformError::Api(e.to_string()))?;

        info!(
            "posted panel {} to channel {}, message_id={}",
            panel.id, channel_id, sent.id
        );
        Ok(sent.id.to_string())
    }
}
