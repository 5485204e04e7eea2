use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use super::AuthError;
use crate::config::AuthConfig;
use crate::discord::DiscordClient;

const OAUTH_SCOPES: &str = "identify guilds guilds.members.read";
const GET_ATTEMPTS: u32 = 2;

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub discriminator: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GuildMember {
    #[serde(default)]
    roles: Vec<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn authorize_url(&self, state: &str) -> String;
    async fn exchange_code(&self, code: &str) -> Result<SecretString, AuthError>;
    async fn fetch_user(&self, token: &SecretString) -> Result<ProviderUser, AuthError>;
    /// Empty when the user is not a member or the lookup fails.
    async fn fetch_member_roles(&self, token: &SecretString) -> Vec<u64>;
    /// `None` when the owner cannot be resolved.
    async fn guild_owner_id(&self) -> Option<u64>;
}

pub struct DiscordIdentityProvider {
    http: reqwest::Client,
    api_base_url: String,
    authorize_base: Url,
    client_id: String,
    client_secret: SecretString,
    redirect_uri: String,
    guild_id: u64,
    platform: Arc<DiscordClient>,
}

impl DiscordIdentityProvider {
    pub fn new(config: &AuthConfig, platform: Arc<DiscordClient>) -> Result<Self> {
        let api_base_url = config.api_base_url.trim_end_matches('/').to_string();
        let authorize_base = Url::parse(&format!("{api_base_url}/oauth2/authorize"))
            .with_context(|| format!("invalid auth.api_base_url {}", config.api_base_url))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("failed to build oauth http client")?;

        Ok(Self {
            http,
            api_base_url,
            authorize_base,
            client_id: config.client_id.clone(),
            client_secret: SecretString::from(config.client_secret.clone()),
            redirect_uri: config.redirect_uri.clone(),
            guild_id: config.guild_id,
            platform,
        })
    }

    /// GET with one retry on transport failure or a 5xx answer.
    async fn get_with_retry(
        &self,
        url: &str,
        token: &SecretString,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let mut attempt = 1;
        loop {
            let result = self
                .http
                .get(url)
                .bearer_auth(token.expose_secret())
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_server_error() && attempt < GET_ATTEMPTS => {
                    warn!("provider returned {} for {}, retrying", response.status(), url);
                }
                Err(err) if attempt < GET_ATTEMPTS => {
                    warn!("provider request to {} failed: {}, retrying", url, err);
                }
                other => return other,
            }
            attempt += 1;
        }
    }
}

#[async_trait]
impl IdentityProvider for DiscordIdentityProvider {
    fn authorize_url(&self, state: &str) -> String {
        let mut url = self.authorize_base.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", OAUTH_SCOPES)
            .append_pair("state", state);
        url.to_string()
    }

    async fn exchange_code(&self, code: &str) -> Result<SecretString, AuthError> {
        let response = self
            .http
            .post(format!("{}/oauth2/token", self.api_base_url))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.expose_secret()),
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AuthError::provider("token exchange", None, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::provider(
                "token exchange",
                Some(status.as_u16()),
                body,
            ));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| {
                AuthError::provider("token exchange", Some(status.as_u16()), e.to_string())
            })?;
        Ok(SecretString::from(token.access_token))
    }

    async fn fetch_user(&self, token: &SecretString) -> Result<ProviderUser, AuthError> {
        let url = format!("{}/users/@me", self.api_base_url);
        let response = self
            .get_with_retry(&url, token)
            .await
            .map_err(|e| AuthError::provider("user lookup", None, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::provider("user lookup", Some(status.as_u16()), body));
        }

        response
            .json::<ProviderUser>()
            .await
            .map_err(|e| AuthError::provider("user lookup", Some(status.as_u16()), e.to_string()))
    }

    async fn fetch_member_roles(&self, token: &SecretString) -> Vec<u64> {
        let url = format!(
            "{}/users/@me/guilds/{}/member",
            self.api_base_url, self.guild_id
        );
        let response = match self.get_with_retry(&url, token).await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                debug!("guild member lookup returned {}", response.status());
                return Vec::new();
            }
            Err(err) => {
                warn!("guild member lookup failed: {}", err);
                return Vec::new();
            }
        };

        match response.json::<GuildMember>().await {
            Ok(member) => parse_role_ids(&member.roles),
            Err(err) => {
                warn!("guild member payload unreadable: {}", err);
                Vec::new()
            }
        }
    }

    async fn guild_owner_id(&self) -> Option<u64> {
        match self.platform.guild_owner_id().await {
            Ok(owner) => Some(owner),
            Err(err) => {
                warn!("guild owner lookup failed guild_id={}: {}", self.guild_id, err);
                None
            }
        }
    }
}

fn parse_role_ids(raw: &[String]) -> Vec<u64> {
    raw.iter().filter_map(|role| role.parse().ok()).collect()
}

#[cfg(test)]
mod tests {
    use super::parse_role_ids;

    #[test]
    fn unparsable_role_ids_are_skipped() {
        let raw = vec![
            "1365633918593794079".to_string(),
            "not-a-role".to_string(),
            "".to_string(),
            "42".to_string(),
        ];
        assert_eq!(parse_role_ids(&raw), vec![1365633918593794079, 42]);
    }
}
