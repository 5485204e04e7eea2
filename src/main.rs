#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use secrecy::SecretString;
use tracing::{debug, error, info};

mod auth;
mod cli;
mod config;
mod db;
mod discord;
mod relay;
mod session;
mod toggles;
mod utils;
mod web;

use auth::{AccessPolicy, DiscordIdentityProvider};
use cli::Args;
use config::Config;
use discord::DiscordClient;
use relay::{EventBus, EventRelay};
use session::SessionManager;
use toggles::ToggleStore;
use web::{WebServer, WebState};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Arc::new(Config::load_from_file(&args.config)?);
    utils::logging::init_tracing(&config.logging);
    info!("ticket dashboard starting up config={}", args.config);

    let db_manager = Arc::new(db::DatabaseManager::new(&config.database).await?);
    db_manager.migrate().await?;
    if args.migrate_only {
        info!("migrations applied, exiting");
        return Ok(());
    }

    let discord_client = Arc::new(DiscordClient::new(&config.auth));
    let identity = Arc::new(DiscordIdentityProvider::new(
        &config.auth,
        discord_client.clone(),
    )?);

    let sessions = Arc::new(SessionManager::new(Duration::from_secs(
        config.server.session_ttl_secs,
    )));
    let relay = Arc::new(EventRelay::new(
        db_manager.ticket_store(),
        EventBus::new(config.live.channel_capacity),
    ));
    let toggles = Arc::new(ToggleStore::from_config(
        &config.toggles,
        db_manager.settings_store(),
    ));

    let state = WebState {
        config: config.clone(),
        db_manager: db_manager.clone(),
        sessions: sessions.clone(),
        policy: Arc::new(AccessPolicy::new(config.auth.allowed_roles.clone())),
        identity,
        publisher: discord_client,
        relay,
        toggles,
        webhook_secret: Arc::new(SecretString::from(config.auth.webhook_secret.clone())),
        started_at: Instant::now(),
    };

    let sweep_every = Duration::from_secs(config.server.session_sweep_secs.max(1));
    let sweep_handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_every);
        loop {
            ticker.tick().await;
            let removed = sessions.sweep();
            if removed > 0 {
                debug!("expired sessions swept count={}", removed);
            }
        }
    });

    let web_server = WebServer::new(state);
    let web_handle = tokio::spawn(async move {
        if let Err(e) = web_server.start().await {
            error!("web server error: {}", e);
        }
    });

    tokio::select! {
        _ = web_handle => {},
        _ = sweep_handle => {},
    }

    info!("ticket dashboard shutting down");
    Ok(())
}
