use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use salvo::prelude::*;
use secrecy::SecretString;
use tracing::info;

use crate::auth::{AccessPolicy, IdentityProvider};
use crate::config::Config;
use crate::db::DatabaseManager;
use crate::discord::PanelPublisher;
use crate::relay::EventRelay;
use crate::session::SessionManager;
use crate::toggles::ToggleStore;

pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;

#[cfg(test)]
mod tests;

pub use self::error::{ApiError, ApiResult};
use self::routes::create_router;

pub const SESSION_COOKIE: &str = "dashboard_session";
pub const LOGIN_STATE_COOKIE: &str = "dashboard_login_state";

/// Shared handles every handler reads from the request `Depot`.
#[derive(Clone)]
pub struct WebState {
    pub config: Arc<Config>,
    pub db_manager: Arc<DatabaseManager>,
    pub sessions: Arc<SessionManager>,
    pub policy: Arc<AccessPolicy>,
    pub identity: Arc<dyn IdentityProvider>,
    pub publisher: Arc<dyn PanelPublisher>,
    pub relay: Arc<EventRelay>,
    pub toggles: Arc<ToggleStore>,
    pub webhook_secret: Arc<SecretString>,
    pub started_at: Instant,
}

pub fn web_state(depot: &Depot) -> ApiResult<&WebState> {
    depot
        .obtain::<WebState>()
        .map_err(|_| ApiError::internal("web state is not initialized"))
}

#[derive(Clone)]
pub struct WebServer {
    state: WebState,
}

impl WebServer {
    pub fn new(state: WebState) -> Self {
        Self { state }
    }

    pub async fn start(&self) -> Result<()> {
        let server = &self.state.config.server;
        let bind_addr = format!("{}:{}", server.bind_address, server.port);
        info!("starting web server on {}", bind_addr);

        let acceptor = TcpListener::new(bind_addr).bind().await;
        Server::new(acceptor)
            .serve(create_router(self.state.clone()))
            .await;

        Ok(())
    }
}
