use crate::config::DatabaseConfig;
use crate::db::{CategoryStore, DatabaseError, PanelStore, SettingsStore, TicketStore};
use std::sync::Arc;

#[cfg(feature = "sqlite")]
use crate::db::sqlite::{
    SqliteCategoryStore, SqlitePanelStore, SqliteSettingsStore, SqliteTicketStore,
};
#[cfg(feature = "sqlite")]
use diesel::connection::SimpleConnection;
#[cfg(feature = "sqlite")]
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection};
#[cfg(feature = "sqlite")]
use diesel::sqlite::SqliteConnection;

#[cfg(feature = "sqlite")]
pub type Pool = r2d2::Pool<ConnectionManager<SqliteConnection>>;

/// Applied to every pooled connection; SQLite keeps these per connection.
#[cfg(feature = "sqlite")]
#[derive(Debug)]
struct SqlitePragmas {
    busy_timeout_ms: u64,
}

#[cfg(feature = "sqlite")]
impl CustomizeConnection<SqliteConnection, r2d2::Error> for SqlitePragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        conn.batch_execute(&format!(
            "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = {};",
            self.busy_timeout_ms
        ))
        .map_err(r2d2::Error::QueryError)
    }
}

#[derive(Clone)]
pub struct DatabaseManager {
    #[cfg(feature = "sqlite")]
    pool: Pool,
    category_store: Arc<dyn CategoryStore>,
    panel_store: Arc<dyn PanelStore>,
    ticket_store: Arc<dyn TicketStore>,
    settings_store: Arc<dyn SettingsStore>,
}

impl DatabaseManager {
    #[cfg(feature = "sqlite")]
    pub async fn new(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let path = config
            .sqlite_path()
            .ok_or_else(|| DatabaseError::Connection("database path is not set".to_string()))?;

        let manager = ConnectionManager::<SqliteConnection>::new(path);
        let pool = r2d2::Pool::builder()
            .max_size(config.max_connections())
            .connection_customizer(Box::new(SqlitePragmas {
                busy_timeout_ms: config.busy_timeout_ms,
            }))
            .build(manager)
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        Ok(Self {
            category_store: Arc::new(SqliteCategoryStore::new(pool.clone())),
            panel_store: Arc::new(SqlitePanelStore::new(pool.clone())),
            ticket_store: Arc::new(SqliteTicketStore::new(pool.clone())),
            settings_store: Arc::new(SqliteSettingsStore::new(pool.clone())),
            pool,
        })
    }

    #[cfg(not(feature = "sqlite"))]
    pub async fn new(_config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        Err(DatabaseError::Connection(
            "SQLite feature not enabled".to_string(),
        ))
    }

    #[cfg(feature = "sqlite")]
    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| DatabaseError::Connection(e.to_string()))?;

            let statements = [
                "PRAGMA journal_mode = WAL",
                r#"
                CREATE TABLE IF NOT EXISTS categories (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    emoji TEXT,
                    description TEXT,
                    channel_category_id TEXT,
                    channel_name_template TEXT,
                    allowed_roles TEXT NOT NULL DEFAULT '[]',
                    mention_role_id TEXT,
                    initial_message TEXT,
                    buttons_config TEXT NOT NULL DEFAULT '[]',
                    color TEXT NOT NULL DEFAULT '#FF8C00',
                    created_at TEXT NOT NULL
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS panels (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    title TEXT,
                    description TEXT,
                    color TEXT NOT NULL DEFAULT '#FF8C00',
                    image_url TEXT,
                    thumbnail_url TEXT,
                    footer TEXT,
                    channel_id TEXT,
                    message_id TEXT,
                    panel_type TEXT NOT NULL DEFAULT 'buttons',
                    categories TEXT NOT NULL DEFAULT '[]',
                    created_at TEXT NOT NULL
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS tickets (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    ticket_number BIGINT NOT NULL UNIQUE,
                    user_id TEXT NOT NULL,
                    username TEXT,
                    category_id INTEGER REFERENCES categories(id) ON DELETE SET NULL,
                    channel_id TEXT,
                    status TEXT NOT NULL DEFAULT 'open',
                    priority TEXT NOT NULL DEFAULT 'normal',
                    assigned_to TEXT,
                    created_at TEXT NOT NULL,
                    closed_at TEXT,
                    messages_count INTEGER NOT NULL DEFAULT 0
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS ticket_messages (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    ticket_id INTEGER NOT NULL REFERENCES tickets(id) ON DELETE CASCADE,
                    user_id TEXT NOT NULL,
                    username TEXT,
                    content TEXT NOT NULL DEFAULT '',
                    attachments TEXT NOT NULL DEFAULT '[]',
                    created_at TEXT NOT NULL
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS settings (
                    key TEXT PRIMARY KEY NOT NULL,
                    value TEXT NOT NULL
                )
                "#,
                "CREATE INDEX IF NOT EXISTS idx_tickets_status_created ON tickets(status, created_at)",
                "CREATE INDEX IF NOT EXISTS idx_tickets_category ON tickets(category_id)",
                "CREATE INDEX IF NOT EXISTS idx_ticket_messages_ticket ON ticket_messages(ticket_id, created_at)",
            ];

            for statement in statements {
                conn.batch_execute(statement)
                    .map_err(|e| DatabaseError::Migration(e.to_string()))?;
            }

            Ok(())
        })
        .await
        .map_err(|e| DatabaseError::Migration(format!("migration task failed: {e}")))?
    }

    #[cfg(not(feature = "sqlite"))]
    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        Err(DatabaseError::Migration(
            "SQLite feature not enabled".to_string(),
        ))
    }

    pub fn category_store(&self) -> Arc<dyn CategoryStore> {
        self.category_store.clone()
    }

    pub fn panel_store(&self) -> Arc<dyn PanelStore> {
        self.panel_store.clone()
    }

    pub fn ticket_store(&self) -> Arc<dyn TicketStore> {
        self.ticket_store.clone()
    }

    pub fn settings_store(&self) -> Arc<dyn SettingsStore> {
        self.settings_store.clone()
    }
}
