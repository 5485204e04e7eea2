pub use self::error::DatabaseError;
pub use self::manager::DatabaseManager;
pub use self::models::{
    Category, CategoryInput, CloseOutcome, NewTicket, NewTicketMessage, Panel, PanelInput,
    DEFAULT_COLOR, PanelType, Ticket, TicketMessage, TicketPriority, TicketStatus, TicketUpdate,
    ValidationError,
};
pub use self::stores::{CategoryStore, PanelStore, SettingsStore, TicketStore};

pub mod error;
pub mod manager;
pub mod models;
pub mod stores;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub mod schema_sqlite;
