use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::DatabaseError;
use super::models::{
    Category, CategoryInput, CloseOutcome, NewTicket, NewTicketMessage, Panel, PanelInput,
    SettingsEntry, Ticket, TicketDetail, TicketMessage, TicketStats, TicketStatus, TicketSummary,
    TicketUpdate,
};

#[async_trait]
pub trait CategoryStore: Send + Sync {
    async fn list_categories(&self) -> Result<Vec<Category>, DatabaseError>;
    async fn get_category(&self, id: i64) -> Result<Option<Category>, DatabaseError>;
    /// Fetches the given ids in the order asked; fails on the first id that does not exist.
    async fn resolve_categories(&self, ids: &[i64]) -> Result<Vec<Category>, DatabaseError>;
    async fn create_category(&self, input: &CategoryInput) -> Result<i64, DatabaseError>;
    async fn update_category(&self, id: i64, input: &CategoryInput) -> Result<(), DatabaseError>;
    async fn delete_category(&self, id: i64) -> Result<(), DatabaseError>;
}

#[async_trait]
pub trait PanelStore: Send + Sync {
    async fn list_panels(&self) -> Result<Vec<Panel>, DatabaseError>;
    async fn get_panel(&self, id: i64) -> Result<Option<Panel>, DatabaseError>;
    async fn create_panel(&self, input: &PanelInput) -> Result<i64, DatabaseError>;
    async fn update_panel(&self, id: i64, input: &PanelInput) -> Result<(), DatabaseError>;
    async fn delete_panel(&self, id: i64) -> Result<(), DatabaseError>;
    async fn set_panel_message(&self, id: i64, message_id: &str) -> Result<(), DatabaseError>;
}

#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn create_ticket(
        &self,
        ticket: &NewTicket,
        created_at: DateTime<Utc>,
    ) -> Result<Ticket, DatabaseError>;
    /// Inserts the message and bumps `messages_count` in one transaction.
    async fn append_message(
        &self,
        message: &NewTicketMessage,
    ) -> Result<TicketMessage, DatabaseError>;
    async fn close_ticket(&self, id: i64) -> Result<CloseOutcome, DatabaseError>;
    async fn update_ticket(&self, id: i64, update: &TicketUpdate) -> Result<Ticket, DatabaseError>;
    async fn get_ticket(&self, id: i64) -> Result<Option<TicketDetail>, DatabaseError>;
    async fn list_tickets(
        &self,
        status: TicketStatus,
        limit: i64,
    ) -> Result<Vec<TicketSummary>, DatabaseError>;
    async fn ticket_stats(&self) -> Result<TicketStats, DatabaseError>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_setting(&self, key: &str) -> Result<Option<String>, DatabaseError>;
    async fn list_settings(&self) -> Result<Vec<SettingsEntry>, DatabaseError>;
    async fn put_setting(&self, key: &str, value: &str) -> Result<(), DatabaseError>;
    /// Returns whether a row was removed.
    async fn delete_setting(&self, key: &str) -> Result<bool, DatabaseError>;
}
