use std::sync::Arc;

use serde_json::json;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::db::{
    CloseOutcome, DatabaseError, NewTicket, NewTicketMessage, Ticket, TicketMessage, TicketStore,
    TicketUpdate, ValidationError,
};

pub mod bus;

pub use self::bus::{EventBus, TicketEvent, TicketEventKind};

#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Applies ticket transitions and announces each committed one on the bus.
///
/// Mutation and publish share one lock so subscribers see events in commit order.
pub struct EventRelay {
    store: Arc<dyn TicketStore>,
    bus: EventBus,
    write_lock: Mutex<()>,
}

impl EventRelay {
    pub fn new(store: Arc<dyn TicketStore>, bus: EventBus) -> Self {
        Self {
            store,
            bus,
            write_lock: Mutex::new(()),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub async fn create_ticket(&self, ticket: &NewTicket) -> Result<Ticket, RelayError> {
        let created_at = ticket.created_at()?;

        let _guard = self.write_lock.lock().await;
        let created = self.store.create_ticket(ticket, created_at).await?;
        info!(
            "ticket created id={} number={} user_id={}",
            created.id, created.ticket_number, created.user_id
        );

        self.publish(TicketEvent {
            kind: TicketEventKind::TicketCreated,
            ticket_id: created.id,
            payload: json!(created),
        });
        Ok(created)
    }

    pub async fn append_message(
        &self,
        message: &NewTicketMessage,
    ) -> Result<TicketMessage, RelayError> {
        let _guard = self.write_lock.lock().await;
        let stored = self.store.append_message(message).await?;
        debug!(
            "ticket message stored ticket_id={} message_id={}",
            stored.ticket_id, stored.id
        );

        self.publish(TicketEvent {
            kind: TicketEventKind::TicketUpdate,
            ticket_id: stored.ticket_id,
            payload: json!({ "action": "message", "message": stored }),
        });
        Ok(stored)
    }

    /// Closing a closed ticket succeeds quietly and publishes nothing.
    pub async fn close_ticket(&self, ticket_id: i64) -> Result<CloseOutcome, RelayError> {
        let _guard = self.write_lock.lock().await;
        let outcome = self.store.close_ticket(ticket_id).await?;

        if outcome.already_closed {
            debug!("ticket {} was already closed", ticket_id);
        } else {
            info!("ticket closed id={}", ticket_id);
            self.publish(TicketEvent {
                kind: TicketEventKind::TicketUpdate,
                ticket_id,
                payload: json!({ "action": "closed", "ticket": outcome.ticket }),
            });
        }
        Ok(outcome)
    }

    pub async fn update_ticket(
        &self,
        ticket_id: i64,
        update: &TicketUpdate,
    ) -> Result<Ticket, RelayError> {
        let _guard = self.write_lock.lock().await;
        let ticket = self.store.update_ticket(ticket_id, update).await?;
        info!(
            "ticket updated id={} priority={} assigned_to={:?}",
            ticket.id,
            ticket.priority.as_str(),
            ticket.assigned_to
        );

        self.publish(TicketEvent {
            kind: TicketEventKind::TicketUpdate,
            ticket_id,
            payload: json!({ "action": "updated", "ticket": ticket }),
        });
        Ok(ticket)
    }

    fn publish(&self, event: TicketEvent) {
        let delivered = self.bus.publish(event);
        debug!("event delivered to {} subscribers", delivered);
    }
}
