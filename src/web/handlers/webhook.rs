//! Ingress for the Discord bot. Every route here sits behind `require_webhook_secret`.

use salvo::prelude::*;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::db::{NewTicket, NewTicketMessage};
use crate::web::error::{ApiError, ApiResult, respond};
use crate::web::metrics::Metrics;
use crate::web::web_state;

#[derive(Debug, Deserialize)]
struct TicketClosed {
    ticket_id: i64,
    #[serde(default)]
    status: Option<String>,
}

#[handler]
pub async fn ticket_created(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let result: ApiResult<Value> = async {
        let state = web_state(depot)?;
        let ticket = req
            .parse_json::<NewTicket>()
            .await
            .map_err(|e| ApiError::bad_request(format!("invalid ticket payload: {e}")))?;

        let created = state.relay.create_ticket(&ticket).await?;
        Metrics::webhook_accepted();
        Ok(json!({ "success": true, "ticket_id": created.id }))
    }
    .await;
    respond(res, result);
}

#[handler]
pub async fn ticket_message(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let result: ApiResult<Value> = async {
        let state = web_state(depot)?;
        let message = req
            .parse_json::<NewTicketMessage>()
            .await
            .map_err(|e| ApiError::bad_request(format!("invalid message payload: {e}")))?;

        let stored = state.relay.append_message(&message).await?;
        Metrics::webhook_accepted();
        Ok(json!({ "success": true, "message_id": stored.id }))
    }
    .await;
    respond(res, result);
}

#[handler]
pub async fn ticket_closed(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let result: ApiResult<Value> = async {
        let state = web_state(depot)?;
        let body = req
            .parse_json::<TicketClosed>()
            .await
            .map_err(|e| ApiError::bad_request(format!("invalid close payload: {e}")))?;
        if let Some(status) = body.status.as_deref().filter(|s| *s != "closed") {
            debug!(
                "ignoring status {:?} on close webhook ticket_id={}",
                status, body.ticket_id
            );
        }

        let outcome = state.relay.close_ticket(body.ticket_id).await?;
        Metrics::webhook_accepted();
        Ok(json!({ "success": true, "already_closed": outcome.already_closed }))
    }
    .await;
    respond(res, result);
}
