use std::str::FromStr;

use salvo::prelude::*;
use serde_json::{Value, json};

use crate::db::{TicketStatus, TicketUpdate};
use crate::web::error::{ApiError, ApiResult, respond};
use crate::web::web_state;

const LIST_LIMIT: i64 = 50;

pub(crate) fn id_param(req: &Request, what: &str) -> ApiResult<i64> {
    match req.param::<i64>("id") {
        Some(id) if id > 0 => Ok(id),
        _ => Err(ApiError::bad_request(format!("invalid {what} id"))),
    }
}

#[handler]
pub async fn get_stats(depot: &mut Depot, res: &mut Response) {
    let result: ApiResult<Value> = async {
        let state = web_state(depot)?;
        let stats = state.db_manager.ticket_store().ticket_stats().await?;
        Ok(json!(stats))
    }
    .await;
    respond(res, result);
}

#[handler]
pub async fn list_tickets(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let result: ApiResult<Value> = async {
        let state = web_state(depot)?;
        let status = match req.query::<String>("status") {
            Some(raw) => TicketStatus::from_str(&raw)?,
            None => TicketStatus::Open,
        };
        let tickets = state
            .db_manager
            .ticket_store()
            .list_tickets(status, LIST_LIMIT)
            .await?;
        Ok(json!(tickets))
    }
    .await;
    respond(res, result);
}

#[handler]
pub async fn get_ticket(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let result: ApiResult<Value> = async {
        let state = web_state(depot)?;
        let id = id_param(req, "ticket")?;
        match state.db_manager.ticket_store().get_ticket(id).await? {
            Some(ticket) => Ok(json!(ticket)),
            None => Err(ApiError::not_found(format!("ticket {id} not found"))),
        }
    }
    .await;
    respond(res, result);
}

#[handler]
pub async fn update_ticket(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let result: ApiResult<Value> = async {
        let state = web_state(depot)?;
        let id = id_param(req, "ticket")?;
        let update = req
            .parse_json::<TicketUpdate>()
            .await
            .map_err(|e| ApiError::bad_request(format!("invalid ticket update: {e}")))?;
        if update.is_empty() {
            return Err(ApiError::bad_request("nothing to update"));
        }

        let ticket = state.relay.update_ticket(id, &update).await?;
        Ok(json!(ticket))
    }
    .await;
    respond(res, result);
}

#[handler]
pub async fn close_ticket(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let result: ApiResult<Value> = async {
        let state = web_state(depot)?;
        let id = id_param(req, "ticket")?;
        let outcome = state.relay.close_ticket(id).await?;
        Ok(json!({
            "success": true,
            "already_closed": outcome.already_closed,
            "ticket": outcome.ticket,
        }))
    }
    .await;
    respond(res, result);
}
