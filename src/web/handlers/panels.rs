use salvo::prelude::*;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::db::PanelInput;
use crate::web::error::{ApiError, ApiResult, respond};
use crate::web::handlers::tickets::id_param;
use crate::web::metrics::Metrics;
use crate::web::web_state;

async fn parse_input(req: &mut Request) -> ApiResult<PanelInput> {
    let input = req
        .parse_json::<PanelInput>()
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid panel body: {e}")))?;
    Ok(input.validated()?)
}

#[handler]
pub async fn list_panels(depot: &mut Depot, res: &mut Response) {
    let result: ApiResult<Value> = async {
        let state = web_state(depot)?;
        let panels = state.db_manager.panel_store().list_panels().await?;
        Ok(json!(panels))
    }
    .await;
    respond(res, result);
}

#[handler]
pub async fn create_panel(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let result: ApiResult<Value> = async {
        let state = web_state(depot)?;
        let input = parse_input(req).await?;
        let id = state.db_manager.panel_store().create_panel(&input).await?;
        info!("panel created id={} name={}", id, input.name);
        Ok(json!({ "id": id, "message": "panel created" }))
    }
    .await;

    if result.is_ok() {
        res.status_code(StatusCode::CREATED);
    }
    respond(res, result);
}

/// Returns the panel with `category_records` alongside the stored ids.
/// Categories deleted since the panel was saved are left out of the records.
#[handler]
pub async fn get_panel(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let result: ApiResult<Value> = async {
        let state = web_state(depot)?;
        let id = id_param(req, "panel")?;
        let Some(panel) = state.db_manager.panel_store().get_panel(id).await? else {
            return Err(ApiError::not_found(format!("panel {id} not found")));
        };

        let categories = state.db_manager.category_store();
        let mut records = Vec::with_capacity(panel.categories.len());
        for category_id in &panel.categories {
            match categories.get_category(*category_id).await? {
                Some(category) => records.push(category),
                None => warn!(
                    "panel references missing category panel_id={} category_id={}",
                    panel.id, category_id
                ),
            }
        }

        let mut body = json!(panel);
        body["category_records"] = json!(records);
        Ok(body)
    }
    .await;
    respond(res, result);
}

#[handler]
pub async fn update_panel(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let result: ApiResult<Value> = async {
        let state = web_state(depot)?;
        let id = id_param(req, "panel")?;
        let input = parse_input(req).await?;
        state.db_manager.panel_store().update_panel(id, &input).await?;
        Ok(json!({ "success": true }))
    }
    .await;
    respond(res, result);
}

#[handler]
pub async fn delete_panel(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let result: ApiResult<Value> = async {
        let state = web_state(depot)?;
        let id = id_param(req, "panel")?;
        state.db_manager.panel_store().delete_panel(id).await?;
        info!("panel deleted id={}", id);
        Ok(json!({ "success": true }))
    }
    .await;
    respond(res, result);
}

#[derive(Debug, Deserialize)]
struct SendPanelRequest {
    panel_id: i64,
}

#[handler]
pub async fn send_panel(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let result: ApiResult<Value> = async {
        let state = web_state(depot)?;
        let body = req
            .parse_json::<SendPanelRequest>()
            .await
            .map_err(|e| ApiError::bad_request(format!("invalid send-panel body: {e}")))?;

        let panels = state.db_manager.panel_store();
        let Some(panel) = panels.get_panel(body.panel_id).await? else {
            return Err(ApiError::not_found(format!(
                "panel {} not found",
                body.panel_id
            )));
        };
        let categories = state
            .db_manager
            .category_store()
            .resolve_categories(&panel.categories)
            .await?;

        let message_id = state.publisher.post_panel(&panel, &categories).await?;
        panels.set_panel_message(panel.id, &message_id).await?;
        Metrics::panel_posted();
        info!(
            "panel posted panel_id={} channel_id={:?} message_id={}",
            panel.id, panel.channel_id, message_id
        );

        Ok(json!({
            "success": true,
            "message": "panel sent to discord",
            "message_id": message_id,
        }))
    }
    .await;
    respond(res, result);
}
