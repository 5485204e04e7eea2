use salvo::prelude::*;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::web::error::{ApiError, ApiResult, respond};
use crate::web::web_state;

#[derive(Debug, Deserialize)]
struct SetSubsystem {
    enabled: bool,
}

fn system_param(req: &Request) -> ApiResult<String> {
    req.param::<String>("system")
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ApiError::bad_request("missing subsystem name"))
}

/// Unauthenticated: the bot polls this to decide which features to run.
#[handler]
pub async fn config_status(depot: &mut Depot, res: &mut Response) {
    let result: ApiResult<Value> = async {
        let state = web_state(depot)?;
        Ok(json!(state.toggles.status().await?))
    }
    .await;
    respond(res, result);
}

#[handler]
pub async fn get_subsystem(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let result: ApiResult<Value> = async {
        let state = web_state(depot)?;
        let system = system_param(req)?;
        let enabled = state.toggles.get(&system).await?;
        Ok(json!({ "system": system, "enabled": enabled }))
    }
    .await;
    respond(res, result);
}

#[handler]
pub async fn toggle_subsystem(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let result: ApiResult<Value> = async {
        let state = web_state(depot)?;
        let system = system_param(req)?;
        let enabled = state.toggles.toggle(&system).await?;
        Ok(json!({ "system": system, "enabled": enabled }))
    }
    .await;
    respond(res, result);
}

#[handler]
pub async fn set_subsystem(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let result: ApiResult<Value> = async {
        let state = web_state(depot)?;
        let system = system_param(req)?;
        let body = req
            .parse_json::<SetSubsystem>()
            .await
            .map_err(|e| ApiError::bad_request(format!("invalid toggle body: {e}")))?;
        let enabled = state.toggles.set(&system, body.enabled).await?;
        Ok(json!({ "system": system, "enabled": enabled }))
    }
    .await;
    respond(res, result);
}
