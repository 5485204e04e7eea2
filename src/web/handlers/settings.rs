use salvo::prelude::*;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::web::error::{ApiError, ApiResult, respond};
use crate::web::web_state;

#[derive(Debug, Deserialize)]
struct PutSetting {
    value: String,
}

fn key_param(req: &Request) -> ApiResult<String> {
    req.param::<String>("key")
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .ok_or_else(|| ApiError::bad_request("missing setting key"))
}

#[handler]
pub async fn list_settings(depot: &mut Depot, res: &mut Response) {
    let result: ApiResult<Value> = async {
        let state = web_state(depot)?;
        let entries = state.db_manager.settings_store().list_settings().await?;
        Ok(json!(entries))
    }
    .await;
    respond(res, result);
}

#[handler]
pub async fn get_setting(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let result: ApiResult<Value> = async {
        let state = web_state(depot)?;
        let key = key_param(req)?;
        match state.db_manager.settings_store().get_setting(&key).await? {
            Some(value) => Ok(json!({ "key": key, "value": value })),
            None => Err(ApiError::not_found(format!("setting {key:?} not found"))),
        }
    }
    .await;
    respond(res, result);
}

#[handler]
pub async fn put_setting(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let result: ApiResult<Value> = async {
        let state = web_state(depot)?;
        let key = key_param(req)?;
        let body = req
            .parse_json::<PutSetting>()
            .await
            .map_err(|e| ApiError::bad_request(format!("invalid setting body: {e}")))?;
        state
            .db_manager
            .settings_store()
            .put_setting(&key, &body.value)
            .await?;
        info!("setting stored key={}", key);
        Ok(json!({ "key": key, "value": body.value }))
    }
    .await;
    respond(res, result);
}

#[handler]
pub async fn delete_setting(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let result: ApiResult<Value> = async {
        let state = web_state(depot)?;
        let key = key_param(req)?;
        if !state.db_manager.settings_store().delete_setting(&key).await? {
            return Err(ApiError::not_found(format!("setting {key:?} not found")));
        }
        info!("setting deleted key={}", key);
        Ok(json!({ "success": true }))
    }
    .await;
    respond(res, result);
}
