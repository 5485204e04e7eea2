use salvo::prelude::*;
use serde_json::{Value, json};
use tracing::info;

use crate::db::CategoryInput;
use crate::web::error::{ApiError, ApiResult, respond};
use crate::web::handlers::tickets::id_param;
use crate::web::web_state;

async fn parse_input(req: &mut Request) -> ApiResult<CategoryInput> {
    let input = req
        .parse_json::<CategoryInput>()
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid category body: {e}")))?;
    Ok(input.validated()?)
}

#[handler]
pub async fn list_categories(depot: &mut Depot, res: &mut Response) {
    let result: ApiResult<Value> = async {
        let state = web_state(depot)?;
        let categories = state.db_manager.category_store().list_categories().await?;
        Ok(json!(categories))
    }
    .await;
    respond(res, result);
}

#[handler]
pub async fn create_category(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let result: ApiResult<Value> = async {
        let state = web_state(depot)?;
        let input = parse_input(req).await?;
        let id = state.db_manager.category_store().create_category(&input).await?;
        info!("category created id={} name={}", id, input.name);
        Ok(json!({ "id": id, "message": "category created" }))
    }
    .await;

    if result.is_ok() {
        res.status_code(StatusCode::CREATED);
    }
    respond(res, result);
}

#[handler]
pub async fn get_category(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let result: ApiResult<Value> = async {
        let state = web_state(depot)?;
        let id = id_param(req, "category")?;
        match state.db_manager.category_store().get_category(id).await? {
            Some(category) => Ok(json!(category)),
            None => Err(ApiError::not_found(format!("category {id} not found"))),
        }
    }
    .await;
    respond(res, result);
}

#[handler]
pub async fn update_category(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let result: ApiResult<Value> = async {
        let state = web_state(depot)?;
        let id = id_param(req, "category")?;
        let input = parse_input(req).await?;
        state
            .db_manager
            .category_store()
            .update_category(id, &input)
            .await?;
        Ok(json!({ "success": true }))
    }
    .await;
    respond(res, result);
}

#[handler]
pub async fn delete_category(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let result: ApiResult<Value> = async {
        let state = web_state(depot)?;
        let id = id_param(req, "category")?;
        state.db_manager.category_store().delete_category(id).await?;
        info!("category deleted id={}", id);
        Ok(json!({ "success": true }))
    }
    .await;
    respond(res, result);
}
