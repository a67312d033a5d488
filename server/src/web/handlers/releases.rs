// Interactive-search endpoints: release listing, rejected checks, grab.

use axum::extract::{Query, State};
use axum::response::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::common::{ApiError, ApiResult};
use crate::config::is_known_service;
use crate::reconcile::BatchRejected;
use crate::web::AppState;

#[derive(Deserialize)]
pub struct ReleaseQuery {
    pub service: String,
    #[serde(rename = "itemId")]
    pub item_id: i64,
}

#[derive(Deserialize)]
pub struct BatchQuery {
    pub service: String,
    #[serde(rename = "itemIds")]
    pub item_ids: String,
}

#[derive(Deserialize)]
pub struct GrabBody {
    pub service: String,
    pub release: Value,
}

pub async fn list_releases(
    Query(query): Query<ReleaseQuery>,
    State(state): State<AppState>,
) -> ApiResult<Value> {
    validate_service(&query.service)?;
    let items = state
        .reconciler
        .list_releases(&query.service, query.item_id)
        .await?;
    Ok(Json(json!({ "items": items })))
}

pub async fn has_rejected(
    Query(query): Query<ReleaseQuery>,
    State(state): State<AppState>,
) -> ApiResult<Value> {
    validate_service(&query.service)?;
    let has_rejected = state
        .reconciler
        .has_rejected_releases(&query.service, query.item_id)
        .await?;
    Ok(Json(json!({ "hasRejected": has_rejected })))
}

pub async fn has_rejected_batch(
    Query(query): Query<BatchQuery>,
    State(state): State<AppState>,
) -> ApiResult<BatchRejected> {
    validate_service(&query.service)?;
    let item_ids = parse_item_ids(&query.item_ids)?;
    let batch = state
        .reconciler
        .batch_rejected(&query.service, item_ids)
        .await?;
    Ok(Json(batch))
}

pub async fn grab_release(
    State(state): State<AppState>,
    Json(body): Json<GrabBody>,
) -> ApiResult<Value> {
    validate_service(&body.service)?;
    if body.release.is_null() {
        return Err(ApiError::bad_request("Missing release payload"));
    }
    info!("grabbing release via {}", body.service);
    state
        .reconciler
        .grab_release(&body.service, body.release)
        .await?;
    Ok(Json(json!({ "ok": true })))
}

fn validate_service(service: &str) -> Result<(), ApiError> {
    if is_known_service(service) {
        Ok(())
    } else {
        Err(ApiError::bad_request(format!(
            "Unknown service: {}",
            service
        )))
    }
}

fn parse_item_ids(raw: &str) -> Result<Vec<i64>, ApiError> {
    let mut ids = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let id = part
            .parse::<i64>()
            .map_err(|_| ApiError::bad_request(format!("Invalid item id: {}", part)))?;
        ids.push(id);
    }
    Ok(ids)
}
