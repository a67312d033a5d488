// Legacy category dashboard: one flat card list per category.

use axum::extract::{Path, State};
use axum::response::Json;
use futures::future::join_all;
use serde::Serialize;
use serde_json::{json, Value};

use super::common::{ApiError, ApiResult};
use crate::constants::DASHBOARD_QUEUE_LIMIT;
use crate::web::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct DashboardItem {
    pub id: Value,
    pub service: String,
    pub source: String,
    pub title: String,
    pub summary: String,
}

pub async fn dashboard_category(
    Path(category): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<Value> {
    let Some(services) = crate::config::ServicesConfig::services_for_category(&category) else {
        return Err(ApiError::bad_request("Unknown category"));
    };

    let batches = join_all(
        services
            .iter()
            .map(|service| fetch_category_items(&state, service)),
    )
    .await;

    let items: Vec<DashboardItem> = batches.into_iter().flatten().collect();
    Ok(Json(json!({ "items": items })))
}

/// Status card plus the first queue records for one service; either
/// sub-fetch failing just drops its cards.
async fn fetch_category_items(state: &AppState, service: &str) -> Vec<DashboardItem> {
    let Some(svc) = state.config.service(service) else {
        return Vec::new();
    };

    let status_paths = svc.status_paths();
    let queue_path =
        svc.api_path("/queue?page=1&pageSize=50&sortKey=timeleft&sortDirection=ascending");
    let query_params = Default::default();
    let (status, queue) = tokio::join!(
        state
            .arr
            .request_with_fallback(service, &status_paths, &query_params),
        state.arr.get(service, &queue_path),
    );

    let mut items = Vec::new();

    if let Ok(st) = status {
        let app_name = st
            .get("appName")
            .and_then(Value::as_str)
            .unwrap_or(service);
        let version = st.get("version").and_then(Value::as_str).unwrap_or("?");
        let instance = st
            .get("instanceName")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or("default instance");
        items.push(DashboardItem {
            id: Value::String(format!("status-{}", service)),
            service: service.to_string(),
            source: "System".to_string(),
            title: format!("{} v{}", app_name, version),
            summary: format!("Status: {}", instance),
        });
    }

    if let Ok(payload) = queue {
        let records = payload
            .get("records")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for rec in records.iter().take(DASHBOARD_QUEUE_LIMIT) {
            items.push(DashboardItem {
                id: rec.get("id").cloned().unwrap_or(Value::Null),
                service: service.to_string(),
                source: "Queue".to_string(),
                title: queue_title(rec),
                summary: queue_summary(rec),
            });
        }
    }

    items
}

fn queue_title(rec: &Value) -> String {
    non_empty(rec.get("title"))
        .or_else(|| non_empty(rec.get("series").and_then(|s| s.get("title"))))
        .or_else(|| non_empty(rec.get("artist").and_then(|a| a.get("artistName"))))
        .unwrap_or("Queued Item")
        .to_string()
}

fn queue_summary(rec: &Value) -> String {
    non_empty(rec.get("status"))
        .or_else(|| non_empty(rec.get("trackedDownloadState")))
        .or_else(|| non_empty(rec.get("errorMessage")))
        .or_else(|| non_empty(rec.get("outputPath")))
        .unwrap_or("Queued")
        .to_string()
}

fn non_empty(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}
