// Merged error/log feed across every source the dashboard can see.

use axum::extract::{Query, State};
use axum::response::Json;
use futures::future::join_all;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use super::common::ApiResult;
use crate::config::{DASHBOARD_SERVICE, DOWNLOAD_CLIENT_NAME};
use crate::constants::MAX_LOG_ITEMS;
use crate::normalize::{normalize_log_entry, parse_time_or_epoch, LogEntry};
use crate::web::AppState;

const LOG_PATH: &str = "/log?sortKey=time&sortDirection=descending&page=1&pageSize=250";

#[derive(Deserialize)]
pub struct LogsQuery {
    pub service: Option<String>,
    pub level: Option<String>,
    pub search: Option<String>,
}

/// Fan out log fetches over the selected sources, merge, sort newest
/// first (unparseable times sink as epoch), filter, cap. A dead source
/// drops out of the merge; it never fails the feed.
pub async fn service_logs(
    Query(query): Query<LogsQuery>,
    State(state): State<AppState>,
) -> ApiResult<Value> {
    let requested_service = query
        .service
        .as_deref()
        .unwrap_or("all")
        .trim()
        .to_lowercase();
    let requested_level = query
        .level
        .as_deref()
        .unwrap_or("all")
        .trim()
        .to_lowercase();
    let search = query
        .search
        .as_deref()
        .unwrap_or_default()
        .trim()
        .to_lowercase();

    let wants = |source: &str| requested_service == "all" || requested_service == source;

    let targets: Vec<String> = state
        .config
        .configured_services()
        .into_iter()
        .filter(|s| wants(s))
        .collect();

    let upstream_batches = join_all(
        targets
            .iter()
            .map(|service| fetch_service_logs(&state, service)),
    );
    let client_logs = async {
        if wants(DOWNLOAD_CLIENT_NAME) {
            match state.downloads.get_logs().await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("download client logs unavailable: {}", e);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        }
    };
    let (upstream_batches, client_logs) = tokio::join!(upstream_batches, client_logs);

    let mut items: Vec<LogEntry> = upstream_batches.into_iter().flatten().collect();
    items.extend(client_logs);
    if wants(DASHBOARD_SERVICE) {
        items.extend(state.ops_log.snapshot().into_iter().map(|entry| LogEntry {
            service: DASHBOARD_SERVICE.to_string(),
            level: entry.level,
            message: entry.message,
            time: Some(entry.time),
        }));
    }

    items.sort_by_key(|entry| std::cmp::Reverse(parse_time_or_epoch(entry.time.as_deref())));

    if requested_level != "all" {
        items.retain(|entry| entry.level == requested_level);
    }
    if !search.is_empty() {
        items.retain(|entry| entry.message.to_lowercase().contains(&search));
    }
    items.truncate(MAX_LOG_ITEMS);

    Ok(Json(json!({ "items": items })))
}

/// One service's normalized log page; a failure is logged and yields
/// an empty batch.
async fn fetch_service_logs(state: &AppState, service: &str) -> Vec<LogEntry> {
    let Some(svc) = state.config.service(service) else {
        return Vec::new();
    };
    let path = svc.api_path(LOG_PATH);
    match state.arr.get(service, &path).await {
        Ok(payload) => log_records(&payload)
            .iter()
            .map(|record| normalize_log_entry(service, record))
            .collect(),
        Err(e) => {
            warn!("{} log fetch failed: {}", service, e);
            Vec::new()
        }
    }
}

fn log_records(payload: &Value) -> Vec<Value> {
    if let Some(records) = payload.get("records").and_then(Value::as_array) {
        return records.clone();
    }
    payload.as_array().cloned().unwrap_or_default()
}
