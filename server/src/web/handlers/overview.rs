// Service inventory and reachability endpoints.

use axum::extract::State;
use axum::response::Json;
use futures::future::join_all;
use serde_json::{json, Value};

use super::common::ApiResult;
use crate::config::SERVICE_NAMES;
use crate::web::{AppState, ServiceOverview};

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "ok": true,
        "configuredServices": state.config.configured_services(),
    }))
}

pub async fn list_services(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "services": state.config.configured_services() }))
}

/// One card per known upstream plus the download client. The fan-out is
/// fixed-size and fully parallel; a dead service yields an "offline"
/// card, never a failed payload.
pub async fn overview(State(state): State<AppState>) -> ApiResult<Value> {
    let upstream_cards = join_all(
        SERVICE_NAMES
            .iter()
            .map(|service| service_overview(&state, service)),
    );
    let (mut items, client_status) = tokio::join!(upstream_cards, state.downloads.get_status());

    items.push(ServiceOverview {
        service: "qbittorrent".to_string(),
        configured: client_status.configured,
        status: client_status.status,
        version: client_status.version,
        message: client_status.message,
        queueing: client_status.queueing,
    });

    Ok(Json(json!({ "items": items })))
}

async fn service_overview(state: &AppState, service: &str) -> ServiceOverview {
    let Some(svc) = state.config.service(service) else {
        return ServiceOverview {
            service: service.to_string(),
            configured: false,
            status: "not_configured".to_string(),
            version: None,
            message: "Not configured".to_string(),
            queueing: None,
        };
    };

    let paths = svc.status_paths();
    match state
        .arr
        .request_with_fallback(service, &paths, &Default::default())
        .await
    {
        Ok(payload) => {
            let instance = payload
                .get("instanceName")
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .unwrap_or("default instance");
            ServiceOverview {
                service: service.to_string(),
                configured: true,
                status: "online".to_string(),
                version: payload
                    .get("version")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                message: format!("Status: {}", instance),
                queueing: None,
            }
        }
        Err(e) => ServiceOverview {
            service: service.to_string(),
            configured: true,
            status: "offline".to_string(),
            version: None,
            message: e.to_string(),
            queueing: None,
        },
    }
}
