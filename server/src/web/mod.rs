pub mod handlers;
pub mod server;

pub use self::server::{create_router, start_web_server};

use serde::Serialize;
use std::sync::Arc;

use crate::config::ServicesConfig;
use crate::downloads::TorrentClient;
use crate::logbuf::OpsLogBuffer;
use crate::reconcile::Reconciler;
use crate::upstream::ArrClient;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServicesConfig>,
    pub arr: Arc<ArrClient>,
    pub downloads: Arc<TorrentClient>,
    pub reconciler: Arc<Reconciler>,
    pub ops_log: Arc<OpsLogBuffer>,
}

impl AppState {
    pub fn new(config: Arc<ServicesConfig>, ops_log: Arc<OpsLogBuffer>) -> Self {
        let arr = Arc::new(ArrClient::new(config.clone(), ops_log.clone()));
        let downloads = Arc::new(TorrentClient::new(config.clone(), ops_log.clone()));
        let reconciler = Arc::new(Reconciler::new(
            config.clone(),
            arr.clone(),
            downloads.clone(),
        ));
        Self {
            config,
            arr,
            downloads,
            reconciler,
            ops_log,
        }
    }
}

/// One card on the overview page: a configured-or-not upstream (or the
/// download client) with its reachability summary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceOverview {
    pub service: String,
    pub configured: bool,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queueing: Option<bool>,
}
