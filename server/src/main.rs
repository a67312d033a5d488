use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use server::config::{ServicesConfig, SERVICE_NAMES};
use server::constants::OPS_LOG_CAPACITY;
use server::logbuf::OpsLogBuffer;
use server::web::{start_web_server, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging with reduced verbosity
    let env_filter = EnvFilter::from_default_env()
        .add_directive("server=info".parse()?)
        .add_directive("tower_http=warn".parse()?)
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?);

    fmt().with_env_filter(env_filter).init();

    info!("Starting media dashboard aggregator");

    let config = Arc::new(ServicesConfig::from_env());
    let configured = config.configured_services();
    info!(
        "Configuration loaded: {}/{} upstream services configured, download client: {}",
        configured.len(),
        SERVICE_NAMES.len(),
        if config.download_client.is_configured() {
            "configured"
        } else {
            "not configured"
        }
    );
    if configured.is_empty() {
        warn!("No upstream services configured");
        warn!("Set e.g. SONARR_URL and SONARR_API_KEY to enable a service");
    } else {
        info!("Configured services: {}", configured.join(", "));
    }

    let ops_log = Arc::new(OpsLogBuffer::new(OPS_LOG_CAPACITY));
    let state = AppState::new(config, ops_log);

    start_web_server(state).await
}
