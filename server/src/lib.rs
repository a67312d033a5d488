pub mod batch;
pub mod config;
pub mod constants;
pub mod downloads;
pub mod errors;
pub mod logbuf;
pub mod normalize;
pub mod reconcile;
pub mod upstream;
pub mod web;

// Re-export commonly used types
pub use config::{ServiceConfig, ServicesConfig};
pub use downloads::TorrentClient;
pub use errors::UpstreamError;
pub use logbuf::OpsLogBuffer;
pub use reconcile::Reconciler;
pub use upstream::ArrClient;
pub use web::AppState;
