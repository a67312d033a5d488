pub mod common;
pub mod dashboard;
pub mod library;
pub mod logs;
pub mod overview;
pub mod releases;

pub use dashboard::dashboard_category;
pub use library::{movies_overview, season_episodes, tv_overview};
pub use logs::service_logs;
pub use overview::{health, list_services, overview};
pub use releases::{grab_release, has_rejected, has_rejected_batch, list_releases};
