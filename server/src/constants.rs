/// Default per-call upstream timeout.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

/// Release searches fan out to every indexer behind the manager and
/// routinely take tens of seconds.
pub const RELEASE_TIMEOUT_SECONDS: u64 = 60;

/// Grab is a single write against the manager's decision engine.
pub const GRAB_TIMEOUT_SECONDS: u64 = 30;

/// Capacity of the aggregator's own operational log ring buffer.
pub const OPS_LOG_CAPACITY: usize = 500;

/// Most-recent cap on the merged /api/errors payload.
pub const MAX_LOG_ITEMS: usize = 400;

/// Queue page size used by the reconciliation fetch; large enough to
/// cover a realistic in-flight queue in one page.
pub const QUEUE_PAGE_SIZE: usize = 1000;

/// In-flight caps for the batch rejected-release check. Sonarr's
/// release search is the rate-limit-sensitive path.
pub const SONARR_RELEASE_CONCURRENCY: usize = 2;
pub const DEFAULT_RELEASE_CONCURRENCY: usize = 4;

/// Queue records shown per service on the legacy dashboard cards.
pub const DASHBOARD_QUEUE_LIMIT: usize = 20;
