//! Reconciliation engine: joins a manager's library with its download
//! queue and the download client's torrents to produce one enriched
//! status per library item.
//!
//! Join keys: queue record -> library item by foreign id
//! (`seriesId`/`movieId`), queue record -> torrent by normalized
//! content hash (`downloadId`/`trackedDownloadId`).

use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::warn;

use crate::batch::map_limit;
use crate::config::ServicesConfig;
use crate::constants::{
    DEFAULT_RELEASE_CONCURRENCY, GRAB_TIMEOUT_SECONDS, QUEUE_PAGE_SIZE,
    RELEASE_TIMEOUT_SECONDS, SONARR_RELEASE_CONCURRENCY,
};
use crate::downloads::{DownloadInfo, TorrentClient};
use crate::errors::UpstreamError;
use crate::normalize::{
    extract_episode_hint, extract_year, normalize_hash, normalize_release, pick_poster_url,
    queue_state_from_records, round2, QueueState, Release,
};
use crate::upstream::{ArrClient, RequestOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryKind {
    Series,
    Movies,
}

impl LibraryKind {
    pub fn service(&self) -> &'static str {
        match self {
            LibraryKind::Series => "sonarr",
            LibraryKind::Movies => "radarr",
        }
    }

    fn library_path(&self) -> &'static str {
        match self {
            LibraryKind::Series => "/series",
            LibraryKind::Movies => "/movie",
        }
    }

    fn foreign_key(&self) -> &'static str {
        match self {
            LibraryKind::Series => "seriesId",
            LibraryKind::Movies => "movieId",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadSummary {
    pub state: String,
    pub progress_pct: f64,
    pub eta_seconds: Option<i64>,
    pub is_stalled: bool,
    pub stalled_seconds: Option<i64>,
    pub peers: i64,
    pub size_gb: f64,
    pub torrents: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TorrentDetail {
    pub hash: String,
    pub name: String,
    pub state: String,
    pub progress_pct: f64,
    pub eta_seconds: Option<i64>,
    pub is_stalled: bool,
    pub stalled_seconds: Option<i64>,
    pub peers: i64,
    pub size_gb: f64,
    pub episode: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonSummary {
    pub season_number: i64,
    pub status: String,
    pub episode_file_count: i64,
    pub total_episode_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryItem {
    pub id: i64,
    pub title: String,
    pub year: Option<i32>,
    pub poster_url: Option<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_episodes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_file_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_episodes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seasons: Option<Vec<SeasonSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_file: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub download: Option<DownloadSummary>,
    pub download_items: Vec<TorrentDetail>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryOverview {
    pub configured: bool,
    pub wanted_downloading: Vec<LibraryItem>,
    pub available: Vec<LibraryItem>,
}

impl LibraryOverview {
    fn not_configured() -> Self {
        Self {
            configured: false,
            wanted_downloading: Vec::new(),
            available: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeItem {
    pub id: i64,
    pub episode_number: i64,
    pub title: String,
    pub air_date: Option<String>,
    pub has_file: bool,
    pub status: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonEpisodes {
    pub items: Vec<EpisodeItem>,
    pub season_status: String,
    pub total_episodes: usize,
    pub available_episodes: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRejected {
    pub items: HashMap<i64, bool>,
    pub failures: usize,
}

pub struct Reconciler {
    config: Arc<ServicesConfig>,
    arr: Arc<ArrClient>,
    downloads: Arc<TorrentClient>,
}

impl Reconciler {
    pub fn new(
        config: Arc<ServicesConfig>,
        arr: Arc<ArrClient>,
        downloads: Arc<TorrentClient>,
    ) -> Self {
        Self {
            config,
            arr,
            downloads,
        }
    }

    /// Library + queue + torrents, joined and classified. The library
    /// fetch is fatal; queue and torrent fetches degrade to empty.
    pub async fn library_overview(
        &self,
        kind: LibraryKind,
    ) -> Result<LibraryOverview, UpstreamError> {
        let service = kind.service();
        let Some(svc) = self.config.service(service) else {
            return Ok(LibraryOverview::not_configured());
        };

        let library_path = svc.api_path(kind.library_path());
        let queue_path = svc.api_path(&format!("/queue?page=1&pageSize={}", QUEUE_PAGE_SIZE));

        let (library, queue, torrents) = tokio::join!(
            self.arr.get(service, &library_path),
            self.arr.get(service, &queue_path),
            self.downloads.list_downloads(),
        );

        let library = library?;
        let queue_records = match queue {
            Ok(payload) => queue_records(&payload),
            Err(e) => {
                warn!("{} queue unavailable, reconciling without it: {}", service, e);
                Vec::new()
            }
        };
        let torrent_map = match torrents {
            Ok(map) => map.by_hash,
            Err(e) => {
                warn!("torrent list unavailable, reconciling without it: {}", e);
                HashMap::new()
            }
        };

        let by_item = group_by_foreign_key(&queue_records, kind.foreign_key());
        let base_url = Some(svc.url.as_str());

        let mut wanted_downloading = Vec::new();
        let mut available = Vec::new();
        for raw in library.as_array().map(Vec::as_slice).unwrap_or_default() {
            let Some(id) = raw.get("id").and_then(Value::as_i64) else {
                continue;
            };
            let records = by_item.get(&id).cloned().unwrap_or_default();
            let item = build_item(kind, base_url, id, raw, &records, &torrent_map);
            if item.status == "available" {
                available.push(item);
            } else {
                wanted_downloading.push(item);
            }
        }

        // Stable sort: downloading first, then error, then wanted.
        wanted_downloading.sort_by_key(|item| status_rank(&item.status));

        Ok(LibraryOverview {
            configured: true,
            wanted_downloading,
            available,
        })
    }

    /// Episodes of one season, classified by file presence.
    pub async fn season_episodes(
        &self,
        series_id: i64,
        season_number: i64,
    ) -> Result<SeasonEpisodes, UpstreamError> {
        let service = "sonarr";
        let Some(svc) = self.config.service(service) else {
            return Err(UpstreamError::NotConfigured {
                service: service.to_string(),
            });
        };

        let path = svc.api_path(&format!("/episode?seriesId={}", series_id));
        let payload = self.arr.get(service, &path).await?;

        let mut items: Vec<EpisodeItem> = payload
            .as_array()
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .filter(|ep| ep.get("seasonNumber").and_then(Value::as_i64) == Some(season_number))
            .map(|ep| {
                let has_file = ep.get("hasFile").and_then(Value::as_bool).unwrap_or(false);
                EpisodeItem {
                    id: ep.get("id").and_then(Value::as_i64).unwrap_or_default(),
                    episode_number: ep
                        .get("episodeNumber")
                        .and_then(Value::as_i64)
                        .unwrap_or_default(),
                    title: ep
                        .get("title")
                        .and_then(Value::as_str)
                        .unwrap_or("TBA")
                        .to_string(),
                    air_date: ep
                        .get("airDate")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    has_file,
                    status: if has_file { "available" } else { "wanted" }.to_string(),
                }
            })
            .collect();
        items.sort_by_key(|ep| ep.episode_number);

        let total_episodes = items.len();
        let available_episodes = items.iter().filter(|ep| ep.has_file).count();
        Ok(SeasonEpisodes {
            season_status: season_status(available_episodes as i64, total_episodes as i64)
                .to_string(),
            items,
            total_episodes,
            available_episodes,
        })
    }

    /// Raw releases for one library item, normalized and sorted
    /// rejected-last then seeders-descending.
    pub async fn list_releases(
        &self,
        service: &str,
        item_id: i64,
    ) -> Result<Vec<Release>, UpstreamError> {
        let Some(svc) = self.config.service(service) else {
            return Err(UpstreamError::NotConfigured {
                service: service.to_string(),
            });
        };

        let key = if service == "radarr" { "movieId" } else { "seriesId" };
        let path = svc.api_path(&format!("/release?{}={}", key, item_id));
        let payload = self
            .arr
            .request(
                service,
                &path,
                &RequestOptions::get_with_timeout(RELEASE_TIMEOUT_SECONDS),
            )
            .await?;

        let mut releases: Vec<Release> = payload
            .as_array()
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map(|raw| normalize_release(service, raw))
            .collect();
        releases.sort_by_key(|r| (r.rejected, std::cmp::Reverse(r.seeders.unwrap_or(0))));
        Ok(releases)
    }

    pub async fn has_rejected_releases(
        &self,
        service: &str,
        item_id: i64,
    ) -> Result<bool, UpstreamError> {
        let releases = self.list_releases(service, item_id).await?;
        Ok(releases.iter().any(|r| r.rejected))
    }

    /// Runs the rejected check for every id through the bounded runner.
    /// Each id is a full release-list fetch — deliberately uncached.
    /// Partial failures are counted, never failing the batch.
    pub async fn batch_rejected(
        &self,
        service: &str,
        item_ids: Vec<i64>,
    ) -> Result<BatchRejected, UpstreamError> {
        if !self.config.is_configured(service) {
            return Err(UpstreamError::NotConfigured {
                service: service.to_string(),
            });
        }

        let limit = if service == "sonarr" {
            SONARR_RELEASE_CONCURRENCY
        } else {
            DEFAULT_RELEASE_CONCURRENCY
        };

        let outcomes = map_limit(item_ids, limit, |id| async move {
            let has_rejected = self.has_rejected_releases(service, id).await?;
            Ok((id, has_rejected))
        })
        .await;

        let mut items = HashMap::new();
        let mut failures = 0;
        for outcome in outcomes {
            match outcome {
                Ok((id, has_rejected)) => {
                    items.insert(id, has_rejected);
                }
                Err(e) => {
                    warn!("{} rejected-release check failed: {}", service, e);
                    failures += 1;
                }
            }
        }
        Ok(BatchRejected { items, failures })
    }

    /// Forwards the opaque release payload back to the manager's grab
    /// endpoint. Never retried; a failure surfaces to the caller.
    pub async fn grab_release(
        &self,
        service: &str,
        release: Value,
    ) -> Result<Value, UpstreamError> {
        let Some(svc) = self.config.service(service) else {
            return Err(UpstreamError::NotConfigured {
                service: service.to_string(),
            });
        };
        let path = svc.api_path("/release");
        self.arr
            .request(
                service,
                &path,
                &RequestOptions::post(release, GRAB_TIMEOUT_SECONDS),
            )
            .await
    }
}

/// The queue endpoint answers `{records: [...]}` on current versions
/// and a bare array on older ones.
fn queue_records(payload: &Value) -> Vec<Value> {
    if let Some(records) = payload.get("records").and_then(Value::as_array) {
        return records.clone();
    }
    payload.as_array().cloned().unwrap_or_default()
}

fn group_by_foreign_key<'a>(
    records: &'a [Value],
    key: &str,
) -> HashMap<i64, Vec<&'a Value>> {
    let mut grouped: HashMap<i64, Vec<&Value>> = HashMap::new();
    for record in records {
        if let Some(id) = record.get(key).and_then(Value::as_i64) {
            grouped.entry(id).or_default().push(record);
        }
    }
    grouped
}

fn status_rank(status: &str) -> u8 {
    match status {
        "downloading" => 0,
        "error" => 1,
        "wanted" => 2,
        _ => 3,
    }
}

fn season_status(files: i64, total: i64) -> &'static str {
    if total > 0 && files >= total {
        "available"
    } else if files > 0 {
        "partially_available"
    } else {
        "wanted"
    }
}

fn item_year(raw: &Value) -> Option<i32> {
    for field in ["year", "firstAired", "inCinemas", "digitalRelease"] {
        if let Some(year) = raw.get(field).and_then(|v| extract_year(v)) {
            if year > 0 {
                return Some(year);
            }
        }
    }
    None
}

/// Torrents referenced by the given queue records, deduplicated by
/// hash — a season pack is tracked once per episode but must only be
/// counted once.
fn matched_torrents<'a>(
    records: &[&Value],
    torrent_map: &'a HashMap<String, DownloadInfo>,
) -> Vec<&'a DownloadInfo> {
    let mut seen = HashSet::new();
    let mut matched = Vec::new();
    for record in records {
        let hash = record
            .get("downloadId")
            .and_then(Value::as_str)
            .or_else(|| record.get("trackedDownloadId").and_then(Value::as_str))
            .map(normalize_hash)
            .unwrap_or_default();
        if hash.is_empty() || !seen.insert(hash.clone()) {
            continue;
        }
        if let Some(info) = torrent_map.get(&hash) {
            matched.push(info);
        }
    }
    matched
}

/// Never constructed for zero matched torrents.
fn summarize_downloads(matched: &[&DownloadInfo]) -> Option<DownloadSummary> {
    if matched.is_empty() {
        return None;
    }
    let progress_sum: f64 = matched.iter().map(|t| t.progress_pct).sum();
    let eta_seconds = matched
        .iter()
        .filter_map(|t| t.eta_seconds)
        .filter(|eta| *eta > 0)
        .min();
    let stalled_seconds = matched
        .iter()
        .filter(|t| t.is_stalled)
        .filter_map(|t| t.stalled_seconds)
        .max();
    Some(DownloadSummary {
        state: matched[0].state.clone(),
        progress_pct: round2(progress_sum / matched.len() as f64),
        eta_seconds,
        is_stalled: matched.iter().any(|t| t.is_stalled),
        stalled_seconds,
        peers: matched.iter().map(|t| t.peers).sum(),
        size_gb: round2(matched.iter().map(|t| t.size_gb).sum()),
        torrents: matched.len(),
    })
}

fn torrent_details(matched: &[&DownloadInfo]) -> Vec<TorrentDetail> {
    matched
        .iter()
        .map(|t| TorrentDetail {
            hash: t.hash.clone(),
            name: t.name.clone(),
            state: t.state.clone(),
            progress_pct: t.progress_pct,
            eta_seconds: t.eta_seconds,
            is_stalled: t.is_stalled,
            stalled_seconds: t.stalled_seconds,
            peers: t.peers,
            size_gb: t.size_gb,
            episode: extract_episode_hint(&t.name),
        })
        .collect()
}

fn movie_summary(records: &[&Value], has_file: bool, queue_state: QueueState) -> String {
    if queue_state == QueueState::Error {
        if let Some(message) = records.iter().find_map(|r| {
            r.get("errorMessage")
                .and_then(Value::as_str)
                .filter(|m| !m.trim().is_empty())
        }) {
            return message.to_string();
        }
    }
    if let Some(state) = records.iter().find_map(|r| {
        r.get("status")
            .and_then(Value::as_str)
            .or_else(|| r.get("trackedDownloadState").and_then(Value::as_str))
            .filter(|s| !s.trim().is_empty())
    }) {
        return state.to_string();
    }
    if has_file {
        "Available".to_string()
    } else {
        "Missing".to_string()
    }
}

fn build_item(
    kind: LibraryKind,
    base_url: Option<&str>,
    id: i64,
    raw: &Value,
    records: &[&Value],
    torrent_map: &HashMap<String, DownloadInfo>,
) -> LibraryItem {
    let queue_state = queue_state_from_records(records.iter().copied());

    let matched = matched_torrents(records, torrent_map);
    let download = summarize_downloads(&matched);
    let download_items = torrent_details(&matched);

    let title = raw
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or("Untitled")
        .to_string();
    let year = item_year(raw);
    let poster_url = pick_poster_url(base_url, raw);

    match kind {
        LibraryKind::Series => {
            let stats = raw.get("statistics");
            let files = stats
                .and_then(|s| s.get("episodeFileCount"))
                .and_then(Value::as_i64)
                .unwrap_or(0);
            let total = stats
                .and_then(|s| s.get("episodeCount"))
                .and_then(Value::as_i64)
                .or_else(|| {
                    stats
                        .and_then(|s| s.get("totalEpisodeCount"))
                        .and_then(Value::as_i64)
                })
                .unwrap_or(0);
            let missing = (total - files).max(0);
            let status = classify_status(queue_state, missing > 0);

            let seasons = raw.get("seasons").and_then(Value::as_array).map(|list| {
                list.iter()
                    .map(|season| {
                        let season_stats = season.get("statistics");
                        let files = season_stats
                            .and_then(|s| s.get("episodeFileCount"))
                            .and_then(Value::as_i64)
                            .unwrap_or(0);
                        let total = season_stats
                            .and_then(|s| s.get("totalEpisodeCount"))
                            .and_then(Value::as_i64)
                            .unwrap_or(0);
                        SeasonSummary {
                            season_number: season
                                .get("seasonNumber")
                                .and_then(Value::as_i64)
                                .unwrap_or_default(),
                            status: season_status(files, total).to_string(),
                            episode_file_count: files,
                            total_episode_count: total,
                        }
                    })
                    .collect()
            });

            LibraryItem {
                id,
                title,
                year,
                poster_url,
                status: status.to_string(),
                total_episodes: Some(total),
                episode_file_count: Some(files),
                missing_episodes: Some(missing),
                seasons,
                has_file: None,
                summary: None,
                download,
                download_items,
            }
        }
        LibraryKind::Movies => {
            let has_file = raw.get("hasFile").and_then(Value::as_bool).unwrap_or(false);
            let status = classify_status(queue_state, !has_file);
            let summary = movie_summary(records, has_file, queue_state);

            LibraryItem {
                id,
                title,
                year,
                poster_url,
                status: status.to_string(),
                total_episodes: None,
                episode_file_count: None,
                missing_episodes: None,
                seasons: None,
                has_file: Some(has_file),
                summary: Some(summary),
                download,
                download_items,
            }
        }
    }
}

/// Strict priority chain: error beats downloading beats wanted beats
/// available.
fn classify_status(queue_state: QueueState, missing_content: bool) -> &'static str {
    match queue_state {
        QueueState::Error => "error",
        QueueState::Downloading => "downloading",
        QueueState::Idle => {
            if missing_content {
                "wanted"
            } else {
                "available"
            }
        }
    }
}
