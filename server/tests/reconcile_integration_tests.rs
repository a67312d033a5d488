//! Reconciliation engine integration tests: a wiremock sonarr/radarr
//! plus a wiremock qBittorrent, joined end to end.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use server::config::{DownloadClientConfig, ServiceConfig, ServicesConfig};
use server::downloads::TorrentClient;
use server::logbuf::OpsLogBuffer;
use server::reconcile::{LibraryKind, Reconciler};
use server::upstream::ArrClient;

fn build_reconciler(
    sonarr_url: Option<&str>,
    radarr_url: Option<&str>,
    qbit_url: Option<&str>,
) -> Reconciler {
    let mut services = HashMap::new();
    if let Some(url) = sonarr_url {
        services.insert(
            "sonarr".to_string(),
            ServiceConfig::new("sonarr", url, "test-key"),
        );
    }
    if let Some(url) = radarr_url {
        services.insert(
            "radarr".to_string(),
            ServiceConfig::new("radarr", url, "test-key"),
        );
    }
    let config = Arc::new(ServicesConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        static_dir: "no-such-dir".to_string(),
        services,
        download_client: DownloadClientConfig {
            url: qbit_url.map(str::to_string),
            username: None,
            password: None,
        },
    });
    let ops_log = Arc::new(OpsLogBuffer::new(64));
    let arr = Arc::new(ArrClient::new(config.clone(), ops_log.clone()));
    let downloads = Arc::new(TorrentClient::new(config.clone(), ops_log));
    Reconciler::new(config, arr, downloads)
}

async fn mount_series_fixture(sonarr: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v3/series"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": 1,
                "title": "Alpha",
                "year": 2020,
                "images": [{"coverType": "poster", "url": "/img/alpha.jpg"}],
                "statistics": {"episodeFileCount": 4, "episodeCount": 10},
                "seasons": [
                    {"seasonNumber": 1, "statistics": {"episodeFileCount": 4, "totalEpisodeCount": 4}},
                    {"seasonNumber": 2, "statistics": {"episodeFileCount": 0, "totalEpisodeCount": 6}},
                ],
            },
            {
                "id": 2,
                "title": "Beta",
                "year": 2018,
                "statistics": {"episodeFileCount": 8, "episodeCount": 8},
            },
            {
                "id": 3,
                "title": "Gamma",
                "year": 2022,
                "statistics": {"episodeFileCount": 0, "episodeCount": 5},
            },
        ])))
        .mount(sonarr)
        .await;
}

async fn mount_queue_fixture(sonarr: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v3/queue"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [
                {"id": 11, "seriesId": 1, "downloadId": "AAA111"},
                {"id": 12, "seriesId": 1, "downloadId": "BBB222"},
                {"id": 13, "seriesId": 3, "errorMessage": "no space left on device"},
            ],
        })))
        .mount(sonarr)
        .await;
}

async fn mount_torrents_fixture(qbit: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v2/torrents/info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "hash": "aaa111",
                "name": "Alpha.S01E05.1080p",
                "state": "downloading",
                "progress": 0.40,
                "eta": 600,
                "num_seeds": 5,
                "num_leechs": 1,
                "size": 1073741824i64,
            },
            {
                "hash": "bbb222",
                "name": "Alpha.S01E06.1080p",
                "state": "stalledDL",
                "progress": 0.60,
                "eta": 0,
                "num_seeds": 0,
                "num_leechs": 0,
                "size": 1073741824i64,
            },
        ])))
        .mount(qbit)
        .await;
}

#[tokio::test]
async fn joins_queue_records_to_torrents_and_classifies_items() {
    let sonarr = MockServer::start().await;
    let qbit = MockServer::start().await;
    mount_series_fixture(&sonarr).await;
    mount_queue_fixture(&sonarr).await;
    mount_torrents_fixture(&qbit).await;

    let reconciler = build_reconciler(Some(&sonarr.uri()), None, Some(&qbit.uri()));
    let overview = reconciler
        .library_overview(LibraryKind::Series)
        .await
        .unwrap();

    assert!(overview.configured);

    // Downloading ranks ahead of error in the wanted list.
    assert_eq!(overview.wanted_downloading.len(), 2);
    let alpha = &overview.wanted_downloading[0];
    let gamma = &overview.wanted_downloading[1];
    assert_eq!(alpha.title, "Alpha");
    assert_eq!(alpha.status, "downloading");
    assert_eq!(gamma.title, "Gamma");
    assert_eq!(gamma.status, "error");

    // Aggregation across the two matched torrents.
    let download = alpha.download.as_ref().unwrap();
    assert_eq!(download.progress_pct, 50.0);
    assert_eq!(download.eta_seconds, Some(600));
    assert!(download.is_stalled);
    assert_eq!(download.peers, 6);
    assert_eq!(download.size_gb, 2.0);
    assert_eq!(download.torrents, 2);
    assert_eq!(download.state, "downloading");

    assert_eq!(alpha.download_items.len(), 2);
    assert_eq!(alpha.download_items[0].episode.as_deref(), Some("S01E05"));

    // Fully stocked series land in available with no summary object.
    assert_eq!(overview.available.len(), 1);
    let beta = &overview.available[0];
    assert_eq!(beta.title, "Beta");
    assert_eq!(beta.status, "available");
    assert!(beta.download.is_none());

    // Poster resolved against the sonarr base URL.
    assert_eq!(
        alpha.poster_url.as_deref(),
        Some(format!("{}/img/alpha.jpg", sonarr.uri()).as_str())
    );

    // Season-level classification.
    let seasons = alpha.seasons.as_ref().unwrap();
    assert_eq!(seasons[0].status, "available");
    assert_eq!(seasons[1].status, "wanted");

    // Error status never leaks a download summary without torrents.
    assert!(gamma.download.is_none());
    assert_eq!(gamma.missing_episodes, Some(5));
}

#[tokio::test]
async fn error_status_beats_wanted_even_with_missing_files() {
    let sonarr = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/series"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 3, "title": "Gamma", "statistics": {"episodeFileCount": 0, "episodeCount": 5}},
        ])))
        .mount(&sonarr)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/queue"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [{"id": 9, "seriesId": 3, "status": "failed"}],
        })))
        .mount(&sonarr)
        .await;

    let reconciler = build_reconciler(Some(&sonarr.uri()), None, None);
    let overview = reconciler
        .library_overview(LibraryKind::Series)
        .await
        .unwrap();
    assert_eq!(overview.wanted_downloading[0].status, "error");
}

#[tokio::test]
async fn queue_and_torrent_failures_degrade_gracefully() {
    let sonarr = MockServer::start().await;
    mount_series_fixture(&sonarr).await;
    Mock::given(method("GET"))
        .and(path("/api/v3/queue"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&sonarr)
        .await;

    // Download client configured but unreachable.
    let reconciler = build_reconciler(Some(&sonarr.uri()), None, Some("http://127.0.0.1:9"));
    let overview = reconciler
        .library_overview(LibraryKind::Series)
        .await
        .unwrap();

    // Without queue data everything incomplete is merely wanted.
    assert!(overview.configured);
    let statuses: Vec<&str> = overview
        .wanted_downloading
        .iter()
        .map(|i| i.status.as_str())
        .collect();
    assert_eq!(statuses, vec!["wanted", "wanted"]);
}

#[tokio::test]
async fn library_failure_is_fatal() {
    let sonarr = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/series"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&sonarr)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/queue"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"records": []})))
        .mount(&sonarr)
        .await;

    let reconciler = build_reconciler(Some(&sonarr.uri()), None, None);
    assert!(reconciler
        .library_overview(LibraryKind::Series)
        .await
        .is_err());
}

#[tokio::test]
async fn unconfigured_manager_short_circuits() {
    let reconciler = build_reconciler(None, None, None);
    let overview = reconciler
        .library_overview(LibraryKind::Series)
        .await
        .unwrap();
    assert!(!overview.configured);
    assert!(overview.wanted_downloading.is_empty());
    assert!(overview.available.is_empty());
}

#[tokio::test]
async fn movie_overview_uses_has_file_for_wanted() {
    let radarr = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/movie"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 5, "title": "Film A", "year": 2021, "hasFile": true},
            {"id": 6, "title": "Film B", "year": 2023, "hasFile": false},
        ])))
        .mount(&radarr)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/queue"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"records": []})))
        .mount(&radarr)
        .await;

    let reconciler = build_reconciler(None, Some(&radarr.uri()), None);
    let overview = reconciler
        .library_overview(LibraryKind::Movies)
        .await
        .unwrap();

    assert_eq!(overview.available.len(), 1);
    assert_eq!(overview.available[0].title, "Film A");
    assert_eq!(overview.wanted_downloading.len(), 1);
    let film_b = &overview.wanted_downloading[0];
    assert_eq!(film_b.status, "wanted");
    assert_eq!(film_b.has_file, Some(false));
    assert_eq!(film_b.summary.as_deref(), Some("Missing"));
}

#[tokio::test]
async fn season_episodes_filter_sort_and_classify() {
    let sonarr = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/episode"))
        .and(query_param("seriesId", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 31, "seasonNumber": 2, "episodeNumber": 3, "title": "Three", "hasFile": false},
            {"id": 29, "seasonNumber": 2, "episodeNumber": 1, "title": "One", "hasFile": true},
            {"id": 40, "seasonNumber": 3, "episodeNumber": 1, "title": "Other Season", "hasFile": true},
            {"id": 30, "seasonNumber": 2, "episodeNumber": 2, "title": "Two", "hasFile": true},
        ])))
        .mount(&sonarr)
        .await;

    let reconciler = build_reconciler(Some(&sonarr.uri()), None, None);
    let season = reconciler.season_episodes(1, 2).await.unwrap();

    let numbers: Vec<i64> = season.items.iter().map(|e| e.episode_number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    assert_eq!(season.total_episodes, 3);
    assert_eq!(season.available_episodes, 2);
    assert_eq!(season.season_status, "partially_available");
    assert_eq!(season.items[2].status, "wanted");
}

#[tokio::test]
async fn releases_sort_rejected_last_then_seeders_desc() {
    let sonarr = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/release"))
        .and(query_param("seriesId", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"title": "rejected high seeders", "seeders": 500, "rejections": ["unwanted quality"]},
            {"title": "accepted low seeders", "seeders": 2, "approved": true},
            {"title": "accepted high seeders", "seeders": 90, "approved": true},
        ])))
        .mount(&sonarr)
        .await;

    let reconciler = build_reconciler(Some(&sonarr.uri()), None, None);
    let releases = reconciler.list_releases("sonarr", 1).await.unwrap();

    let titles: Vec<&str> = releases.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(
        titles,
        vec![
            "accepted high seeders",
            "accepted low seeders",
            "rejected high seeders",
        ]
    );
    assert!(releases[2].rejected);
    assert_eq!(releases[2].rejections, vec!["unwanted quality"]);
}

#[tokio::test]
async fn batch_rejected_counts_failures_without_failing() {
    let sonarr = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/release"))
        .and(query_param("seriesId", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"title": "bad", "rejections": ["nope"]},
        ])))
        .mount(&sonarr)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/release"))
        .and(query_param("seriesId", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"title": "good", "approved": true},
        ])))
        .mount(&sonarr)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/release"))
        .and(query_param("seriesId", "3"))
        .respond_with(ResponseTemplate::new(500).set_body_string("indexer down"))
        .mount(&sonarr)
        .await;

    let reconciler = build_reconciler(Some(&sonarr.uri()), None, None);
    let batch = reconciler
        .batch_rejected("sonarr", vec![1, 2, 3])
        .await
        .unwrap();

    assert_eq!(batch.items.get(&1), Some(&true));
    assert_eq!(batch.items.get(&2), Some(&false));
    assert_eq!(batch.items.get(&3), None);
    assert_eq!(batch.failures, 1);
}

#[tokio::test]
async fn season_pack_torrent_is_counted_once() {
    let sonarr = MockServer::start().await;
    let qbit = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/series"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "title": "Alpha", "statistics": {"episodeFileCount": 0, "episodeCount": 2}},
        ])))
        .mount(&sonarr)
        .await;
    // Two queue records (one per episode) referencing the same pack.
    Mock::given(method("GET"))
        .and(path("/api/v3/queue"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [
                {"id": 1, "seriesId": 1, "downloadId": "PACK01"},
                {"id": 2, "seriesId": 1, "downloadId": "pack01"},
            ],
        })))
        .mount(&sonarr)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/torrents/info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "hash": "pack01",
                "name": "Alpha.S01.Complete",
                "state": "downloading",
                "progress": 0.5,
                "eta": 100,
                "num_seeds": 3,
                "num_leechs": 0,
                "size": 1073741824i64,
            },
        ])))
        .mount(&qbit)
        .await;

    let reconciler = build_reconciler(Some(&sonarr.uri()), None, Some(&qbit.uri()));
    let overview = reconciler
        .library_overview(LibraryKind::Series)
        .await
        .unwrap();
    let download = overview.wanted_downloading[0].download.as_ref().unwrap();
    assert_eq!(download.torrents, 1);
    assert_eq!(download.size_gb, 1.0);
}
