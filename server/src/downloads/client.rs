//! Adapter for the qBittorrent Web API (v2).
//!
//! Torrent records are normalized into a common download-info shape
//! keyed by lowercased content hash — the join key the reconciliation
//! engine uses against manager queue records.

use chrono::{TimeZone, Utc};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

use crate::config::{ServicesConfig, DOWNLOAD_CLIENT_NAME};
use crate::constants::DEFAULT_TIMEOUT_SECONDS;
use crate::errors::{truncate_snippet, UpstreamError};
use crate::logbuf::OpsLogBuffer;
use crate::normalize::{bytes_to_gb, normalize_hash, round2, LogEntry};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadInfo {
    pub hash: String,
    pub name: String,
    pub state: String,
    pub progress_pct: f64,
    pub eta_seconds: Option<i64>,
    pub is_stalled: bool,
    pub stalled_seconds: Option<i64>,
    pub peers: i64,
    pub size_gb: f64,
}

/// Result of a torrent-list fetch; `configured: false` marks the
/// sentinel returned without a network call when credentials are
/// absent.
#[derive(Debug, Default)]
pub struct TorrentMap {
    pub configured: bool,
    pub by_hash: HashMap<String, DownloadInfo>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientStatus {
    pub configured: bool,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queueing: Option<bool>,
}

pub struct TorrentClient {
    config: Arc<ServicesConfig>,
    client: Client,
    ops_log: Arc<OpsLogBuffer>,
}

impl TorrentClient {
    pub fn new(config: Arc<ServicesConfig>, ops_log: Arc<OpsLogBuffer>) -> Self {
        Self {
            config,
            client: Client::new(),
            ops_log,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config.download_client.is_configured()
    }

    fn base_url(&self) -> Option<&str> {
        self.config.download_client.url.as_deref()
    }

    /// Authenticates and returns the session cookie. An empty cookie
    /// means "proceed without a session" — deployments with anonymous
    /// local access configure no credentials.
    pub async fn login(&self) -> Result<String, UpstreamError> {
        let Some(base) = self.base_url() else {
            return Err(UpstreamError::NotConfigured {
                service: DOWNLOAD_CLIENT_NAME.to_string(),
            });
        };
        let dc = &self.config.download_client;
        if !dc.has_credentials() {
            return Ok(String::new());
        }

        let url = format!("{}/api/v2/auth/login", base);
        let form = [
            ("username", dc.username.as_deref().unwrap_or_default()),
            ("password", dc.password.as_deref().unwrap_or_default()),
        ];
        let response = match timeout(
            Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            self.client.post(&url).form(&form).send(),
        )
        .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                return Err(self.fail(UpstreamError::Login {
                    reason: e.to_string(),
                }));
            }
            Err(_) => {
                return Err(self.fail(UpstreamError::Login {
                    reason: format!("login timed out after {}s", DEFAULT_TIMEOUT_SECONDS),
                }));
            }
        };

        if !response.status().is_success() {
            return Err(self.fail(UpstreamError::Login {
                reason: format!("status {}", response.status().as_u16()),
            }));
        }

        let cookie = response
            .headers()
            .get_all(reqwest::header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with("SID="))
            .and_then(|v| v.split(';').next())
            .map(str::to_string)
            .unwrap_or_default();

        // qBittorrent answers 200 with a bare "Fails." on bad
        // credentials instead of a 4xx.
        let body = response.text().await.unwrap_or_default();
        if body.trim() == "Fails." {
            return Err(self.fail(UpstreamError::Login {
                reason: "invalid credentials".to_string(),
            }));
        }

        Ok(cookie)
    }

    /// Fetches all torrents into a hash-keyed map. Torrents without a
    /// resolvable hash are discarded before indexing.
    pub async fn list_downloads(&self) -> Result<TorrentMap, UpstreamError> {
        if !self.is_configured() {
            return Ok(TorrentMap::default());
        }
        let cookie = self.login().await?;
        let payload = self.get_json("/api/v2/torrents/info", &cookie).await?;

        let mut by_hash = HashMap::new();
        for torrent in payload.as_array().map(Vec::as_slice).unwrap_or_default() {
            let hash = torrent
                .get("hash")
                .and_then(Value::as_str)
                .map(normalize_hash)
                .unwrap_or_default();
            if hash.is_empty() {
                continue;
            }
            by_hash.insert(hash.clone(), normalize_torrent(hash, torrent));
        }

        Ok(TorrentMap {
            configured: true,
            by_hash,
        })
    }

    /// Version and transfer info fetched concurrently; any failure
    /// degrades to "offline" with the failure's message. Never errors.
    pub async fn get_status(&self) -> ClientStatus {
        if !self.is_configured() {
            return ClientStatus {
                configured: false,
                status: "not_configured".to_string(),
                version: None,
                message: "Not configured".to_string(),
                queueing: None,
            };
        }

        let cookie = match self.login().await {
            Ok(cookie) => cookie,
            Err(e) => return offline_status(e),
        };

        let (version, transfer) = tokio::join!(
            self.get_text("/api/v2/app/version", &cookie),
            self.get_json("/api/v2/transfer/info", &cookie),
        );

        let version = match version {
            Ok(v) => v.trim().to_string(),
            Err(e) => return offline_status(e),
        };
        let transfer = match transfer {
            Ok(t) => t,
            Err(e) => return offline_status(e),
        };

        let connection = transfer
            .get("connection_status")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        ClientStatus {
            configured: true,
            status: "online".to_string(),
            version: Some(version),
            message: format!("Connection: {}", connection),
            queueing: transfer.get("queueing").and_then(Value::as_bool),
        }
    }

    /// Main log, severity codes folded into the shared level enum and
    /// epoch-second timestamps converted to ISO-8601.
    pub async fn get_logs(&self) -> Result<Vec<LogEntry>, UpstreamError> {
        if !self.is_configured() {
            return Ok(Vec::new());
        }
        let cookie = self.login().await?;
        let payload = self
            .get_json("/api/v2/log/main?last_known_id=-1", &cookie)
            .await?;

        let entries = payload
            .as_array()
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map(|entry| {
                let level = match entry.get("type").and_then(Value::as_i64) {
                    Some(8) => "fatal",
                    Some(4) => "warn",
                    _ => "info",
                };
                let time = entry
                    .get("timestamp")
                    .and_then(Value::as_i64)
                    .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
                    .map(|t| t.to_rfc3339());
                LogEntry {
                    service: DOWNLOAD_CLIENT_NAME.to_string(),
                    level: level.to_string(),
                    message: entry
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("No message")
                        .to_string(),
                    time,
                }
            })
            .collect();

        Ok(entries)
    }

    async fn send_get(
        &self,
        path: &str,
        cookie: &str,
    ) -> Result<reqwest::Response, UpstreamError> {
        let Some(base) = self.base_url() else {
            return Err(UpstreamError::NotConfigured {
                service: DOWNLOAD_CLIENT_NAME.to_string(),
            });
        };
        let url = format!("{}{}", base, path);
        let mut request = self.client.get(&url);
        if !cookie.is_empty() {
            request = request.header(reqwest::header::COOKIE, cookie);
        }

        let response = match timeout(
            Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            request.send(),
        )
        .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                return Err(self.fail(UpstreamError::Network {
                    service: DOWNLOAD_CLIENT_NAME.to_string(),
                    reason: e.to_string(),
                }));
            }
            Err(_) => {
                return Err(self.fail(UpstreamError::Timeout {
                    service: DOWNLOAD_CLIENT_NAME.to_string(),
                    endpoint: path.to_string(),
                    seconds: DEFAULT_TIMEOUT_SECONDS,
                }));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let snippet = truncate_snippet(&response.text().await.unwrap_or_default());
            return Err(self.fail(UpstreamError::Status {
                service: DOWNLOAD_CLIENT_NAME.to_string(),
                status: status.as_u16(),
                snippet,
            }));
        }
        Ok(response)
    }

    async fn get_json(&self, path: &str, cookie: &str) -> Result<Value, UpstreamError> {
        let response = self.send_get(path, cookie).await?;
        let body = response.text().await.unwrap_or_default();
        serde_json::from_str(&body).map_err(|_| {
            self.fail(UpstreamError::NonJson {
                service: DOWNLOAD_CLIENT_NAME.to_string(),
                endpoint: path.to_string(),
                snippet: truncate_snippet(&body),
            })
        })
    }

    async fn get_text(&self, path: &str, cookie: &str) -> Result<String, UpstreamError> {
        let response = self.send_get(path, cookie).await?;
        Ok(response.text().await.unwrap_or_default())
    }

    fn fail(&self, error: UpstreamError) -> UpstreamError {
        warn!(kind = error.kind(), "download client request failed: {}", error);
        self.ops_log.push("warn", error.to_string());
        error
    }
}

fn offline_status(error: UpstreamError) -> ClientStatus {
    ClientStatus {
        configured: true,
        status: "offline".to_string(),
        version: None,
        message: error.to_string(),
        queueing: None,
    }
}

fn normalize_torrent(hash: String, torrent: &Value) -> DownloadInfo {
    let state = torrent
        .get("state")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    let is_stalled = state.to_lowercase().contains("stalled");
    let stalled_seconds = if is_stalled {
        torrent
            .get("last_activity")
            .and_then(Value::as_i64)
            .filter(|ts| *ts > 0)
            .map(|ts| (Utc::now().timestamp() - ts).max(0))
    } else {
        None
    };
    let seeds = torrent.get("num_seeds").and_then(Value::as_i64).unwrap_or(0);
    let leechers = torrent.get("num_leechs").and_then(Value::as_i64).unwrap_or(0);

    DownloadInfo {
        hash,
        name: torrent
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_string(),
        state,
        progress_pct: round2(torrent.get("progress").and_then(Value::as_f64).unwrap_or(0.0) * 100.0),
        eta_seconds: torrent
            .get("eta")
            .and_then(Value::as_i64)
            .filter(|eta| *eta > 0),
        is_stalled,
        stalled_seconds,
        peers: seeds + leechers,
        size_gb: bytes_to_gb(torrent.get("size").and_then(Value::as_f64).unwrap_or(0.0)),
    }
}
