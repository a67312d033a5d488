//! Pure normalization functions for the heterogeneous payload shapes
//! the upstream managers return. Total functions: malformed input
//! degrades to `None`/defaults, never a panic.
//!
//! Upstream field names vary across services and versions, so every
//! extractor probes a fixed list of candidate fields in priority order.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::OnceLock;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn bytes_to_gb(bytes: f64) -> f64 {
    round2(bytes / BYTES_PER_GB)
}

/// Year from a mixed date/string/number field: numeric passthrough,
/// 4-digit string as number, otherwise a date parse taking the UTC year.
pub fn extract_year(value: &Value) -> Option<i32> {
    if let Some(n) = value.as_i64() {
        return Some(n as i32);
    }
    if let Some(f) = value.as_f64() {
        return Some(f as i32);
    }
    let text = value.as_str()?.trim();
    if text.len() == 4 && text.chars().all(|c| c.is_ascii_digit()) {
        return text.parse().ok();
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc).year());
    }
    if let Ok(parsed) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(parsed.year());
    }
    None
}

/// Resolves a poster/asset path against a service base URL, keeping
/// absolute URLs as-is and guaranteeing exactly one path separator.
pub fn build_asset_url(base: Option<&str>, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.starts_with("http://") || raw.starts_with("https://") {
        return Some(raw.to_string());
    }
    let base = base?.trim_end_matches('/');
    Some(format!("{}/{}", base, raw.trim_start_matches('/')))
}

/// Poster selection: the image with cover type "poster", else the first
/// image; the raw path is tried as `remoteUrl` then `url`.
pub fn pick_poster_url(base: Option<&str>, item: &Value) -> Option<String> {
    let images = item.get("images")?.as_array()?;
    let image = images
        .iter()
        .find(|img| {
            img.get("coverType")
                .and_then(Value::as_str)
                .map(|t| t.eq_ignore_ascii_case("poster"))
                .unwrap_or(false)
        })
        .or_else(|| images.first())?;
    let raw = image
        .get("remoteUrl")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .or_else(|| image.get("url").and_then(Value::as_str))?;
    build_asset_url(base, raw)
}

/// The universal join key between queue records and torrents.
pub fn normalize_hash(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn episode_range_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)S\d{1,2}E\d{1,3}-E?\d{1,3}").expect("static regex"))
}

fn episode_single_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)S\d{1,2}E\d{1,3}").expect("static regex"))
}

/// Extracts an `SxxEyy` or `SxxEyy-Ezz` display hint from a release or
/// torrent name. A range match wins over its single-episode prefix.
pub fn extract_episode_hint(text: &str) -> Option<String> {
    if let Some(m) = episode_range_regex().find(text) {
        return Some(m.as_str().to_string());
    }
    episode_single_regex()
        .find(text)
        .map(|m| m.as_str().to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Idle,
    Downloading,
    Error,
}

impl QueueState {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueState::Idle => "idle",
            QueueState::Downloading => "downloading",
            QueueState::Error => "error",
        }
    }
}

fn record_has_error(record: &Value) -> bool {
    let has_message = record
        .get("errorMessage")
        .and_then(Value::as_str)
        .map(|m| !m.trim().is_empty())
        .unwrap_or(false);
    let failed_status = record
        .get("status")
        .and_then(Value::as_str)
        .map(|s| s.eq_ignore_ascii_case("failed"))
        .unwrap_or(false);
    has_message || failed_status
}

/// Error takes precedence over mere presence of records.
pub fn queue_state_from_records<'a>(records: impl IntoIterator<Item = &'a Value>) -> QueueState {
    let mut any = false;
    for record in records {
        if record_has_error(record) {
            return QueueState::Error;
        }
        any = true;
    }
    if any {
        QueueState::Downloading
    } else {
        QueueState::Idle
    }
}

/// The managers signal rejection three different ways: an explicit
/// flag, an approval flag set to false, or a non-empty rejection
/// list/string.
pub fn is_rejected_release_raw(raw: &Value) -> bool {
    if raw.get("rejected").and_then(Value::as_bool) == Some(true) {
        return true;
    }
    if raw.get("approved").and_then(Value::as_bool) == Some(false) {
        return true;
    }
    !rejection_reasons(raw).is_empty()
}

/// Flattens the rejection field into a list of human-readable reasons,
/// whether the source used a string, a string list, or objects with a
/// `reason` field.
pub fn rejection_reasons(raw: &Value) -> Vec<String> {
    match raw.get("rejections") {
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        Some(Value::Array(entries)) => entries
            .iter()
            .filter_map(|entry| {
                entry
                    .as_str()
                    .map(str::to_string)
                    .or_else(|| {
                        entry
                            .get("reason")
                            .and_then(Value::as_str)
                            .map(str::to_string)
                    })
            })
            .filter(|reason| !reason.trim().is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    pub service: String,
    pub guid: Option<String>,
    pub indexer_id: Option<i64>,
    pub title: String,
    pub indexer: Option<String>,
    pub age: Option<i64>,
    pub size: Option<i64>,
    pub size_gb: Option<f64>,
    pub seeders: Option<i64>,
    pub leechers: Option<i64>,
    pub language: Option<String>,
    pub quality: Option<String>,
    pub protocol: Option<String>,
    pub rejected: bool,
    pub rejections: Vec<String>,
    /// Opaque original payload, passed back verbatim on grab.
    pub full: Value,
}

fn release_language(raw: &Value) -> Option<String> {
    if let Some(lang) = raw.get("language") {
        if let Some(s) = lang.as_str() {
            return Some(s.to_string());
        }
        if let Some(name) = lang.get("name").and_then(Value::as_str) {
            return Some(name.to_string());
        }
    }
    raw.get("languages")
        .and_then(Value::as_array)
        .and_then(|list| list.first())
        .and_then(|first| first.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn release_quality(raw: &Value) -> Option<String> {
    let quality = raw.get("quality")?;
    if let Some(s) = quality.as_str() {
        return Some(s.to_string());
    }
    quality
        .get("quality")
        .and_then(|q| q.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

pub fn normalize_release(service: &str, raw: &Value) -> Release {
    let size = raw
        .get("size")
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)));
    Release {
        service: service.to_string(),
        guid: raw.get("guid").and_then(Value::as_str).map(str::to_string),
        indexer_id: raw.get("indexerId").and_then(Value::as_i64),
        title: raw
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or("Untitled release")
            .to_string(),
        indexer: raw
            .get("indexer")
            .and_then(Value::as_str)
            .map(str::to_string),
        age: raw.get("age").and_then(Value::as_i64),
        size,
        size_gb: size.map(|bytes| bytes_to_gb(bytes as f64)),
        seeders: raw.get("seeders").and_then(Value::as_i64),
        leechers: raw.get("leechers").and_then(Value::as_i64),
        language: release_language(raw),
        quality: release_quality(raw),
        protocol: raw
            .get("protocol")
            .and_then(Value::as_str)
            .map(str::to_string),
        rejected: is_rejected_release_raw(raw),
        rejections: rejection_reasons(raw),
        full: raw.clone(),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub service: String,
    pub level: String,
    pub message: String,
    pub time: Option<String>,
}

/// Folds arbitrary upstream level strings into the shared four-level
/// enum; anything unknown counts as info.
pub fn normalize_log_level(raw: Option<&str>) -> &'static str {
    match raw.map(|l| l.trim().to_lowercase()).as_deref() {
        Some("warn") | Some("warning") => "warn",
        Some("error") => "error",
        Some("fatal") | Some("critical") => "fatal",
        _ => "info",
    }
}

fn non_empty_str<'a>(raw: &'a Value, field: &str) -> Option<&'a str> {
    raw.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

pub fn normalize_log_entry(service: &str, raw: &Value) -> LogEntry {
    let message = non_empty_str(raw, "message")
        .or_else(|| non_empty_str(raw, "exception"))
        .or_else(|| non_empty_str(raw, "logger"))
        .unwrap_or("No message")
        .to_string();
    let time = non_empty_str(raw, "time")
        .or_else(|| non_empty_str(raw, "timestamp"))
        .map(str::to_string);
    LogEntry {
        service: service.to_string(),
        level: normalize_log_level(raw.get("level").and_then(Value::as_str)).to_string(),
        message,
        time,
    }
}

/// Sort key for log entries: unparseable or missing times count as the
/// epoch so they sink to the bottom of a descending sort.
pub fn parse_time_or_epoch(time: Option<&str>) -> DateTime<Utc> {
    time.and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}
