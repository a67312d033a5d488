use std::collections::HashMap;
use std::env;

/// Every upstream manager the dashboard knows about, in display order.
pub const SERVICE_NAMES: [&str; 6] = [
    "sonarr", "radarr", "lidarr", "readarr", "prowlarr", "bazarr",
];

pub const DOWNLOAD_CLIENT_NAME: &str = "qbittorrent";

/// Service name the aggregator's own operational log lines appear under.
pub const DASHBOARD_SERVICE: &str = "dashboard";

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub name: String,
    pub url: String,
    pub api_key: String,
    pub api_prefix: &'static str,
}

impl ServiceConfig {
    pub fn new(name: &str, url: &str, api_key: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            api_prefix: api_prefix_for(name),
        }
    }

    /// Endpoint path under this service's API prefix, e.g. `/queue?...`
    /// becomes `/api/v3/queue?...` for sonarr.
    pub fn api_path(&self, rest: &str) -> String {
        format!("{}{}", self.api_prefix, rest)
    }

    /// System-status endpoints in preference order, ending with the
    /// legacy unversioned path older deployments answer on.
    pub fn status_paths(&self) -> Vec<String> {
        let primary = self.api_path("/system/status");
        let legacy = "/api/system/status".to_string();
        if primary == legacy {
            vec![primary]
        } else {
            vec![primary, legacy]
        }
    }
}

/// sonarr/radarr speak v3, the remaining managers v1, bazarr an
/// unversioned `/api`.
pub fn api_prefix_for(name: &str) -> &'static str {
    match name {
        "sonarr" | "radarr" => "/api/v3",
        "bazarr" => "/api",
        _ => "/api/v1",
    }
}

pub fn is_known_service(name: &str) -> bool {
    SERVICE_NAMES.contains(&name)
}

#[derive(Debug, Clone, Default)]
pub struct DownloadClientConfig {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl DownloadClientConfig {
    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct ServicesConfig {
    pub host: String,
    pub port: u16,
    pub static_dir: String,
    pub services: HashMap<String, ServiceConfig>,
    pub download_client: DownloadClientConfig,
}

impl ServicesConfig {
    /// Loads the full configuration from environment variables. A
    /// service needs both `{NAME}_URL` and `{NAME}_API_KEY` to count as
    /// configured; anything else leaves it on its "not configured"
    /// branch for every operation.
    pub fn from_env() -> Self {
        let mut services = HashMap::new();
        for name in SERVICE_NAMES {
            let upper = name.to_uppercase();
            let url = non_empty_env(&format!("{}_URL", upper));
            let api_key = non_empty_env(&format!("{}_API_KEY", upper));
            if let (Some(url), Some(api_key)) = (url, api_key) {
                services.insert(name.to_string(), ServiceConfig::new(name, &url, &api_key));
            }
        }

        let download_client = DownloadClientConfig {
            url: non_empty_env("QBITTORRENT_URL").map(|u| u.trim_end_matches('/').to_string()),
            username: non_empty_env("QBITTORRENT_USERNAME"),
            password: non_empty_env("QBITTORRENT_PASSWORD"),
        };

        let host = non_empty_env("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = non_empty_env("PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);
        let static_dir = non_empty_env("STATIC_DIR").unwrap_or_else(|| "dist".to_string());

        Self {
            host,
            port,
            static_dir,
            services,
            download_client,
        }
    }

    pub fn service(&self, name: &str) -> Option<&ServiceConfig> {
        self.services.get(name)
    }

    pub fn is_configured(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    /// Configured upstream names in the fixed display order.
    pub fn configured_services(&self) -> Vec<String> {
        SERVICE_NAMES
            .iter()
            .filter(|name| self.services.contains_key(**name))
            .map(|name| name.to_string())
            .collect()
    }

    pub fn services_for_category(category: &str) -> Option<&'static [&'static str]> {
        match category {
            "tv" => Some(&["sonarr"]),
            "movies" => Some(&["radarr"]),
            "music" => Some(&["lidarr"]),
            _ => None,
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
