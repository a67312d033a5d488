//! Generic HTTP client for the configured upstream managers.

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, StatusCode};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

use crate::config::ServicesConfig;
use crate::constants::DEFAULT_TIMEOUT_SECONDS;
use crate::errors::{truncate_snippet, UpstreamError};
use crate::logbuf::OpsLogBuffer;

#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub body: Option<Value>,
    pub timeout_seconds: u64,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            body: None,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

impl RequestOptions {
    pub fn get_with_timeout(timeout_seconds: u64) -> Self {
        Self {
            timeout_seconds,
            ..Self::default()
        }
    }

    pub fn post(body: Value, timeout_seconds: u64) -> Self {
        Self {
            method: Method::POST,
            body: Some(body),
            timeout_seconds,
        }
    }
}

pub struct ArrClient {
    config: Arc<ServicesConfig>,
    client: Client,
    ops_log: Arc<OpsLogBuffer>,
}

impl ArrClient {
    pub fn new(config: Arc<ServicesConfig>, ops_log: Arc<OpsLogBuffer>) -> Self {
        Self {
            config,
            client: Client::new(),
            ops_log,
        }
    }

    /// GET with default options.
    pub async fn get(&self, service: &str, endpoint: &str) -> Result<Value, UpstreamError> {
        self.request(service, endpoint, &RequestOptions::default())
            .await
    }

    /// Performs an authenticated request against a configured service
    /// and returns the parsed JSON body. 204 yields an empty object.
    pub async fn request(
        &self,
        service: &str,
        endpoint: &str,
        options: &RequestOptions,
    ) -> Result<Value, UpstreamError> {
        let Some(svc) = self.config.service(service) else {
            return Err(UpstreamError::NotConfigured {
                service: service.to_string(),
            });
        };

        let url = join_url(&svc.url, endpoint);
        let mut request = self
            .client
            .request(options.method.clone(), &url)
            .header("X-Api-Key", &svc.api_key);

        if options.method != Method::GET {
            if let Some(body) = &options.body {
                let encoded = match body {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                request = request
                    .header(CONTENT_TYPE, "application/json")
                    .body(encoded);
            }
        }

        let response = match timeout(
            Duration::from_secs(options.timeout_seconds),
            request.send(),
        )
        .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                return Err(self.fail(
                    endpoint,
                    UpstreamError::Network {
                        service: service.to_string(),
                        reason: e.to_string(),
                    },
                ));
            }
            Err(_) => {
                return Err(self.fail(
                    endpoint,
                    UpstreamError::Timeout {
                        service: service.to_string(),
                        endpoint: endpoint.to_string(),
                        seconds: options.timeout_seconds,
                    },
                ));
            }
        };

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Object(Map::new()));
        }

        if !status.is_success() {
            let snippet = truncate_snippet(&response.text().await.unwrap_or_default());
            return Err(self.fail(
                endpoint,
                UpstreamError::Status {
                    service: service.to_string(),
                    status: status.as_u16(),
                    snippet,
                },
            ));
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("json"))
            .unwrap_or(false);
        let body = response.text().await.unwrap_or_default();
        if !is_json {
            return Err(self.fail(
                endpoint,
                UpstreamError::NonJson {
                    service: service.to_string(),
                    endpoint: endpoint.to_string(),
                    snippet: truncate_snippet(&body),
                },
            ));
        }

        serde_json::from_str(&body).map_err(|_| {
            self.fail(
                endpoint,
                UpstreamError::NonJson {
                    service: service.to_string(),
                    endpoint: endpoint.to_string(),
                    snippet: truncate_snippet(&body),
                },
            )
        })
    }

    /// Tries each endpoint in order and returns the first success; all
    /// failing, the last error. Not-configured short-circuits — other
    /// paths cannot fare better.
    pub async fn request_with_fallback(
        &self,
        service: &str,
        endpoints: &[String],
        options: &RequestOptions,
    ) -> Result<Value, UpstreamError> {
        let mut last_error = None;
        for endpoint in endpoints {
            match self.request(service, endpoint, options).await {
                Ok(value) => return Ok(value),
                Err(e @ UpstreamError::NotConfigured { .. }) => return Err(e),
                Err(e) => {
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| UpstreamError::Network {
            service: service.to_string(),
            reason: "no endpoint available".to_string(),
        }))
    }

    /// Logs the failure with full context and records it in the
    /// operational buffer before handing the error back.
    fn fail(&self, endpoint: &str, error: UpstreamError) -> UpstreamError {
        warn!(
            kind = error.kind(),
            endpoint = endpoint,
            "upstream request failed: {}",
            error
        );
        self.ops_log.push("warn", error.to_string());
        error
    }
}

/// Joins a base URL and an endpoint with exactly one path separator.
fn join_url(base: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}
