use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexMap;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use resolv_spec::PackageRecord;

use crate::config::{select_proxy, NetworkConfig, SslVerify};
use crate::repository::RepoData;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status}: {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Invalid proxy '{proxy}': {reason}")]
    InvalidProxy { proxy: String, reason: String },

    #[error("Failed to load CA bundle {path}: {reason}")]
    Certificate { path: PathBuf, reason: String },

    #[error("Max retries exceeded for {url}")]
    MaxRetries { url: String },

    #[error("JSON deserialization error: {0}")]
    JsonParse(String),
}

/// HTTP client for repository data, with retries and proxy selection
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    user_agent: String,
    max_retries: u32,
    retry_delay: Duration,
    proxy_servers: IndexMap<String, String>,
}

impl HttpClient {
    pub fn new(config: HttpClientConfig) -> Result<Self, HttpError> {
        let mut builder = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .gzip(true)
            .user_agent(&config.user_agent);

        // host specific entries win over scheme entries, which win over "all"
        for proxy in ordered_proxies(&config.proxy_servers)? {
            builder = builder.proxy(proxy);
        }

        match &config.ssl_verify {
            SslVerify::Bool(false) => {
                log::warn!("TLS certificate verification is disabled");
                builder = builder.danger_accept_invalid_certs(true);
            }
            SslVerify::Bool(true) => {}
            SslVerify::Path(path) => {
                builder = builder.add_root_certificate(load_certificate(path)?);
            }
        }

        let client = builder.build()?;

        Ok(Self {
            client,
            user_agent: config.user_agent,
            max_retries: config.max_retries,
            retry_delay: config.retry_delay,
            proxy_servers: config.proxy_servers,
        })
    }

    pub fn from_network(network: &NetworkConfig) -> Result<Self, HttpError> {
        Self::new(HttpClientConfig::from_network(network))
    }

    /// Proxy requests to `url` go through, if any
    pub fn proxy_for(&self, url: &str) -> Option<&str> {
        select_proxy(&self.proxy_servers, url)
    }

    /// Perform GET request with automatic retries
    pub async fn get(&self, url: &str) -> Result<Response, HttpError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    } else if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                        last_error = Some(HttpError::HttpStatus {
                            status: status.as_u16(),
                            url: url.to_string(),
                        });
                    } else {
                        // 4xx other than 429 will not improve
                        return Err(HttpError::HttpStatus {
                            status: status.as_u16(),
                            url: url.to_string(),
                        });
                    }
                }
                Err(e) => {
                    last_error = Some(HttpError::Request(e));
                }
            }

            if attempt < self.max_retries {
                let delay = self.backoff_delay(attempt);
                log::debug!("Retrying {} in {:?} (attempt {})", url, delay, attempt + 1);
                tokio::time::sleep(delay).await;
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Err(HttpError::MaxRetries {
                url: url.to_string(),
            }),
        }
    }

    /// Wait before retry `attempt + 1`: the retry delay doubled per attempt,
    /// capped at one minute
    fn backoff_delay(&self, attempt: u32) -> Duration {
        self.retry_delay
            .saturating_mul(2_u32.saturating_pow(attempt))
            .min(MAX_RETRY_DELAY)
    }

    /// GET JSON and deserialize
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, HttpError> {
        let response = self.get(url).await?;
        let text = response.text().await?;

        serde_json::from_str(&text).map_err(|e| HttpError::JsonParse(e.to_string()))
    }

    /// Fetch a repodata index and return its records tagged with `channel`
    pub async fn fetch_repodata(&self, url: &str, channel: &str) -> Result<Vec<PackageRecord>, HttpError> {
        let repodata: RepoData = self.get_json(url).await?;
        log::debug!("Fetched {} records for {} from {}", repodata.len(), channel, url);
        Ok(repodata.into_records(channel))
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

fn load_certificate(path: &Path) -> Result<reqwest::Certificate, HttpError> {
    let bytes = std::fs::read(path).map_err(|e| HttpError::Certificate {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    reqwest::Certificate::from_pem(&bytes).map_err(|e| HttpError::Certificate {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Build reqwest proxies in match order
fn ordered_proxies(proxies: &IndexMap<String, String>) -> Result<Vec<reqwest::Proxy>, HttpError> {
    let mut hosts = Vec::new();
    let mut schemes = Vec::new();
    let mut fallback = Vec::new();

    for (key, proxy_url) in proxies {
        let invalid = |reason: String| HttpError::InvalidProxy {
            proxy: proxy_url.clone(),
            reason,
        };
        let target = Url::parse(proxy_url).map_err(|e| invalid(e.to_string()))?;

        let proxy = match key.as_str() {
            "all" => reqwest::Proxy::all(target.as_str()),
            "http" => reqwest::Proxy::http(target.as_str()),
            "https" => reqwest::Proxy::https(target.as_str()),
            scoped if scoped.contains("://") => {
                let scope = scoped.trim_end_matches('/').to_string();
                let via = target.clone();
                Ok(reqwest::Proxy::custom(move |url| {
                    let origin = format!("{}://{}", url.scheme(), url.host_str().unwrap_or(""));
                    (origin == scope).then(|| via.clone())
                }))
            }
            other => {
                log::warn!("Ignoring proxy for unknown scheme '{}'", other);
                continue;
            }
        }
        .map_err(|e| invalid(e.to_string()))?;

        let proxy = with_credentials(proxy, &target);
        match key.as_str() {
            "all" => fallback.push(proxy),
            "http" | "https" => schemes.push(proxy),
            _ => hosts.push(proxy),
        }
    }

    hosts.extend(schemes);
    hosts.extend(fallback);
    Ok(hosts)
}

/// Credentials embedded in the proxy URL become basic auth
fn with_credentials(proxy: reqwest::Proxy, target: &Url) -> reqwest::Proxy {
    if target.username().is_empty() {
        return proxy;
    }
    proxy.basic_auth(target.username(), target.password().unwrap_or(""))
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// Scheme, `scheme://host` or `all` to proxy URL
    pub proxy_servers: IndexMap<String, String>,
    pub ssl_verify: SslVerify,
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            proxy_servers: IndexMap::new(),
            ssl_verify: SslVerify::default(),
            user_agent: crate::config::NetworkConfig::default().user_agent,
        }
    }
}

impl HttpClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_network(network: &NetworkConfig) -> Self {
        Self {
            timeout: Duration::from_secs(network.timeout_secs),
            connect_timeout: Duration::from_secs(network.connect_timeout_secs),
            max_retries: network.max_retries,
            retry_delay: DEFAULT_RETRY_DELAY,
            proxy_servers: network.proxy_servers.clone(),
            ssl_verify: network.ssl_verify.clone(),
            user_agent: network.user_agent.clone(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_proxy(mut self, key: impl Into<String>, proxy: impl Into<String>) -> Self {
        self.proxy_servers.insert(key.into(), proxy.into());
        self
    }

    pub fn with_ssl_verify(mut self, ssl_verify: SslVerify) -> Self {
        self.ssl_verify = ssl_verify;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }
}
