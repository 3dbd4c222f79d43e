use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use url::Url;

/// TLS verification setting: on, off, or a CA bundle to verify against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SslVerify {
    Bool(bool),
    Path(PathBuf),
}

impl Default for SslVerify {
    fn default() -> Self {
        SslVerify::Bool(true)
    }
}

impl SslVerify {
    /// "true"/"false" (and 1/0) map to the switch, anything else is a path
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "true" | "1" | "yes" => SslVerify::Bool(true),
            "false" | "0" | "no" => SslVerify::Bool(false),
            _ => SslVerify::Path(PathBuf::from(s)),
        }
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self, SslVerify::Bool(false))
    }

    pub fn ca_bundle(&self) -> Option<&Path> {
        match self {
            SslVerify::Path(path) => Some(path),
            SslVerify::Bool(_) => None,
        }
    }
}

/// Transport settings for fetching repository data.
///
/// `proxy_servers` maps a scheme (`http`, `https`), a `scheme://host` pair
/// or `all` to a proxy URL. Credentials may be embedded in the proxy URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default)]
    pub proxy_servers: IndexMap<String, String>,

    #[serde(default)]
    pub ssl_verify: SslVerify,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    3
}

pub(crate) fn default_user_agent() -> String {
    format!("resolv/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            proxy_servers: IndexMap::new(),
            ssl_verify: SslVerify::default(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_retries: default_max_retries(),
            user_agent: default_user_agent(),
        }
    }
}

impl NetworkConfig {
    /// Proxy to use for `url`: `scheme://host` first, then the scheme, then `all`
    pub fn proxy_for(&self, url: &str) -> Option<&str> {
        select_proxy(&self.proxy_servers, url)
    }

    pub fn set_proxy(&mut self, key: impl Into<String>, proxy: impl Into<String>) {
        self.proxy_servers.insert(key.into(), proxy.into());
    }
}

pub(crate) fn select_proxy<'a>(proxies: &'a IndexMap<String, String>, url: &str) -> Option<&'a str> {
    let parsed = Url::parse(url).ok()?;
    let scheme = parsed.scheme();

    if let Some(host) = parsed.host_str() {
        let key = format!("{}://{}", scheme, host);
        if let Some(proxy) = proxies.get(&key) {
            return Some(proxy.as_str());
        }
    }

    proxies
        .get(scheme)
        .or_else(|| proxies.get("all"))
        .map(String::as_str)
}
