use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::network::{NetworkConfig, SslVerify};
use super::source::{ConfigLoader, ConfigSource};
use crate::solver::{Flags, Pool, SolveBudget, DEFAULT_MAX_STEPS};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// How channel order affects candidate selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelPriority {
    /// A name is only taken from the most preferred channel offering it
    Strict,
    /// Channel order ranks candidates but every channel stays eligible
    Flexible,
    /// Channels are ignored, only versions count
    Disabled,
}

impl Default for ChannelPriority {
    fn default() -> Self {
        ChannelPriority::Flexible
    }
}

impl ChannelPriority {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "strict" => Some(ChannelPriority::Strict),
            "flexible" => Some(ChannelPriority::Flexible),
            "disabled" => Some(ChannelPriority::Disabled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelPriority::Strict => "strict",
            ChannelPriority::Flexible => "flexible",
            ChannelPriority::Disabled => "disabled",
        }
    }
}

/// Search limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverConfig {
    #[serde(default = "default_max_steps")]
    pub max_steps: u64,

    /// Wall-clock limit for one solve, unlimited when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

fn default_max_steps() -> u64 {
    DEFAULT_MAX_STEPS
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            timeout_secs: None,
        }
    }
}

/// Resolver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub flags: Flags,

    /// Channels, most preferred first
    #[serde(default)]
    pub channels: Vec<String>,

    #[serde(default)]
    pub channel_priority: ChannelPriority,

    #[serde(default)]
    pub solver: SolverConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(skip)]
    sources: HashMap<String, ConfigSource>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            flags: Flags::default(),
            channels: Vec::new(),
            channel_priority: ChannelPriority::default(),
            solver: SolverConfig::default(),
            network: NetworkConfig::default(),
            sources: HashMap::new(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::from_json_str(&contents)?;
        config.mark_all(ConfigSource::File(path.to_path_buf()));
        Ok(config)
    }

    /// Defaults, overlaid by `path` when it exists, overlaid by `RESOLV_*`
    /// variables from `loader`.
    pub fn build(path: Option<&Path>, loader: &ConfigLoader) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) if path.exists() => Self::load(path)?,
            Some(path) => {
                log::debug!("No configuration at {}, using defaults", path.display());
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_env_overrides(loader)?;
        Ok(config)
    }

    /// Where `key` was set, if anywhere but the defaults
    pub fn get_source(&self, key: &str) -> Option<&ConfigSource> {
        self.sources.get(key)
    }

    /// Budget for a solve run under this configuration
    pub fn solve_budget(&self) -> SolveBudget {
        let budget = SolveBudget::new().with_max_steps(self.solver.max_steps);
        match self.solver.timeout_secs {
            Some(secs) => budget.with_timeout(Duration::from_secs(secs)),
            None => budget,
        }
    }

    /// Flags for a request, with strict channel priority folded in
    pub fn request_flags(&self) -> Flags {
        let mut flags = self.flags;
        if self.channel_priority == ChannelPriority::Strict {
            flags.strict_repo_priority = true;
        }
        flags
    }

    /// Register the configured channels with the pool
    pub fn apply_to_pool(&self, pool: &mut Pool) {
        match self.channel_priority {
            ChannelPriority::Disabled => {
                for channel in &self.channels {
                    pool.add_channel(channel.clone(), 0);
                }
            }
            ChannelPriority::Strict | ChannelPriority::Flexible => {
                pool.add_channels(self.channels.iter().cloned());
            }
        }
    }

    fn mark_all(&mut self, source: ConfigSource) {
        for key in Self::config_keys() {
            self.sources.insert(key.to_string(), source.clone());
        }
    }

    fn mark_env(&mut self, key: &str) {
        self.sources.insert(
            key.to_string(),
            ConfigSource::Environment(ConfigLoader::env_name(key)),
        );
    }

    fn apply_env_overrides(&mut self, loader: &ConfigLoader) -> Result<(), ConfigError> {
        if let Some(channels) = loader.get_env_list("channels") {
            self.channels = channels;
            self.mark_env("channels");
        }

        if let Some(value) = loader.get_env_config("channel-priority") {
            self.channel_priority = ChannelPriority::from_str(&value).ok_or_else(|| {
                ConfigError::InvalidValue {
                    key: ConfigLoader::env_name("channel-priority"),
                    value,
                }
            })?;
            self.mark_env("channel-priority");
        }

        if let Some(steps) = loader.get_env_u64("max-steps") {
            self.solver.max_steps = steps;
            self.mark_env("max-steps");
        }

        if let Some(secs) = loader.get_env_u64("solver-timeout") {
            self.solver.timeout_secs = Some(secs);
            self.mark_env("solver-timeout");
        }

        // Flags
        let flags: [(&str, fn(&mut Flags) -> &mut bool); 6] = [
            ("keep-dependencies", |f| &mut f.keep_dependencies),
            ("keep-user-specs", |f| &mut f.keep_user_specs),
            ("force-reinstall", |f| &mut f.force_reinstall),
            ("allow-downgrade", |f| &mut f.allow_downgrade),
            ("allow-uninstall", |f| &mut f.allow_uninstall),
            ("strict-repo-priority", |f| &mut f.strict_repo_priority),
        ];
        for (key, field) in flags {
            if let Some(value) = loader.get_env_bool(key) {
                *field(&mut self.flags) = value;
                self.mark_env(key);
            }
        }

        // Network
        if let Some(value) = loader.get_env_config("ssl-verify") {
            self.network.ssl_verify = SslVerify::from_str(&value);
            self.mark_env("ssl-verify");
        }

        for scheme in ["http", "https"] {
            let key = format!("{}-proxy", scheme);
            if let Some(proxy) = loader.get_env_config(&key) {
                self.network.set_proxy(scheme, proxy);
                self.mark_env(&key);
            }
        }

        if let Some(secs) = loader.get_env_u64("network-timeout") {
            self.network.timeout_secs = secs;
            self.mark_env("network-timeout");
        }

        if let Some(agent) = loader.get_env_config("user-agent") {
            self.network.user_agent = agent;
            self.mark_env("user-agent");
        }

        Ok(())
    }

    fn config_keys() -> &'static [&'static str] {
        &[
            "flags",
            "channels",
            "channel-priority",
            "max-steps",
            "solver-timeout",
            "ssl-verify",
            "network-timeout",
            "user-agent",
        ]
    }
}
