use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

/// Where a configuration value came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Built-in default
    Default,
    /// A configuration file
    File(PathBuf),
    /// An environment variable
    Environment(String),
}

impl ConfigSource {
    pub fn as_str(&self) -> String {
        match self {
            ConfigSource::Default => "default".to_string(),
            ConfigSource::File(path) => path.display().to_string(),
            ConfigSource::Environment(var) => var.clone(),
        }
    }
}

/// Reads `RESOLV_*` overrides, from the process environment or from a fixed
/// set of variables.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    use_environment: bool,
    vars: Option<HashMap<String, String>>,
}

impl ConfigLoader {
    pub fn new(use_environment: bool) -> Self {
        Self {
            use_environment,
            vars: None,
        }
    }

    /// Loader that reads from `vars` instead of the process environment
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            use_environment: true,
            vars: Some(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect()),
        }
    }

    pub fn uses_environment(&self) -> bool {
        self.use_environment
    }

    /// Raw variable lookup. Empty values count as unset.
    pub fn get_var(&self, var: &str) -> Option<String> {
        if !self.use_environment {
            return None;
        }

        let value = match &self.vars {
            Some(vars) => vars.get(var).cloned(),
            None => env::var(var).ok(),
        };
        value.filter(|s| !s.is_empty())
    }

    /// Converts "max-steps" to "RESOLV_MAX_STEPS"
    pub fn env_name(key: &str) -> String {
        format!("RESOLV_{}", key.replace('-', "_").to_uppercase())
    }

    pub fn get_env_config(&self, key: &str) -> Option<String> {
        self.get_var(&Self::env_name(key))
    }

    pub fn get_env_bool(&self, key: &str) -> Option<bool> {
        self.get_env_config(key).map(|val| !matches!(val.to_lowercase().as_str(), "false" | "0" | "no" | "off"))
    }

    pub fn get_env_u64(&self, key: &str) -> Option<u64> {
        let raw = self.get_env_config(key)?;
        match raw.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                log::warn!("Ignoring {}={}: not a number", Self::env_name(key), raw);
                None
            }
        }
    }

    /// Comma separated list, blank entries dropped
    pub fn get_env_list(&self, key: &str) -> Option<Vec<String>> {
        self.get_env_config(key).map(|val| {
            val.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_source_as_str() {
        assert_eq!(ConfigSource::Default.as_str(), "default");
        assert_eq!(
            ConfigSource::Environment("RESOLV_MAX_STEPS".to_string()).as_str(),
            "RESOLV_MAX_STEPS"
        );
        assert_eq!(ConfigSource::File(PathBuf::from("/etc/resolv.json")).as_str(), "/etc/resolv.json");
    }

    #[test]
    fn test_env_name() {
        assert_eq!(ConfigLoader::env_name("max-steps"), "RESOLV_MAX_STEPS");
        assert_eq!(ConfigLoader::env_name("ssl_verify"), "RESOLV_SSL_VERIFY");
    }

    #[test]
    fn test_disabled_loader_ignores_vars() {
        let mut loader = ConfigLoader::from_vars([("RESOLV_MAX_STEPS", "10")]);
        assert_eq!(loader.get_env_u64("max-steps"), Some(10));

        loader.use_environment = false;
        assert_eq!(loader.get_env_u64("max-steps"), None);
    }

    #[test]
    fn test_typed_lookups() {
        let loader = ConfigLoader::from_vars([
            ("RESOLV_ALLOW_DOWNGRADE", "0"),
            ("RESOLV_FORCE_REINSTALL", "yes"),
            ("RESOLV_MAX_STEPS", "many"),
            ("RESOLV_CHANNELS", "main, ,forge"),
            ("RESOLV_USER_AGENT", ""),
        ]);

        assert_eq!(loader.get_env_bool("allow-downgrade"), Some(false));
        assert_eq!(loader.get_env_bool("force-reinstall"), Some(true));
        assert_eq!(loader.get_env_u64("max-steps"), None);
        assert_eq!(
            loader.get_env_list("channels"),
            Some(vec!["main".to_string(), "forge".to_string()])
        );
        assert_eq!(loader.get_env_config("user-agent"), None);
    }
}
