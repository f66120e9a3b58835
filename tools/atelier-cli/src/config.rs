//! CLI configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use atelier_admin::{BackoffStrategy, RestConfig, RetryPolicy};
use atelier_commerce::cart::CartPolicy;
use atelier_commerce::{Currency, Money};
use serde::{Deserialize, Serialize};

/// File names searched for, in order, when no `--config` is given.
pub const CONFIG_NAMES: [&str; 3] = ["atelier.toml", ".atelier.toml", "atelier.json"];

/// CLI configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AtelierConfig {
    /// Cart pricing rules.
    pub storefront: StorefrontConfig,

    /// Local storage.
    pub storage: StorageConfig,

    /// Remote database connection.
    pub remote: RemoteConfig,

    /// Background write behaviour.
    pub sync: SyncConfig,

    /// Log output.
    pub logging: LoggingConfig,
}

impl AtelierConfig {
    /// Load config from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        if is_json(path) {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
        }
    }

    /// Find a config file in `start` or any of its parents.
    pub fn discover(start: &Path) -> Option<PathBuf> {
        start.ancestors().find_map(|dir| {
            CONFIG_NAMES
                .iter()
                .map(|name| dir.join(name))
                .find(|path| path.is_file())
        })
    }

    /// Cart policy described by `[storefront]`.
    pub fn cart_policy(&self) -> Result<CartPolicy> {
        let s = &self.storefront;
        let currency = Currency::from_code(&s.currency)
            .with_context(|| format!("Unknown currency: {}", s.currency))?;
        let policy = CartPolicy {
            currency,
            tax_rate: s.tax_rate,
            free_shipping_threshold: Money::from_decimal(s.free_shipping_threshold, currency),
            standard_shipping: Money::from_decimal(s.standard_shipping, currency),
            max_quantity: s.max_quantity,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Retry policy described by `[sync]`.
    pub fn retry_policy(&self) -> RetryPolicy {
        let backoff = match self.sync.backoff_ms {
            0 => BackoffStrategy::None,
            ms => BackoffStrategy::Exponential {
                base: Duration::from_millis(ms),
                max: Duration::from_secs(5),
            },
        };
        RetryPolicy::new(self.sync.max_retries).with_backoff(backoff)
    }

    /// Connection settings for the REST remote. The key is read from the
    /// environment variable named by `remote.api_key_env`.
    pub fn rest_config(&self) -> Result<RestConfig> {
        let r = &self.remote;
        let Some(url) = r.url.as_deref() else {
            bail!("remote.url is required when remote.kind = \"rest\"");
        };
        let api_key = std::env::var(&r.api_key_env)
            .with_context(|| format!("Environment variable {} is not set", r.api_key_env))?;
        Ok(RestConfig::new(url, api_key).with_timeout(Duration::from_secs(r.timeout_secs)))
    }

    /// Check the config for mistakes. Returns (errors, warnings).
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let s = &self.storefront;
        if Currency::from_code(&s.currency).is_none() {
            errors.push(format!("storefront.currency '{}' is not supported", s.currency));
        }
        if !(0.0..=1.0).contains(&s.tax_rate) {
            errors.push("storefront.tax_rate must be between 0 and 1".to_string());
        }
        if s.free_shipping_threshold < 0.0 || s.standard_shipping < 0.0 {
            errors.push("storefront shipping amounts must not be negative".to_string());
        }
        if s.max_quantity == 0 {
            errors.push("storefront.max_quantity must be at least 1".to_string());
        }

        match self.remote.kind {
            RemoteKind::Rest => {
                match self.remote.url.as_deref() {
                    None => errors.push("remote.url is required for the rest remote".to_string()),
                    Some(url) if !url.starts_with("https://") && !url.starts_with("http://") => {
                        errors.push(format!("remote.url '{url}' must be an http(s) URL"))
                    }
                    Some(url) if url.starts_with("http://") => {
                        warnings.push("remote.url is not using https".to_string())
                    }
                    Some(_) => {}
                }
                if std::env::var_os(&self.remote.api_key_env).is_none() {
                    warnings.push(format!("{} is not set", self.remote.api_key_env));
                }
            }
            RemoteKind::Memory => warnings.push(
                "remote.kind = \"memory\": admin changes are only saved on this machine".to_string(),
            ),
        }

        if self.sync.max_retries > 10 {
            warnings.push("sync.max_retries above 10 can stall commands".to_string());
        }
        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            errors.push(format!("logging.level '{}' is not a log level", self.logging.level));
        }

        (errors, warnings)
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}

/// `[storefront]`: cart pricing rules. Amounts are in major units.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorefrontConfig {
    pub currency: String,
    pub tax_rate: f64,
    pub free_shipping_threshold: f64,
    pub standard_shipping: f64,
    pub max_quantity: u32,
    /// Default low-stock threshold for new products.
    pub low_stock_threshold: u32,
}

impl Default for StorefrontConfig {
    fn default() -> Self {
        Self {
            currency: "GBP".to_string(),
            tax_rate: 0.20,
            free_shipping_threshold: 50.0,
            standard_shipping: 4.99,
            max_quantity: 10,
            low_stock_threshold: 5,
        }
    }
}

/// `[storage]`: where the cart and admin snapshots live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Relative paths resolve against the working directory.
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: ".atelier".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteKind {
    /// Process-local store; nothing leaves the machine.
    #[default]
    Memory,
    /// PostgREST-style HTTP database.
    Rest,
}

/// `[remote]`: the database admin writes go to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub kind: RemoteKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            kind: RemoteKind::Memory,
            url: None,
            api_key_env: "ATELIER_API_KEY".to_string(),
            timeout_secs: 10,
        }
    }
}

/// `[sync]`: retries of failed remote writes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub max_retries: u32,
    /// Base of the exponential backoff; 0 retries immediately.
    pub backoff_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// `[logging]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Generate a default atelier.toml config file.
pub fn generate_default_config() -> String {
    r#"# Atelier storefront configuration

[storefront]
currency = "GBP"
tax_rate = 0.20
free_shipping_threshold = 50.00
standard_shipping = 4.99
max_quantity = 10
low_stock_threshold = 5

[storage]
data_dir = ".atelier"

[remote]
# "memory" keeps admin changes on this machine; "rest" writes to the database.
kind = "memory"
# url = "https://your-project.supabase.co"
api_key_env = "ATELIER_API_KEY"
timeout_secs = 10

[sync]
max_retries = 2
backoff_ms = 200

[logging]
level = "warn"
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config: AtelierConfig = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(config.sync.max_retries, 2);
        assert_eq!(config.remote.kind, RemoteKind::Memory);
        assert_eq!(config.cart_policy().unwrap(), CartPolicy::default());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: AtelierConfig = toml::from_str("[storefront]\ntax_rate = 0.1\n").unwrap();
        assert_eq!(config.storefront.tax_rate, 0.1);
        assert_eq!(config.storefront.max_quantity, 10);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_validate_flags_bad_values() {
        let mut config = AtelierConfig::default();
        config.storefront.currency = "XYZ".into();
        config.storefront.max_quantity = 0;
        config.remote.kind = RemoteKind::Rest;
        let (errors, _) = config.validate();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_discover_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join(".atelier.toml"), "").unwrap();
        assert_eq!(
            AtelierConfig::discover(&nested),
            Some(dir.path().join(".atelier.toml"))
        );
    }

    #[test]
    fn test_load_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("atelier.json");
        std::fs::write(&path, r#"{"sync": {"max_retries": 4}}"#).unwrap();
        assert_eq!(AtelierConfig::load(&path).unwrap().sync.max_retries, 4);
    }
}
