//! Configuration types
//!
//! The configuration is read once at startup and handed to the components
//! that need it; nothing here is global.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};
use tracing::warn;

use crate::error::InventoryError;

/// Default cache lifetime in seconds
pub const DEFAULT_MAX_AGE_SECS: i64 = 86_400;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Cache settings
    pub cache: CacheConfig,
    /// Provider CLI settings
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Per-resource-kind connection templates, keyed by kind (`cvm`)
    #[serde(flatten)]
    pub kinds: BTreeMap<String, KindConfig>,
}

impl Config {
    /// Parse configuration from TOML text
    ///
    /// # Errors
    /// Returns `Config` if the text is not valid TOML or does not match the schema.
    pub fn from_toml_str(content: &str) -> Result<Self, InventoryError> {
        toml::from_str(content).map_err(|e| InventoryError::Config(e.to_string()))
    }

    /// Load configuration from a file
    ///
    /// # Errors
    /// Returns `Config` if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, InventoryError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| InventoryError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Look up the section for a resource kind
    ///
    /// # Errors
    /// Returns `MissingField` if the configuration has no section for `kind`.
    pub fn kind(&self, kind: &str) -> Result<&KindConfig, InventoryError> {
        self.kinds
            .get(kind)
            .ok_or_else(|| InventoryError::missing(kind, "configuration"))
    }
}

/// `[cache]` section
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Location of the cache artifact
    pub path: PathBuf,
    /// Maximum age in seconds before the cache is stale; zero or negative
    /// makes every cache stale
    #[serde(default = "default_max_age", deserialize_with = "lenient_max_age")]
    pub max_age: i64,
    /// Ignore the cache and rebuild on every run
    #[serde(default, deserialize_with = "lenient_bool")]
    pub cache_disable: bool,
}

impl CacheConfig {
    /// Settings for a cache at `path` with default lifetime
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_age: DEFAULT_MAX_AGE_SECS,
            cache_disable: false,
        }
    }
}

fn default_max_age() -> i64 {
    DEFAULT_MAX_AGE_SECS
}

fn lenient_max_age<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = toml::Value::deserialize(deserializer)?;
    let parsed = match &value {
        toml::Value::Integer(n) => Some(*n),
        toml::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    Ok(parsed.unwrap_or_else(|| {
        warn!(value = %value, default = DEFAULT_MAX_AGE_SECS, "unusable cache.max_age, using default");
        DEFAULT_MAX_AGE_SECS
    }))
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = toml::Value::deserialize(deserializer)?;
    let parsed = match &value {
        toml::Value::Boolean(b) => Some(*b),
        toml::Value::Integer(1) => Some(true),
        toml::Value::Integer(0) => Some(false),
        toml::Value::String(s) => match s.trim().to_lowercase().as_str() {
            "1" | "yes" | "true" | "on" => Some(true),
            "0" | "no" | "false" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    };
    Ok(parsed.unwrap_or_else(|| {
        warn!(value = %value, "unusable cache.cache_disable, using false");
        false
    }))
}

/// How successive `DescribeInstances` pages are requested
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pagination {
    /// Forward `--Offset`/`--Limit` so each call returns the next page
    #[default]
    Offset,
    /// Send no cursor; every call returns the first page again
    Legacy,
}

impl std::fmt::Display for Pagination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Pagination::Offset => write!(f, "offset"),
            Pagination::Legacy => write!(f, "legacy"),
        }
    }
}

/// `[fetch]` section
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Provider CLI executable
    #[serde(default = "default_command")]
    pub command: String,
    /// Region passed as `--region`
    pub region: Option<String>,
    /// Credential profile passed as `--profile`
    pub profile: Option<String>,
    /// Page cursor handling
    #[serde(default)]
    pub pagination: Pagination,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            region: None,
            profile: None,
            pagination: Pagination::default(),
        }
    }
}

fn default_command() -> String {
    "tccli".to_string()
}

/// A template value; TOML lets `port = 22` be written without quotes
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum TemplateText {
    Text(String),
    Integer(i64),
}

fn template_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        Option::<TemplateText>::deserialize(deserializer)?.map(|t| match t {
            TemplateText::Text(s) => s,
            TemplateText::Integer(n) => n.to_string(),
        }),
    )
}

/// Connection templates; every key is optional so host overrides can be partial
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateSet {
    /// Template for the login user
    #[serde(default, deserialize_with = "template_text")]
    pub user: Option<String>,
    /// Template for the address to connect to
    #[serde(default, deserialize_with = "template_text")]
    pub host: Option<String>,
    /// Template for the SSH port
    #[serde(default, deserialize_with = "template_text")]
    pub port: Option<String>,
}

/// Section for one resource kind, e.g. `[cvm]`
#[derive(Debug, Clone, Deserialize)]
pub struct KindConfig {
    /// Record field used to derive the inventory host name
    #[serde(default = "default_hostname_field")]
    pub hostname_field: String,
    /// Kind-level templates
    #[serde(flatten)]
    pub defaults: TemplateSet,
    /// Per-host overrides, keyed by safe host name (`[cvm."web-01"]`)
    #[serde(flatten)]
    pub hosts: BTreeMap<String, TemplateSet>,
}

fn default_hostname_field() -> String {
    "InstanceName".to_string()
}
