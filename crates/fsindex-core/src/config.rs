//! Configuration for fsindex.
//!
//! A YAML file provides the base values; every field has a default, and a
//! fixed set of environment variables override the file.

use crate::CoreError;
use fsindex_sync::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Indexer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Directories to scan, in order
    #[serde(default = "default_roots")]
    pub roots: Vec<RootConfig>,

    /// Logical root name for roots that do not set their own
    #[serde(default = "default_root_name")]
    pub root_name: String,

    /// Exclusion pattern file
    #[serde(default = "default_excludes_file")]
    pub excludes_file: PathBuf,

    /// Stability window in seconds
    #[serde(default = "default_stability_secs")]
    pub stability_secs: u64,

    /// Documents per upsert call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    /// Seconds between passes; a single pass when unset
    #[serde(default)]
    pub interval_secs: Option<u64>,

    /// PID file path
    #[serde(default = "default_pid_file")]
    pub pid_file: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// One scan root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootConfig {
    pub path: PathBuf,
    /// Logical name; falls back to [`IndexerConfig::root_name`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl RootConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            name: None,
        }
    }

    pub fn named(path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: Some(name.into()),
        }
    }
}

/// Which search engine to write to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Manticore,
    Meilisearch,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Manticore => write!(f, "manticore"),
            Backend::Meilisearch => write!(f, "meilisearch"),
        }
    }
}

impl FromStr for Backend {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manticore" => Ok(Backend::Manticore),
            "meilisearch" => Ok(Backend::Meilisearch),
            other => Err(CoreError::Config(format!("unknown search backend: {other}"))),
        }
    }
}

/// Search engine connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub backend: Backend,

    #[serde(default = "default_engine_url")]
    pub url: String,

    /// Index or table name
    #[serde(default = "default_index")]
    pub index: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_sweep_timeout_secs")]
    pub sweep_timeout_secs: u64,

    /// How long to wait for an enqueued task to settle
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,

    #[serde(default = "default_task_poll_interval_ms")]
    pub task_poll_interval_ms: u64,
}

/// Backoff settings for engine calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_multiplier_ms")]
    pub multiplier_ms: u64,

    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_roots() -> Vec<RootConfig> {
    vec![RootConfig::new("/data")]
}

fn default_root_name() -> String {
    "data".to_string()
}

fn default_excludes_file() -> PathBuf {
    PathBuf::from("/app/config/excludes.txt")
}

fn default_stability_secs() -> u64 {
    30
}

fn default_batch_size() -> usize {
    2000
}

fn default_pid_file() -> PathBuf {
    PathBuf::from("/tmp/fsindex.pid")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_engine_url() -> String {
    "http://manticore:9308".to_string()
}

fn default_index() -> String {
    "files".to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_sweep_timeout_secs() -> u64 {
    600
}

fn default_task_timeout_secs() -> u64 {
    300
}

fn default_task_poll_interval_ms() -> u64 {
    250
}

fn default_max_attempts() -> u32 {
    3
}

fn default_multiplier_ms() -> u64 {
    1000
}

fn default_min_delay_ms() -> u64 {
    2000
}

fn default_max_delay_ms() -> u64 {
    10_000
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            roots: default_roots(),
            root_name: default_root_name(),
            excludes_file: default_excludes_file(),
            stability_secs: default_stability_secs(),
            batch_size: default_batch_size(),
            engine: EngineConfig::default(),
            retry: RetryConfig::default(),
            interval_secs: None,
            pid_file: default_pid_file(),
            log_level: default_log_level(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            url: default_engine_url(),
            index: default_index(),
            api_key: None,
            request_timeout_secs: default_request_timeout_secs(),
            sweep_timeout_secs: default_sweep_timeout_secs(),
            task_timeout_secs: default_task_timeout_secs(),
            task_poll_interval_ms: default_task_poll_interval_ms(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            multiplier_ms: default_multiplier_ms(),
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            multiplier: Duration::from_millis(self.multiplier_ms),
            min_delay: Duration::from_millis(self.min_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

impl IndexerConfig {
    /// Default config file location.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fsindex")
            .join("config.yaml")
    }

    /// Load configuration from the default location.
    ///
    /// Defaults apply only when no file exists there; a file that cannot be
    /// read or parsed is an error.
    pub fn load() -> Result<Self, CoreError> {
        Self::load_or_default(&Self::default_path())
    }

    /// Load `path` if it exists, otherwise return the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, CoreError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Load from `path` (or the default location), apply the process
    /// environment and validate.
    pub fn resolve(path: Option<&Path>) -> Result<Self, CoreError> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => Self::load()?,
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment-style overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(roots) = get("SCAN_ROOTS") {
            self.roots = roots
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(RootConfig::new)
                .collect();
        }
        if let Some(name) = get("ROOT_NAME") {
            self.root_name = name;
        }
        if let Some(path) = get("EXCLUDES_FILE") {
            self.excludes_file = PathBuf::from(path);
        }
        if let Some(secs) = get("STABILITY_SEC") {
            self.stability_secs = parse_env("STABILITY_SEC", &secs)?;
        }
        if let Some(size) = get("BATCH_SIZE") {
            self.batch_size = parse_env("BATCH_SIZE", &size)?;
        }
        if let Some(level) = get("LOG_LEVEL") {
            self.log_level = level.to_ascii_lowercase();
        }
        if let Some(backend) = get("SEARCH_BACKEND") {
            self.engine.backend = backend.parse()?;
        }
        if let Some(url) = get("ENGINE_URL").or_else(|| get("MANTICORE_URL")) {
            self.engine.url = url;
        }
        if let Some(index) = get("ENGINE_INDEX") {
            self.engine.index = index;
        }
        if let Some(key) = get("ENGINE_API_KEY") {
            self.engine.api_key = Some(key);
        }
        if let Some(secs) = get("SCAN_INTERVAL_SEC") {
            self.interval_secs = Some(parse_env("SCAN_INTERVAL_SEC", &secs)?);
        }
        Ok(())
    }

    /// Reject configurations that cannot produce a valid pass.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.roots.is_empty() {
            return Err(CoreError::Config("at least one scan root is required".into()));
        }
        if self.batch_size == 0 {
            return Err(CoreError::Config("batch_size must be greater than zero".into()));
        }
        if self.root_name.trim().is_empty() {
            return Err(CoreError::Config("root_name must not be empty".into()));
        }
        if let Some(root) = self
            .roots
            .iter()
            .find(|r| r.name.as_deref().is_some_and(|n| n.trim().is_empty()))
        {
            return Err(CoreError::Config(format!(
                "root {} has an empty name",
                root.path.display()
            )));
        }
        let index = &self.engine.index;
        if index.is_empty() || !index.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(CoreError::Config(format!("invalid index name: {index:?}")));
        }
        if self.retry.max_attempts == 0 {
            return Err(CoreError::Config("retry.max_attempts must be at least 1".into()));
        }
        if self.interval_secs == Some(0) {
            return Err(CoreError::Config("interval_secs must be greater than zero".into()));
        }
        Ok(())
    }

    /// Logical name of a root.
    pub fn root_name_of<'a>(&'a self, root: &'a RootConfig) -> &'a str {
        root.name.as_deref().unwrap_or(&self.root_name)
    }

    /// Distinct logical root names, in configuration order.
    pub fn root_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for root in &self.roots {
            let name = self.root_name_of(root);
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        names
    }

    pub fn stability_window(&self) -> Duration {
        Duration::from_secs(self.stability_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.policy()
    }

    /// Copy with credentials masked, for display.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.engine.api_key.is_some() {
            config.engine.api_key = Some("********".to_string());
        }
        config
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T, CoreError> {
    value
        .trim()
        .parse()
        .map_err(|_| CoreError::Config(format!("{key} has an invalid value: {value:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = IndexerConfig::default();
        assert_eq!(config.roots, vec![RootConfig::new("/data")]);
        assert_eq!(config.root_name, "data");
        assert_eq!(config.excludes_file, PathBuf::from("/app/config/excludes.txt"));
        assert_eq!(config.stability_secs, 30);
        assert_eq!(config.batch_size, 2000);
        assert_eq!(config.engine.backend, Backend::Manticore);
        assert_eq!(config.engine.index, "files");
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_partial_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "roots:\n  - path: /srv/a\n  - path: /srv/b\n    name: media\nbatch_size: 500\nengine:\n  backend: meilisearch\n  url: http://meili:7700\n",
        )
        .unwrap();

        let config = IndexerConfig::load_from(&path).unwrap();

        assert_eq!(config.roots.len(), 2);
        assert_eq!(config.root_name_of(&config.roots[0]), "data");
        assert_eq!(config.root_name_of(&config.roots[1]), "media");
        assert_eq!(config.batch_size, 500);
        assert_eq!(config.engine.backend, Backend::Meilisearch);
        assert_eq!(config.engine.index, "files");
        assert_eq!(config.stability_secs, 30);
    }

    #[test]
    fn test_invalid_yaml_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "batch_size: [not a number").unwrap();

        assert!(matches!(
            IndexerConfig::load_from(&path),
            Err(CoreError::Yaml(_))
        ));
    }

    #[test]
    fn test_load_or_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        assert_eq!(
            IndexerConfig::load_or_default(&path).unwrap(),
            IndexerConfig::default()
        );

        std::fs::write(&path, "batch_size: [oops").unwrap();
        assert!(matches!(
            IndexerConfig::load_or_default(&path),
            Err(CoreError::Yaml(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = IndexerConfig::default();
        config
            .apply_overrides(env(&[
                ("SCAN_ROOTS", "/mnt/a, /mnt/b"),
                ("ROOT_NAME", "nas"),
                ("STABILITY_SEC", "5"),
                ("BATCH_SIZE", "100"),
                ("LOG_LEVEL", "DEBUG"),
                ("SEARCH_BACKEND", "Meilisearch"),
                ("MANTICORE_URL", "http://legacy:9308/sql"),
                ("ENGINE_API_KEY", "secret"),
                ("SCAN_INTERVAL_SEC", "3600"),
            ]))
            .unwrap();

        assert_eq!(
            config.roots,
            vec![RootConfig::new("/mnt/a"), RootConfig::new("/mnt/b")]
        );
        assert_eq!(config.root_names(), vec!["nas".to_string()]);
        assert_eq!(config.stability_secs, 5);
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.engine.backend, Backend::Meilisearch);
        assert_eq!(config.engine.url, "http://legacy:9308/sql");
        assert_eq!(config.engine.api_key.as_deref(), Some("secret"));
        assert_eq!(config.interval_secs, Some(3600));
    }

    #[test]
    fn test_engine_url_takes_precedence() {
        let mut config = IndexerConfig::default();
        config
            .apply_overrides(env(&[
                ("ENGINE_URL", "http://new:9308"),
                ("MANTICORE_URL", "http://old:9308"),
            ]))
            .unwrap();
        assert_eq!(config.engine.url, "http://new:9308");
    }

    #[test]
    fn test_invalid_env_value() {
        let mut config = IndexerConfig::default();
        let err = config
            .apply_overrides(env(&[("BATCH_SIZE", "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains("BATCH_SIZE"));

        let err = config
            .apply_overrides(env(&[("SEARCH_BACKEND", "solr")]))
            .unwrap_err();
        assert!(err.to_string().contains("solr"));
    }

    #[test]
    fn test_validation() {
        let invalid = [
            IndexerConfig {
                roots: Vec::new(),
                ..IndexerConfig::default()
            },
            IndexerConfig {
                batch_size: 0,
                ..IndexerConfig::default()
            },
            IndexerConfig {
                roots: vec![RootConfig::named("/data", " ")],
                ..IndexerConfig::default()
            },
            IndexerConfig {
                engine: EngineConfig {
                    index: "files; DROP".to_string(),
                    ..EngineConfig::default()
                },
                ..IndexerConfig::default()
            },
            IndexerConfig {
                retry: RetryConfig {
                    max_attempts: 0,
                    ..RetryConfig::default()
                },
                ..IndexerConfig::default()
            },
        ];

        for config in invalid {
            assert!(config.validate().is_err(), "accepted {config:?}");
        }
    }

    #[test]
    fn test_root_names_are_distinct_and_ordered() {
        let config = IndexerConfig {
            roots: vec![
                RootConfig::named("/a", "media"),
                RootConfig::new("/b"),
                RootConfig::named("/c", "media"),
            ],
            ..IndexerConfig::default()
        };
        assert_eq!(config.root_names(), vec!["media", "data"]);
    }

    #[test]
    fn test_redacted_hides_api_key() {
        let mut config = IndexerConfig::default();
        config.engine.api_key = Some("secret".to_string());

        let yaml = serde_yaml::to_string(&config.redacted()).unwrap();
        assert!(!yaml.contains("secret"));
        assert!(yaml.contains("********"));
    }
}
