//! Configuration file schema and parsing.
//!
//! Example TOML config file:
//!
//! ```toml
//! [server]
//! listen = "127.0.0.1:8080"
//! log_format = "json"
//! log_file = "uptime_log.txt"
//!
//! [policy]
//! timeout_secs = 10
//! max_retries = 3
//! retry_delay_secs = 5
//!
//! [[target]]
//! url = "https://example.com"
//! name = "Example"
//! interval_secs = 30
//!
//! [[target]]
//! url = "https://status.example.org/health"
//! ```
//!
//! Files ending in `.json` are read in the older layout:
//! `{"websites": [{"url", "name", "interval"}], "timeout", "max_retries", "retry_delay"}`
//! or the single-site form `{"url", "name", "interval"}`.
//!
//! Without `--config`, the first of [`DEFAULT_CONFIG_FILES`] found in the
//! working directory is loaded.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use uptime_core::{PolicyConfig, Target, DEFAULT_INTERVAL};

/// Files looked up in the working directory when no config path is given, in order.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["uptime.toml", "config.json"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {}: {source}", path.display())]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to parse config file {}: {source}", path.display())]
    ParseJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub policy: PolicySection,

    #[serde(default)]
    pub target: Vec<TargetDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Status API address. The API is disabled when unset.
    #[serde(default)]
    pub listen: Option<SocketAddr>,

    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log lines are also appended to this file when set.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: None,
            log_format: default_log_format(),
            log_file: None,
        }
    }
}

fn default_log_format() -> String {
    "pretty".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct PolicySection {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl Default for PolicySection {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_secs() -> u64 {
    5
}

fn default_shutdown_grace_secs() -> u64 {
    2
}

impl PolicySection {
    pub fn to_policy_config(&self) -> PolicyConfig {
        PolicyConfig::default()
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_max_retries(self.max_retries)
            .with_retry_delay(Duration::from_secs(self.retry_delay_secs))
            .with_shutdown_grace(Duration::from_secs(self.shutdown_grace_secs))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TargetDef {
    pub url: String,
    pub name: Option<String>,
    pub interval_secs: Option<u64>,
}

impl TargetDef {
    pub fn to_target(&self) -> Target {
        let interval = self
            .interval_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_INTERVAL);
        let target = Target::new(&self.url, interval);
        match &self.name {
            Some(name) => target.with_name(name),
            None => target,
        }
    }
}

/// The JSON layout accepted for older config files.
#[derive(Debug, Deserialize)]
struct LegacyConfig {
    websites: Option<Vec<LegacySite>>,
    url: Option<String>,
    name: Option<String>,
    interval: Option<u64>,
    timeout: Option<u64>,
    max_retries: Option<u32>,
    retry_delay: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct LegacySite {
    url: String,
    name: Option<String>,
    interval: Option<u64>,
}

impl From<LegacyConfig> for AppConfig {
    fn from(legacy: LegacyConfig) -> Self {
        // The single-site keys only count when there is no `websites` list.
        let sites = match (legacy.websites, legacy.url) {
            (Some(sites), _) => sites,
            (None, Some(url)) => vec![LegacySite {
                url,
                name: legacy.name,
                interval: legacy.interval,
            }],
            (None, None) => Vec::new(),
        };

        let defaults = PolicySection::default();
        Self {
            server: ServerConfig::default(),
            policy: PolicySection {
                timeout_secs: legacy.timeout.unwrap_or(defaults.timeout_secs),
                max_retries: legacy.max_retries.unwrap_or(defaults.max_retries),
                retry_delay_secs: legacy.retry_delay.unwrap_or(defaults.retry_delay_secs),
                shutdown_grace_secs: defaults.shutdown_grace_secs,
            },
            target: sites
                .into_iter()
                .map(|s| TargetDef {
                    url: s.url,
                    name: s.name,
                    interval_secs: s.interval,
                })
                .collect(),
        }
    }
}

/// Returns the first default config file present in `dir`.
pub fn find_default_config(dir: &Path) -> Option<PathBuf> {
    DEFAULT_CONFIG_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

impl AppConfig {
    /// Reads and validates a config file. The format follows the extension.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let config = if is_json {
            Self::from_json(&content).map_err(|source| ConfigError::ParseJson {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            toml::from_str(&content).map_err(|source| ConfigError::ParseToml {
                path: path.to_path_buf(),
                source,
            })?
        };

        config.validate()?;
        Ok(config)
    }

    fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        let legacy: LegacyConfig = serde_json::from_str(content)?;
        Ok(legacy.into())
    }

    pub fn targets(&self) -> Vec<Target> {
        self.target.iter().map(TargetDef::to_target).collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_targets(&self.targets())?;
        validate_policy(&self.policy.to_policy_config())?;
        validate_log_format(&self.server.log_format)
    }
}

pub fn validate_policy(policy: &PolicyConfig) -> Result<(), ConfigError> {
    if policy.timeout.is_zero() {
        return Err(ConfigError::Invalid("timeout must be greater than 0".into()));
    }
    Ok(())
}

/// Checks URLs, intervals and name uniqueness across the resolved target list.
pub fn validate_targets(targets: &[Target]) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    for (i, t) in targets.iter().enumerate() {
        t.validate().map_err(|reason| {
            ConfigError::Invalid(format!("target '{}' at index {}: {}", t.name, i, reason))
        })?;
        if !names.insert(t.name.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "duplicate target name: {}",
                t.name
            )));
        }
    }
    Ok(())
}

pub fn validate_log_format(format: &str) -> Result<(), ConfigError> {
    match format {
        "pretty" | "json" => Ok(()),
        other => Err(ConfigError::Invalid(format!(
            "invalid log_format '{}': must be 'pretty' or 'json'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let toml = r#"
[[target]]
url = "https://example.com"
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        config.validate().unwrap();

        let targets = config.targets();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].name, "https://example.com");
        assert_eq!(targets[0].interval, DEFAULT_INTERVAL);
        assert_eq!(config.server.log_format, "pretty");
        assert!(config.server.listen.is_none());
        assert!(config.server.log_file.is_none());

        let policy = config.policy.to_policy_config();
        assert_eq!(policy.timeout, Duration::from_secs(10));
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.retry_delay, Duration::from_secs(5));
        assert_eq!(policy.shutdown_grace, Duration::from_secs(2));
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[server]
listen = "127.0.0.1:9090"
log_format = "json"
log_file = "logs/uptime_log.txt"

[policy]
timeout_secs = 3
max_retries = 5
retry_delay_secs = 1
shutdown_grace_secs = 4

[[target]]
url = "https://api.example.com/health"
name = "api"
interval_secs = 15

[[target]]
url = "http://www.example.org"
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        config.validate().unwrap();

        assert_eq!(config.server.listen.map(|a| a.port()), Some(9090));
        assert_eq!(config.server.log_format, "json");
        assert_eq!(
            config.server.log_file.as_deref(),
            Some(Path::new("logs/uptime_log.txt"))
        );

        let policy = config.policy.to_policy_config();
        assert_eq!(policy.timeout, Duration::from_secs(3));
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.shutdown_grace, Duration::from_secs(4));

        let targets = config.targets();
        assert_eq!(targets[0].name, "api");
        assert_eq!(targets[0].interval, Duration::from_secs(15));
        assert_eq!(targets[1].name, "http://www.example.org");
    }

    #[test]
    fn zero_retries_are_clamped() {
        let toml = r#"
[policy]
max_retries = 0
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.policy.to_policy_config().max_retries, 1);
    }

    #[test]
    fn parse_legacy_json_list() {
        let json = r#"{
            "websites": [
                {"url": "https://www.google.com", "name": "Google", "interval": 60},
                {"url": "https://example.com"}
            ],
            "timeout": 7,
            "max_retries": 2,
            "retry_delay": 1
        }"#;
        let config = AppConfig::from_json(json).unwrap();
        config.validate().unwrap();

        let targets = config.targets();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].name, "Google");
        assert_eq!(targets[1].interval, DEFAULT_INTERVAL);
        assert_eq!(config.policy.timeout_secs, 7);
        assert_eq!(config.policy.max_retries, 2);
        assert_eq!(config.policy.retry_delay_secs, 1);
    }

    #[test]
    fn parse_legacy_json_single_site() {
        let json = r#"{"url": "https://example.com", "name": "Example", "interval": 30}"#;
        let config = AppConfig::from_json(json).unwrap();

        let targets = config.targets();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].name, "Example");
        assert_eq!(targets[0].interval, Duration::from_secs(30));
        assert_eq!(config.policy.max_retries, 3);
    }

    #[test]
    fn legacy_json_without_sites_has_no_targets() {
        let config = AppConfig::from_json(r#"{"timeout": 5}"#).unwrap();
        assert!(config.targets().is_empty());
    }

    #[test]
    fn legacy_site_list_wins_over_single_site_keys() {
        let json = r#"{"websites": [], "url": "https://example.com"}"#;
        let config = AppConfig::from_json(json).unwrap();
        assert!(config.targets().is_empty());
    }

    #[test]
    fn validate_rejects_duplicate_names() {
        let toml = r#"
[[target]]
url = "https://a.example"
name = "same"

[[target]]
url = "https://b.example"
name = "same"
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("duplicate target name"), "{}", err);
    }

    #[test]
    fn validate_rejects_bad_url_and_zero_interval() {
        let bad_url: AppConfig = toml::from_str(
            r#"
[[target]]
url = "ftp://files.example"
"#,
        )
        .unwrap();
        assert!(matches!(bad_url.validate(), Err(ConfigError::Invalid(_))));

        let zero: AppConfig = toml::from_str(
            r#"
[[target]]
url = "https://a.example"
interval_secs = 0
"#,
        )
        .unwrap();
        assert!(matches!(zero.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let config: AppConfig = toml::from_str(
            r#"
[policy]
timeout_secs = 0
"#,
        )
        .unwrap();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("timeout"), "{}", err);
    }

    #[test]
    fn validate_rejects_invalid_log_format() {
        let config: AppConfig = toml::from_str(
            r#"
[server]
log_format = "xml"
"#,
        )
        .unwrap();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("invalid log_format"), "{}", err);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = AppConfig::load(Path::new("/nonexistent/uptime.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }), "{}", err);
    }

    /// Creates an empty directory unique to one test.
    fn scratch_dir(test: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("uptime-cli-{}-{}", test, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn default_config_is_found_in_directory() {
        let dir = scratch_dir("default-json");
        std::fs::write(
            dir.join("config.json"),
            r#"{"websites": [{"url": "https://example.com", "name": "Example"}], "timeout": 4}"#,
        )
        .unwrap();

        let path = find_default_config(&dir).unwrap();
        assert_eq!(path, dir.join("config.json"));

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.targets()[0].name, "Example");
        assert_eq!(config.policy.timeout_secs, 4);

        std::fs::write(dir.join("uptime.toml"), "[[target]]\nurl = \"https://a.example\"\n").unwrap();
        assert_eq!(find_default_config(&dir), Some(dir.join("uptime.toml")));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn no_default_config_in_empty_directory() {
        let dir = scratch_dir("default-none");
        assert!(find_default_config(&dir).is_none());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
