//! Application configuration.
//!
//! Loaded from a TOML file with defaults for every field. The generative
//! service secret is never part of the file; only the name of the
//! environment variable holding it is configurable.

use crate::logging::default_log_level;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "COMMUNITY_CONFIG";
/// Config file looked up in the working directory when nothing else is given.
pub const DEFAULT_CONFIG_FILE: &str = "community.toml";

const DEFAULT_COLLECTION: &str = "posts";
const DEFAULT_ASSIST_MODEL: &str = "gemini-3-flash-preview";
const DEFAULT_ASSIST_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_ASSIST_KEY_ENV: &str = "GEMINI_API_KEY";
const DEFAULT_IDENTITY_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const DEFAULT_ASSIST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MUTATION_TIMEOUT_SECS: u64 = 15;
const DEFAULT_WATCH_INTERVAL_MS: u64 = 500;

#[derive(Debug)]
pub enum ConfigError {
    Read { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: toml::de::Error },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse config `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub log: LogConfig,
    pub store: StoreConfig,
    pub identity: IdentityConfig,
    pub assist: AssistConfig,
    pub feed: FeedConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    /// Must be absolute.
    pub dir: PathBuf,
    /// Mirror `warn` and above to stderr.
    pub echo_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            dir: std::env::temp_dir().join("community-logs"),
            echo_stderr: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite document database path.
    pub path: PathBuf,
    pub collection: String,
    /// How often to look for commits from other processes. `0` disables.
    pub watch_interval_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("community.sqlite3"),
            collection: DEFAULT_COLLECTION.to_string(),
            watch_interval_ms: DEFAULT_WATCH_INTERVAL_MS,
        }
    }
}

impl StoreConfig {
    pub fn watch_interval(&self) -> Option<Duration> {
        (self.watch_interval_ms > 0).then(|| Duration::from_millis(self.watch_interval_ms))
    }
}

/// Identity provider settings. `api_key` is the provider's public web key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub api_key: String,
    pub base_url: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_IDENTITY_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistConfig {
    pub model: String,
    pub base_url: String,
    /// Environment variable read at call time for the API key.
    pub api_key_env: String,
    /// `0` disables the timeout.
    pub timeout_secs: u64,
}

impl Default for AssistConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_ASSIST_MODEL.to_string(),
            base_url: DEFAULT_ASSIST_BASE_URL.to_string(),
            api_key_env: DEFAULT_ASSIST_KEY_ENV.to_string(),
            timeout_secs: DEFAULT_ASSIST_TIMEOUT_SECS,
        }
    }
}

impl AssistConfig {
    pub fn timeout(&self) -> Option<Duration> {
        non_zero_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// `0` disables the timeout.
    pub mutation_timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            mutation_timeout_secs: DEFAULT_MUTATION_TIMEOUT_SECS,
        }
    }
}

impl FeedConfig {
    pub fn mutation_timeout(&self) -> Option<Duration> {
        non_zero_secs(self.mutation_timeout_secs)
    }
}

impl AppConfig {
    /// Parses configuration text. Missing sections and fields take defaults.
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Loads configuration from `path`; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml_str(&text, path),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Resolves the config path: explicit argument, then `COMMUNITY_CONFIG`,
    /// then `./community.toml`.
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(value) if !value.trim().is_empty() => PathBuf::from(value.trim()),
            _ => PathBuf::from(DEFAULT_CONFIG_FILE),
        }
    }
}

fn non_zero_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::{AppConfig, ConfigError};
    use std::io::Write;
    use std::path::Path;
    use std::time::Duration;

    #[test]
    fn empty_file_yields_defaults() {
        let config = AppConfig::from_toml_str("", Path::new("community.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.store.collection, "posts");
        assert_eq!(config.assist.api_key_env, "GEMINI_API_KEY");
        assert_eq!(config.feed.mutation_timeout(), Some(Duration::from_secs(15)));
        assert_eq!(config.store.watch_interval(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let text = r#"
            [assist]
            model = "gemini-2.5-flash"
            timeout_secs = 0

            [store]
            path = "/var/lib/community/posts.sqlite3"
            watch_interval_ms = 0
        "#;
        let config = AppConfig::from_toml_str(text, Path::new("x.toml")).unwrap();
        assert_eq!(config.assist.model, "gemini-2.5-flash");
        assert_eq!(config.assist.timeout(), None);
        assert_eq!(config.store.collection, "posts");
        assert!(config.store.path.ends_with("posts.sqlite3"));
        assert_eq!(config.store.watch_interval(), None);
    }

    #[test]
    fn malformed_file_reports_parse_error() {
        let err = AppConfig::from_toml_str("[assist\nmodel=", Path::new("bad.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn load_reads_file_and_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("community.toml");
        assert_eq!(AppConfig::load(&path).unwrap(), AppConfig::default());

        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[feed]\nmutation_timeout_secs = 3").unwrap();
        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.feed.mutation_timeout(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn explicit_path_wins() {
        let path = AppConfig::resolve_path(Some(Path::new("/etc/community.toml")));
        assert_eq!(path, Path::new("/etc/community.toml"));
    }
}
