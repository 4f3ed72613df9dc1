//! Configuration file management for percept.
//!
//! Provides a TOML-based config file at `~/.config/percept/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use percept_core::adapter::{DEFAULT_ADAPTER_URL, DEFAULT_POLL_INTERVAL};

pub const ENV_ADAPTER_URL: &str = "PERCEPT_ADAPTER_URL";
pub const ENV_MODULES: &str = "PERCEPT_MODULES";
pub const ENV_DATA_DIR: &str = "PERCEPT_DATA_DIR";
pub const ENV_POLL_INTERVAL_MS: &str = "PERCEPT_POLL_INTERVAL_MS";

/// Module source used when nothing else is configured.
pub const DEFAULT_MODULES: &str = "modules";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub adapter: AdapterSection,
    #[serde(default)]
    pub modules: ModulesSection,
    #[serde(default)]
    pub storage: StorageSection,
}

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AdapterSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,
}

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModulesSection {
    /// Directory holding `manifest.json`, or an `http(s)://` base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the percept config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/percept` or
/// `~/.config/percept`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("percept");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("percept")
}

/// Return the path to the percept config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Where progress is stored when no data directory is configured.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("percept")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file at `path`.
pub fn load_config_from(path: &Path) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    toml::from_str(&contents).context("failed to parse config file")
}

/// Serialize and write the config file to `path`, creating parent dirs as
/// needed.
pub fn save_config_to(path: &Path, config: &ConfigFile) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }
    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Where module documents are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleLocation {
    Dir(PathBuf),
    Url(String),
}

impl ModuleLocation {
    pub fn parse(s: &str) -> Self {
        if s.starts_with("http://") || s.starts_with("https://") {
            Self::Url(s.to_string())
        } else {
            Self::Dir(PathBuf::from(s))
        }
    }
}

impl std::fmt::Display for ModuleLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dir(dir) => write!(f, "{}", dir.display()),
            Self::Url(url) => f.write_str(url),
        }
    }
}

/// Values given on the command line; `None` defers to the rest of the chain.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub adapter_url: Option<String>,
    pub modules: Option<String>,
    pub data_dir: Option<PathBuf>,
}

/// Fully resolved configuration, ready for use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerceptConfig {
    pub adapter_url: String,
    pub modules: ModuleLocation,
    pub data_dir: PathBuf,
    pub poll_interval: Duration,
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl PerceptConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config
    /// file > default. A missing or unreadable config file is skipped.
    pub fn resolve(cli: &CliOverrides) -> Result<Self> {
        let file_config = match load_config_from(&config_path()) {
            Ok(cfg) => Some(cfg),
            Err(e) => {
                tracing::debug!(error = %format!("{e:#}"), "no usable config file");
                None
            }
        };
        Self::resolve_from(cli, file_config.as_ref())
    }

    /// Resolve against an already loaded config file.
    pub fn resolve_from(cli: &CliOverrides, file: Option<&ConfigFile>) -> Result<Self> {
        let adapter_url = cli
            .adapter_url
            .clone()
            .or_else(|| env_var(ENV_ADAPTER_URL))
            .or_else(|| file.and_then(|f| f.adapter.url.clone()))
            .unwrap_or_else(|| DEFAULT_ADAPTER_URL.to_string());

        let modules = cli
            .modules
            .clone()
            .or_else(|| env_var(ENV_MODULES))
            .or_else(|| file.and_then(|f| f.modules.source.clone()))
            .unwrap_or_else(|| DEFAULT_MODULES.to_string());

        let data_dir = cli
            .data_dir
            .clone()
            .or_else(|| env_var(ENV_DATA_DIR).map(PathBuf::from))
            .or_else(|| file.and_then(|f| f.storage.data_dir.clone()))
            .unwrap_or_else(default_data_dir);

        let poll_ms = match env_var(ENV_POLL_INTERVAL_MS) {
            Some(raw) => Some(
                raw.trim()
                    .parse::<u64>()
                    .with_context(|| format!("{ENV_POLL_INTERVAL_MS} is not a number of milliseconds: {raw}"))?,
            ),
            None => file.and_then(|f| f.adapter.poll_interval_ms),
        };
        let poll_interval = match poll_ms {
            Some(0) => bail!("poll interval must be positive"),
            Some(ms) => Duration::from_millis(ms),
            None => DEFAULT_POLL_INTERVAL,
        };

        Ok(Self {
            adapter_url,
            modules: ModuleLocation::parse(&modules),
            data_dir,
            poll_interval,
        })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        crate::test_util::lock_env()
    }

    fn clear_env() {
        for name in [ENV_ADAPTER_URL, ENV_MODULES, ENV_DATA_DIR, ENV_POLL_INTERVAL_MS] {
            unsafe { std::env::remove_var(name) };
        }
    }

    fn file() -> ConfigFile {
        ConfigFile {
            adapter: AdapterSection {
                url: Some("http://file:1".to_string()),
                poll_interval_ms: Some(250),
            },
            modules: ModulesSection {
                source: Some("/srv/modules".to_string()),
            },
            storage: StorageSection {
                data_dir: Some(PathBuf::from("/srv/data")),
            },
        }
    }

    #[test]
    fn save_and_load_config_roundtrip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("percept").join("config.toml");
        let original = file();

        save_config_to(&path, &original).unwrap();
        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn partial_config_file_parses() {
        let cfg: ConfigFile = toml::from_str("[adapter]\nurl = \"http://x:2\"\n").unwrap();
        assert_eq!(cfg.adapter.url.as_deref(), Some("http://x:2"));
        assert_eq!(cfg.modules.source, None);
    }

    #[test]
    fn resolve_defaults_when_nothing_set() {
        let _lock = lock_env();
        clear_env();

        let config = PerceptConfig::resolve_from(&CliOverrides::default(), None).unwrap();
        assert_eq!(config.adapter_url, DEFAULT_ADAPTER_URL);
        assert_eq!(config.modules, ModuleLocation::Dir(PathBuf::from("modules")));
        assert_eq!(config.data_dir, default_data_dir());
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
    }

    #[test]
    fn resolve_config_file_over_defaults() {
        let _lock = lock_env();
        clear_env();

        let config = PerceptConfig::resolve_from(&CliOverrides::default(), Some(&file())).unwrap();
        assert_eq!(config.adapter_url, "http://file:1");
        assert_eq!(config.modules, ModuleLocation::Dir(PathBuf::from("/srv/modules")));
        assert_eq!(config.data_dir, PathBuf::from("/srv/data"));
        assert_eq!(config.poll_interval, Duration::from_millis(250));
    }

    #[test]
    fn resolve_with_env_var_overrides_config_file() {
        let _lock = lock_env();
        clear_env();
        unsafe { std::env::set_var(ENV_ADAPTER_URL, "http://env:3") };
        unsafe { std::env::set_var(ENV_MODULES, "https://cdn.example/modules/") };
        unsafe { std::env::set_var(ENV_POLL_INTERVAL_MS, "900") };

        let config = PerceptConfig::resolve_from(&CliOverrides::default(), Some(&file())).unwrap();
        clear_env();

        assert_eq!(config.adapter_url, "http://env:3");
        assert_eq!(
            config.modules,
            ModuleLocation::Url("https://cdn.example/modules/".to_string())
        );
        assert_eq!(config.poll_interval, Duration::from_millis(900));
        assert_eq!(config.data_dir, PathBuf::from("/srv/data"));
    }

    #[test]
    fn resolve_with_cli_flag_overrides_all() {
        let _lock = lock_env();
        clear_env();
        unsafe { std::env::set_var(ENV_ADAPTER_URL, "http://env:3") };
        unsafe { std::env::set_var(ENV_DATA_DIR, "/env/data") };

        let cli = CliOverrides {
            adapter_url: Some("http://cli:4".to_string()),
            modules: Some("./local".to_string()),
            data_dir: Some(PathBuf::from("/cli/data")),
        };
        let config = PerceptConfig::resolve_from(&cli, Some(&file())).unwrap();
        clear_env();

        assert_eq!(config.adapter_url, "http://cli:4");
        assert_eq!(config.modules, ModuleLocation::Dir(PathBuf::from("./local")));
        assert_eq!(config.data_dir, PathBuf::from("/cli/data"));
    }

    #[test]
    fn resolve_rejects_bad_poll_interval() {
        let _lock = lock_env();
        clear_env();

        unsafe { std::env::set_var(ENV_POLL_INTERVAL_MS, "soon") };
        let err = PerceptConfig::resolve_from(&CliOverrides::default(), None).unwrap_err();
        assert!(err.to_string().contains(ENV_POLL_INTERVAL_MS), "unexpected error: {err}");

        unsafe { std::env::set_var(ENV_POLL_INTERVAL_MS, "0") };
        let result = PerceptConfig::resolve_from(&CliOverrides::default(), None);
        clear_env();
        assert!(result.is_err());
    }

    #[test]
    fn config_path_ends_with_expected_filename() {
        let path = config_path();
        assert!(
            path.ends_with("percept/config.toml"),
            "unexpected config path: {}",
            path.display()
        );
    }
}
