//! Configuration loading for the index catalog.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at ~/.config/index-catalog/config.toml.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::TypesError;

/// Connection settings for the search engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Base URL of the engine REST API
    #[serde(default = "default_engine_url")]
    pub url: String,

    /// Basic auth user
    #[serde(default)]
    pub username: Option<String>,

    /// Basic auth password (loaded from env var, not stored in config file)
    #[serde(default)]
    pub password: Option<String>,

    /// Per-request timeout
    #[serde(default = "default_engine_timeout")]
    pub timeout_secs: u64,
}

fn default_engine_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_engine_timeout() -> u64 {
    30
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            url: default_engine_url(),
            username: None,
            password: None,
            timeout_secs: default_engine_timeout(),
        }
    }
}

/// Startup contract settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartupSettings {
    /// How long to wait for the engine before giving up (seconds).
    /// An unreachable engine after this window is fatal.
    #[serde(default = "default_engine_wait")]
    pub engine_wait_secs: u64,
}

fn default_engine_wait() -> u64 {
    30
}

impl Default for StartupSettings {
    fn default() -> Self {
        Self {
            engine_wait_secs: default_engine_wait(),
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Path to the RocksDB registry directory
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Seconds between background reconciliation passes; 0 disables them
    #[serde(default)]
    pub reconcile_interval_secs: u64,

    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    pub startup: StartupSettings,
}

fn default_db_path() -> String {
    ProjectDirs::from("", "", "index-catalog")
        .map(|p| p.data_local_dir().join("registry"))
        .unwrap_or_else(|| PathBuf::from("./registry"))
        .to_string_lossy()
        .to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            log_level: default_log_level(),
            reconcile_interval_secs: 0,
            engine: EngineSettings::default(),
            startup: StartupSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/index-catalog/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (CATALOG_*, `__` between nested keys)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, TypesError> {
        let config_dir = ProjectDirs::from("", "", "index-catalog")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("db_path", default_db_path())
            .map_err(|e| TypesError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| TypesError::Config(e.to_string()))?
            .set_default("reconcile_interval_secs", 0_i64)
            .map_err(|e| TypesError::Config(e.to_string()))?
            .set_default("engine.url", default_engine_url())
            .map_err(|e| TypesError::Config(e.to_string()))?
            .set_default("engine.timeout_secs", default_engine_timeout() as i64)
            .map_err(|e| TypesError::Config(e.to_string()))?
            .set_default("startup.engine_wait_secs", default_engine_wait() as i64)
            .map_err(|e| TypesError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // CATALOG_DB_PATH, CATALOG_ENGINE__URL, CATALOG_ENGINE__PASSWORD, ...
        builder = builder.add_source(
            Environment::with_prefix("CATALOG")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| TypesError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| TypesError::Config(e.to_string()))
    }

    /// Expand ~ in db_path to the home directory
    pub fn expanded_db_path(&self) -> PathBuf {
        if let Some(rest) = self.db_path.strip_prefix("~/") {
            if let Some(dirs) = directories::BaseDirs::new() {
                return dirs.home_dir().join(rest);
            }
        }
        PathBuf::from(&self.db_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.engine.url, "http://localhost:9200");
        assert_eq!(settings.engine.timeout_secs, 30);
        assert_eq!(settings.startup.engine_wait_secs, 30);
        assert_eq!(settings.reconcile_interval_secs, 0);
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn test_load_with_defaults() {
        let settings = Settings::load(None).unwrap();
        assert!(!settings.db_path.is_empty());
        assert!(settings.engine.timeout_secs > 0);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("catalog.toml");
        std::fs::write(
            &path,
            "db_path = \"/tmp/registry\"\nreconcile_interval_secs = 60\n\n[engine]\nurl = \"http://es:9200\"\n",
        )
        .unwrap();

        let settings = Settings::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(settings.db_path, "/tmp/registry");
        assert_eq!(settings.reconcile_interval_secs, 60);
        assert_eq!(settings.engine.url, "http://es:9200");
        assert_eq!(settings.engine.timeout_secs, 30);
    }

    #[test]
    fn test_expanded_db_path_absolute() {
        let settings = Settings {
            db_path: "/var/lib/catalog".to_string(),
            ..Settings::default()
        };
        assert_eq!(settings.expanded_db_path(), PathBuf::from("/var/lib/catalog"));
    }

    #[test]
    fn test_expanded_db_path_home() {
        let settings = Settings {
            db_path: "~/catalog".to_string(),
            ..Settings::default()
        };
        assert!(settings.expanded_db_path().ends_with("catalog"));
        assert!(!settings.expanded_db_path().starts_with("~"));
    }
}
