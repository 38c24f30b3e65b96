//! Configuration for the hostbridge interop layer
//!
//! The configuration file is TOML and lives at `$HOSTBRIDGE_CONFIG` when that
//! variable is set, otherwise at `<config dir>/hostbridge/config.toml`:
//!
//! ```toml
//! search_path = ["/opt/host/lib", "/opt/host/vendor.jar"]
//!
//! [logging]
//! verbosity = 1
//! file = "/tmp/hostbridge.log"
//! ```
//!
//! A missing file is not an error; it yields the default configuration.
//! Entries of `HOSTBRIDGE_PATH` (platform path-list syntax) are appended to the
//! configured search path when the default locations are computed.

use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Environment variable overriding the configuration file location
pub const CONFIG_ENV: &str = "HOSTBRIDGE_CONFIG";

/// Environment variable holding extra default locations
pub const PATH_ENV: &str = "HOSTBRIDGE_PATH";

const CONFIG_DIR_NAME: &str = "hostbridge";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Error type for configuration loading and saving
#[derive(Debug)]
pub enum ConfigError {
    /// No platform configuration directory could be determined
    NoConfigDir,
    /// Reading or writing the configuration file failed
    Io { path: PathBuf, source: io::Error },
    /// The configuration file is not valid TOML for [`Config`]
    Parse { path: PathBuf, message: String },
    /// The configuration could not be rendered as TOML
    Serialize(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NoConfigDir => write!(f, "Could not determine config directory"),
            ConfigError::Io { path, source } => {
                write!(f, "Failed to access config {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, message } => {
                write!(f, "Invalid config {}: {}", path.display(), message)
            }
            ConfigError::Serialize(msg) => write!(f, "Failed to serialize config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Logging section of the configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 0 = warnings only, 1 = debug, 2 = trace
    pub verbosity: u8,
    /// Log file; the logger's default location when unset
    pub file: Option<PathBuf>,
    /// Suppress console echo of log messages
    pub no_stderr: bool,
}

/// Bridge configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default locations consulted before the runtime search path
    pub search_path: Vec<String>,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load the configuration from its default location
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        Self::load_from(&path)
    }

    /// Resolve the configuration file path
    pub fn path() -> Result<PathBuf, ConfigError> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            if !path.is_empty() {
                return Ok(PathBuf::from(path));
            }
        }
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load the configuration from an explicit path, defaulting when it is missing
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Write the configuration to an explicit path, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Configured search path followed by the entries of `HOSTBRIDGE_PATH`
    pub fn default_locations(&self) -> Vec<String> {
        self.locations_with_env(std::env::var_os(PATH_ENV))
    }

    /// Configured search path followed by the entries of a path-list value
    pub fn locations_with_env(&self, path_list: Option<OsString>) -> Vec<String> {
        let mut locations = self.search_path.clone();
        if let Some(list) = path_list {
            locations.extend(
                std::env::split_paths(&list)
                    .filter(|p| !p.as_os_str().is_empty())
                    .map(|p| p.to_string_lossy().into_owned()),
            );
        }
        locations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_default() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        let result = Config::load_from(&dir.path().join("absent.toml"));
        assert!(result.is_ok_and(|c| c == Config::default()));
    }

    #[test]
    fn test_parse_search_path_and_logging() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        let path = dir.path().join("config.toml");
        let written = fs::write(
            &path,
            "search_path = [\"/opt/lib\", \"/opt/vendor.jar\"]\n\n[logging]\nverbosity = 2\n",
        );
        assert!(written.is_ok());

        let config = Config::load_from(&path);
        assert!(config.is_ok_and(|c| {
            c.search_path == vec!["/opt/lib".to_string(), "/opt/vendor.jar".to_string()]
                && c.logging.verbosity == 2
                && c.logging.file.is_none()
        }));
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        let path = dir.path().join("config.toml");
        assert!(fs::write(&path, "search_path = 12").is_ok());
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_save_then_load() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        let path = dir.path().join("nested").join("config.toml");
        let config = Config {
            search_path: vec!["/libs".to_string()],
            logging: LoggingConfig {
                verbosity: 1,
                file: Some(PathBuf::from("/tmp/bridge.log")),
                no_stderr: true,
            },
        };
        assert!(config.save_to(&path).is_ok());
        assert!(Config::load_from(&path).is_ok_and(|loaded| loaded == config));
    }

    #[test]
    fn test_env_locations_follow_configured_ones() {
        let config = Config {
            search_path: vec!["/first".to_string()],
            ..Config::default()
        };
        let joined = std::env::join_paths(["/second", "/third"]).ok();
        assert_eq!(
            config.locations_with_env(joined),
            vec![
                "/first".to_string(),
                "/second".to_string(),
                "/third".to_string()
            ]
        );
        assert_eq!(config.locations_with_env(None), vec!["/first".to_string()]);
    }
}
