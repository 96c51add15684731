//! Configuration loading and resolution
//!
//! Each setting is resolved in priority order:
//! 1. Command-line argument / environment variable (clap fills [`ConfigOverrides`])
//! 2. TOML config file
//! 3. OS-dependent compiled default
//!
//! A missing or unreadable TOML file is not fatal: a warning is logged and
//! the remaining sources are used.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 5780;

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "PULSE_CONFIG";

/// Compiled fallbacks for every setting
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub database_path: PathBuf,
    pub bind_address: String,
    pub port: u16,
    pub session_ttl_hours: i64,
    pub reassignment_interval_secs: u64,
    pub public_base_url: String,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            database_path: default_data_folder().join("pulse.db"),
            bind_address: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            session_ttl_hours: 24,
            reassignment_interval_secs: 3600,
            public_base_url: format!("http://localhost:{}", DEFAULT_PORT),
            log_level: "info".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Contents of `config.toml`; every key is optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub database_path: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub session_secret: Option<String>,
    pub session_ttl_hours: Option<i64>,
    pub admin_notification_email: Option<String>,
    pub public_base_url: Option<String>,
    pub reassignment_interval_secs: Option<u64>,
    pub bootstrap_admin_email: Option<String>,
    pub bootstrap_admin_password: Option<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Values supplied on the command line or through `PULSE_*` variables
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub database_path: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub session_secret: Option<String>,
    pub session_ttl_hours: Option<i64>,
    pub admin_notification_email: Option<String>,
    pub public_base_url: Option<String>,
    pub reassignment_interval_secs: Option<u64>,
    pub bootstrap_admin_email: Option<String>,
    pub bootstrap_admin_password: Option<String>,
    pub log_level: Option<String>,
}

/// Initial ADMIN account created when no admin exists yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
}

/// Fully resolved server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_path: PathBuf,
    pub bind_address: String,
    pub port: u16,
    /// `None` means load (or generate) the secret from the settings table
    pub session_secret: Option<String>,
    pub session_ttl: chrono::Duration,
    pub admin_notification_email: Option<String>,
    pub public_base_url: String,
    pub reassignment_interval: std::time::Duration,
    pub bootstrap_admin: Option<BootstrapAdmin>,
    pub log_level: String,
}

impl ServerConfig {
    /// Merge overrides, TOML and compiled defaults
    pub fn resolve(overrides: &ConfigOverrides, toml: Option<&TomlConfig>) -> Result<Self> {
        let defaults = CompiledDefaults::for_current_platform();
        let file = toml.cloned().unwrap_or_default();

        let session_ttl_hours = overrides
            .session_ttl_hours
            .or(file.session_ttl_hours)
            .unwrap_or(defaults.session_ttl_hours);
        if session_ttl_hours <= 0 {
            return Err(Error::Config(format!(
                "session_ttl_hours must be positive, got {}",
                session_ttl_hours
            )));
        }

        let reassignment_interval_secs = overrides
            .reassignment_interval_secs
            .or(file.reassignment_interval_secs)
            .unwrap_or(defaults.reassignment_interval_secs);
        if reassignment_interval_secs == 0 {
            return Err(Error::Config(
                "reassignment_interval_secs must be greater than zero".to_string(),
            ));
        }

        let session_secret = overrides
            .session_secret
            .clone()
            .or(file.session_secret)
            .filter(|s| !s.trim().is_empty());

        let bootstrap_email = overrides
            .bootstrap_admin_email
            .clone()
            .or(file.bootstrap_admin_email);
        let bootstrap_password = overrides
            .bootstrap_admin_password
            .clone()
            .or(file.bootstrap_admin_password);
        let bootstrap_admin = match (bootstrap_email, bootstrap_password) {
            (Some(email), Some(password)) => Some(BootstrapAdmin { email, password }),
            (None, None) => None,
            _ => {
                return Err(Error::Config(
                    "bootstrap admin needs both an email and a password".to_string(),
                ))
            }
        };

        let port = overrides.port.or(file.port).unwrap_or(defaults.port);

        Ok(Self {
            database_path: overrides
                .database_path
                .clone()
                .or(file.database_path)
                .unwrap_or(defaults.database_path),
            bind_address: overrides
                .bind_address
                .clone()
                .or(file.bind_address)
                .unwrap_or(defaults.bind_address),
            port,
            session_secret,
            session_ttl: chrono::Duration::hours(session_ttl_hours),
            admin_notification_email: overrides
                .admin_notification_email
                .clone()
                .or(file.admin_notification_email),
            public_base_url: overrides
                .public_base_url
                .clone()
                .or(file.public_base_url)
                .unwrap_or(defaults.public_base_url)
                .trim_end_matches('/')
                .to_string(),
            reassignment_interval: std::time::Duration::from_secs(reassignment_interval_secs),
            bootstrap_admin,
            log_level: overrides
                .log_level
                .clone()
                .unwrap_or(file.logging.level),
        })
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// Locate the TOML config file, if any
///
/// `PULSE_CONFIG` wins; otherwise `~/.config/pulse/config.toml`, then
/// `/etc/pulse/config.toml` on Linux.
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        return Some(PathBuf::from(path));
    }

    let user_config = dirs::config_dir().map(|d| d.join("pulse").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/pulse/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Invalid config file {}: {}", path.display(), e)))
}

/// Load the config file if present; problems are logged and ignored
pub fn load_optional_toml_config() -> Option<TomlConfig> {
    let path = config_file_path()?;
    match load_toml_config(&path) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!("Ignoring config file {}: {}", path.display(), e);
            None
        }
    }
}

/// Get OS-dependent default data folder
fn default_data_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/pulse (or /var/lib/pulse for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("pulse"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/pulse"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("pulse"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/pulse"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("pulse"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\pulse"))
    } else {
        PathBuf::from("./pulse_data")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_nothing_configured() {
        let config = ServerConfig::resolve(&ConfigOverrides::default(), None).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.session_ttl, chrono::Duration::hours(24));
        assert!(config.session_secret.is_none());
        assert!(config.bootstrap_admin.is_none());
        assert!(config.database_path.ends_with("pulse.db"));
    }

    #[test]
    fn test_override_beats_toml() {
        let toml = TomlConfig {
            port: Some(6000),
            admin_notification_email: Some("ops@pulse.test".to_string()),
            ..TomlConfig::default()
        };
        let overrides = ConfigOverrides {
            port: Some(7000),
            ..ConfigOverrides::default()
        };
        let config = ServerConfig::resolve(&overrides, Some(&toml)).unwrap();
        assert_eq!(config.port, 7000);
        assert_eq!(config.admin_notification_email.as_deref(), Some("ops@pulse.test"));
    }

    #[test]
    fn test_half_configured_bootstrap_admin_rejected() {
        let overrides = ConfigOverrides {
            bootstrap_admin_email: Some("root@pulse.test".to_string()),
            ..ConfigOverrides::default()
        };
        assert!(matches!(
            ServerConfig::resolve(&overrides, None),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_blank_secret_treated_as_missing() {
        let overrides = ConfigOverrides {
            session_secret: Some("   ".to_string()),
            ..ConfigOverrides::default()
        };
        let config = ServerConfig::resolve(&overrides, None).unwrap();
        assert!(config.session_secret.is_none());
    }

    #[test]
    fn test_non_positive_ttl_rejected() {
        let overrides = ConfigOverrides {
            session_ttl_hours: Some(0),
            ..ConfigOverrides::default()
        };
        assert!(ServerConfig::resolve(&overrides, None).is_err());
    }

    #[test]
    fn test_public_base_url_trailing_slash_trimmed() {
        let overrides = ConfigOverrides {
            public_base_url: Some("https://pulse.example.com/".to_string()),
            ..ConfigOverrides::default()
        };
        let config = ServerConfig::resolve(&overrides, None).unwrap();
        assert_eq!(config.public_base_url, "https://pulse.example.com");
    }
}
