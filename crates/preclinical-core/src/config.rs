//! Configuration loading with environment overrides.
//!
//! Load order:
//! 1. TOML file (explicit path, else `PRECLINICAL_CONFIG_PATH`, else built-in defaults)
//! 2. Environment variables (runtime overrides)
//! 3. Validation

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "PRECLINICAL_CONFIG_PATH";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CoreConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub scheduling: SchedulingPolicy,
}

/// Database location. No path means an in-memory database.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of trace, debug, info, warn, error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Optional integrity rules applied by the visit scheduler.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SchedulingPolicy {
    /// Refuse moving a visit out of Completed/Missed/Skipped.
    pub strict_status_transitions: bool,
    /// Refuse assigning a study procedure to a visit of another study.
    pub enforce_procedure_study: bool,
}

impl Default for SchedulingPolicy {
    fn default() -> Self {
        Self {
            strict_status_transitions: false,
            enforce_procedure_study: true,
        }
    }
}

impl CoreConfig {
    /// Parse configuration from TOML text (no overrides applied).
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> ConfigResult<()> {
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "logging.level must be one of {:?}, got '{}'",
                LOG_LEVELS, self.logging.level
            )));
        }
        if let Some(path) = &self.database.path {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid("database.path must not be empty".into()));
            }
        }
        Ok(())
    }
}

/// Load configuration.
///
/// `config_path` wins over `PRECLINICAL_CONFIG_PATH`; with neither, defaults are used.
pub fn load_config(config_path: Option<&Path>) -> ConfigResult<CoreConfig> {
    let file = match config_path {
        Some(path) => Some(path.to_path_buf()),
        None => env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from),
    };

    let mut config = match file {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.display().to_string()));
            }
            let content = fs::read_to_string(&path)?;
            CoreConfig::from_toml_str(&content)?
        }
        None => CoreConfig::default(),
    };

    apply_environment_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `PRECLINICAL_DB_PATH` -> `database.path`
/// - `PRECLINICAL_LOG_LEVEL` -> `logging.level`
/// - `PRECLINICAL_STRICT_STATUS` -> `scheduling.strict_status_transitions`
/// - `PRECLINICAL_ENFORCE_PROCEDURE_STUDY` -> `scheduling.enforce_procedure_study`
pub fn apply_environment_overrides(config: &mut CoreConfig) {
    apply_overrides_from(config, |key| env::var(key).ok());
}

/// Apply overrides from an arbitrary lookup (environment, test fixtures).
pub fn apply_overrides_from<F>(config: &mut CoreConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup("PRECLINICAL_DB_PATH") {
        config.database.path = Some(PathBuf::from(value));
    }
    if let Some(value) = lookup("PRECLINICAL_LOG_LEVEL") {
        config.logging.level = value.to_lowercase();
    }
    if let Some(flag) = lookup("PRECLINICAL_STRICT_STATUS").and_then(|v| parse_bool(&v)) {
        config.scheduling.strict_status_transitions = flag;
    }
    if let Some(flag) = lookup("PRECLINICAL_ENFORCE_PROCEDURE_STUDY").and_then(|v| parse_bool(&v)) {
        config.scheduling.enforce_procedure_study = flag;
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = CoreConfig::default();
        assert!(config.database.path.is_none());
        assert_eq!(config.logging.level, "info");
        assert!(!config.scheduling.strict_status_transitions);
        assert!(config.scheduling.enforce_procedure_study);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = CoreConfig::from_toml_str(
            r#"
            [scheduling]
            strict_status_transitions = true
            "#,
        )
        .unwrap();

        assert!(config.scheduling.strict_status_transitions);
        assert!(config.scheduling.enforce_procedure_study);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [database]
            path = "/var/lib/preclinical/studies.db"

            [logging]
            level = "debug"
            "#
        )
        .unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(
            config.database.path,
            Some(PathBuf::from("/var/lib/preclinical/studies.db"))
        );
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_missing_file() {
        let result = load_config(Some(Path::new("/definitely/not/here.toml")));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            CoreConfig::from_toml_str("[database\npath ="),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("PRECLINICAL_DB_PATH", "/tmp/override.db"),
            ("PRECLINICAL_LOG_LEVEL", "WARN"),
            ("PRECLINICAL_STRICT_STATUS", "yes"),
            ("PRECLINICAL_ENFORCE_PROCEDURE_STUDY", "0"),
        ]
        .into_iter()
        .collect();

        let mut config = CoreConfig::default();
        apply_overrides_from(&mut config, |key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.path, Some(PathBuf::from("/tmp/override.db")));
        assert_eq!(config.logging.level, "warn");
        assert!(config.scheduling.strict_status_transitions);
        assert!(!config.scheduling.enforce_procedure_study);
    }

    #[test]
    fn test_unparseable_flag_ignored() {
        let mut config = CoreConfig::default();
        apply_overrides_from(&mut config, |key| {
            (key == "PRECLINICAL_ENFORCE_PROCEDURE_STUDY").then(|| "maybe".to_string())
        });
        assert!(config.scheduling.enforce_procedure_study);
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = CoreConfig::default();
        config.logging.level = "verbose".into();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
