//! Configuration module for the echo server.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

/// Command-line arguments for the echo server
#[derive(Parser, Debug)]
#[command(name = "echoline")]
#[command(author = "echoline authors")]
#[command(version = "0.1.0")]
#[command(about = "A line-oriented TCP echo server", long_about = None)]
pub struct CliArgs {
    /// Port to listen on
    #[arg(value_parser = clap::value_parser!(u16).range(1..))]
    pub port: u16,

    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host address to bind to (e.g., 0.0.0.0)
    #[arg(long)]
    pub host: Option<String>,

    /// Seconds to serve before shutting down (0 = run until Ctrl-C)
    #[arg(long)]
    pub run_for: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Seconds to serve before shutting down
    #[serde(default = "default_run_for")]
    pub run_for: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            run_for: default_run_for(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
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

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_run_for() -> u64 {
    60 // seconds
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    pub run_for: u64,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_cli(CliArgs::parse())
    }

    fn from_cli(cli: CliArgs) -> Result<Self, ConfigError> {
        // Load TOML config if specified
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Ok(Self::merge(cli, toml_config))
    }

    /// Merge CLI args with TOML config (CLI takes precedence).
    fn merge(cli: CliArgs, toml_config: TomlConfig) -> Config {
        Config {
            port: cli.port,
            host: cli.host.unwrap_or(toml_config.server.host),
            run_for: cli.run_for.unwrap_or(toml_config.server.run_for),
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        }
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TomlConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.run_for, 60);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            [server]
            host = "0.0.0.0"
            run_for = 0

            [logging]
            level = "debug"
        "#;

        let config: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.run_for, 0);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_port_is_required_and_validated() {
        assert!(CliArgs::try_parse_from(["echoline"]).is_err());
        assert!(CliArgs::try_parse_from(["echoline", "0"]).is_err());
        assert!(CliArgs::try_parse_from(["echoline", "70000"]).is_err());
        assert!(CliArgs::try_parse_from(["echoline", "9000"]).is_ok());
    }

    #[test]
    fn test_defaults_apply_without_flags() {
        let cli = CliArgs::try_parse_from(["echoline", "9000"]).unwrap();
        let config = Config::from_cli(cli).unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.run_for, 60);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_cli_takes_precedence_over_toml() {
        let toml_config: TomlConfig = toml::from_str(
            r#"
            [server]
            host = "10.0.0.1"
            run_for = 300

            [logging]
            level = "warn"
        "#,
        )
        .unwrap();

        let cli = CliArgs::try_parse_from(["echoline", "9000", "--host", "0.0.0.0"]).unwrap();
        let config = Config::merge(cli, toml_config);

        assert_eq!(config.port, 9000);
        assert_eq!(config.host, "0.0.0.0");
        // Flags left at their defaults fall through to the file.
        assert_eq!(config.run_for, 300);
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_cli_flags_override_everything() {
        let cli = CliArgs::try_parse_from([
            "echoline",
            "9000",
            "--host",
            "0.0.0.0",
            "--run-for",
            "0",
            "--log-level",
            "debug",
        ])
        .unwrap();
        let config = Config::from_cli(cli).unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.run_for, 0);
        assert_eq!(config.log_level, "debug");
    }
}
