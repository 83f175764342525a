//! Configuration module for the textdrop server.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::Parser;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

/// Command-line arguments for the paste server
#[derive(Parser, Debug)]
#[command(name = "textdrop")]
#[command(author = "textdrop authors")]
#[command(version = "0.1.0")]
#[command(about = "A netcat-friendly pastebin server", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Domain used in response URLs (e.g., paste.example.com)
    #[arg(short, long)]
    pub domain: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Receive buffer size in bytes; payloads beyond this are truncated
    #[arg(short, long)]
    pub buffer_size: Option<usize>,

    /// Listen backlog (pending connection queue size)
    #[arg(short = 'q', long)]
    pub backlog: Option<u32>,

    /// Initial slug length; grows on collision
    #[arg(short, long)]
    pub slug_length: Option<usize>,

    /// Directory pastes are stored under
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Append one slug:ip:hostname line per connection to this file
    #[arg(short, long)]
    pub log_file: Option<PathBuf>,

    /// Per-connection read/write deadline in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

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
    pub paste: PasteConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Domain used in response URLs
    #[serde(default = "default_domain")]
    pub domain: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// Listen backlog
    #[serde(default = "default_backlog")]
    pub backlog: u32,
    /// Receive buffer size in bytes
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Per-connection read/write deadline in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            domain: default_domain(),
            port: default_port(),
            backlog: default_backlog(),
            buffer_size: default_buffer_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Paste storage configuration
#[derive(Debug, Deserialize, Default)]
pub struct PasteConfig {
    /// Directory pastes are stored under (default: $HOME/code)
    pub output_dir: Option<PathBuf>,
    /// Initial slug length
    pub slug_length: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Audit log file path
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_domain() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    9999
}

fn default_backlog() -> u32 {
    500
}

fn default_buffer_size() -> usize {
    32768
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_slug_length() -> usize {
    4
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Pastes land under `$HOME/code` unless configured otherwise.
fn default_output_dir() -> PathBuf {
    match env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join("code"),
        None => PathBuf::from("code"),
    }
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// URL prefix for responses, normalized to end with `/`
    pub domain: String,
    pub port: u16,
    pub backlog: u32,
    pub buffer_size: usize,
    pub timeout_secs: u64,
    pub slug_length: usize,
    pub output_dir: PathBuf,
    pub log_file: Option<PathBuf>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        Self::resolve(CliArgs::parse())
    }

    /// Merge CLI args with the TOML file they point at (CLI takes precedence).
    pub fn resolve(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        let config = Config {
            domain: normalize_domain(&cli.domain.unwrap_or(toml_config.server.domain)),
            port: cli.port.unwrap_or(toml_config.server.port),
            backlog: cli.backlog.unwrap_or(toml_config.server.backlog),
            buffer_size: cli.buffer_size.unwrap_or(toml_config.server.buffer_size),
            timeout_secs: cli.timeout.unwrap_or(toml_config.server.timeout_secs),
            slug_length: cli
                .slug_length
                .or(toml_config.paste.slug_length)
                .unwrap_or_else(default_slug_length),
            output_dir: cli
                .output_dir
                .or(toml_config.paste.output_dir)
                .unwrap_or_else(default_output_dir),
            log_file: cli.log_file.or(toml_config.logging.file),
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values the server cannot run with.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.slug_length == 0 {
            return Err(ConfigError::Invalid(
                "slug length must be at least 1".to_string(),
            ));
        }
        if self.buffer_size == 0 {
            return Err(ConfigError::Invalid(
                "buffer size must be at least 1 byte".to_string(),
            ));
        }
        if self.backlog == 0 {
            return Err(ConfigError::Invalid(
                "backlog must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Wrap a bare domain as `http://<domain>/`; leave an explicit scheme alone.
/// The trailing slash is guaranteed either way so `<domain><slug>/` composes.
fn normalize_domain(domain: &str) -> String {
    let mut normalized = if domain.contains("://") {
        domain.to_string()
    } else {
        format!("http://{domain}")
    };
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    normalized
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
    Invalid(String),
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
            ConfigError::Invalid(msg) => {
                write!(f, "Invalid configuration: {msg}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
