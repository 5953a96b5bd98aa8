//! Exporter configuration
//!
//! Settings come from three places, highest priority first:
//!
//! 1. Command line flags and their environment variables (`cli::Cli`)
//! 2. A TOML file, `--config` or `~/.config/dhub-ratelimit/config.toml`
//! 3. Built-in defaults (`defaults.rs`)
//!
//! A password read with `--password-stdin` beats every other source.

pub mod defaults;

pub use defaults::*;

use secrecy::SecretString;
use serde::Deserialize;
use std::io::Read;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::Cli;
use crate::core::ratelimit::IpProvider;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid listen address {0:?}")]
    InvalidListenAddr(String),
    #[error("invalid duration {value:?}: {reason}")]
    InvalidDuration { value: String, reason: String },
    #[error("unable to read password from stdin: {0}")]
    Stdin(#[source] std::io::Error),
}

/// Contents of the `--config` TOML file. Keys match the long flag names.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    pub http: Option<String>,
    pub extip: Option<String>,
    pub interval: Option<String>,
    pub check_timeout: Option<String>,
    pub verbose: Option<bool>,
    pub log_file: Option<PathBuf>,
}

impl FileConfig {
    /// `~/.config/dhub-ratelimit/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| {
            home.join(".config")
                .join("dhub-ratelimit")
                .join("config.toml")
        })
    }

    /// Load the explicit file, or the default one if it exists
    pub fn discover(explicit: Option<&Path>) -> Result<Option<Self>, ConfigError> {
        match explicit {
            Some(path) => Self::load(path).map(Some),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::load(&path).map(Some),
                _ => Ok(None),
            },
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

/// Fully resolved exporter settings
#[derive(Debug)]
pub struct ExporterConfig {
    pub username: String,
    pub password: SecretString,
    pub listen_addr: SocketAddr,
    pub ip_provider: IpProvider,
    pub interval: Duration,
    pub check_timeout: Duration,
    pub verbose: bool,
    pub log_file: Option<PathBuf>,
    pub once: bool,
}

impl ExporterConfig {
    /// Merge CLI flags, an optional config file and defaults.
    pub fn resolve(
        cli: &Cli,
        file: Option<FileConfig>,
        stdin_password: Option<String>,
    ) -> Result<Self, ConfigError> {
        let file = file.unwrap_or_default();

        let username = cli.username.clone().or(file.username).unwrap_or_default();
        let password = stdin_password
            .or_else(|| cli.password.clone())
            .or(file.password)
            .unwrap_or_default();

        let listen = cli
            .listen
            .clone()
            .or(file.http)
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());

        let extip = cli
            .extip
            .clone()
            .or(file.extip)
            .unwrap_or_else(|| DEFAULT_IP_PROVIDER.to_string());

        let interval = match (cli.interval, file.interval) {
            (Some(interval), _) => interval,
            (None, Some(raw)) => parse_duration_value(&raw)?,
            (None, None) => DEFAULT_INTERVAL,
        };

        let check_timeout = match (cli.check_timeout, file.check_timeout) {
            (Some(timeout), _) => timeout,
            (None, Some(raw)) => parse_duration_value(&raw)?,
            (None, None) => DEFAULT_CHECK_TIMEOUT,
        };

        Ok(Self {
            username,
            password: SecretString::new(password),
            listen_addr: parse_listen_addr(&listen)?,
            ip_provider: IpProvider::from_label(&extip),
            interval,
            check_timeout,
            verbose: cli.verbose || file.verbose.unwrap_or(false),
            log_file: cli.log_file.clone().or(file.log_file),
            once: cli.once,
        })
    }
}

/// Read a password from `reader`, dropping the trailing line break
pub fn read_password_from<R: Read>(mut reader: R) -> Result<String, ConfigError> {
    let mut password = String::new();
    reader
        .read_to_string(&mut password)
        .map_err(ConfigError::Stdin)?;
    Ok(password.trim_end_matches(['\r', '\n']).to_string())
}

/// Accept Go-style `:port` as well as `host:port`
pub fn parse_listen_addr(raw: &str) -> Result<SocketAddr, ConfigError> {
    let trimmed = raw.trim();
    let candidate = if trimmed.starts_with(':') {
        format!("0.0.0.0{}", trimmed)
    } else {
        trimmed.to_string()
    };

    candidate
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| ConfigError::InvalidListenAddr(raw.to_string()))
}

/// Parse `300s`, `5m`, `1h`, `1500ms` or a bare number of seconds.
///
/// Used as a clap value parser, hence the `String` error.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let value = raw.trim();
    let split_at = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(split_at);

    let amount: u64 = number
        .parse()
        .map_err(|_| format!("expected a number followed by ms, s, m or h, got {:?}", raw))?;

    let duration = match unit {
        "ms" => Duration::from_millis(amount),
        "" | "s" => Duration::from_secs(amount),
        "m" => Duration::from_secs(amount.saturating_mul(60)),
        "h" => Duration::from_secs(amount.saturating_mul(3600)),
        other => return Err(format!("unknown duration unit {:?}", other)),
    };

    if duration.is_zero() {
        return Err("duration must be greater than zero".to_string());
    }
    Ok(duration)
}

fn parse_duration_value(raw: &str) -> Result<Duration, ConfigError> {
    parse_duration(raw).map_err(|reason| ConfigError::InvalidDuration {
        value: raw.to_string(),
        reason,
    })
}
