use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::parse_duration;

#[derive(Parser, Debug, Default)]
#[command(name = "dhub-ratelimit")]
#[command(version = concat!("Ver:", env!("CARGO_PKG_VERSION")))]
#[command(about = "Shows the remaining amount of container image pulls remaining from the Docker Hub to this host")]
pub struct Cli {
    /// Docker Hub username
    #[arg(long, env = "DOCKER_REGISTRY_USER")]
    pub username: Option<String>,

    /// Docker Hub password or access token
    #[arg(long, env = "DOCKER_REGISTRY_PASS", hide_env_values = true)]
    pub password: Option<String>,

    /// Read the password from stdin
    #[arg(long = "password-stdin")]
    pub password_stdin: bool,

    /// HTTP listen address for /limit and /metrics
    #[arg(long = "http", env = "LISTEN_ADDR")]
    pub listen: Option<String>,

    /// External IP provider: icanhazip, ipify or myipio
    #[arg(long = "extip", env = "EXTIP_PROVIDER")]
    pub extip: Option<String>,

    /// Enable debug log level
    #[arg(short = 'v', long = "verbose", env = "VERBOSE")]
    pub verbose: bool,

    /// Time between checks (e.g. 300s, 5m)
    #[arg(short = 'i', long = "interval", value_parser = parse_duration)]
    pub interval: Option<Duration>,

    /// Deadline for a single check (e.g. 30s)
    #[arg(long = "check-timeout", value_parser = parse_duration)]
    pub check_timeout: Option<Duration>,

    /// TOML configuration file
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Write logs to a rotating file instead of stderr
    #[arg(long = "log-file", env = "LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Run a single check, print the result as JSON and exit
    #[arg(long = "once")]
    pub once: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
