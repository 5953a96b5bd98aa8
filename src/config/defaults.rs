// Defaults shared by the CLI, the config file and the exporter

use std::time::Duration;

/// Go-style listen address, binds on every interface
pub const DEFAULT_LISTEN_ADDR: &str = ":55123";

pub const DEFAULT_IP_PROVIDER: &str = "icanhazip";

/// Docker Hub's window is six hours, five minutes is plenty of resolution
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(300);

pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(30);
