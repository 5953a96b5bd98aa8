pub mod debug_logger;
pub mod ratelimit;

pub use debug_logger::{get_debug_logger, init_logger, EnhancedDebugLogger, LoggerConfig};
pub use ratelimit::{CheckResult, Checker};
