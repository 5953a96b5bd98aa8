pub mod debug_logger_tests;
pub mod ratelimit;
