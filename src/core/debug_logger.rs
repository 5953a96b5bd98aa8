use std::collections::HashMap;
use std::env;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, OnceLock};

use chrono::Local;
use flate2::{write::GzEncoder, Compression};
use fs2::FileExt;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Hardcoded rotation policy - only the log path is configurable
const LOG_ROTATION_SIZE_MB: u64 = 8;
const MAX_ARCHIVES: u32 = 5;
const ROTATION_CHECK_INTERVAL: u32 = 200;

const DEBUG_ENV_VAR: &str = "DHUB_RATELIMIT_DEBUG";

static GLOBAL_LOGGER: OnceLock<EnhancedDebugLogger> = OnceLock::new();

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LogEntry {
    pub timestamp: String,                              // ISO-8601 with timezone
    pub level: String,                                  // DEBUG, INFO, WARN, ERROR
    pub component: String,                              // Component name
    pub event: String,                                  // Event type
    pub message: String,                                // Human readable message (redacted)
    pub correlation_id: Option<String>,                 // For tracking multi-step operations
    pub fields: HashMap<String, serde_json::Value>,     // Structured data
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

/// Logger setup chosen at startup
#[derive(Debug, Clone, Default)]
pub struct LoggerConfig {
    /// Emit DEBUG entries
    pub verbose: bool,
    /// Write to a rotating file instead of stderr
    pub log_file: Option<PathBuf>,
}

struct RotatingLogger {
    log_path: PathBuf,
    write_count: AtomicU32,
}

impl RotatingLogger {
    pub fn new(log_path: PathBuf) -> Self {
        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        Self {
            log_path,
            write_count: AtomicU32::new(0),
        }
    }

    pub fn write_with_rotation(&self, json_line: &str) -> Result<(), std::io::Error> {
        // Check for rotation every ROTATION_CHECK_INTERVAL writes
        if self.write_count.fetch_add(1, Ordering::Relaxed) % ROTATION_CHECK_INTERVAL == 0 {
            let _ = self.rotate_if_needed(); // Don't let rotation errors stop logging
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;

        writeln!(file, "{}", json_line)?;
        Ok(())
    }

    fn rotate_if_needed(&self) -> Result<(), std::io::Error> {
        if !self.needs_rotation()? {
            return Ok(());
        }

        // Lock file keeps two exporters sharing a log from rotating at once
        let lock_path = self.log_path.with_extension("lock");
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;

        match lock_file.try_lock_exclusive() {
            Ok(()) => {
                if self.needs_rotation()? {
                    self.perform_rotation()?;
                }
                let _ = std::fs::remove_file(&lock_path);
                Ok(())
            }
            Err(_) => Ok(()),
        }
    }

    fn needs_rotation(&self) -> Result<bool, std::io::Error> {
        if !self.log_path.exists() {
            return Ok(false);
        }

        let metadata = std::fs::metadata(&self.log_path)?;
        Ok(metadata.len() >= LOG_ROTATION_SIZE_MB * 1024 * 1024)
    }

    fn log_dir(&self) -> &Path {
        self.log_path.parent().unwrap_or_else(|| Path::new("."))
    }

    fn base_name(&self) -> String {
        self.log_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| "dhub-ratelimit".to_string())
    }

    /// `<stem>.<YYYYmmdd_HHMMSS_micros>.gz`, suffixed with a counter if taken
    fn next_archive_path(&self) -> PathBuf {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S_%6f").to_string();
        let base_name = self.base_name();

        let mut archive_path = self
            .log_dir()
            .join(format!("{}.{}.gz", base_name, timestamp));
        let mut attempt = 1;
        while archive_path.exists() {
            archive_path = self
                .log_dir()
                .join(format!("{}.{}-{}.gz", base_name, timestamp, attempt));
            attempt += 1;
        }
        archive_path
    }

    fn perform_rotation(&self) -> Result<(), std::io::Error> {
        let archive_path = self.next_archive_path();

        // Move aside, compress, then drop the uncompressed copy
        let temp_path = self.log_path.with_extension("rotating");
        std::fs::rename(&self.log_path, &temp_path)?;

        let source_file = File::open(&temp_path)?;
        let target_file = File::create(&archive_path)?;
        let mut encoder = GzEncoder::new(target_file, Compression::default());
        std::io::copy(&mut BufReader::new(source_file), &mut encoder)?;
        encoder.finish()?;

        std::fs::remove_file(&temp_path)?;

        let _ = self.cleanup_old_archives();

        Ok(())
    }

    fn cleanup_old_archives(&self) -> Result<(), std::io::Error> {
        let base_name = self.base_name();

        let mut archives = Vec::new();
        for entry in std::fs::read_dir(self.log_dir())? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();

            if name.starts_with(&format!("{}.", base_name)) && name.ends_with(".gz") {
                archives.push((entry.path(), entry.metadata()?.modified()?));
            }
        }

        // Keep only the most recent MAX_ARCHIVES
        archives.sort_by_key(|(_, modified)| *modified);
        if archives.len() > MAX_ARCHIVES as usize {
            let to_remove = archives.len() - MAX_ARCHIVES as usize;
            for (path, _) in archives.iter().take(to_remove) {
                let _ = std::fs::remove_file(path);
            }
        }

        Ok(())
    }
}

enum LogSink {
    Stderr,
    File(Mutex<RotatingLogger>),
}

/// Structured JSON-lines logger with secret redaction
pub struct EnhancedDebugLogger {
    verbose: bool,
    sink: LogSink,
    session_id: String, // Correlation ID for this process
    redaction_patterns: Vec<Regex>,
}

impl EnhancedDebugLogger {
    pub fn new(config: LoggerConfig) -> Self {
        let verbose = config.verbose || Self::parse_debug_enabled();
        let session_id = Uuid::new_v4().to_string()[..8].to_string();

        let sink = match config.log_file {
            Some(path) => LogSink::File(Mutex::new(RotatingLogger::new(path))),
            None => LogSink::Stderr,
        };

        Self {
            verbose,
            sink,
            session_id,
            redaction_patterns: Self::compile_redaction_patterns(),
        }
    }

    /// Logger configured from the environment only
    pub fn from_env() -> Self {
        Self::new(LoggerConfig::default())
    }

    /// Parse DHUB_RATELIMIT_DEBUG
    /// Supports: true/false, 1/0, yes/no, on/off (case insensitive)
    fn parse_debug_enabled() -> bool {
        env::var(DEBUG_ENV_VAR)
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on"))
            .unwrap_or(false)
    }

    fn compile_redaction_patterns() -> Vec<Regex> {
        let patterns = [
            // bearer must run before authorization
            r"(?i)bearer[:\s]+[^\s\n]+",
            r"(?i)authorization[:=\s]+[^\s\n]+",
            r"(?i)token[:=\s]+[^\s\n]+",
            r"(?i)password[:=\s]+[^\s\n]+",
            r"(?i)secret[:=\s]+[^\s\n]+",
        ];

        patterns
            .iter()
            .filter_map(|pattern| Regex::new(pattern).ok())
            .collect()
    }

    /// Redaction guardrails for sensitive data
    pub fn redact_sensitive_data(&self, text: &str) -> String {
        let mut redacted = text.to_string();

        for regex in &self.redaction_patterns {
            redacted = regex.replace_all(&redacted, "[REDACTED]").to_string();
        }

        // Redact suspiciously long strings (potential tokens)
        if redacted.len() > 100
            && !redacted.contains(' ')
            && redacted
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "-_.".contains(c))
        {
            redacted = format!("[REDACTED_LONG_STRING_{}chars]", redacted.len());
        }

        redacted
    }

    /// Build an entry, or None when the level is filtered out
    pub fn build_entry(
        &self,
        level: LogLevel,
        component: &str,
        event: &str,
        message: &str,
        correlation_id: Option<String>,
        fields: HashMap<String, serde_json::Value>,
    ) -> Option<LogEntry> {
        if level == LogLevel::Debug && !self.verbose {
            return None;
        }

        Some(LogEntry {
            timestamp: Local::now().to_rfc3339(),
            level: level.as_str().to_string(),
            component: component.to_string(),
            event: event.to_string(),
            message: self.redact_sensitive_data(message),
            correlation_id: correlation_id.or_else(|| Some(self.session_id.clone())),
            fields,
        })
    }

    pub fn log(
        &self,
        level: LogLevel,
        component: &str,
        event: &str,
        message: &str,
        correlation_id: Option<String>,
        fields: HashMap<String, serde_json::Value>,
    ) {
        let Some(entry) = self.build_entry(level, component, event, message, correlation_id, fields)
        else {
            return;
        };
        let Ok(json_line) = serde_json::to_string(&entry) else {
            return;
        };

        match &self.sink {
            LogSink::Stderr => eprintln!("{}", json_line),
            LogSink::File(logger) => {
                if let Ok(logger) = logger.lock() {
                    let _ = logger.write_with_rotation(&json_line); // Don't crash on logging errors
                }
            }
        }
    }

    pub fn debug(&self, component: &str, event: &str, message: &str) {
        self.log(LogLevel::Debug, component, event, message, None, HashMap::new());
    }

    pub fn info(&self, component: &str, event: &str, message: &str) {
        self.log(LogLevel::Info, component, event, message, None, HashMap::new());
    }

    pub fn warn(&self, component: &str, event: &str, message: &str) {
        self.log(LogLevel::Warn, component, event, message, None, HashMap::new());
    }

    pub fn error(&self, component: &str, event: &str, message: &str) {
        self.log(LogLevel::Error, component, event, message, None, HashMap::new());
    }

    // Typed events

    pub fn token_refreshed(&self, authenticated: bool, expires_at: &str) {
        let mut fields = HashMap::new();
        fields.insert("authenticated".to_string(), serde_json::Value::Bool(authenticated));
        fields.insert("expires_at".to_string(), serde_json::Value::String(expires_at.to_string()));

        self.log(LogLevel::Debug, "Checker", "token_refreshed",
                 &format!("Refreshed Docker Hub credentials, valid until {}", expires_at),
                 None, fields);
    }

    pub fn ip_resolved(&self, provider: &str, ip: &str) {
        let mut fields = HashMap::new();
        fields.insert("provider".to_string(), serde_json::Value::String(provider.to_string()));
        fields.insert("ip_address".to_string(), serde_json::Value::String(ip.to_string()));

        self.log(LogLevel::Info, "Checker", "ip_resolved",
                 &format!("Resolved public IP {} via {}", ip, provider),
                 None, fields);
    }

    pub fn probe_end(
        &self,
        identity: &str,
        http_status: u16,
        limit: u64,
        remaining: u64,
        duration_ms: u64,
        correlation_id: String,
    ) {
        let mut fields = HashMap::new();
        fields.insert("identity".to_string(), serde_json::Value::String(identity.to_string()));
        fields.insert("http_status".to_string(), serde_json::Value::Number(http_status.into()));
        fields.insert("pull_limit".to_string(), serde_json::Value::Number(limit.into()));
        fields.insert("pull_remaining".to_string(), serde_json::Value::Number(remaining.into()));
        fields.insert("duration_ms".to_string(), serde_json::Value::Number(duration_ms.into()));

        self.log(LogLevel::Debug, "Checker", "probe_end",
                 &format!("Probe completed: {}/{} pulls left ({}ms)", remaining, limit, duration_ms),
                 Some(correlation_id), fields);
    }

    pub fn http_request(&self, method: &str, path: &str, remote: &str) {
        let mut fields = HashMap::new();
        fields.insert("remote".to_string(), serde_json::Value::String(remote.to_string()));

        self.log(LogLevel::Info, "Server", "http_request",
                 &format!("{} {}", method, path),
                 None, fields);
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn get_session_id(&self) -> &str {
        &self.session_id
    }
}

/// Install the process-wide logger. Returns false if one was already set.
pub fn init_logger(config: LoggerConfig) -> bool {
    GLOBAL_LOGGER.set(EnhancedDebugLogger::new(config)).is_ok()
}

/// Process-wide logger, configured from the environment if never initialised
pub fn get_debug_logger() -> &'static EnhancedDebugLogger {
    GLOBAL_LOGGER.get_or_init(EnhancedDebugLogger::from_env)
}
