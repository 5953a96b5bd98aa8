use crate::common::create_temp_dir;
use dhub_ratelimit::core::debug_logger::{EnhancedDebugLogger, LogEntry, LogLevel, LoggerConfig};
use flate2::read::GzDecoder;
use serial_test::serial;
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

const ROTATION_SIZE: usize = 8 * 1024 * 1024;

fn logger(verbose: bool) -> EnhancedDebugLogger {
    EnhancedDebugLogger::new(LoggerConfig {
        verbose,
        log_file: None,
    })
}

#[test]
#[serial]
fn test_debug_entries_filtered_unless_verbose() {
    std::env::remove_var("DHUB_RATELIMIT_DEBUG");

    let quiet = logger(false);
    assert!(quiet
        .build_entry(LogLevel::Debug, "Checker", "x", "hidden", None, HashMap::new())
        .is_none());
    assert!(quiet
        .build_entry(LogLevel::Info, "Checker", "x", "shown", None, HashMap::new())
        .is_some());

    let verbose = logger(true);
    assert!(verbose.is_verbose());
    assert!(verbose
        .build_entry(LogLevel::Debug, "Checker", "x", "shown", None, HashMap::new())
        .is_some());
}

#[test]
#[serial]
fn test_env_var_enables_debug() {
    std::env::set_var("DHUB_RATELIMIT_DEBUG", "yes");
    let from_env = EnhancedDebugLogger::from_env();
    std::env::remove_var("DHUB_RATELIMIT_DEBUG");

    assert!(from_env.is_verbose());
}

#[test]
fn test_entry_fields() {
    let logger = logger(true);
    let mut fields = HashMap::new();
    fields.insert("identity".to_string(), serde_json::json!("auth:alice"));

    let entry = logger
        .build_entry(LogLevel::Warn, "Poller", "check_failed", "boom", None, fields)
        .unwrap();

    assert_eq!(entry.level, "WARN");
    assert_eq!(entry.component, "Poller");
    assert_eq!(entry.event, "check_failed");
    assert_eq!(entry.correlation_id.as_deref(), Some(logger.get_session_id()));
    assert_eq!(entry.fields["identity"], "auth:alice");
    assert!(chrono::DateTime::parse_from_rfc3339(&entry.timestamp).is_ok());
}

#[test]
fn test_secrets_are_redacted() {
    let logger = logger(true);

    let redacted = logger.redact_sensitive_data("Authorization: Bearer abc.def.ghi");
    assert!(!redacted.contains("abc.def.ghi"));

    let redacted = logger.redact_sensitive_data("password=hunter2 user=alice");
    assert!(!redacted.contains("hunter2"));
    assert!(redacted.contains("user=alice"));

    let long_token = "a".repeat(150);
    assert_eq!(
        logger.redact_sensitive_data(&long_token),
        "[REDACTED_LONG_STRING_150chars]"
    );
}

#[test]
#[serial]
fn test_file_sink_writes_json_lines() {
    let dir = create_temp_dir();
    let path = dir.path().join("logs").join("dhub.log");
    let logger = EnhancedDebugLogger::new(LoggerConfig {
        verbose: false,
        log_file: Some(path.clone()),
    });

    logger.info("Server", "listening", "about to listen for HTTP");
    logger.debug("Server", "hidden", "not written");
    logger.http_request("GET", "/limit", "127.0.0.1:40000");

    let content = std::fs::read_to_string(&path).unwrap();
    let entries: Vec<LogEntry> = content
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].event, "listening");
    assert_eq!(entries[1].event, "http_request");
    assert_eq!(entries[1].message, "GET /limit");
    assert_eq!(entries[1].fields["remote"], "127.0.0.1:40000");
}

fn file_logger(path: &Path) -> EnhancedDebugLogger {
    EnhancedDebugLogger::new(LoggerConfig {
        verbose: false,
        log_file: Some(path.to_path_buf()),
    })
}

fn seed_full_log(path: &Path) {
    std::fs::write(path, vec![b'x'; ROTATION_SIZE]).unwrap();
}

fn archives(dir: &Path) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| {
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            name.starts_with("dhub.") && name.ends_with(".gz")
        })
        .collect();
    found.sort();
    found
}

#[test]
#[serial]
fn test_full_log_is_rotated_into_gzip_archive() {
    std::env::remove_var("DHUB_RATELIMIT_DEBUG");
    let dir = create_temp_dir();
    let path = dir.path().join("dhub.log");
    seed_full_log(&path);

    file_logger(&path).info("Poller", "check_failed", "after rotation");

    let archived = archives(dir.path());
    assert_eq!(archived.len(), 1);

    let mut decoded = Vec::new();
    GzDecoder::new(std::fs::File::open(&archived[0]).unwrap())
        .read_to_end(&mut decoded)
        .unwrap();
    assert_eq!(decoded.len(), ROTATION_SIZE);

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.lines().count(), 1);
    let entry: LogEntry = serde_json::from_str(content.trim_end()).unwrap();
    assert_eq!(entry.message, "after rotation");

    assert!(!dir.path().join("dhub.lock").exists());
    assert!(!dir.path().join("dhub.rotating").exists());
}

#[test]
#[serial]
fn test_small_log_is_not_rotated() {
    let dir = create_temp_dir();
    let path = dir.path().join("dhub.log");
    std::fs::write(&path, "{}\n").unwrap();

    file_logger(&path).info("Server", "listening", "no rotation");

    assert!(archives(dir.path()).is_empty());
    assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 2);
}

#[test]
#[serial]
fn test_old_archives_are_pruned_to_five() {
    let dir = create_temp_dir();
    let path = dir.path().join("dhub.log");
    for day in 1..=7 {
        std::fs::write(
            dir.path().join(format!("dhub.2024010{}_000000_000000.gz", day)),
            b"old",
        )
        .unwrap();
    }
    std::fs::write(dir.path().join("notes.gz"), b"unrelated").unwrap();
    seed_full_log(&path);

    file_logger(&path).info("Server", "listening", "after rotation");

    assert_eq!(archives(dir.path()).len(), 5);
    assert!(dir.path().join("notes.gz").exists());
}

#[test]
#[serial]
fn test_back_to_back_rotations_keep_both_archives() {
    let dir = create_temp_dir();
    let path = dir.path().join("dhub.log");

    seed_full_log(&path);
    file_logger(&path).info("Server", "listening", "first");
    seed_full_log(&path);
    file_logger(&path).info("Server", "listening", "second");

    assert_eq!(archives(dir.path()).len(), 2);
}
