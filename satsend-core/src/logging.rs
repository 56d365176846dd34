//! Logging infrastructure for the satsend engine
//!
//! The engine logs through the `log` facade. This module wires up an
//! `env_logger` backend with optional timestamps, source locations, a JSON
//! line format and a file target.
//!
//! Addresses and transaction ids are truncated before they reach a log line.
//! Signed transaction bytes are never logged.
//!
//! # Usage
//!
//! ```
//! use satsend_core::logging::{self, LogConfig, LogLevel};
//! use serde_json::json;
//!
//! logging::init(&LogConfig::default()).expect("Failed to initialize logging");
//!
//! logging::log_network(
//!     LogLevel::Info,
//!     "utxo provider answered",
//!     Some(json!({ "provider": "mempool.space" })),
//! );
//! ```

use chrono::Local;
use log::{debug, LevelFilter};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fs::OpenOptions;
use std::io::Write as IoWrite;
use std::sync::Once;

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Log context categories for structured logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogContext {
    /// Provider calls: UTXO lookup, fee estimation, broadcast
    Network,
    /// Selection, template construction and signing hand-off
    Transaction,
    /// Config file handling
    Config,
}

/// Configuration for the logging system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default log level for all targets
    pub level: LogLevel,
    /// Path to log file (None for console-only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<String>,
    pub include_timestamps: bool,
    pub include_source_location: bool,
    /// Emit one JSON object per line instead of the human format
    pub json_format: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            log_file: None,
            include_timestamps: true,
            include_source_location: true,
            json_format: false,
        }
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

impl From<LogLevel> for log::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Trace => log::Level::Trace,
        }
    }
}

// Ensure logging is only initialized once
static LOGGING_INIT: Once = Once::new();

/// Initialize the logging system with the given configuration
///
/// Safe to call multiple times; only the first call installs a logger. An
/// error is returned only when the first call cannot open the log file.
pub fn init(config: &LogConfig) -> Result<(), String> {
    let mut result = Ok(());

    let include_timestamps = config.include_timestamps;
    let include_source_location = config.include_source_location;
    let json_format = config.json_format;
    let log_file = config.log_file.clone();
    let level = config.level;

    LOGGING_INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();
        builder.filter_level(level.into());

        builder.format(move |buf, record| {
            let timestamp = if include_timestamps {
                Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string()
            } else {
                String::new()
            };

            let location = if include_source_location {
                format!("{}:{}", record.file().unwrap_or("unknown"), record.line().unwrap_or(0))
            } else {
                String::new()
            };

            if json_format {
                let line = json!({
                    "timestamp": timestamp,
                    "level": record.level().to_string(),
                    "target": record.target(),
                    "location": location,
                    "message": record.args().to_string(),
                });
                writeln!(buf, "{}", line)
            } else {
                let mut style = buf.style();
                style.set_bold(true);

                if include_timestamps {
                    write!(buf, "{} ", timestamp)?;
                }
                if include_source_location {
                    writeln!(buf, "[{} {}] {}", style.value(record.level()), location, record.args())
                } else {
                    writeln!(buf, "[{}] {}", style.value(record.level()), record.args())
                }
            }
        });

        if let Some(file_path) = &log_file {
            match OpenOptions::new().create(true).append(true).open(file_path) {
                Ok(file) => {
                    builder.target(env_logger::Target::Pipe(Box::new(file)));
                }
                Err(e) => {
                    result = Err(format!("Failed to open log file {}: {}", file_path, e));
                    return;
                }
            }
        }

        // Test binaries may have installed a logger already
        if let Err(e) = builder.try_init() {
            debug!("Logger already initialized, using existing instance: {}", e);
        }
    });

    result
}

/// Truncate an address or txid for logging
///
/// Keeps the first and last four characters; very short values are masked.
pub fn sanitize_for_logging(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }

    let chars: Vec<char> = input.chars().collect();
    if chars.len() <= 8 {
        return "*****".to_string();
    }

    let first: String = chars[..4].iter().collect();
    let last: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", first, last)
}

fn log_with_context(
    level: LogLevel,
    context: LogContext,
    message: &str,
    params: Option<serde_json::Value>,
) {
    match params {
        Some(p) => log::log!(level.into(), "[{:?}] {} {}", context, message, p),
        None => log::log!(level.into(), "[{:?}] {}", context, message),
    }
}

/// Log a provider event
pub fn log_network(level: LogLevel, message: &str, params: Option<serde_json::Value>) {
    log_with_context(level, LogContext::Network, message, params);
}

/// Log a transaction pipeline event
pub fn log_transaction(level: LogLevel, message: &str, params: Option<serde_json::Value>) {
    log_with_context(level, LogContext::Transaction, message, params);
}

/// Log a configuration event
pub fn log_config(level: LogLevel, message: &str, params: Option<serde_json::Value>) {
    log_with_context(level, LogContext::Config, message, params);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_truncates_long_values() {
        let txid = "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b";
        assert_eq!(sanitize_for_logging(txid), "4a5e...a33b");
        assert_eq!(sanitize_for_logging("short"), "*****");
        assert_eq!(sanitize_for_logging(""), "");
    }

    #[test]
    fn test_log_config_defaults_from_partial_toml() {
        let config: LogConfig = toml::from_str("level = \"debug\"\njson_format = true").unwrap();
        assert_eq!(config.level, LogLevel::Debug);
        assert!(config.json_format);
        assert!(config.include_timestamps);
        assert!(config.log_file.is_none());
    }

    #[test]
    fn test_init_is_idempotent() {
        assert!(init(&LogConfig::default()).is_ok());
        assert!(init(&LogConfig::default()).is_ok());
    }
}
