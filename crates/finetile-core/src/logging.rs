//! Logging system for finetile
//!
//! Category-based level filtering and per-category rate limiting layered over
//! `tracing`. Hot paths (one warning per overflowing tile, per frame) go
//! through the rate-limited macros so a pathological scene cannot flood the log.

use crate::config::LoggingConfig;
use crate::error::{FinetileError, Result};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Log levels supported by the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Log categories for organizing log messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogCategory {
    Encode,
    Decode,
    Eval,
    Grid,
    Raster,
}

impl LogCategory {
    /// Convert LogCategory to string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogCategory::Encode => "encode",
            LogCategory::Decode => "decode",
            LogCategory::Eval => "eval",
            LogCategory::Grid => "grid",
            LogCategory::Raster => "raster",
        }
    }
}

impl std::fmt::Display for LogCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl LogLevel {
    /// Parse a level name, case-insensitively
    pub fn parse(s: &str) -> Option<LogLevel> {
        match s.to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    /// Convert LogLevel to string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rate limiting state for a specific category
#[derive(Debug)]
struct RateLimitState {
    last_reset: Instant,
    count: u32,
    max_count: u32,
    duration: Duration,
}

impl RateLimitState {
    fn new(max_count: u32, duration: Duration) -> Self {
        Self {
            last_reset: Instant::now(),
            count: 0,
            max_count,
            duration,
        }
    }

    fn should_allow(&mut self) -> bool {
        let now = Instant::now();

        if now.duration_since(self.last_reset) >= self.duration {
            self.last_reset = now;
            self.count = 0;
        }

        if self.count < self.max_count {
            self.count += 1;
            true
        } else {
            false
        }
    }
}

/// Logger configuration and state
#[derive(Debug)]
pub struct LoggerConfig {
    rate_limiters: Mutex<HashMap<String, RateLimitState>>,
    config: LoggingConfig,
}

impl LoggerConfig {
    /// Create a new logger configuration
    pub fn new(config: LoggingConfig) -> Self {
        Self {
            rate_limiters: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Check if a log message should be allowed based on rate limiting
    pub fn should_allow_log(&self, category: &str) -> bool {
        let mut limiters = self.rate_limiters.lock();

        let limiter = limiters.entry(category.to_string()).or_insert_with(|| {
            RateLimitState::new(
                self.config.max_rate_limit_count,
                Duration::from_secs(self.config.rate_limit_seconds),
            )
        });

        limiter.should_allow()
    }

    /// Check if a log level is enabled for a category
    pub fn is_level_enabled(&self, category: &str, level: LogLevel) -> bool {
        if let Some(category_level) = self
            .config
            .category_levels
            .get(category)
            .and_then(|s| LogLevel::parse(s))
        {
            return level >= category_level;
        }

        // Default to Info level if category not found
        level >= LogLevel::Info
    }

    /// Most verbose level any category asks for
    pub fn most_verbose_level(&self) -> LogLevel {
        self.config
            .category_levels
            .values()
            .filter_map(|s| LogLevel::parse(s))
            .min()
            .unwrap_or(LogLevel::Info)
    }

    /// Update the configuration
    pub fn update_config(&mut self, config: LoggingConfig) {
        self.config = config;
        self.rate_limiters.lock().clear();
    }
}

/// Global logger instance
static LOGGER: OnceLock<RwLock<LoggerConfig>> = OnceLock::new();

/// Initialize the logging system.
///
/// Installs a `tracing` fmt subscriber. `RUST_LOG` takes precedence over the
/// category levels when set. Calling this twice keeps the first subscriber.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let logger_config = LoggerConfig::new(config.clone());
    let default_level = logger_config.most_verbose_level();

    if LOGGER.set(RwLock::new(logger_config)).is_err() {
        update_config(config.clone());
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level.as_str()))
        .map_err(|e| FinetileError::initialization(format!("invalid log filter: {}", e)))?;

    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_err()
    {
        // Another subscriber (e.g. a test harness) is already installed.
        tracing::debug!("tracing subscriber already installed, keeping it");
    }

    Ok(())
}

/// Internal logging function
pub fn log_internal(level: LogLevel, category: &str, message: &str, rate_limited: bool) {
    if let Some(logger) = LOGGER.get() {
        let logger = logger.read();

        if !logger.is_level_enabled(category, level) {
            return;
        }

        if rate_limited && !logger.should_allow_log(category) {
            return;
        }
    }

    match level {
        LogLevel::Trace => tracing::trace!(category, "{}", message),
        LogLevel::Debug => tracing::debug!(category, "{}", message),
        LogLevel::Info => tracing::info!(category, "{}", message),
        LogLevel::Warn => tracing::warn!(category, "{}", message),
        LogLevel::Error => tracing::error!(category, "{}", message),
    }
}

/// Update logger configuration
pub fn update_config(config: LoggingConfig) {
    if let Some(logger) = LOGGER.get() {
        logger.write().update_config(config);
    }
}

#[macro_export]
macro_rules! finetile_debug {
    ($category:expr, $($arg:tt)*) => {
        $crate::logging::log_internal($crate::logging::LogLevel::Debug, $category.as_str(), &format!($($arg)*), false);
    };
}

#[macro_export]
macro_rules! finetile_info {
    ($category:expr, $($arg:tt)*) => {
        $crate::logging::log_internal($crate::logging::LogLevel::Info, $category.as_str(), &format!($($arg)*), false);
    };
}

#[macro_export]
macro_rules! finetile_warn {
    ($category:expr, $($arg:tt)*) => {
        $crate::logging::log_internal($crate::logging::LogLevel::Warn, $category.as_str(), &format!($($arg)*), false);
    };
}

// Rate-limited logging macros
#[macro_export]
macro_rules! finetile_warn_rate_limited {
    ($category:expr, $($arg:tt)*) => {
        $crate::logging::log_internal($crate::logging::LogLevel::Warn, $category.as_str(), &format!($($arg)*), true);
    };
}

#[macro_export]
macro_rules! finetile_error_rate_limited {
    ($category:expr, $($arg:tt)*) => {
        $crate::logging::log_internal($crate::logging::LogLevel::Error, $category.as_str(), &format!($($arg)*), true);
    };
}

pub use crate::finetile_debug;
pub use crate::finetile_error_rate_limited;
pub use crate::finetile_info;
pub use crate::finetile_warn;
pub use crate::finetile_warn_rate_limited;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(LogLevel::parse("info"), Some(LogLevel::Info));
        assert_eq!(LogLevel::parse("INFO"), Some(LogLevel::Info));
        assert_eq!(LogLevel::parse("invalid"), None);

        assert_eq!(LogLevel::Info.as_str(), "info");
        assert_eq!(LogCategory::Grid.to_string(), "grid");
    }

    #[test]
    fn test_rate_limiting() {
        let mut state = RateLimitState::new(2, Duration::from_millis(100));

        assert!(state.should_allow());
        assert!(state.should_allow());
        assert!(!state.should_allow());

        std::thread::sleep(Duration::from_millis(150));
        assert!(state.should_allow());
    }

    #[test]
    fn test_logger_config() {
        let mut category_levels = HashMap::new();
        category_levels.insert("grid".to_string(), "debug".to_string());
        category_levels.insert("eval".to_string(), "error".to_string());

        let config = LoggingConfig {
            category_levels,
            rate_limit_seconds: 60,
            max_rate_limit_count: 1,
        };

        let logger_config = LoggerConfig::new(config);

        assert!(logger_config.is_level_enabled("grid", LogLevel::Debug));
        assert!(!logger_config.is_level_enabled("grid", LogLevel::Trace));
        assert!(!logger_config.is_level_enabled("eval", LogLevel::Warn));
        assert!(logger_config.is_level_enabled("unknown", LogLevel::Info));
        assert_eq!(logger_config.most_verbose_level(), LogLevel::Debug);

        assert!(logger_config.should_allow_log("grid"));
        assert!(!logger_config.should_allow_log("grid"));
        // Limits are tracked per category.
        assert!(logger_config.should_allow_log("raster"));
    }

    #[test]
    fn test_init_is_idempotent() {
        let config = LoggingConfig::default();
        assert!(init(&config).is_ok());
        assert!(init(&config).is_ok());
        finetile_warn_rate_limited!(LogCategory::Grid, "tile {} overflowed", 3);
    }
}
