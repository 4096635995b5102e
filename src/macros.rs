//! Logging macros with `format!`-style messages
//!
//! Every macro takes the logger, a title, then the message format string and
//! its arguments. Structured data goes in a `data = ...` argument placed
//! right after the title.
//!
//! # Examples
//!
//! ```
//! use logrelay::prelude::*;
//! use logrelay::{error, info};
//!
//! let logger = Logger::new(LoggerConfig::disabled()).unwrap();
//!
//! let port = 8080;
//! info!(logger, "http", "listening on port {}", port);
//!
//! let retries = Payload::new().with_field("retries", 3);
//! error!(logger, "db", data = retries, "timeout after {} ms", 250);
//! ```

/// Log a formatted message at the given level.
///
/// ```
/// # use logrelay::prelude::*;
/// # let logger = Logger::new(LoggerConfig::disabled()).unwrap();
/// use logrelay::log;
/// log!(logger, LogLevel::Info, "boot", "started");
/// log!(logger, LogLevel::Error, "http", "status {}", 500);
/// log!(logger, LogLevel::Warn, "queue", data = serde_json::json!({"depth": 900}), "backlog");
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $title:expr, data = $data:expr, $($arg:tt)+) => {
        $logger.log(
            $level,
            $title,
            format!($($arg)+),
            Some($crate::Payload::from($data)),
        )
    };
    ($logger:expr, $level:expr, $title:expr, $($arg:tt)+) => {
        $logger.log($level, $title, format!($($arg)+), None)
    };
}

/// Log a trace-level message.
#[macro_export]
macro_rules! trace {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Trace, $($arg)+)
    };
}

/// Log a debug-level message.
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Debug, $($arg)+)
    };
}

/// Log a info-level message.
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Info, $($arg)+)
    };
}

/// Log a warning message.
#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Warn, $($arg)+)
    };
}

/// Log a error message.
#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Error, $($arg)+)
    };
}

/// Log a fatal message.
#[macro_export]
macro_rules! fatal {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Fatal, $($arg)+)
    };
}

#[cfg(test)]
mod tests {
    use crate::core::{Appender, LogRecord, LoggerConfig, Result};
    use crate::{LogLevel, Logger, Payload};
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<LogRecord>>>);

    impl Appender for Capture {
        fn append(&mut self, record: &LogRecord, _config: &LoggerConfig) -> Result<()> {
            self.0.lock().push(record.clone());
            Ok(())
        }

        fn flush(&mut self) -> Result<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "capture"
        }
    }

    fn capture_logger() -> (Logger, Capture) {
        let capture = Capture::default();
        let logger = Logger::builder()
            .config(LoggerConfig {
                log_stdout: true,
                ..LoggerConfig::disabled()
            })
            .console_appender(capture.clone())
            .build()
            .unwrap();
        (logger, capture)
    }

    #[test]
    fn test_level_macros() {
        let (mut logger, capture) = capture_logger();

        trace!(logger, "t", "trace {}", 1);
        debug!(logger, "d", "debug {}", 2);
        info!(logger, "i", "info {}", 3);
        warn!(logger, "w", "warn {}", 4);
        error!(logger, "e", "error {}", 5);
        fatal!(logger, "f", "fatal {}", 6);
        logger.shutdown();

        let records = capture.0.lock();
        assert_eq!(records.len(), 6);
        assert_eq!(records[0].level, LogLevel::Trace);
        assert_eq!(records[2].message, "info 3");
        assert_eq!(records[5].level, LogLevel::Fatal);
        assert!(records.iter().all(|r| r.payload.is_none()));
    }

    #[test]
    fn test_data_argument() {
        let (mut logger, capture) = capture_logger();

        let attempts = 3;
        error!(
            logger,
            "db",
            data = Payload::new().with_field("retries", attempts),
            "timeout after {} attempts",
            attempts
        );
        logger.shutdown();

        let records = capture.0.lock();
        assert_eq!(records[0].title, "db");
        assert_eq!(records[0].message, "timeout after 3 attempts");
        assert_eq!(
            records[0].payload.as_ref().map(|p| p.to_json_string()),
            Some(r#"{"retries":3}"#.to_string())
        );
    }
}
