//! # logrelay
//!
//! An embedded, asynchronous log dispatcher with three sinks: standard
//! output, a size-rotated local file and a remote log server over HTTP.
//!
//! ## Features
//!
//! - **Non-blocking**: logging calls hand records to a bounded channel and return
//! - **Batched delivery**: server-bound records are posted in batches on a timer
//!   and once more on shutdown
//! - **Bounded fan-out**: each sink has one worker and an explicit overflow policy
//! - **Live reconfiguration**: config snapshots are swapped atomically
//!
//! ## Example
//!
//! ```
//! use logrelay::prelude::*;
//!
//! let config = LoggerConfig::from_json_str(r#"{"log_file": false}"#).unwrap();
//! let mut logger = Logger::new(config).unwrap();
//!
//! logger.info("boot", "started");
//! logger.error_with("db", "timeout", Payload::new().with_field("retries", 3));
//!
//! logger.shutdown();
//! ```

pub mod appenders;
pub mod core;
pub mod macros;

pub mod prelude {
    pub use crate::appenders::{ConsoleAppender, FileAppender, RemoteAppender};
    pub use crate::core::{
        Appender, BatchTransport, CancellationToken, DispatchState, Environment, FieldValue,
        LogLevel, LogRecord, Logger, LoggerBuilder, LoggerConfig, LoggerError, LoggerMetrics,
        OverflowCallback, OverflowPolicy, Payload, Result,
    };
}

pub use appenders::{ConsoleAppender, FileAppender, RemoteAppender};
pub use core::{
    generate_hash, generate_hash_at, Appender, BatchTransport, CancellationToken, DispatchState,
    Environment, FieldValue, LogLevel, LogRecord, Logger, LoggerBuilder, LoggerConfig,
    LoggerError, LoggerMetrics, OverflowCallback, OverflowPolicy, Payload, Result,
    DEFAULT_CHANNEL_CAPACITY, DEFAULT_SHUTDOWN_GRACE, DEFAULT_SINK_QUEUE_CAPACITY,
};
