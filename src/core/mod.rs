//! Core logger types and traits

pub mod appender;
pub mod auth;
pub mod cancellation;
pub mod config;
pub mod dispatcher;
pub mod environment;
pub mod error;
pub mod log_level;
pub mod log_record;
pub mod logger;
pub mod metrics;
pub mod overflow_policy;
pub mod payload;
pub(crate) mod sink_worker;

pub use appender::{Appender, BatchTransport};
pub use auth::{generate_hash, generate_hash_at};
pub use cancellation::CancellationToken;
pub use config::LoggerConfig;
pub use dispatcher::DispatchState;
pub use environment::Environment;
pub use error::{LoggerError, Result};
pub use log_level::LogLevel;
pub use log_record::LogRecord;
pub use logger::{
    Logger, LoggerBuilder, DEFAULT_CHANNEL_CAPACITY, DEFAULT_SHUTDOWN_GRACE,
    DEFAULT_SINK_QUEUE_CAPACITY,
};
pub use metrics::LoggerMetrics;
pub use overflow_policy::{OverflowCallback, OverflowPolicy};
pub use payload::{FieldValue, Payload};
