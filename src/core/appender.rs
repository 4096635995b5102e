//! Sink traits for log output destinations

use super::{config::LoggerConfig, error::Result, log_record::LogRecord};

/// Per-record sink (console, file)
///
/// The config passed alongside each record is the snapshot the dispatch
/// loop used to route it.
pub trait Appender: Send {
    fn append(&mut self, record: &LogRecord, config: &LoggerConfig) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
    fn name(&self) -> &str;
}

/// Batch sink for the remote log server
pub trait BatchTransport: Send {
    fn send_batch(&mut self, records: &[LogRecord], config: &LoggerConfig) -> Result<()>;
    fn name(&self) -> &str;
}
