//! File appender implementation

use super::rotating_file::{RotatingFileWriter, RotationPolicy};
use crate::core::{Appender, LogRecord, LoggerConfig, Result};
use std::path::Path;

/// Writes one line per record to `LoggerConfig::file_location`
///
/// The rotating writer is opened on the first record and re-opened whenever a
/// newer config snapshot names a different path or rotation policy.
#[derive(Default)]
pub struct FileAppender {
    writer: Option<RotatingFileWriter>,
}

impl FileAppender {
    pub fn new() -> Self {
        Self::default()
    }

    fn writer_for(&mut self, config: &LoggerConfig) -> Result<&mut RotatingFileWriter> {
        let policy = RotationPolicy::from_config(config);
        let stale = match self.writer {
            Some(ref writer) => !matches_config(writer, &config.file_location, &policy),
            None => true,
        };

        if stale {
            if let Some(mut previous) = self.writer.take() {
                previous.flush()?;
            }
            self.writer = Some(RotatingFileWriter::open(&config.file_location, policy)?);
        }

        match self.writer {
            Some(ref mut writer) => Ok(writer),
            None => Err(crate::core::LoggerError::writer("Writer not initialized")),
        }
    }

    /// Path of the currently open file, if any
    pub fn current_path(&self) -> Option<&Path> {
        self.writer.as_ref().map(RotatingFileWriter::path)
    }
}

fn matches_config(writer: &RotatingFileWriter, path: &Path, policy: &RotationPolicy) -> bool {
    writer.path() == path && writer.policy() == policy
}

impl Appender for FileAppender {
    fn append(&mut self, record: &LogRecord, config: &LoggerConfig) -> Result<()> {
        let line = record.format_line();
        self.writer_for(config)?.write_line(&line)
    }

    fn flush(&mut self) -> Result<()> {
        match self.writer {
            Some(ref mut writer) => writer.flush(),
            None => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Environment, LogLevel, Payload};
    use std::fs;
    use tempfile::tempdir;

    fn file_config(path: &Path) -> LoggerConfig {
        LoggerConfig {
            log_file: true,
            file_location: path.to_path_buf(),
            ..LoggerConfig::default()
        }
    }

    #[test]
    fn test_file_appender_writes_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        let config = file_config(&path);
        let mut appender = FileAppender::new();

        let record = LogRecord::new(LogLevel::Info, "boot", "started", Environment::Local);
        appender.append(&record, &config).unwrap();
        let record = LogRecord::new(LogLevel::Error, "db", "timeout", Environment::Local)
            .with_payload(Payload::new().with_field("retries", 3));
        appender.append(&record, &config).unwrap();
        appender.flush().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("[info] boot - started"));
        assert!(lines[1].ends_with(r#"[error] db - timeout, data: {"retries":3}"#));
    }

    #[test]
    fn test_nothing_opened_before_first_record() {
        let appender = FileAppender::new();
        assert!(appender.current_path().is_none());
    }

    #[test]
    fn test_new_location_reopens_writer() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("first.log");
        let second = dir.path().join("second.log");
        let mut appender = FileAppender::new();

        let record = LogRecord::new(LogLevel::Info, "a", "one", Environment::Local);
        appender.append(&record, &file_config(&first)).unwrap();
        let record = LogRecord::new(LogLevel::Info, "b", "two", Environment::Local);
        appender.append(&record, &file_config(&second)).unwrap();
        appender.flush().unwrap();

        assert_eq!(appender.current_path(), Some(second.as_path()));
        assert!(fs::read_to_string(&first).unwrap().contains("a - one"));
        assert!(fs::read_to_string(&second).unwrap().contains("b - two"));
    }
}
