//! Log record structure

use super::environment::Environment;
use super::log_level::LogLevel;
use super::payload::Payload;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp layout shared by the console and file sinks
pub const LINE_TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// One log event. Built by the logger, consumed once by the dispatch loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub level: LogLevel,
    pub title: String,
    pub message: String,
    pub environment: Environment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
    pub timestamp: DateTime<Utc>,
}

impl LogRecord {
    /// Sanitize text to prevent log injection attacks
    ///
    /// Replaces newlines, carriage returns, and tabs with escape sequences
    /// so a record always occupies exactly one line in the text sinks.
    pub(crate) fn sanitize(text: &str) -> String {
        text.replace('\n', "\\n")
            .replace('\r', "\\r")
            .replace('\t', "\\t")
    }

    pub fn new(
        level: LogLevel,
        title: impl AsRef<str>,
        message: impl AsRef<str>,
        environment: Environment,
    ) -> Self {
        Self {
            level,
            title: title.as_ref().to_string(),
            message: message.as_ref().to_string(),
            environment,
            payload: None,
            timestamp: Utc::now(),
        }
    }

    /// Attach a payload. Empty payloads are kept: presence is what matters on the wire.
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// `[<level>] <title> - <message>[, data: <payload>]`
    ///
    /// Title and message are escaped here; the record itself keeps the raw text.
    pub fn format_body(&self) -> String {
        let mut body = format!(
            "[{}] {} - {}",
            self.level,
            Self::sanitize(&self.title),
            Self::sanitize(&self.message)
        );
        if let Some(ref payload) = self.payload {
            body.push_str(", data: ");
            body.push_str(&payload.to_json_string());
        }
        body
    }

    /// Full text line without the trailing newline
    pub fn format_line(&self) -> String {
        format!("{} {}", self.local_timestamp(), self.format_body())
    }

    pub fn local_timestamp(&self) -> String {
        self.timestamp
            .with_timezone(&Local)
            .format(LINE_TIMESTAMP_FORMAT)
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_body_without_payload() {
        let record = LogRecord::new(LogLevel::Info, "boot", "started", Environment::Local);
        assert_eq!(record.format_body(), "[info] boot - started");
    }

    #[test]
    fn test_format_body_with_payload() {
        let record = LogRecord::new(LogLevel::Warn, "db", "slow query", Environment::Production)
            .with_payload(Payload::new().with_field("ms", 1200));
        assert_eq!(record.format_body(), r#"[warn] db - slow query, data: {"ms":1200}"#);
    }

    #[test]
    fn test_text_rendering_escapes_control_characters() {
        let record = LogRecord::new(
            LogLevel::Error,
            "auth\nforged",
            "line one\nERROR fake\r\tend",
            Environment::Local,
        );
        assert_eq!(record.title, "auth\nforged");
        assert_eq!(record.message, "line one\nERROR fake\r\tend");
        assert_eq!(
            record.format_body(),
            "[error] auth\\nforged - line one\\nERROR fake\\r\\tend"
        );
        assert_eq!(record.format_line().lines().count(), 1);
    }

    #[test]
    fn test_format_line_starts_with_timestamp() {
        let record = LogRecord::new(LogLevel::Debug, "t", "m", Environment::Local);
        let line = record.format_line();
        let stamp = record.local_timestamp();
        assert!(line.starts_with(&stamp));
        assert_eq!(stamp.len(), "2006/01/02 15:04:05".len());
    }
}
