//! Console appender implementation

use crate::core::{Appender, LogRecord, LoggerConfig, Result};
#[cfg(feature = "console")]
use colored::Colorize;
use std::io::Write;

/// Writes `<timestamp> [<level>] <title> - <message>[, data: <payload>]`
/// lines to standard output, or to any injected writer.
pub struct ConsoleAppender {
    writer: Box<dyn Write + Send>,
    use_colors: bool,
}

impl ConsoleAppender {
    pub fn new() -> Self {
        Self::with_writer(std::io::stdout())
    }

    /// Write lines to `writer` instead of standard output
    ///
    /// # Example
    ///
    /// ```
    /// use logrelay::appenders::ConsoleAppender;
    ///
    /// let appender = ConsoleAppender::with_writer(std::io::sink());
    /// ```
    pub fn with_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            writer: Box::new(writer),
            use_colors: false,
        }
    }

    /// Force level colouring regardless of `LoggerConfig::stdout_colors`
    #[must_use]
    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    fn format_text(&self, record: &LogRecord, colors: bool) -> String {
        if !colors {
            return record.format_line();
        }

        #[cfg(feature = "console")]
        {
            let level = record
                .level
                .to_str()
                .color(record.level.color_code())
                .to_string();
            let mut line = format!(
                "{} [{}] {} - {}",
                record.local_timestamp(),
                level,
                LogRecord::sanitize(&record.title),
                LogRecord::sanitize(&record.message)
            );
            if let Some(ref payload) = record.payload {
                line.push_str(", data: ");
                line.push_str(&payload.to_json_string());
            }
            line
        }

        #[cfg(not(feature = "console"))]
        {
            record.format_line()
        }
    }
}

impl Default for ConsoleAppender {
    fn default() -> Self {
        Self::new()
    }
}

impl Appender for ConsoleAppender {
    fn append(&mut self, record: &LogRecord, config: &LoggerConfig) -> Result<()> {
        let output = self.format_text(record, self.use_colors || config.stdout_colors);
        writeln!(self.writer, "{}", output)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}
