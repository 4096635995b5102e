//! Size-based rotating file writer
//!
//! The file sink writes through this collaborator. When the next line would
//! push the active file past its limit, the file becomes `<name>.1`, older
//! backups shift up by one and the oldest beyond `max_backups` is removed.

use crate::core::config::LoggerConfig;
use crate::core::error::{LoggerError, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Chunk size used when streaming a rotated file through gzip
const COMPRESS_CHUNK: usize = 64 * 1024;

/// When and how a log file is rotated
///
/// # Examples
///
/// ```
/// use logrelay::appenders::RotationPolicy;
///
/// let policy = RotationPolicy::new()
///     .with_max_size_mb(64)
///     .with_max_backups(7)
///     .with_compression(true);
///
/// assert_eq!(policy.max_bytes, 64 * 1024 * 1024);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Size limit of the active file in bytes
    pub max_bytes: u64,
    /// Rotated files to keep; 0 keeps every backup
    pub max_backups: usize,
    /// Gzip rotated files to `<name>.<n>.gz`
    pub compress: bool,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_bytes: crate::core::config::DEFAULT_FILE_MAX_SIZE_MB * BYTES_PER_MB,
            max_backups: crate::core::config::DEFAULT_FILE_MAX_BACKUPS,
            compress: false,
        }
    }
}

impl RotationPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rotation settings carried by a config snapshot
    #[must_use]
    pub fn from_config(config: &LoggerConfig) -> Self {
        Self {
            max_bytes: config.file_max_bytes(),
            max_backups: config.file_max_backups,
            compress: config.file_compress,
        }
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_size_mb(mut self, megabytes: u64) -> Self {
        self.max_bytes = megabytes.saturating_mul(BYTES_PER_MB);
        self
    }

    /// Set the limit in bytes; mostly useful in tests
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_bytes(mut self, bytes: u64) -> Self {
        self.max_bytes = bytes;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_backups(mut self, count: usize) -> Self {
        self.max_backups = count;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }
}

/// Append-only writer over one log file with size-based rotation
///
/// ```no_run
/// use logrelay::appenders::{RotatingFileWriter, RotationPolicy};
///
/// let mut writer = RotatingFileWriter::open("/var/log/app.log", RotationPolicy::new()).unwrap();
/// writer.write_line("2024/01/01 00:00:00 [info] boot - started").unwrap();
/// writer.flush().unwrap();
/// ```
pub struct RotatingFileWriter {
    base_path: PathBuf,
    policy: RotationPolicy,
    writer: Option<BufWriter<File>>,
    current_size: u64,
}

impl RotatingFileWriter {
    /// Open (or create) `path` for appending, creating parent directories
    ///
    /// # Errors
    ///
    /// Returns error if the directory or the file cannot be created
    pub fn open<P: AsRef<Path>>(path: P, policy: RotationPolicy) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();

        if let Some(parent) = base_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                LoggerError::io_operation(
                    "create log directory",
                    format!("Failed to create directory '{}'", parent.display()),
                    e,
                )
            })?;
        }

        let (file, current_size) = Self::open_active(&base_path)?;

        Ok(Self {
            base_path,
            policy,
            writer: Some(BufWriter::new(file)),
            current_size,
        })
    }

    fn open_active(path: &Path) -> Result<(File, u64)> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                LoggerError::file_appender(
                    path.display().to_string(),
                    format!("Failed to open: {}", e),
                )
            })?;

        let size = file.metadata().map(|m| m.len()).map_err(|e| {
            LoggerError::file_appender(
                path.display().to_string(),
                format!("Cannot access file metadata: {}", e),
            )
        })?;

        Ok((file, size))
    }

    /// Write one line, rotating first if it would not fit
    ///
    /// # Errors
    ///
    /// Returns error if the line cannot be written. A failed rotation is
    /// reported on stderr and the line goes to the current file instead.
    pub fn write_line(&mut self, line: &str) -> Result<()> {
        let bytes_needed = line.len() as u64 + 1;

        if self.should_rotate(bytes_needed) {
            if let Err(e) = self.rotate() {
                eprintln!(
                    "[LOGGER WARNING] Log rotation failed: {}. Continuing with current file.",
                    e
                );
                if self.writer.is_none() {
                    let (file, size) = Self::open_active(&self.base_path)?;
                    self.writer = Some(BufWriter::new(file));
                    self.current_size = size;
                }
                // Let the file outgrow its limit rather than retry on every line
                self.current_size = 0;
            }
        }

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| LoggerError::writer("Writer not initialized"))?;
        writer
            .write_all(line.as_bytes())
            .and_then(|()| writer.write_all(b"\n"))
            .map_err(|e| {
                LoggerError::file_appender(
                    self.base_path.display().to_string(),
                    format!("Failed to write log line: {}", e),
                )
            })?;
        self.current_size += bytes_needed;
        Ok(())
    }

    fn should_rotate(&self, bytes_needed: u64) -> bool {
        self.current_size > 0 && self.current_size + bytes_needed > self.policy.max_bytes
    }

    fn rotate(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|e| {
                LoggerError::file_rotation(
                    self.base_path.display().to_string(),
                    format!("Failed to flush before rotation: {}", e),
                )
            })?;
        }

        let highest = if self.policy.max_backups == 0 {
            self.highest_backup_index()
        } else {
            // Drop the backup that would be pushed past the limit
            self.remove_backup(self.policy.max_backups);
            self.policy.max_backups - 1
        };

        for i in (1..=highest).rev() {
            self.shift_backup(i)?;
        }

        let first = self.backup_path(1);
        if self.base_path.exists() {
            fs::rename(&self.base_path, &first).map_err(|e| {
                LoggerError::file_rotation(
                    self.base_path.display().to_string(),
                    format!("Failed to rotate current log file: {}", e),
                )
            })?;

            if self.policy.compress {
                self.compress_file(&first)?;
            }
        }

        let (file, size) = Self::open_active(&self.base_path)?;
        self.writer = Some(BufWriter::new(file));
        self.current_size = size;
        Ok(())
    }

    /// Move backup `index` (plain or gzipped) to `index + 1`
    fn shift_backup(&self, index: usize) -> Result<()> {
        for (from, to) in [
            (self.backup_path(index), self.backup_path(index + 1)),
            (
                gz_path(&self.backup_path(index)),
                gz_path(&self.backup_path(index + 1)),
            ),
        ] {
            if !from.exists() {
                continue;
            }
            if fs::rename(&from, &to).is_err() {
                // Some platforms refuse to rename over an existing file
                let _ = fs::remove_file(&to);
                fs::rename(&from, &to).map_err(|e| {
                    LoggerError::file_rotation(
                        from.display().to_string(),
                        format!("Failed to rotate backup files: {}", e),
                    )
                })?;
            }
        }
        Ok(())
    }

    fn remove_backup(&self, index: usize) {
        let plain = self.backup_path(index);
        for path in [gz_path(&plain), plain] {
            if path.exists() {
                if let Err(e) = fs::remove_file(&path) {
                    eprintln!(
                        "[LOGGER WARNING] Failed to remove old backup {}: {}",
                        path.display(),
                        e
                    );
                }
            }
        }
    }

    fn highest_backup_index(&self) -> usize {
        let mut index = 0;
        while self.backup_path(index + 1).exists() || gz_path(&self.backup_path(index + 1)).exists()
        {
            index += 1;
        }
        index
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        let filename = self
            .base_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("golog.log");
        self.base_path
            .with_file_name(format!("{}.{}", filename, index))
    }

    /// Gzip `path` to `<path>.gz`, removing the original only on success
    fn compress_file(&self, path: &Path) -> Result<()> {
        let target = gz_path(path);
        let temp = target.with_file_name(format!(
            "{}.tmp",
            target.file_name().and_then(|n| n.to_str()).unwrap_or("backup.gz")
        ));

        let result = (|| -> std::io::Result<()> {
            let mut reader = BufReader::with_capacity(COMPRESS_CHUNK, File::open(path)?);
            let output = BufWriter::with_capacity(COMPRESS_CHUNK, File::create(&temp)?);
            let mut encoder = flate2::write::GzEncoder::new(output, flate2::Compression::default());

            let mut buffer = vec![0u8; COMPRESS_CHUNK];
            loop {
                let read = reader.read(&mut buffer)?;
                if read == 0 {
                    break;
                }
                encoder.write_all(&buffer[..read])?;
            }
            encoder.finish()?.flush()?;
            fs::rename(&temp, &target)
        })();

        if let Err(e) = result {
            let _ = fs::remove_file(&temp);
            return Err(LoggerError::io_operation(
                "compress log file",
                format!("Failed to compress {}", path.display()),
                e,
            ));
        }

        if let Err(e) = fs::remove_file(path) {
            eprintln!(
                "[LOGGER WARNING] Compressed {} but could not remove the original: {}",
                path.display(),
                e
            );
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns error if buffered bytes cannot reach the file
    pub fn flush(&mut self) -> Result<()> {
        if let Some(ref mut writer) = self.writer {
            writer.flush().map_err(|e| {
                LoggerError::file_appender(
                    self.base_path.display().to_string(),
                    format!("Failed to flush: {}", e),
                )
            })?;
        }
        Ok(())
    }

    #[must_use]
    pub fn current_size(&self) -> u64 {
        self.current_size
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.base_path
    }

    #[must_use]
    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }
}

impl Drop for RotatingFileWriter {
    fn drop(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.flush();
        }
    }
}

fn gz_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".gz");
    PathBuf::from(name)
}
