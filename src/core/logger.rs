//! Logger handle
//!
//! `Logger` owns the ingress side of the dispatch loop. Logging calls build a
//! record and hand it over with `try_send`; they never block and never fail.

use super::{
    appender::{Appender, BatchTransport},
    cancellation::CancellationToken,
    config::LoggerConfig,
    dispatcher::{
        ConfigCell, Control, DispatchState, Dispatcher, SinkWorkers, WorkerSettings,
        DEFAULT_GRACE_PERIOD,
    },
    error::{LoggerError, Result},
    log_level::LogLevel,
    log_record::LogRecord,
    metrics::LoggerMetrics,
    overflow_policy::{should_alert, OverflowCallback, OverflowPolicy},
    payload::Payload,
};
use crate::appenders::{ConsoleAppender, FileAppender, RemoteAppender};
use crossbeam_channel::{bounded, RecvTimeoutError, Sender, TrySendError};
use parking_lot::RwLock;
use std::sync::atomic::AtomicU8;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Records buffered between callers and the dispatch loop
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Jobs buffered in front of each sink
pub const DEFAULT_SINK_QUEUE_CAPACITY: usize = 256;

/// Time given to in-flight sink writes before the final flush
pub const DEFAULT_SHUTDOWN_GRACE: Duration = DEFAULT_GRACE_PERIOD;

/// Slack on top of the drain budget before giving up on the dispatch thread
const SHUTDOWN_MARGIN: Duration = Duration::from_secs(4);

pub struct Logger {
    config: ConfigCell,
    sender: Option<Sender<LogRecord>>,
    control: Sender<Control>,
    dispatch_handle: Option<thread::JoinHandle<()>>,
    state: Arc<AtomicU8>,
    /// Metrics for observability (dropped count, flushes, sink failures)
    metrics: Arc<LoggerMetrics>,
    on_overflow: Option<OverflowCallback>,
    shutdown_grace: Duration,
}

impl Logger {
    /// Start a logger with the default sinks
    ///
    /// # Errors
    ///
    /// Returns error if the config is invalid or a thread cannot be spawned
    ///
    /// # Example
    ///
    /// ```
    /// use logrelay::{Logger, LoggerConfig};
    ///
    /// let mut logger = Logger::new(LoggerConfig::disabled()).unwrap();
    /// logger.info("boot", "started");
    /// assert!(logger.shutdown());
    /// ```
    pub fn new(config: LoggerConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    /// Start a logger whose dispatch loop stops when `token` is cancelled
    ///
    /// Cancellation stops the loop without a final flush.
    pub fn with_cancellation(config: LoggerConfig, token: CancellationToken) -> Result<Self> {
        Self::builder().config(config).cancellation(token).build()
    }

    #[must_use]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }

    /// Queue a record for the enabled sinks
    ///
    /// The record carries the environment of the config active at call time.
    /// When the ingress channel is full the record is dropped and counted.
    pub fn log(
        &self,
        level: LogLevel,
        title: impl AsRef<str>,
        message: impl AsRef<str>,
        payload: Option<Payload>,
    ) {
        let Some(ref sender) = self.sender else {
            return;
        };

        let environment = self.config.read().environment;
        let mut record = LogRecord::new(level, title, message, environment);
        if let Some(payload) = payload {
            record = record.with_payload(payload);
        }

        match sender.try_send(record) {
            Ok(()) => {
                self.metrics.record_logged();
            }
            Err(TrySendError::Full(_)) => self.alert_and_drop(),
            // Dispatch loop already stopped
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    fn alert_and_drop(&self) {
        self.metrics.record_queue_full();
        let dropped_count = self.metrics.record_dropped();

        if should_alert(dropped_count) {
            eprintln!(
                "[LOGGER WARNING] Ingress queue full, {} records dropped. \
                 Consider a larger channel capacity.",
                dropped_count + 1
            );

            if let Some(ref callback) = self.on_overflow {
                callback(dropped_count + 1);
            }
        }
    }

    #[inline]
    pub fn trace(&self, title: impl AsRef<str>, message: impl AsRef<str>) {
        self.log(LogLevel::Trace, title, message, None);
    }

    #[inline]
    pub fn debug(&self, title: impl AsRef<str>, message: impl AsRef<str>) {
        self.log(LogLevel::Debug, title, message, None);
    }

    #[inline]
    pub fn info(&self, title: impl AsRef<str>, message: impl AsRef<str>) {
        self.log(LogLevel::Info, title, message, None);
    }

    #[inline]
    pub fn warn(&self, title: impl AsRef<str>, message: impl AsRef<str>) {
        self.log(LogLevel::Warn, title, message, None);
    }

    #[inline]
    pub fn error(&self, title: impl AsRef<str>, message: impl AsRef<str>) {
        self.log(LogLevel::Error, title, message, None);
    }

    #[inline]
    pub fn fatal(&self, title: impl AsRef<str>, message: impl AsRef<str>) {
        self.log(LogLevel::Fatal, title, message, None);
    }

    /// Log at `Panic` level. Only records; the caller keeps running.
    #[inline]
    pub fn panic(&self, title: impl AsRef<str>, message: impl AsRef<str>) {
        self.log(LogLevel::Panic, title, message, None);
    }

    pub fn trace_with(
        &self,
        title: impl AsRef<str>,
        message: impl AsRef<str>,
        payload: impl Into<Payload>,
    ) {
        self.log(LogLevel::Trace, title, message, Some(payload.into()));
    }

    pub fn debug_with(
        &self,
        title: impl AsRef<str>,
        message: impl AsRef<str>,
        payload: impl Into<Payload>,
    ) {
        self.log(LogLevel::Debug, title, message, Some(payload.into()));
    }

    /// Log at `Info` with structured data
    ///
    /// ```
    /// use logrelay::{Logger, LoggerConfig, Payload};
    ///
    /// let logger = Logger::new(LoggerConfig::disabled()).unwrap();
    /// logger.info_with("cache", "warmed", Payload::new().with_field("entries", 512));
    /// logger.info_with("cache", "stats", serde_json::json!({"hits": 10}));
    /// ```
    pub fn info_with(
        &self,
        title: impl AsRef<str>,
        message: impl AsRef<str>,
        payload: impl Into<Payload>,
    ) {
        self.log(LogLevel::Info, title, message, Some(payload.into()));
    }

    pub fn warn_with(
        &self,
        title: impl AsRef<str>,
        message: impl AsRef<str>,
        payload: impl Into<Payload>,
    ) {
        self.log(LogLevel::Warn, title, message, Some(payload.into()));
    }

    pub fn error_with(
        &self,
        title: impl AsRef<str>,
        message: impl AsRef<str>,
        payload: impl Into<Payload>,
    ) {
        self.log(LogLevel::Error, title, message, Some(payload.into()));
    }

    pub fn fatal_with(
        &self,
        title: impl AsRef<str>,
        message: impl AsRef<str>,
        payload: impl Into<Payload>,
    ) {
        self.log(LogLevel::Fatal, title, message, Some(payload.into()));
    }

    pub fn panic_with(
        &self,
        title: impl AsRef<str>,
        message: impl AsRef<str>,
        payload: impl Into<Payload>,
    ) {
        self.log(LogLevel::Panic, title, message, Some(payload.into()));
    }

    /// Replace the active configuration
    ///
    /// Records already routed keep the snapshot they were routed with. The
    /// file sink re-opens on its next write if the location or rotation
    /// settings changed.
    ///
    /// # Errors
    ///
    /// Returns error if the logger was shut down or cancelled, or if
    /// `config` fails validation; the previous config stays active either way
    pub fn set_config(&self, config: LoggerConfig) -> Result<()> {
        if self.dispatch_handle.is_none() || self.state() == DispatchState::Stopped {
            return Err(LoggerError::LoggerStopped);
        }
        config.validate()?;
        *self.config.write() = Arc::new(config);
        Ok(())
    }

    /// Snapshot of the active configuration
    pub fn config(&self) -> Arc<LoggerConfig> {
        Arc::clone(&self.config.read())
    }

    pub fn metrics(&self) -> &LoggerMetrics {
        &self.metrics
    }

    pub fn state(&self) -> DispatchState {
        DispatchState::load(&self.state)
    }

    pub fn is_running(&self) -> bool {
        self.dispatch_handle.is_some() && self.state() == DispatchState::Running
    }

    /// Drain, flush and stop using the configured grace period
    ///
    /// See [`Logger::shutdown_with_grace`].
    pub fn shutdown(&mut self) -> bool {
        self.shutdown_with_grace(self.shutdown_grace)
    }

    /// Drain queued records, flush the server batch once and stop
    ///
    /// Records already accepted are routed, in-flight sink writes get up to
    /// `grace` to finish, and the remaining batch is posted before this
    /// returns. Calling it again is a no-op.
    ///
    /// # Returns
    ///
    /// `true` if the dispatch loop stopped within its time budget
    ///
    /// # Example
    ///
    /// ```
    /// use logrelay::{Logger, LoggerConfig};
    /// use std::time::Duration;
    ///
    /// let mut logger = Logger::new(LoggerConfig::disabled()).unwrap();
    /// logger.warn("disk", "almost full");
    /// assert!(logger.shutdown_with_grace(Duration::from_millis(100)));
    /// assert!(!logger.is_running());
    /// ```
    pub fn shutdown_with_grace(&mut self, grace: Duration) -> bool {
        let Some(handle) = self.dispatch_handle.take() else {
            return true;
        };

        let request_timeout = self.config().request_timeout();
        let budget = grace + request_timeout * 2 + SHUTDOWN_MARGIN;
        let start = Instant::now();

        // The drain request goes first so the closed ingress is not mistaken for it
        let (done_tx, done_rx) = bounded(1);
        let requested = self
            .control
            .try_send(Control::Drain {
                grace,
                done: done_tx,
            })
            .is_ok();
        drop(self.sender.take());

        if requested {
            match done_rx.recv_timeout(budget) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
                Err(RecvTimeoutError::Timeout) => {
                    eprintln!(
                        "[LOGGER WARNING] Dispatch loop did not drain within {:?}. \
                         Some records may be lost.",
                        budget
                    );
                    return false;
                }
            }
        }

        loop {
            if handle.is_finished() {
                if let Err(e) = handle.join() {
                    eprintln!(
                        "[LOGGER ERROR] Dispatch thread panicked during shutdown: {}",
                        super::sink_worker::panic_message(e.as_ref())
                    );
                    return false;
                }
                return true;
            }

            if start.elapsed() >= budget {
                eprintln!(
                    "[LOGGER WARNING] Dispatch thread did not finish within {:?}. \
                     Some records may be lost.",
                    budget
                );
                return false;
            }

            thread::sleep(Duration::from_millis(10));
        }
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        if self.dispatch_handle.is_some() {
            self.shutdown();
        }

        let dropped = self.metrics.dropped_count();
        if dropped > 0 {
            eprintln!(
                "[LOGGER WARNING] Logger shutting down with {} dropped records (drop rate: {:.2}%)",
                dropped,
                self.metrics.drop_rate()
            );
        }
    }
}

/// Builder for constructing a [`Logger`] with a fluent API
///
/// # Example
/// ```
/// use logrelay::prelude::*;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let mut logger = Logger::builder()
///     .config(LoggerConfig::disabled())
///     .channel_capacity(4096)
///     .sink_queue_capacity(512)
///     .overflow_policy(OverflowPolicy::BlockWithTimeout(Duration::from_millis(20)))
///     .on_overflow(Arc::new(|count| {
///         eprintln!("ALERT: {} records dropped", count);
///     }))
///     .build()
///     .unwrap();
///
/// logger.info("boot", "started");
/// logger.shutdown();
/// ```
pub struct LoggerBuilder {
    config: LoggerConfig,
    channel_capacity: usize,
    sink_queue_capacity: usize,
    overflow_policy: OverflowPolicy,
    on_overflow: Option<OverflowCallback>,
    shutdown_grace: Duration,
    cancellation: Option<CancellationToken>,
    console: Option<Box<dyn Appender>>,
    file: Option<Box<dyn Appender>>,
    transport: Option<Box<dyn BatchTransport>>,
}

impl LoggerBuilder {
    pub fn new() -> Self {
        Self {
            config: LoggerConfig::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            sink_queue_capacity: DEFAULT_SINK_QUEUE_CAPACITY,
            overflow_policy: OverflowPolicy::default(),
            on_overflow: None,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            cancellation: None,
            console: None,
            file: None,
            transport: None,
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn config(mut self, config: LoggerConfig) -> Self {
        self.config = config;
        self
    }

    /// Capacity of the channel between callers and the dispatch loop
    #[must_use = "builder methods return a new value"]
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Capacity of each sink's work queue
    #[must_use = "builder methods return a new value"]
    pub fn sink_queue_capacity(mut self, capacity: usize) -> Self {
        self.sink_queue_capacity = capacity;
        self
    }

    /// What a sink queue does when it is full. Default is `AlertAndDrop`.
    #[must_use = "builder methods return a new value"]
    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    /// Called with the running drop count on the first drop and every 1000th after
    #[must_use = "builder methods return a new value"]
    pub fn on_overflow(mut self, callback: OverflowCallback) -> Self {
        self.on_overflow = Some(callback);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Replace the stdout writer
    #[must_use = "builder methods return a new value"]
    pub fn console_appender<A: Appender + 'static>(mut self, appender: A) -> Self {
        self.console = Some(Box::new(appender));
        self
    }

    /// Replace the rotating file writer
    #[must_use = "builder methods return a new value"]
    pub fn file_appender<A: Appender + 'static>(mut self, appender: A) -> Self {
        self.file = Some(Box::new(appender));
        self
    }

    /// Replace the HTTP transport used for server batches
    #[must_use = "builder methods return a new value"]
    pub fn transport<T: BatchTransport + 'static>(mut self, transport: T) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    /// Validate the config, start the sink workers and the dispatch thread
    ///
    /// # Errors
    ///
    /// Returns error if the config is invalid or a thread cannot be spawned
    pub fn build(self) -> Result<Logger> {
        self.config.validate()?;

        let metrics = Arc::new(LoggerMetrics::new());
        let settings = WorkerSettings {
            capacity: self.sink_queue_capacity,
            policy: self.overflow_policy,
            on_overflow: self.on_overflow.clone(),
        };
        let workers = SinkWorkers::spawn(
            self.console
                .unwrap_or_else(|| Box::new(ConsoleAppender::new())),
            self.file.unwrap_or_else(|| Box::new(FileAppender::new())),
            self.transport
                .unwrap_or_else(|| Box::new(RemoteAppender::new())),
            &settings,
            &metrics,
        )?;

        let config: ConfigCell = Arc::new(RwLock::new(Arc::new(self.config)));
        let state = Arc::new(AtomicU8::new(DispatchState::Running as u8));
        let (sender, ingress) = bounded(self.channel_capacity.max(1));
        let (control, control_rx) = bounded(1);

        let dispatcher = Dispatcher::new(
            ingress,
            control_rx,
            self.cancellation.unwrap_or_default(),
            Arc::clone(&config),
            workers,
            Arc::clone(&state),
        );
        let dispatch_handle = thread::Builder::new()
            .name("logrelay-dispatch".to_string())
            .spawn(move || dispatcher.run())
            .map_err(|e| LoggerError::io_operation("spawning dispatch thread", "dispatcher", e))?;

        Ok(Logger {
            config,
            sender: Some(sender),
            control,
            dispatch_handle: Some(dispatch_handle),
            state,
            metrics,
            on_overflow: self.on_overflow,
            shutdown_grace: self.shutdown_grace,
        })
    }
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
