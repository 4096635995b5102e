//! Dispatch loop
//!
//! One thread owns the batch buffer and the flush ticker. It routes each
//! record to the enabled sinks, appends server-bound records to the batch,
//! and hands the batch to the remote worker on every tick and once more
//! while draining.

use super::{
    appender::{Appender, BatchTransport},
    cancellation::CancellationToken,
    config::LoggerConfig,
    log_record::LogRecord,
    metrics::LoggerMetrics,
    sink_worker::{QueueItem, SinkWorker},
};
use crossbeam_channel::{select, tick, Receiver, Sender};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Grace period used when the ingress channel closes without an explicit drain
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(1);

/// Extra time allowed for the console and file workers to finish on close
const WORKER_CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Shared, atomically replaceable configuration snapshot
pub(crate) type ConfigCell = Arc<RwLock<Arc<LoggerConfig>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Running = 0,
    Draining = 1,
    Stopped = 2,
}

impl DispatchState {
    pub(crate) fn load(cell: &AtomicU8) -> Self {
        match cell.load(Ordering::SeqCst) {
            0 => DispatchState::Running,
            1 => DispatchState::Draining,
            _ => DispatchState::Stopped,
        }
    }

    fn store(self, cell: &AtomicU8) {
        cell.store(self as u8, Ordering::SeqCst);
    }
}

/// Requests sent to the loop from the logger handle
pub(crate) enum Control {
    /// Drain, flush the batch one last time and stop. `done` fires once stopped.
    Drain { grace: Duration, done: Sender<()> },
}

pub(crate) struct RecordJob {
    pub(crate) record: LogRecord,
    pub(crate) config: Arc<LoggerConfig>,
}

pub(crate) struct BatchJob {
    pub(crate) records: Vec<LogRecord>,
    pub(crate) config: Arc<LoggerConfig>,
}

impl QueueItem for RecordJob {}

impl QueueItem for BatchJob {
    fn record_count(&self) -> u64 {
        self.records.len() as u64
    }
}

pub(crate) struct SinkWorkers {
    pub(crate) console: SinkWorker<RecordJob>,
    pub(crate) file: SinkWorker<RecordJob>,
    pub(crate) remote: SinkWorker<BatchJob>,
}

/// Queue settings shared by the three sink workers
pub(crate) struct WorkerSettings {
    pub(crate) capacity: usize,
    pub(crate) policy: super::overflow_policy::OverflowPolicy,
    pub(crate) on_overflow: Option<super::overflow_policy::OverflowCallback>,
}

impl SinkWorkers {
    pub(crate) fn spawn(
        mut console: Box<dyn Appender>,
        mut file: Box<dyn Appender>,
        mut transport: Box<dyn BatchTransport>,
        settings: &WorkerSettings,
        metrics: &Arc<LoggerMetrics>,
    ) -> super::error::Result<Self> {
        let console_metrics = Arc::clone(metrics);
        let console = SinkWorker::spawn(
            "console",
            settings.capacity,
            settings.policy.clone(),
            settings.on_overflow.clone(),
            Arc::clone(metrics),
            move |job: RecordJob| write_record(console.as_mut(), &job, &console_metrics),
        )?;

        let file_metrics = Arc::clone(metrics);
        let file = SinkWorker::spawn(
            "file",
            settings.capacity,
            settings.policy.clone(),
            settings.on_overflow.clone(),
            Arc::clone(metrics),
            move |job: RecordJob| write_record(file.as_mut(), &job, &file_metrics),
        )?;

        let remote_metrics = Arc::clone(metrics);
        let remote = SinkWorker::spawn(
            "remote",
            settings.capacity,
            settings.policy.clone(),
            settings.on_overflow.clone(),
            Arc::clone(metrics),
            move |job: BatchJob| send_batch(transport.as_mut(), &job, &remote_metrics),
        )?;

        Ok(Self {
            console,
            file,
            remote,
        })
    }
}

fn write_record(appender: &mut dyn Appender, job: &RecordJob, metrics: &LoggerMetrics) {
    let result = appender
        .append(&job.record, &job.config)
        .and_then(|()| appender.flush());
    if let Err(e) = result {
        eprintln!("[LOGGER ERROR] {} sink failed: {}", appender.name(), e);
        metrics.record_sink_failure();
    }
}

fn send_batch(transport: &mut dyn BatchTransport, job: &BatchJob, metrics: &LoggerMetrics) {
    match transport.send_batch(&job.records, &job.config) {
        Ok(()) => metrics.record_flush(job.records.len()),
        Err(e) => {
            eprintln!(
                "[LOGGER ERROR] {} failed to deliver {} records: {}",
                transport.name(),
                job.records.len(),
                e
            );
            metrics.record_flush_failure();
        }
    }
}

pub(crate) struct Dispatcher {
    ingress: Receiver<LogRecord>,
    control: Receiver<Control>,
    cancellation: CancellationToken,
    config: ConfigCell,
    workers: SinkWorkers,
    /// Server-bound records since the last flush
    batch: Vec<LogRecord>,
    state: Arc<AtomicU8>,
}

impl Dispatcher {
    pub(crate) fn new(
        ingress: Receiver<LogRecord>,
        control: Receiver<Control>,
        cancellation: CancellationToken,
        config: ConfigCell,
        workers: SinkWorkers,
        state: Arc<AtomicU8>,
    ) -> Self {
        Self {
            ingress,
            control,
            cancellation,
            config,
            workers,
            batch: Vec::new(),
            state,
        }
    }

    fn snapshot(&self) -> Arc<LoggerConfig> {
        Arc::clone(&self.config.read())
    }

    pub(crate) fn run(mut self) {
        DispatchState::Running.store(&self.state);

        let ingress = self.ingress.clone();
        let control = self.control.clone();
        let cancelled = self.cancellation.signal().clone();

        let mut interval = self.snapshot().flush_interval();
        let mut ticker = tick(interval);

        loop {
            select! {
                recv(cancelled) -> _ => {
                    self.stop_on_cancel();
                    return;
                }
                recv(control) -> request => {
                    self.drain(request.ok());
                    return;
                }
                recv(ticker) -> _ => self.flush(),
                recv(ingress) -> record => match record {
                    Ok(record) => self.dispatch(record),
                    Err(_) => {
                        // Every sender is gone; honour a drain request racing with it
                        let request = control.try_recv().ok();
                        self.drain(request);
                        return;
                    }
                },
            }

            let wanted = self.snapshot().flush_interval();
            if wanted != interval {
                interval = wanted;
                ticker = tick(interval);
            }
        }
    }

    /// Fan one record out to the sinks enabled in the current snapshot
    fn dispatch(&mut self, record: LogRecord) {
        let config = self.snapshot();

        if config.log_stdout {
            self.workers.console.submit(RecordJob {
                record: record.clone(),
                config: Arc::clone(&config),
            });
        }

        if config.log_file {
            self.workers.file.submit(RecordJob {
                record: record.clone(),
                config: Arc::clone(&config),
            });
        }

        if config.log_server {
            self.batch.push(record);
        }
    }

    /// Hand the current batch to the remote worker without waiting for delivery
    fn flush(&mut self) {
        if self.batch.is_empty() {
            return;
        }
        let job = BatchJob {
            records: std::mem::take(&mut self.batch),
            config: self.snapshot(),
        };
        self.workers.remote.submit(job);
    }

    fn drain(&mut self, request: Option<Control>) {
        DispatchState::Draining.store(&self.state);

        let (grace, done) = match request {
            Some(Control::Drain { grace, done }) => (grace, Some(done)),
            None => (DEFAULT_GRACE_PERIOD, None),
        };

        // Records accepted before the drain request still get routed
        while let Ok(record) = self.ingress.try_recv() {
            self.dispatch(record);
        }

        // In-flight writes and earlier flushes land first
        let deadline = Instant::now() + grace;
        self.workers.console.wait_idle(deadline);
        self.workers.file.wait_idle(deadline);
        self.workers.remote.wait_idle(deadline);

        let config = self.snapshot();
        let request_timeout = config.request_timeout();
        if !self.batch.is_empty() {
            let job = BatchJob {
                records: std::mem::take(&mut self.batch),
                config,
            };
            self.workers.remote.submit_blocking(job, request_timeout);
        }

        self.workers.console.close(WORKER_CLOSE_TIMEOUT);
        self.workers.file.close(WORKER_CLOSE_TIMEOUT);
        // Closing the remote worker waits for the final POST to complete
        self.workers
            .remote
            .close(request_timeout + WORKER_CLOSE_TIMEOUT);

        DispatchState::Stopped.store(&self.state);
        if let Some(done) = done {
            let _ = done.send(());
        }
    }

    fn stop_on_cancel(&mut self) {
        if !self.batch.is_empty() {
            eprintln!(
                "[LOGGER WARNING] Dispatcher cancelled with {} unsent records in the server batch.",
                self.batch.len()
            );
            self.batch.clear();
        }
        DispatchState::Stopped.store(&self.state);
    }
}
