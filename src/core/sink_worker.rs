//! Bounded single-consumer queue in front of each sink
//!
//! Every sink gets one worker thread fed by a bounded crossbeam channel.
//! The dispatch loop submits work without waiting for it to complete; when
//! the queue is full the configured [`OverflowPolicy`] decides what is lost.

use super::{
    error::{LoggerError, Result},
    metrics::LoggerMetrics,
    overflow_policy::{should_alert_span, OverflowCallback, OverflowPolicy},
};
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender, TrySendError};
use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Poll interval used while waiting for a worker to go idle or finish
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Unit of work queued for a sink
pub(crate) trait QueueItem: Send + 'static {
    /// Log records lost if this item is dropped
    fn record_count(&self) -> u64 {
        1
    }
}

pub(crate) struct SinkWorker<T: QueueItem> {
    name: &'static str,
    sender: Option<Sender<T>>,
    /// Shared receiver end, used to evict the oldest item under `DropOldest`
    evictor: Receiver<T>,
    capacity: usize,
    policy: OverflowPolicy,
    on_overflow: Option<OverflowCallback>,
    metrics: Arc<LoggerMetrics>,
    /// Items queued or being handled
    pending: Arc<AtomicUsize>,
    handle: Option<thread::JoinHandle<()>>,
}

impl<T: QueueItem> SinkWorker<T> {
    pub(crate) fn spawn<F>(
        name: &'static str,
        capacity: usize,
        policy: OverflowPolicy,
        on_overflow: Option<OverflowCallback>,
        metrics: Arc<LoggerMetrics>,
        mut handler: F,
    ) -> Result<Self>
    where
        F: FnMut(T) + Send + 'static,
    {
        let capacity = capacity.max(1);
        let (sender, receiver) = bounded::<T>(capacity);
        let pending = Arc::new(AtomicUsize::new(0));

        let worker_receiver = receiver.clone();
        let worker_pending = Arc::clone(&pending);
        let handle = thread::Builder::new()
            .name(format!("logrelay-{}", name))
            .spawn(move || {
                for item in worker_receiver.iter() {
                    let outcome =
                        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| handler(item)));
                    if let Err(panic_info) = outcome {
                        eprintln!(
                            "[LOGGER CRITICAL] {} sink panicked: {}. Other sinks continue to function.",
                            name,
                            panic_message(panic_info.as_ref())
                        );
                    }
                    worker_pending.fetch_sub(1, Ordering::SeqCst);
                }
            })
            .map_err(|e| {
                LoggerError::io_operation("spawning sink worker", format!("{} sink", name), e)
            })?;

        Ok(Self {
            name,
            sender: Some(sender),
            evictor: receiver,
            capacity,
            policy,
            on_overflow,
            metrics,
            pending,
            handle: Some(handle),
        })
    }

    /// Queue an item without waiting for it to be handled.
    ///
    /// Returns `false` when the item was dropped.
    pub(crate) fn submit(&self, item: T) -> bool {
        let Some(ref sender) = self.sender else {
            return false;
        };

        self.pending.fetch_add(1, Ordering::SeqCst);
        let queued = match sender.try_send(item) {
            Ok(()) => true,
            Err(TrySendError::Full(item)) => self.handle_overflow(sender, item),
            Err(TrySendError::Disconnected(_)) => false,
        };
        if !queued {
            self.pending.fetch_sub(1, Ordering::SeqCst);
        }
        queued
    }

    /// Queue an item, waiting up to `timeout` for room regardless of policy
    pub(crate) fn submit_blocking(&self, item: T, timeout: Duration) -> bool {
        let Some(ref sender) = self.sender else {
            return false;
        };

        self.pending.fetch_add(1, Ordering::SeqCst);
        match sender.send_timeout(item, timeout) {
            Ok(()) => true,
            Err(e) => {
                self.pending.fetch_sub(1, Ordering::SeqCst);
                self.alert_and_drop(e.into_inner().record_count());
                false
            }
        }
    }

    fn handle_overflow(&self, sender: &Sender<T>, item: T) -> bool {
        self.metrics.record_queue_full();

        match &self.policy {
            OverflowPolicy::DropNewest => {
                self.metrics.record_dropped_many(item.record_count());
                false
            }

            OverflowPolicy::DropOldest => {
                if let Ok(evicted) = self.evictor.try_recv() {
                    self.pending.fetch_sub(1, Ordering::SeqCst);
                    self.metrics.record_dropped_many(evicted.record_count());
                }
                match sender.try_send(item) {
                    Ok(()) => true,
                    // The worker could not keep up even after eviction
                    Err(e) => {
                        self.alert_and_drop(e.into_inner().record_count());
                        false
                    }
                }
            }

            OverflowPolicy::BlockWithTimeout(timeout) => {
                self.metrics.record_block();
                match sender.send_timeout(item, *timeout) {
                    Ok(()) => true,
                    Err(SendTimeoutError::Timeout(item)) => {
                        self.alert_and_drop(item.record_count());
                        false
                    }
                    Err(SendTimeoutError::Disconnected(_)) => false,
                }
            }

            OverflowPolicy::AlertAndDrop => {
                self.alert_and_drop(item.record_count());
                false
            }
        }
    }

    fn alert_and_drop(&self, records: u64) {
        let dropped_before = self.metrics.record_dropped_many(records);
        let dropped_count = dropped_before + records;

        if should_alert_span(dropped_before, records) {
            eprintln!(
                "[LOGGER WARNING] {} queue full ({} slots), {} records dropped. \
                 Consider a larger sink queue or a different overflow policy.",
                self.name,
                self.capacity,
                dropped_count
            );

            if let Some(ref callback) = self.on_overflow {
                callback(dropped_count);
            }
        }
    }

    /// Items queued or in progress
    pub(crate) fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Wait until everything submitted so far has been handled
    pub(crate) fn wait_idle(&self, deadline: Instant) -> bool {
        loop {
            if self.pending() == 0 {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Stop accepting work, let the worker finish its queue and join it
    pub(crate) fn close(&mut self, timeout: Duration) -> bool {
        drop(self.sender.take());

        let Some(handle) = self.handle.take() else {
            return true;
        };

        let start = Instant::now();
        loop {
            if handle.is_finished() {
                if let Err(e) = handle.join() {
                    eprintln!(
                        "[LOGGER ERROR] {} worker panicked during shutdown: {}",
                        self.name,
                        panic_message(e.as_ref())
                    );
                    return false;
                }
                return true;
            }

            if start.elapsed() >= timeout {
                eprintln!(
                    "[LOGGER WARNING] {} worker did not finish within {:?}, {} items abandoned.",
                    self.name,
                    timeout,
                    self.pending()
                );
                return false;
            }

            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl<T: QueueItem> Drop for SinkWorker<T> {
    fn drop(&mut self) {
        // Detach: the worker exits on its own once its queue is empty
        drop(self.sender.take());
    }
}

pub(crate) fn panic_message(panic_info: &(dyn Any + Send)) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use parking_lot::Mutex;

    impl QueueItem for u32 {}

    /// Batch carrying `.0` records
    struct Batch(u32);

    impl QueueItem for Batch {
        fn record_count(&self) -> u64 {
            u64::from(self.0)
        }
    }

    fn gated_worker(
        capacity: usize,
        policy: OverflowPolicy,
    ) -> (SinkWorker<u32>, Sender<()>, Arc<Mutex<Vec<u32>>>, Arc<LoggerMetrics>) {
        let (gate_tx, gate_rx) = unbounded::<()>();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let metrics = Arc::new(LoggerMetrics::new());

        let worker = SinkWorker::spawn(
            "test",
            capacity,
            policy,
            None,
            Arc::clone(&metrics),
            move |item| {
                let _ = gate_rx.recv();
                seen_clone.lock().push(item);
            },
        )
        .unwrap();

        (worker, gate_tx, seen, metrics)
    }

    /// Wait until the worker has pulled the first item and is parked on the gate
    fn wait_until_taken(worker: &SinkWorker<u32>) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while worker.evictor.len() > 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn open_gate(gate: &Sender<()>, times: usize) {
        for _ in 0..times {
            gate.send(()).unwrap();
        }
    }

    #[test]
    fn test_items_handled_in_order() {
        let (mut worker, gate, seen, _) = gated_worker(8, OverflowPolicy::AlertAndDrop);
        open_gate(&gate, 3);
        for i in 0..3 {
            assert!(worker.submit(i));
        }
        assert!(worker.wait_idle(Instant::now() + Duration::from_secs(2)));
        assert!(worker.close(Duration::from_secs(1)));
        assert_eq!(*seen.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_drop_newest_keeps_queue() {
        let (mut worker, gate, seen, metrics) = gated_worker(1, OverflowPolicy::DropNewest);
        assert!(worker.submit(1));
        wait_until_taken(&worker);
        assert!(worker.submit(2)); // fills the single slot
        assert!(!worker.submit(3));

        open_gate(&gate, 2);
        assert!(worker.close(Duration::from_secs(2)));
        assert_eq!(*seen.lock(), vec![1, 2]);
        assert_eq!(metrics.dropped_count(), 1);
        assert_eq!(metrics.queue_full_events(), 1);
    }

    #[test]
    fn test_drop_oldest_evicts_queued_item() {
        let (mut worker, gate, seen, metrics) = gated_worker(1, OverflowPolicy::DropOldest);
        assert!(worker.submit(1));
        wait_until_taken(&worker);
        assert!(worker.submit(2));
        assert!(worker.submit(3)); // evicts 2

        open_gate(&gate, 2);
        assert!(worker.close(Duration::from_secs(2)));
        assert_eq!(*seen.lock(), vec![1, 3]);
        assert_eq!(metrics.dropped_count(), 1);
    }

    #[test]
    fn test_block_with_timeout_drops_after_waiting() {
        let (mut worker, gate, seen, metrics) =
            gated_worker(1, OverflowPolicy::BlockWithTimeout(Duration::from_millis(20)));
        assert!(worker.submit(1));
        wait_until_taken(&worker);
        assert!(worker.submit(2));

        let start = Instant::now();
        assert!(!worker.submit(3));
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert_eq!(metrics.block_events(), 1);

        open_gate(&gate, 2);
        assert!(worker.close(Duration::from_secs(2)));
        assert_eq!(*seen.lock(), vec![1, 2]);
    }

    #[test]
    fn test_panicking_handler_does_not_kill_worker() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let mut worker = SinkWorker::spawn(
            "panicky",
            4,
            OverflowPolicy::AlertAndDrop,
            None,
            Arc::new(LoggerMetrics::new()),
            move |item: u32| {
                if item == 0 {
                    panic!("boom");
                }
                seen_clone.lock().push(item);
            },
        )
        .unwrap();

        worker.submit(0);
        worker.submit(1);
        assert!(worker.close(Duration::from_secs(2)));
        assert_eq!(*seen.lock(), vec![1]);
        assert_eq!(worker.pending(), 0);
    }

    #[test]
    fn test_dropped_batches_count_every_record() {
        for policy in [
            OverflowPolicy::DropNewest,
            OverflowPolicy::DropOldest,
            OverflowPolicy::AlertAndDrop,
            OverflowPolicy::BlockWithTimeout(Duration::from_millis(5)),
        ] {
            let (gate_tx, gate_rx) = unbounded::<()>();
            let metrics = Arc::new(LoggerMetrics::new());
            let mut worker = SinkWorker::spawn(
                "batches",
                1,
                policy.clone(),
                None,
                Arc::clone(&metrics),
                move |_batch: Batch| {
                    let _ = gate_rx.recv();
                },
            )
            .unwrap();

            assert!(worker.submit(Batch(10)));
            let deadline = Instant::now() + Duration::from_secs(2);
            while worker.evictor.len() > 0 && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(1));
            }
            assert!(worker.submit(Batch(20)));
            worker.submit(Batch(30));

            // DropOldest loses the queued batch of 20, the rest lose the new 30
            let expected = if policy == OverflowPolicy::DropOldest { 20 } else { 30 };
            assert_eq!(metrics.dropped_count(), expected, "under {}", policy);

            open_gate(&gate_tx, 3);
            assert!(worker.close(Duration::from_secs(2)));
        }
    }

    #[test]
    fn test_submit_after_close_is_rejected() {
        let (mut worker, _gate, _, _) = gated_worker(1, OverflowPolicy::AlertAndDrop);
        assert!(worker.close(Duration::from_secs(1)));
        assert!(!worker.submit(5));
    }
}
