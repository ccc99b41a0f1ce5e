//! Background span reporter.
//!
//! Finished spans are pushed onto a bounded lock-free queue from whatever
//! thread submits them. A single reporter thread drains the queue in batches,
//! either when a batch fills up or when the flush interval elapses, and hands
//! each batch to a [`SpanTransport`]. A full queue drops the span; a failed
//! batch is dropped and logged. Neither is visible to the submitting thread.

use super::wire::ZipkinSpan;
use crate::sink::ExportError;
use crossbeam_queue::ArrayQueue;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(1);

/// Delivers span batches to a collector.
pub trait SpanTransport: Send + 'static {
    /// Sends one batch. The reporter does not retry.
    fn send(&mut self, batch: &[ZipkinSpan]) -> Result<(), ExportError>;
}

impl<F> SpanTransport for F
where
    F: FnMut(&[ZipkinSpan]) -> Result<(), ExportError> + Send + 'static,
{
    fn send(&mut self, batch: &[ZipkinSpan]) -> Result<(), ExportError> {
        self(batch)
    }
}

/// Delivery counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReporterStats {
    /// Spans accepted onto the queue.
    pub enqueued: u64,
    /// Spans delivered in successful batches.
    pub exported: u64,
    /// Spans lost to a full queue, a stopped reporter, or a failed batch.
    pub dropped: u64,
    /// Batches the transport rejected.
    pub failed_batches: u64,
}

#[derive(Debug, Default)]
struct Signal {
    wake: bool,
    stop: bool,
}

struct Shared {
    queue: ArrayQueue<ZipkinSpan>,
    batch_size: usize,
    flush_interval: Duration,
    /// Queued plus in-flight spans.
    pending: AtomicUsize,
    stopped: AtomicBool,
    enqueued: AtomicU64,
    exported: AtomicU64,
    dropped: AtomicU64,
    failed_batches: AtomicU64,
    signal: Mutex<Signal>,
    wake_cv: Condvar,
    idle: Mutex<()>,
    idle_cv: Condvar,
}

impl Shared {
    fn wake(&self) {
        let mut signal = self.signal.lock();
        signal.wake = true;
        self.wake_cv.notify_one();
    }

    fn drain<T: SpanTransport>(&self, transport: &mut T, batch: &mut Vec<ZipkinSpan>) {
        while let Some(span) = self.queue.pop() {
            batch.push(span);
            if batch.len() >= self.batch_size {
                self.send(transport, batch);
            }
        }
        if !batch.is_empty() {
            self.send(transport, batch);
        }
    }

    fn send<T: SpanTransport>(&self, transport: &mut T, batch: &mut Vec<ZipkinSpan>) {
        let n = batch.len();
        match transport.send(batch) {
            Ok(()) => {
                self.exported.fetch_add(n as u64, Ordering::Relaxed);
                tracing::trace!(spans = n, "span batch exported");
            }
            Err(err) => {
                self.failed_batches.fetch_add(1, Ordering::Relaxed);
                self.dropped.fetch_add(n as u64, Ordering::Relaxed);
                tracing::warn!(spans = n, error = %err, "span batch dropped");
            }
        }
        batch.clear();
        self.pending.fetch_sub(n, Ordering::AcqRel);
        let _idle = self.idle.lock();
        self.idle_cv.notify_all();
    }

    /// Drops whatever is still queued. Returns the number of spans dropped.
    fn discard_queued(&self) -> usize {
        let mut n = 0;
        while self.queue.pop().is_some() {
            n += 1;
        }
        if n > 0 {
            self.dropped.fetch_add(n as u64, Ordering::Relaxed);
            self.pending.fetch_sub(n, Ordering::AcqRel);
            let _idle = self.idle.lock();
            self.idle_cv.notify_all();
        }
        n
    }

    fn run<T: SpanTransport>(&self, mut transport: T) {
        let mut batch = Vec::with_capacity(self.batch_size);
        loop {
            let stop = {
                let mut signal = self.signal.lock();
                if !signal.wake && !signal.stop {
                    let _ = self.wake_cv.wait_for(&mut signal, self.flush_interval);
                }
                signal.wake = false;
                signal.stop
            };
            self.drain(&mut transport, &mut batch);
            if stop {
                break;
            }
        }
        tracing::debug!("span reporter stopped");
    }
}

/// Handle to the reporter thread.
pub(crate) struct Reporter {
    shared: Arc<Shared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Reporter {
    pub(crate) fn spawn<T: SpanTransport>(
        transport: T,
        capacity: usize,
        batch_size: usize,
        flush_interval: Duration,
    ) -> Result<Self, ExportError> {
        let shared = Arc::new(Shared {
            queue: ArrayQueue::new(capacity.max(1)),
            batch_size: batch_size.max(1),
            flush_interval: flush_interval.max(MIN_FLUSH_INTERVAL),
            pending: AtomicUsize::new(0),
            stopped: AtomicBool::new(false),
            enqueued: AtomicU64::new(0),
            exported: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            failed_batches: AtomicU64::new(0),
            signal: Mutex::new(Signal::default()),
            wake_cv: Condvar::new(),
            idle: Mutex::new(()),
            idle_cv: Condvar::new(),
        });
        let worker = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name("launchspan-reporter".into())
            .spawn(move || worker.run(transport))?;
        Ok(Self {
            shared,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Queues a finished span without blocking.
    pub(crate) fn enqueue(&self, span: ZipkinSpan) {
        if self.shared.stopped.load(Ordering::SeqCst) {
            self.shared.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.push(span);
    }

    fn push(&self, span: ZipkinSpan) {
        let shared = &self.shared;
        shared.pending.fetch_add(1, Ordering::AcqRel);
        match shared.queue.push(span) {
            Ok(()) => {
                shared.enqueued.fetch_add(1, Ordering::Relaxed);
                // the worker may have made its last drain since the check above
                if shared.stopped.load(Ordering::SeqCst) {
                    let dropped = shared.discard_queued();
                    tracing::debug!(dropped, "reporter stopped during enqueue");
                    return;
                }
                if shared.queue.len() >= shared.batch_size {
                    shared.wake();
                }
            }
            Err(span) => {
                shared.pending.fetch_sub(1, Ordering::AcqRel);
                shared.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(span = %span.name, "span queue full, dropping span");
            }
        }
    }

    /// Waits until every queued span has been handed to the transport.
    pub(crate) fn flush(&self, timeout: Duration) -> bool {
        let shared = &self.shared;
        shared.wake();
        let deadline = Instant::now() + timeout;
        let mut idle = shared.idle.lock();
        while shared.pending.load(Ordering::Acquire) > 0 {
            if shared.idle_cv.wait_until(&mut idle, deadline).timed_out() {
                return shared.pending.load(Ordering::Acquire) == 0;
            }
        }
        true
    }

    /// Flushes, stops the thread, and joins it if the flush completed.
    pub(crate) fn shutdown(&self, timeout: Duration) -> bool {
        let flushed = self.flush(timeout);
        self.stop();
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if flushed {
                if handle.join().is_err() {
                    tracing::warn!("span reporter thread panicked");
                }
            } else {
                tracing::warn!(
                    pending = self.shared.pending.load(Ordering::Acquire),
                    "span reporter did not drain before timeout; detaching"
                );
            }
        }
        flushed
    }

    fn stop(&self) {
        self.shared.stopped.store(true, Ordering::SeqCst);
        let mut signal = self.shared.signal.lock();
        signal.stop = true;
        self.shared.wake_cv.notify_one();
    }

    pub(crate) fn stats(&self) -> ReporterStats {
        let shared = &self.shared;
        ReporterStats {
            enqueued: shared.enqueued.load(Ordering::Relaxed),
            exported: shared.exported.load(Ordering::Relaxed),
            dropped: shared.dropped.load(Ordering::Relaxed),
            failed_batches: shared.failed_batches.load(Ordering::Relaxed),
        }
    }
}

impl Drop for Reporter {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter")
            .field("queued", &self.shared.queue.len())
            .field("stats", &self.stats())
            .finish()
    }
}
