//! The buffered, async reporter: producer threads call
//! [`BufferedReporter::report_span`] (via its [`zipkin_core::SpanSink`]
//! impl) cheaply under a short-lived lock; a single dedicated writer task
//! periodically swaps the buffer out and hands it to a [`Transport`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use zipkin_core::{Span, SpanBuffer, SpanSink};

use crate::transport::Transport;

/// How many spans to hold before dropping, and how often to flush on a
/// timer. Mirrors the original reporter's fixed `max_buffered_spans = 5`
/// and `reporting_period = 500ms`.
#[derive(Debug, Clone, Copy)]
pub struct ReporterConfig {
    /// Spans held before new ones are dropped.
    pub max_buffered_spans: usize,
    /// How often the writer task flushes on a timer, absent an earlier
    /// buffer-full wakeup.
    pub reporting_period: Duration,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            max_buffered_spans: 1000,
            reporting_period: Duration::from_millis(500),
        }
    }
}

struct Shared {
    buffer: Mutex<SpanBuffer>,
    /// Wakes the writer task early: either the buffer just filled up, or a
    /// caller asked for an immediate flush, or we're shutting down.
    wake: Notify,
    /// Spans successfully admitted to the buffer since the reporter was
    /// built (never reset; see spec's `reported` counter).
    reported: AtomicU64,
    /// Spans handed to the transport so far. Carried on a watch channel
    /// rather than a bare `Notify` so `flush_with_timeout` can compare
    /// against a snapshot without a lost-wakeup race: a `Notify::notify_*`
    /// signal sent before the waiter subscribes is gone for good, but a
    /// watch channel always reflects its last value to a fresh subscriber.
    flushed_tx: watch::Sender<u64>,
    exit: AtomicBool,
}

/// Buffers finished spans and flushes them to a [`Transport`] from a single
/// background task, on a timer or when the buffer fills up.
pub struct BufferedReporter {
    shared: Arc<Shared>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl BufferedReporter {
    /// Starts a reporter and its writer task. The writer task runs for the
    /// lifetime of the returned handle (until [`BufferedReporter::shutdown`]
    /// is called).
    pub fn new(transport: Arc<dyn Transport>, config: ReporterConfig) -> Arc<Self> {
        let (flushed_tx, _) = watch::channel(0u64);
        let shared = Arc::new(Shared {
            buffer: Mutex::new(SpanBuffer::new(config.max_buffered_spans)),
            wake: Notify::new(),
            reported: AtomicU64::new(0),
            flushed_tx,
            exit: AtomicBool::new(false),
        });

        let writer_shared = shared.clone();
        let writer = tokio::spawn(writer_loop(writer_shared, transport, config.reporting_period));

        Arc::new(Self {
            shared,
            writer: Mutex::new(Some(writer)),
        })
    }

    /// Number of spans currently buffered, awaiting the next flush.
    pub fn pending_spans(&self) -> usize {
        self.shared.buffer.lock().len()
    }

    /// Spans successfully admitted to the buffer since this reporter was
    /// built. Monotonic; unlike [`BufferedReporter::take_dropped_spans`]
    /// this counter is never reset, matching the original's `reported_`.
    pub fn reported_spans(&self) -> u64 {
        self.shared.reported.load(Ordering::SeqCst)
    }

    /// Number of spans dropped so far due to backpressure (buffer was full
    /// when `report_span` was called). Does not reset the counter; see
    /// [`BufferedReporter::take_dropped_spans`] for the resetting form.
    pub fn dropped_spans(&self) -> u64 {
        self.shared.buffer.lock().dropped()
    }

    /// Reads and resets the dropped-span counter.
    pub fn take_dropped_spans(&self) -> u64 {
        self.shared.buffer.lock().take_dropped()
    }

    /// Wakes the writer early and waits up to `timeout` for every span
    /// admitted so far to have been handed to the transport. Returns
    /// `true` if that was observed within the timeout.
    pub async fn flush_with_timeout(&self, timeout: Duration) -> bool {
        let target = self.shared.reported.load(Ordering::SeqCst);
        let mut rx = self.shared.flushed_tx.subscribe();
        self.shared.wake.notify_one();

        tokio::time::timeout(timeout, async {
            loop {
                if *rx.borrow() >= target {
                    return;
                }
                if rx.changed().await.is_err() {
                    return;
                }
            }
        })
        .await
        .is_ok()
    }

    /// Signals the writer task to flush any remaining spans and stop, and
    /// waits for it to finish.
    pub async fn shutdown(&self) {
        self.shared.exit.store(true, Ordering::SeqCst);
        self.shared.wake.notify_one();
        if let Some(handle) = self.writer.lock().take() {
            let _ = handle.await;
        }
    }
}

impl SpanSink for BufferedReporter {
    fn report_span(&self, span: Span) {
        let (admitted, is_full) = {
            let mut buffer = self.shared.buffer.lock();
            let admitted = buffer.push(span);
            (admitted, buffer.is_full())
        };
        if admitted {
            self.shared.reported.fetch_add(1, Ordering::SeqCst);
        }
        if is_full {
            self.shared.wake.notify_one();
        }
    }
}

async fn writer_loop(shared: Arc<Shared>, transport: Arc<dyn Transport>, period: Duration) {
    let mut due = Instant::now() + period;
    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(due) => {}
            _ = shared.wake.notified() => {}
        }

        // Checked before draining: once `shutdown()` has set this, any spans
        // still sitting in the buffer are discarded rather than flushed, per
        // `ReporterImpl::makeWriterExit`'s "stop reporting immediately".
        if shared.exit.load(Ordering::SeqCst) {
            let current = *shared.flushed_tx.borrow();
            let _ = shared.flushed_tx.send(current);
            break;
        }

        let spans = {
            let mut buffer = shared.buffer.lock();
            buffer.drain()
        };
        if !spans.is_empty() {
            transport.transport_spans(&spans).await;
        }
        let flushed_count = *shared.flushed_tx.borrow() + spans.len() as u64;
        let _ = shared.flushed_tx.send(flushed_count);

        let now = Instant::now();
        due += period;
        if due < now {
            due = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryTransport;

    fn sink(config: ReporterConfig) -> (Arc<BufferedReporter>, Arc<InMemoryTransport>) {
        let transport = Arc::new(InMemoryTransport::new());
        let reporter = BufferedReporter::new(transport.clone(), config);
        (reporter, transport)
    }

    #[tokio::test]
    async fn buffer_full_triggers_early_flush() {
        let (reporter, transport) = sink(ReporterConfig {
            max_buffered_spans: 2,
            reporting_period: Duration::from_secs(3600),
        });
        reporter.report_span(Span::new("a"));
        reporter.report_span(Span::new("b"));

        let flushed = reporter.flush_with_timeout(Duration::from_secs(2)).await;
        assert!(flushed);
        assert_eq!(transport.spans().len(), 2);
        reporter.shutdown().await;
    }

    #[tokio::test]
    async fn backpressure_drops_and_counts() {
        let (reporter, _transport) = sink(ReporterConfig {
            max_buffered_spans: 1,
            reporting_period: Duration::from_secs(3600),
        });
        reporter.report_span(Span::new("a"));
        reporter.report_span(Span::new("b")); // dropped, buffer already full
        assert_eq!(reporter.take_dropped_spans(), 1);
        assert_eq!(reporter.reported_spans(), 1);
        reporter.shutdown().await;
    }

    #[tokio::test]
    async fn flush_with_timeout_snapshot_ignores_spans_reported_after_the_call() {
        let (reporter, transport) = sink(ReporterConfig {
            max_buffered_spans: 10,
            reporting_period: Duration::from_secs(3600),
        });
        reporter.report_span(Span::new("a"));
        assert!(reporter.flush_with_timeout(Duration::from_secs(2)).await);
        assert_eq!(transport.spans().len(), 1);

        // A span reported after the snapshot was taken must not be required
        // for this flush to have "succeeded" -- it lands on the next one.
        reporter.report_span(Span::new("b"));
        assert!(reporter.flush_with_timeout(Duration::from_secs(2)).await);
        assert_eq!(transport.spans().len(), 2);
        reporter.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_discards_unflushed_spans() {
        let (reporter, transport) = sink(ReporterConfig {
            max_buffered_spans: 10,
            reporting_period: Duration::from_secs(3600),
        });
        reporter.report_span(Span::new("a"));
        reporter.shutdown().await;
        assert!(transport.spans().is_empty());
    }

    #[tokio::test]
    async fn flush_before_shutdown_still_delivers_spans() {
        let (reporter, transport) = sink(ReporterConfig {
            max_buffered_spans: 10,
            reporting_period: Duration::from_secs(3600),
        });
        reporter.report_span(Span::new("a"));
        assert!(reporter.flush_with_timeout(Duration::from_secs(2)).await);
        reporter.shutdown().await;
        assert_eq!(transport.spans().len(), 1);
    }
}
