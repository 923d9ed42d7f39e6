use crate::config::WriterConfig;
use crate::error::WriteError;
use crate::event::Event;
use crate::sink::{Payload, Sink, SinkError};
use rand::Rng;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc as std_mpsc, Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{sleep, Duration, Instant};

/// Name of the engine's background thread.
pub(crate) const WORKER_THREAD: &str = "humio-batch";

const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(10);
const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(10);
const MAX_ATTEMPTS: u32 = 3;

/// Tuning for a [`BatchProcessor`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchConfig {
    /// Number of buffered events that triggers a delivery.
    pub actions: usize,
    /// Base period of timed deliveries.
    pub flush_interval: Duration,
    /// Capacity of the event queue.
    pub buffer_limit: usize,
    /// Upper bound of the random delay added to every timed delivery.
    pub jitter_interval: Duration,
    pub debug: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            actions: 1000,
            flush_interval: Duration::from_secs(1),
            buffer_limit: 10_000,
            jitter_interval: Duration::ZERO,
            debug: false,
        }
    }
}

impl From<&WriterConfig> for BatchConfig {
    fn from(config: &WriterConfig) -> Self {
        Self {
            actions: config.batch_actions,
            flush_interval: config.batch_flush_interval,
            buffer_limit: config.batch_buffer_limit,
            jitter_interval: config.batch_jitter_interval,
            debug: config.debug,
        }
    }
}

/// Counters maintained by the engine.
#[derive(Debug, Default)]
pub struct EngineStats {
    /// Events accepted into the queue.
    pub accepted: AtomicU64,
    /// Events rejected because the queue was full.
    pub dropped: AtomicU64,
    /// Events the sink acknowledged.
    pub delivered: AtomicU64,
    /// Payloads given up on after retries.
    pub failed_batches: AtomicU64,
}

impl EngineStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed_batches: self.failed_batches.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub accepted: u64,
    pub dropped: u64,
    pub delivered: u64,
    pub failed_batches: u64,
}

enum Control {
    Flush(std_mpsc::SyncSender<()>),
    Close(std_mpsc::SyncSender<()>),
}

/// Batching and delivery engine.
///
/// Events go through a bounded queue to a dedicated `humio-batch` thread
/// that owns a single-threaded Tokio runtime. That thread groups events
/// into payloads and hands them to the [`Sink`] when the batch reaches
/// `actions` events, when the (jittered) flush timer fires, or when
/// [`flush`](Self::flush) / [`close`](Self::close) is requested.
///
/// A full queue rejects the newest event; an event that was accepted is
/// always handed to the sink.
pub struct BatchProcessor {
    events: mpsc::Sender<Event>,
    control: mpsc::UnboundedSender<Control>,
    stats: Arc<EngineStats>,
    closed: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl BatchProcessor {
    /// Spawn the background thread and return a handle to it.
    ///
    /// Minimal thresholds are enforced for `actions`, `buffer_limit` and
    /// `flush_interval` to avoid degenerate configurations.
    pub fn start(sink: Arc<dyn Sink>, config: BatchConfig) -> io::Result<Self> {
        let config = BatchConfig {
            actions: config.actions.max(1),
            buffer_limit: config.buffer_limit.max(1),
            flush_interval: config.flush_interval.max(MIN_FLUSH_INTERVAL),
            ..config
        };

        let (events_tx, events_rx) = mpsc::channel::<Event>(config.buffer_limit);
        let (control_tx, control_rx) = mpsc::unbounded_channel::<Control>();
        let stats = Arc::new(EngineStats::default());

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let worker = Worker {
            sink,
            config,
            stats: Arc::clone(&stats),
            batch: Vec::new(),
        };
        let handle = thread::Builder::new()
            .name(WORKER_THREAD.to_string())
            .spawn(move || runtime.block_on(worker.run(events_rx, control_rx)))?;

        Ok(Self {
            events: events_tx,
            control: control_tx,
            stats,
            closed: AtomicBool::new(false),
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Queue one event without blocking.
    pub fn enqueue(&self, event: Event) -> Result<(), WriteError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(WriteError::Closed);
        }
        match self.events.try_send(event) {
            Ok(()) => {
                self.stats.accepted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                Err(WriteError::BufferFull)
            }
            Err(TrySendError::Closed(_)) => Err(WriteError::Closed),
        }
    }

    /// Deliver every event accepted so far and wait until the sink is done.
    pub fn flush(&self) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        self.request(Control::Flush);
    }

    /// Deliver every event accepted so far, close the sink and stop the
    /// background thread. Later calls do nothing.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.request(Control::Close);

        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::error!("humio batch thread panicked");
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    fn request(&self, make: fn(std_mpsc::SyncSender<()>) -> Control) {
        let (ack_tx, ack_rx) = std_mpsc::sync_channel(1);
        if self.control.send(make(ack_tx)).is_ok() {
            // An error here means the worker is gone, which leaves nothing to wait for.
            let _ = ack_rx.recv();
        }
    }
}

impl Drop for BatchProcessor {
    fn drop(&mut self) {
        self.close();
    }
}

struct Worker {
    sink: Arc<dyn Sink>,
    config: BatchConfig,
    stats: Arc<EngineStats>,
    batch: Vec<Event>,
}

impl Worker {
    async fn run(mut self, mut events: mpsc::Receiver<Event>, mut control: mpsc::UnboundedReceiver<Control>) {
        let timer = sleep(self.next_delay());
        tokio::pin!(timer);

        loop {
            tokio::select! {
                biased;

                Some(request) = control.recv() => match request {
                    Control::Flush(ack) => {
                        drain(&mut events, &mut self.batch);
                        self.deliver().await;
                        if let Err(e) = self.sink.flush().await {
                            tracing::warn!(error = %e, "humio sink flush failed");
                        }
                        let _ = ack.send(());
                    }
                    Control::Close(ack) => {
                        events.close();
                        drain(&mut events, &mut self.batch);
                        self.shutdown().await;
                        let _ = ack.send(());
                        return;
                    }
                },
                received = events.recv() => match received {
                    Some(event) => {
                        self.batch.push(event);
                        if self.batch.len() >= self.config.actions {
                            self.deliver().await;
                        }
                    }
                    None => {
                        self.shutdown().await;
                        return;
                    }
                },
                () = &mut timer => {
                    self.deliver().await;
                    timer.as_mut().reset(Instant::now() + self.next_delay());
                }
            }
        }
    }

    fn next_delay(&self) -> Duration {
        let jitter = if self.config.jitter_interval.is_zero() {
            Duration::ZERO
        } else {
            rand::rng().random_range(Duration::ZERO..=self.config.jitter_interval)
        };
        self.config.flush_interval + jitter
    }

    async fn deliver(&mut self) {
        while !self.batch.is_empty() {
            let take = self.batch.len().min(self.config.actions);
            let chunk: Vec<Event> = self.batch.drain(..take).collect();
            let payload = self.sink.to_payload(chunk);
            let count = payload.len() as u64;

            match send_batch(&*self.sink, &payload).await {
                Ok(()) => {
                    self.stats.delivered.fetch_add(count, Ordering::Relaxed);
                    if self.config.debug {
                        tracing::debug!(events = count, "humio batch written");
                    }
                }
                Err(e) => {
                    self.stats.failed_batches.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(error = %e, events = count, "giving up on humio batch");
                }
            }
        }
    }

    async fn shutdown(&mut self) {
        self.deliver().await;
        if let Err(e) = self.sink.flush().await {
            tracing::warn!(error = %e, "humio sink flush failed");
        }
        if let Err(e) = self.sink.close().await {
            tracing::warn!(error = %e, "humio sink close failed");
        }
    }
}

fn drain(events: &mut mpsc::Receiver<Event>, batch: &mut Vec<Event>) {
    while let Ok(event) = events.try_recv() {
        batch.push(event);
    }
}

async fn send_batch(sink: &dyn Sink, payload: &Payload) -> Result<(), SinkError> {
    let mut backoff = INITIAL_BACKOFF;
    let mut attempt = 1;
    loop {
        match sink.write(payload).await {
            Ok(()) => return Ok(()),
            Err(e) if attempt >= MAX_ATTEMPTS => return Err(e),
            Err(e) => {
                tracing::warn!(error = %e, attempt, "humio sink write failed, retrying in {:?}", backoff);
                sleep(backoff).await;
                backoff = std::cmp::min(backoff * 2, MAX_BACKOFF);
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Recording {
        payloads: Mutex<Vec<usize>>,
        failures_left: AtomicUsize,
        closed: AtomicBool,
    }

    #[async_trait]
    impl Sink for Recording {
        fn to_payload(&self, events: Vec<Event>) -> Payload {
            Payload {
                events,
                ..Payload::default()
            }
        }

        async fn write(&self, payload: &Payload) -> Result<(), SinkError> {
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err("unavailable".into());
            }
            self.payloads.lock().unwrap().push(payload.len());
            Ok(())
        }

        async fn close(&self) -> Result<(), SinkError> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn event(n: i64) -> Event {
        let mut event = Event::new();
        event.set("n", n);
        event
    }

    fn slow_timer(actions: usize) -> BatchConfig {
        BatchConfig {
            actions,
            flush_interval: Duration::from_secs(3600),
            ..BatchConfig::default()
        }
    }

    #[test]
    fn flush_delivers_pending_events() {
        let sink = Arc::new(Recording::default());
        let engine = BatchProcessor::start(sink.clone(), slow_timer(100)).unwrap();

        for n in 0..5 {
            engine.enqueue(event(n)).unwrap();
        }
        engine.flush();

        assert_eq!(*sink.payloads.lock().unwrap(), vec![5]);
        assert_eq!(engine.stats().delivered, 5);
        engine.close();
    }

    #[test]
    fn batches_are_split_by_action_count() {
        let sink = Arc::new(Recording::default());
        let engine = BatchProcessor::start(sink.clone(), slow_timer(2)).unwrap();

        for n in 0..5 {
            engine.enqueue(event(n)).unwrap();
        }
        engine.close();

        let payloads = sink.payloads.lock().unwrap().clone();
        assert_eq!(payloads.iter().sum::<usize>(), 5);
        assert!(payloads.iter().all(|len| *len <= 2));
        assert!(sink.closed.load(Ordering::SeqCst));
    }

    #[test]
    fn timer_flushes_without_explicit_request() {
        let sink = Arc::new(Recording::default());
        let config = BatchConfig {
            actions: 100,
            flush_interval: Duration::from_millis(20),
            jitter_interval: Duration::from_millis(5),
            ..BatchConfig::default()
        };
        let engine = BatchProcessor::start(sink.clone(), config).unwrap();
        engine.enqueue(event(1)).unwrap();

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while sink.payloads.lock().unwrap().is_empty() && std::time::Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert_eq!(*sink.payloads.lock().unwrap(), vec![1]);
    }

    #[test]
    fn failed_write_is_retried() {
        let sink = Arc::new(Recording::default());
        sink.failures_left.store(1, Ordering::SeqCst);
        let engine = BatchProcessor::start(sink.clone(), slow_timer(10)).unwrap();

        engine.enqueue(event(1)).unwrap();
        engine.flush();

        assert_eq!(*sink.payloads.lock().unwrap(), vec![1]);
        assert_eq!(engine.stats().failed_batches, 0);
    }

    #[test]
    fn close_is_idempotent_and_rejects_later_events() {
        let sink = Arc::new(Recording::default());
        let engine = BatchProcessor::start(sink.clone(), slow_timer(10)).unwrap();
        engine.enqueue(event(1)).unwrap();

        engine.close();
        engine.close();
        engine.flush();

        assert!(engine.is_closed());
        assert_eq!(engine.enqueue(event(2)), Err(WriteError::Closed));
        assert_eq!(*sink.payloads.lock().unwrap(), vec![1]);
    }
}
