use crate::batch::{BatchConfig, BatchProcessor, StatsSnapshot};
use crate::config::{LogEntryValue, WriterConfig};
use crate::error::WriteError;
use crate::event::{self, Event};
use crate::record::LogRecord;
use crate::sink::{Sink, SinkError};
use std::cell::Cell;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

#[cfg(feature = "humio")]
use crate::error::ConfigError;
#[cfg(feature = "humio")]
use std::collections::HashMap;

/// Builds the transport sink once the writer needs it.
pub type SinkFactory = Box<dyn Fn(&WriterConfig) -> Result<Arc<dyn Sink>, SinkError> + Send + Sync>;

thread_local! {
    static SUBMITTING: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as inside [`HumioWriter::submit`] until dropped.
struct SubmitGuard;

impl SubmitGuard {
    fn enter() -> Option<Self> {
        SUBMITTING.with(|flag| (!flag.replace(true)).then_some(SubmitGuard))
    }
}

impl Drop for SubmitGuard {
    fn drop(&mut self) {
        SUBMITTING.with(|flag| flag.set(false));
    }
}

/// Whether the current thread is already submitting to a writer. Events
/// raised from there (a logging sink factory, say) must not re-enter it.
pub(crate) fn is_submitting() -> bool {
    SUBMITTING.with(Cell::get)
}

enum State {
    Uninitialized,
    Active(Arc<BatchProcessor>),
    /// Keeps the engine, if one was started, so its counters stay readable.
    Closed(Option<Arc<BatchProcessor>>),
}

/// Adapts log records into events and feeds them to a lazily started
/// [`BatchProcessor`].
///
/// The engine, and the sink behind it, are constructed on the first
/// submission, exactly once, however many threads race for it. Submissions
/// share a read lock on the lifecycle state and [`close`](Self::close)
/// takes the write lock, so every submission that got in before `close`
/// is drained by the engine.
///
/// The owner keeps the writer (usually as `Arc<HumioWriter>`) for later
/// [`flush`](Self::flush) and [`close`](Self::close) calls.
pub struct HumioWriter {
    config: WriterConfig,
    sink_factory: SinkFactory,
    state: RwLock<State>,
    rejected: AtomicU64,
}

impl HumioWriter {
    /// Writer delivering to the Humio ingest API described by `config`.
    #[cfg(feature = "humio")]
    pub fn new(config: WriterConfig) -> Self {
        Self::with_sink_factory(config, |config| {
            let sink = crate::humio::HumioSink::from_writer_config(config)?;
            Ok(Arc::new(sink) as Arc<dyn Sink>)
        })
    }

    /// Resolve configuration from `explicit` and the ambient layers, then
    /// build a Humio writer. Fails fast when no token is configured.
    #[cfg(feature = "humio")]
    pub fn from_properties(explicit: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Ok(Self::new(WriterConfig::resolve(explicit)?))
    }

    /// Writer delivering to whatever sink `factory` builds.
    pub fn with_sink_factory<F>(config: WriterConfig, factory: F) -> Self
    where
        F: Fn(&WriterConfig) -> Result<Arc<dyn Sink>, SinkError> + Send + Sync + 'static,
    {
        Self {
            config,
            sink_factory: Box::new(factory),
            state: RwLock::new(State::Uninitialized),
            rejected: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Record fields the logging front-end should capture for this writer.
    pub fn required_log_entry_values(&self) -> &BTreeSet<LogEntryValue> {
        &self.config.required_values
    }

    /// Adapt `record` and submit the resulting event.
    pub fn write(&self, record: &LogRecord) -> Result<(), WriteError> {
        self.submit(event::adapt(record, &self.config.hostname, &self.config.static_fields))
    }

    /// Hand one event to the engine, starting the engine if needed.
    ///
    /// A submission made while this thread is already inside `submit` is
    /// refused with [`WriteError::Reentrant`] instead of waiting on itself.
    pub fn submit(&self, event: Event) -> Result<(), WriteError> {
        let result = match SubmitGuard::enter() {
            Some(_guard) => self.try_submit(event),
            None => Err(WriteError::Reentrant),
        };
        if result.is_err() {
            self.rejected.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    fn try_submit(&self, event: Event) -> Result<(), WriteError> {
        {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            match &*state {
                State::Active(engine) => return engine.enqueue(event),
                State::Closed(_) => return Err(WriteError::Closed),
                State::Uninitialized => {}
            }
        }

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if let State::Uninitialized = *state {
            *state = State::Active(Arc::new(self.start_engine()?));
        }
        match &*state {
            State::Active(engine) => engine.enqueue(event),
            State::Closed(_) | State::Uninitialized => Err(WriteError::Closed),
        }
    }

    fn start_engine(&self) -> Result<BatchProcessor, WriteError> {
        let sink = (self.sink_factory)(&self.config).map_err(|e| {
            tracing::error!(error = %e, "failed to build humio sink");
            WriteError::EngineStart(e.to_string())
        })?;
        let engine = BatchProcessor::start(sink, BatchConfig::from(&self.config)).map_err(|e| {
            tracing::error!(error = %e, "failed to start humio batch engine");
            WriteError::EngineStart(e.to_string())
        })?;
        if self.config.debug {
            tracing::info!(
                endpoint = %self.config.server_endpoint,
                uri = %self.config.uri,
                actions = self.config.batch_actions,
                "humio delivery engine started"
            );
        }
        Ok(engine)
    }

    /// Deliver everything submitted so far. Does nothing before the first
    /// submission or after [`close`](Self::close).
    pub fn flush(&self) {
        let engine = match &*self.state.read().unwrap_or_else(PoisonError::into_inner) {
            State::Active(engine) => Arc::clone(engine),
            _ => return,
        };
        engine.flush();
    }

    /// Drain and deliver everything submitted so far, then stop accepting
    /// events. Later calls do nothing.
    pub fn close(&self) {
        let engine = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            match &*state {
                State::Active(engine) => {
                    let engine = Arc::clone(engine);
                    *state = State::Closed(Some(Arc::clone(&engine)));
                    engine
                }
                State::Uninitialized => {
                    *state = State::Closed(None);
                    return;
                }
                State::Closed(_) => return,
            }
        };
        engine.close();
    }

    pub fn is_closed(&self) -> bool {
        matches!(*self.state.read().unwrap_or_else(PoisonError::into_inner), State::Closed(_))
    }

    /// Whether the delivery engine has been constructed.
    pub fn is_started(&self) -> bool {
        matches!(
            *self.state.read().unwrap_or_else(PoisonError::into_inner),
            State::Active(_) | State::Closed(Some(_))
        )
    }

    /// Submissions refused by this writer (closed, full buffer, engine
    /// failed to start).
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Engine counters, once the engine exists.
    pub fn stats(&self) -> Option<StatsSnapshot> {
        match &*self.state.read().unwrap_or_else(PoisonError::into_inner) {
            State::Active(engine) | State::Closed(Some(engine)) => Some(engine.stats()),
            _ => None,
        }
    }
}

impl std::fmt::Debug for HumioWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HumioWriter")
            .field("config", &self.config)
            .field("started", &self.is_started())
            .field("closed", &self.is_closed())
            .finish()
    }
}
