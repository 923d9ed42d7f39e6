#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing_humio::config::ConfigResolver;
use tracing_humio::event::Event;
use tracing_humio::sink::{Payload, Sink, SinkError};
use tracing_humio::{HumioWriter, WriterConfig};

/// Sink that keeps every event it is given.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
    payloads: AtomicUsize,
    closed: AtomicBool,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn payloads(&self) -> usize {
        self.payloads.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Sink for RecordingSink {
    fn to_payload(&self, events: Vec<Event>) -> Payload {
        Payload {
            events,
            ..Payload::default()
        }
    }

    async fn write(&self, payload: &Payload) -> Result<(), SinkError> {
        self.payloads.fetch_add(1, Ordering::SeqCst);
        self.events.lock().unwrap().extend(payload.events.iter().cloned());
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub fn options(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

/// Resolve `pairs` plus a token and hostname, ignoring the real
/// environment and property store.
pub fn config(pairs: &[(&str, &str)]) -> WriterConfig {
    let mut explicit = options(&[("serverToken", "test-token"), ("hostname", "test-host")]);
    explicit.extend(options(pairs));
    ConfigResolver::default()
        .with_env(HashMap::new())
        .with_properties(HashMap::new())
        .resolve(&explicit)
        .expect("valid test configuration")
}

/// Writer bound to `sink`, counting how often its sink factory runs.
pub fn recording_writer(config: WriterConfig, sink: Arc<RecordingSink>, builds: Arc<AtomicUsize>) -> HumioWriter {
    HumioWriter::with_sink_factory(config, move |_| {
        builds.fetch_add(1, Ordering::SeqCst);
        Ok(sink.clone() as Arc<dyn Sink>)
    })
}
