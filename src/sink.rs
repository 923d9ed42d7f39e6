use crate::event::Event;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error;

/// Error returned by transport operations.
pub type SinkError = Box<dyn Error + Send + Sync>;

/// One bulk delivery: a batch of events plus the static tag set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Payload {
    pub tags: BTreeMap<String, String>,
    pub events: Vec<Event>,
}

impl Payload {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Asynchronous destination for batches of [`Event`]s.
///
/// Implementations own the wire format and the network write. The
/// [`BatchProcessor`](crate::batch::BatchProcessor) calls them from its own
/// background thread and never from an application thread.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Group a batch into a single bulk payload.
    fn to_payload(&self, events: Vec<Event>) -> Payload;

    /// Deliver one payload.
    ///
    /// **Returns**
    /// - `Ok(())` if the backend accepted the payload.
    /// - `Err(..)` on network, serialization or HTTP status failure. The
    ///   engine retries the payload a bounded number of times.
    async fn write(&self, payload: &Payload) -> Result<(), SinkError>;

    /// Flush any buffering the transport does on its own.
    ///
    /// Default implementation is a no-op.
    async fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Release transport resources. Called once, after the last write.
    ///
    /// Default implementation is a no-op.
    async fn close(&self) -> Result<(), SinkError> {
        Ok(())
    }
}
