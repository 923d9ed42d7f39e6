use crate::event::Event;
use crate::sink::{Payload, Sink, SinkError};
use async_trait::async_trait;

/// Accepts every payload and discards it.
///
/// Lets the load demo measure adapter and engine cost with no network in
/// the way.
#[derive(Clone, Default)]
pub struct NoopSink;

#[async_trait]
impl Sink for NoopSink {
    fn to_payload(&self, events: Vec<Event>) -> Payload {
        Payload {
            events,
            ..Payload::default()
        }
    }

    async fn write(&self, _payload: &Payload) -> Result<(), SinkError> {
        Ok(())
    }
}
