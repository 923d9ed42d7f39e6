//! Ship `tracing` events to a Humio ingest endpoint in batches.
//!
//! A [`HumioWriter`] adapts each log record into a flat [`Event`], and a
//! lazily started [`BatchProcessor`] groups events into payloads for a
//! [`Sink`]. [`init::init_tracing`] wires everything into the global
//! subscriber and hands back the writer for flushing and shutdown.

pub mod error;
pub mod env;
pub mod properties;
pub mod config;
pub mod hostname;
pub mod record;
pub mod event;
pub mod sink;
pub mod batch;
pub mod writer;
pub mod layer;

#[cfg(feature = "humio")]
pub mod humio;

pub mod init;
pub mod noop_sink;

pub use batch::BatchProcessor;
pub use config::{ConfigResolver, LogEntryValue, WriterConfig};
pub use error::{ConfigError, InitError, WriteError};
pub use event::{adapt, Event};
pub use layer::HumioLayer;
pub use record::LogRecord;
pub use sink::{Payload, Sink};
pub use writer::HumioWriter;
