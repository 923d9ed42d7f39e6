/// Error type returned when resolving a [`WriterConfig`](crate::config::WriterConfig).
///
/// Every variant is raised synchronously while the writer is being
/// constructed; none of them can surface from a logging call.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("serverToken is required")]
    MissingToken,

    #[error("option `{option}` expects a non-negative integer, got {value:?}")]
    InvalidNumber { option: &'static str, value: String },

    #[error("option `{option}` has an invalid value {value:?}")]
    InvalidValue { option: &'static str, value: String },

    #[error("malformed static field entry {entry:?}: {reason}")]
    MalformedStaticFields { entry: String, reason: &'static str },

    #[error("static field `{0}` collides with a reserved event attribute")]
    ReservedStaticField(String),

    #[error("unknown log entry value `{0}`")]
    UnknownLogEntryValue(String),
}

/// Error type returned by [`HumioWriter::submit`](crate::writer::HumioWriter::submit).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum WriteError {
    #[error("writer is closed")]
    Closed,

    #[error("event buffer is full, event rejected")]
    BufferFull,

    #[error("failed to start delivery engine: {0}")]
    EngineStart(String),

    #[error("event raised while this thread was already submitting, dropped")]
    Reentrant,
}

/// Error type returned when installing the global subscriber.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to install global subscriber: {0}")]
    Subscriber(String),
}
