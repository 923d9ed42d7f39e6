/// Names under which each writer option can be supplied.
///
/// Every option is looked up, in order, in the caller's explicit map
/// (by `name`), the process environment (by `env`) and the process-wide
/// property store (by `property`), before falling back to `default`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionKey {
    /// Key in the explicit configuration map, e.g. `serverToken`.
    pub name: &'static str,
    /// Environment variable, e.g. `HUMIO_SERVER_TOKEN`.
    pub env: &'static str,
    /// Key in the [`properties`](crate::properties) store, e.g. `humio.serverToken`.
    pub property: &'static str,
    /// Compiled-in default.
    pub default: &'static str,
}

/// Overrides the host tag. Empty means "look up the local host name".
pub const HOSTNAME: OptionKey = OptionKey {
    name: "hostname",
    env: "HUMIO_HOSTNAME",
    property: "humio.hostname",
    default: "",
};

/// Comma-separated record fields required in addition to date, level and message.
pub const ADDITIONAL_LOG_ENTRY_VALUES: OptionKey = OptionKey {
    name: "additionalLogEntryValues",
    env: "HUMIO_ADDITIONAL_LOG_ENTRY_VALUES",
    property: "humio.additionalLogEntryValues",
    default: "EXCEPTION",
};

/// Comma-separated `key:value` pairs attached to every event.
pub const STATIC_FIELDS: OptionKey = OptionKey {
    name: "staticFields",
    env: "HUMIO_STATIC_FIELDS",
    property: "humio.staticFields",
    default: "",
};

/// Number of buffered events that triggers a flush.
pub const BATCH_ACTIONS: OptionKey = OptionKey {
    name: "batchActions",
    env: "HUMIO_BATCH_ACTIONS",
    property: "humio.batchActions",
    default: "1000",
};

/// Seconds between timed flushes.
pub const BATCH_FLUSH_INTERVAL: OptionKey = OptionKey {
    name: "batchFlushInterval",
    env: "HUMIO_FLUSH_INTERVAL",
    property: "humio.batchFlushInterval",
    default: "1",
};

/// Maximum number of events waiting in the engine queue.
pub const BATCH_BUFFER_LIMIT: OptionKey = OptionKey {
    name: "batchBufferLimit",
    env: "HUMIO_BUFFER_LIMIT",
    property: "humio.batchBufferLimit",
    default: "10000",
};

/// Upper bound, in milliseconds, of the random delay added to each timed flush.
pub const BATCH_JITTER_INTERVAL: OptionKey = OptionKey {
    name: "batchJitterInterval",
    env: "HUMIO_JITTER_INTERVAL",
    property: "humio.batchJitterInterval",
    default: "0",
};

/// Base URL of the Humio cluster.
pub const SERVER_ENDPOINT: OptionKey = OptionKey {
    name: "serverEndpoint",
    env: "HUMIO_SERVER_ENDPOINT",
    property: "humio.serverEndpoint",
    default: "https://cloud.humio.com",
};

/// Ingest path appended to the endpoint.
pub const URI: OptionKey = OptionKey {
    name: "uri",
    env: "HUMIO_URI",
    property: "humio.uri",
    default: "/api/v1/ingest/humio-structured",
};

/// Ingest token. Required.
pub const SERVER_TOKEN: OptionKey = OptionKey {
    name: "serverToken",
    env: "HUMIO_SERVER_TOKEN",
    property: "humio.serverToken",
    default: "",
};

/// Verbose diagnostics.
pub const DEBUG: OptionKey = OptionKey {
    name: "debug",
    env: "HUMIO_DEBUG",
    property: "humio.debug",
    default: "false",
};

/// All recognized options.
pub const ALL_OPTIONS: [OptionKey; 11] = [
    HOSTNAME,
    ADDITIONAL_LOG_ENTRY_VALUES,
    STATIC_FIELDS,
    BATCH_ACTIONS,
    BATCH_FLUSH_INTERVAL,
    BATCH_BUFFER_LIMIT,
    BATCH_JITTER_INTERVAL,
    SERVER_ENDPOINT,
    URI,
    SERVER_TOKEN,
    DEBUG,
];

/// Read an environment variable, treating unset, non-unicode and blank
/// values alike.
pub fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
