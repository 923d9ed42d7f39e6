use crate::record::{LogRecord, UNKNOWN_METHOD};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

pub const TIMESTAMP: &str = "timestamp";
pub const MESSAGE: &str = "message";
pub const HOSTNAME: &str = "hostname";
pub const LEVEL: &str = "level";
pub const THREAD_NAME: &str = "threadName";
pub const THREAD_GROUP: &str = "threadGroup";
pub const THREAD_PRIORITY: &str = "threadPriority";
pub const SOURCE_CLASS_NAME: &str = "sourceClassName";
pub const SOURCE_METHOD_NAME: &str = "sourceMethodName";
pub const SOURCE_FILE_NAME: &str = "sourceFileName";
pub const SOURCE_LINE_NUMBER: &str = "sourceLineNumber";
pub const EXCEPTION_CLASS: &str = "exceptionClass";
pub const EXCEPTION_MESSAGE: &str = "exceptionMessage";
pub const EXCEPTION_STACK_TRACE: &str = "exceptionStackTrace";

/// Attribute names derived from the record; static fields may not use them.
pub const RESERVED_ATTRIBUTES: [&str; 14] = [
    TIMESTAMP,
    MESSAGE,
    HOSTNAME,
    LEVEL,
    THREAD_NAME,
    THREAD_GROUP,
    THREAD_PRIORITY,
    SOURCE_CLASS_NAME,
    SOURCE_METHOD_NAME,
    SOURCE_FILE_NAME,
    SOURCE_LINE_NUMBER,
    EXCEPTION_CLASS,
    EXCEPTION_MESSAGE,
    EXCEPTION_STACK_TRACE,
];

/// Normalized, flat form of a [`LogRecord`], ready for batching.
///
/// Keys are unique; setting an existing key replaces its value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Event {
    attributes: BTreeMap<String, Value>,
}

impl Event {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    /// Milliseconds since the epoch, if the event carries a timestamp.
    pub fn timestamp_millis(&self) -> Option<i64> {
        self.get(TIMESTAMP).and_then(Value::as_i64)
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// Turn one record into an [`Event`].
///
/// Total over every record: optional parts that are missing are simply
/// left out. Static fields are applied last.
pub fn adapt(record: &LogRecord, hostname: &str, static_fields: &BTreeMap<String, String>) -> Event {
    let mut event = Event::new();
    event
        .set(TIMESTAMP, record.timestamp.timestamp_millis())
        .set(MESSAGE, record.message.as_str())
        .set(HOSTNAME, hostname)
        .set(LEVEL, record.level.as_str());

    if let Some(thread) = &record.thread {
        event
            .set(THREAD_NAME, thread.name.as_str())
            .set(THREAD_GROUP, thread.group.as_str())
            .set(THREAD_PRIORITY, thread.priority);
    }

    let source = &record.source;
    if let Some(class_name) = &source.class_name {
        event.set(SOURCE_CLASS_NAME, class_name.as_str());
    }
    if let Some(method_name) = source.method_name.as_deref().filter(|m| *m != UNKNOWN_METHOD) {
        event.set(SOURCE_METHOD_NAME, method_name);
    }
    if let Some(file_name) = &source.file_name {
        event.set(SOURCE_FILE_NAME, file_name.as_str());
    }
    if let Some(line) = source.line_number {
        event.set(SOURCE_LINE_NUMBER, line);
    }

    if let Some(exception) = &record.exception {
        let stack_trace: String = exception
            .frames
            .iter()
            .map(|frame| format!("{frame}\n"))
            .collect();
        event
            .set(EXCEPTION_CLASS, exception.class_name.as_str())
            .set(EXCEPTION_MESSAGE, exception.message.as_str())
            .set(EXCEPTION_STACK_TRACE, stack_trace);
    }

    for (key, value) in static_fields {
        event.set(key.as_str(), value.as_str());
    }
    event
}
