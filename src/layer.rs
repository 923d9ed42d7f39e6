use crate::batch::WORKER_THREAD;
use crate::config::LogEntryValue;
use crate::record::{ExceptionInfo, LogRecord, SourceLocation, ThreadInfo};
use crate::writer::{self, HumioWriter};
use chrono::Utc;
use std::error::Error;
use std::fmt::Write as _;
use std::sync::{Arc, OnceLock};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Rust threads have no scheduling priority; every thread reports the
/// conventional "normal" one.
pub const NORMAL_PRIORITY: i32 = 5;

/// Targets whose events are never forwarded: this crate's own diagnostics
/// and the HTTP stack used for delivery.
const IGNORED_TARGETS: [&str; 6] = ["tracing_humio", "reqwest", "hyper", "hyper_util", "h2", "rustls"];

/// `tracing_subscriber` layer that turns events into [`LogRecord`]s and
/// writes them through a [`HumioWriter`].
///
/// Which optional parts of a record are captured (thread, source
/// location, error) follows the writer's required log entry values. Write
/// failures are counted by the writer and never reach the caller.
pub struct HumioLayer {
    writer: Arc<HumioWriter>,
    level: Level,
    capture_thread: bool,
    capture_class: bool,
    capture_file: bool,
    capture_line: bool,
    capture_exception: bool,
}

impl HumioLayer {
    pub fn new(writer: Arc<HumioWriter>) -> Self {
        let required = writer.required_log_entry_values();
        Self {
            level: Level::INFO,
            capture_thread: required.contains(&LogEntryValue::Thread),
            capture_class: required.contains(&LogEntryValue::Class),
            capture_file: required.contains(&LogEntryValue::File),
            capture_line: required.contains(&LogEntryValue::Line),
            capture_exception: required.contains(&LogEntryValue::Exception),
            writer,
        }
    }

    /// Ignore events less severe than `level`.
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn writer(&self) -> &Arc<HumioWriter> {
        &self.writer
    }

    fn thread_info(&self) -> Option<ThreadInfo> {
        if !self.capture_thread {
            return None;
        }
        let thread = std::thread::current();
        Some(ThreadInfo {
            name: thread.name().unwrap_or("<unnamed>").to_string(),
            group: process_name().to_string(),
            priority: NORMAL_PRIORITY,
        })
    }

    fn source_location(&self, meta: &tracing::Metadata<'_>) -> SourceLocation {
        SourceLocation {
            class_name: self
                .capture_class
                .then(|| meta.module_path().unwrap_or_else(|| meta.target()).to_string()),
            // `tracing` metadata does not carry the function name.
            method_name: None,
            file_name: meta.file().filter(|_| self.capture_file).map(str::to_string),
            line_number: meta.line().filter(|_| self.capture_line),
        }
    }
}

fn is_ignored(target: &str) -> bool {
    IGNORED_TARGETS.iter().any(|ignored| {
        target
            .strip_prefix(ignored)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
    })
}

/// Events raised by the engine thread (a sink that logs) or while a
/// submission is already running on this thread would feed the writer back
/// into itself.
fn is_reentrant() -> bool {
    writer::is_submitting() || std::thread::current().name() == Some(WORKER_THREAD)
}

fn process_name() -> &'static str {
    static NAME: OnceLock<String> = OnceLock::new();
    NAME.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|path| path.file_stem().map(|stem| stem.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "main".to_string())
    })
}

impl<S> Layer<S> for HumioLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if *meta.level() > self.level || is_ignored(meta.target()) || is_reentrant() {
            return;
        }

        let mut visitor = FieldVisitor::new(self.capture_exception);
        event.record(&mut visitor);

        let record = LogRecord {
            timestamp: Utc::now(),
            level: meta.level().into(),
            message: visitor.message(),
            thread: self.thread_info(),
            source: self.source_location(meta),
            exception: visitor.exception,
        };

        // Rejections are already counted by the writer.
        let _ = self.writer.write(&record);
    }
}

/// Collects an event's fields into a message and, optionally, the first
/// recorded error.
pub struct FieldVisitor {
    message: Option<String>,
    fields: String,
    capture_exception: bool,
    exception: Option<ExceptionInfo>,
}

impl FieldVisitor {
    pub fn new(capture_exception: bool) -> Self {
        Self {
            message: None,
            fields: String::new(),
            capture_exception,
            exception: None,
        }
    }

    /// The `message` field followed by every other field as `key=value`.
    pub fn message(&self) -> String {
        match &self.message {
            Some(message) if self.fields.is_empty() => message.clone(),
            Some(message) => format!("{} {}", message, self.fields),
            None => self.fields.clone(),
        }
    }

    pub fn exception(&self) -> Option<&ExceptionInfo> {
        self.exception.as_ref()
    }

    fn push_field(&mut self, field: &Field, value: std::fmt::Arguments<'_>) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{}={}", field.name(), value);
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.push_field(field, format_args!("{value}"));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push_field(field, format_args!("{value}"));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push_field(field, format_args!("{value}"));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push_field(field, format_args!("{value}"));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn Error + 'static)) {
        if self.capture_exception && self.exception.is_none() {
            self.exception = Some(ExceptionInfo::from_dyn(value));
        }
        self.push_field(field, format_args!("{value}"));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        } else {
            self.push_field(field, format_args!("{:?}", value));
        }
    }
}
