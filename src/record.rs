use chrono::{DateTime, Utc};
use serde::Serialize;
use std::error::Error;
use std::fmt;

/// Method name reported by front-ends that could not determine it.
pub const UNKNOWN_METHOD: &str = "<unknown>";

/// Crate prefixes whose frames belong to the logging machinery rather than
/// to the code that raised the error.
/// Crates whose frames sit between the logging call and the capture.
const MACHINERY_CRATES: [&str; 5] = [
    "backtrace::",
    "tracing_humio::",
    "tracing::",
    "tracing_core::",
    "tracing_subscriber::",
];

/// Standard library frames interleaved with the machinery (thread-local
/// access, closure shims).
const RUNTIME_CRATES: [&str; 3] = ["std::", "core::", "alloc::"];

/// Severity of a [`LogRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&tracing::Level> for Level {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            _ => Level::Error,
        }
    }
}

/// One structured log entry handed to the writer by the logging front-end.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub message: String,
    pub thread: Option<ThreadInfo>,
    pub source: SourceLocation,
    pub exception: Option<ExceptionInfo>,
}

impl LogRecord {
    /// A record stamped with the current time and no optional parts.
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            thread: None,
            source: SourceLocation::default(),
            exception: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadInfo {
    pub name: String,
    pub group: String,
    pub priority: i32,
}

/// Where the record was emitted. Every part is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub class_name: Option<String>,
    /// May carry [`UNKNOWN_METHOD`], which is treated as absent.
    pub method_name: Option<String>,
    pub file_name: Option<String>,
    pub line_number: Option<u32>,
}

/// An error attached to a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExceptionInfo {
    /// Fully qualified type name.
    pub class_name: String,
    pub message: String,
    /// Innermost frame first.
    pub frames: Vec<StackFrame>,
}

impl ExceptionInfo {
    /// Describe a statically typed error, capturing the current stack.
    pub fn of<E: Error + 'static>(err: &E) -> Self {
        Self {
            class_name: std::any::type_name::<E>().to_string(),
            message: error_chain(err),
            frames: StackFrame::capture(),
        }
    }

    /// Describe a type-erased error, capturing the current stack.
    ///
    /// The concrete type is gone behind `dyn Error`, so the class name is
    /// taken from the head of the error's `Debug` form.
    pub fn from_dyn(err: &(dyn Error + 'static)) -> Self {
        Self {
            class_name: debug_type_name(err),
            message: error_chain(err),
            frames: StackFrame::capture(),
        }
    }
}

fn error_chain(err: &(dyn Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn debug_type_name(err: &(dyn Error + 'static)) -> String {
    let rendered = format!("{err:?}");
    let head: String = rendered
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == ':')
        .collect();
    if head.is_empty() {
        "Error".to_string()
    } else {
        head
    }
}

/// One frame of an error's stack, rendered as `type.method(file:line)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackFrame {
    pub type_name: String,
    pub method: String,
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl StackFrame {
    pub fn new(type_name: impl Into<String>, method: impl Into<String>, file: Option<&str>, line: Option<u32>) -> Self {
        Self {
            type_name: type_name.into(),
            method: method.into(),
            file: file.map(str::to_string),
            line,
        }
    }

    /// Capture the calling stack, innermost first, without the frames of
    /// the logging machinery itself.
    pub fn capture() -> Vec<StackFrame> {
        let trace = backtrace::Backtrace::new();
        trace
            .frames()
            .iter()
            .flat_map(|frame| frame.symbols())
            .filter_map(|symbol| {
                let name = format!("{:#}", symbol.name()?);
                let (type_name, method) = match name.rsplit_once("::") {
                    Some((type_name, method)) => (type_name.to_string(), method.to_string()),
                    None => (String::new(), name.clone()),
                };
                Some(StackFrame {
                    type_name,
                    method,
                    file: symbol.filename().map(|p| p.display().to_string()),
                    line: symbol.lineno(),
                })
            })
            .skip_while(|frame| frame.is_machinery() || frame.is_runtime())
            .collect()
    }

    /// Either side of a `<Type as Trait>` path belongs to a machinery crate.
    fn is_machinery(&self) -> bool {
        MACHINERY_CRATES
            .iter()
            .any(|krate| mentions_crate(&self.type_name, krate))
    }

    /// The implementing type lives in the standard library, or the frame is
    /// a closure call shim.
    fn is_runtime(&self) -> bool {
        if mentions_crate(&self.type_name, "core::ops::function::") {
            return true;
        }
        let self_type = self
            .type_name
            .trim_start_matches(['<', '&'])
            .trim_start_matches("mut ")
            .trim_start_matches("dyn ");
        RUNTIME_CRATES.iter().any(|krate| self_type.starts_with(krate))
    }
}

/// `krate` (e.g. `"tracing::"`) appears as a whole path segment, so
/// `tracing::` matches `<&T as tracing::Value>` but not `my_tracing::x`.
fn mentions_crate(path: &str, krate: &str) -> bool {
    path.match_indices(krate).any(|(at, _)| {
        !path[..at]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
    })
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}({}:{})",
            self.type_name,
            self.method,
            self.file.as_deref().unwrap_or("unknown"),
            self.line.unwrap_or(0)
        )
    }
}
