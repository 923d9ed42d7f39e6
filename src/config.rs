use crate::env::{self, OptionKey};
use crate::error::ConfigError;
use crate::event::RESERVED_ATTRIBUTES;
use crate::hostname;
use crate::properties;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const FIELD_SEPARATOR: char = ',';
const FIELD_VALUE_SEPARATOR: char = ':';

/// Record fields a writer can ask the logging front-end to capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogEntryValue {
    Date,
    Level,
    Message,
    Thread,
    Context,
    Class,
    Method,
    File,
    Line,
    Tag,
    Exception,
}

impl LogEntryValue {
    /// Fields every event carries regardless of configuration.
    pub const BASIC: [LogEntryValue; 3] = [LogEntryValue::Date, LogEntryValue::Level, LogEntryValue::Message];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogEntryValue::Date => "DATE",
            LogEntryValue::Level => "LEVEL",
            LogEntryValue::Message => "MESSAGE",
            LogEntryValue::Thread => "THREAD",
            LogEntryValue::Context => "CONTEXT",
            LogEntryValue::Class => "CLASS",
            LogEntryValue::Method => "METHOD",
            LogEntryValue::File => "FILE",
            LogEntryValue::Line => "LINE",
            LogEntryValue::Tag => "TAG",
            LogEntryValue::Exception => "EXCEPTION",
        }
    }
}

impl fmt::Display for LogEntryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogEntryValue {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = match s.trim().to_ascii_uppercase().as_str() {
            "DATE" => LogEntryValue::Date,
            "LEVEL" => LogEntryValue::Level,
            "MESSAGE" => LogEntryValue::Message,
            "THREAD" => LogEntryValue::Thread,
            "CONTEXT" => LogEntryValue::Context,
            "CLASS" => LogEntryValue::Class,
            "METHOD" => LogEntryValue::Method,
            "FILE" => LogEntryValue::File,
            "LINE" => LogEntryValue::Line,
            "TAG" => LogEntryValue::Tag,
            "EXCEPTION" => LogEntryValue::Exception,
            _ => return Err(ConfigError::UnknownLogEntryValue(s.trim().to_string())),
        };
        Ok(value)
    }
}

/// Fully resolved, immutable writer configuration.
///
/// Built once by [`ConfigResolver::resolve`]; every later construction
/// step (sink, engine) reads from it.
#[derive(Clone, PartialEq, Eq)]
pub struct WriterConfig {
    pub hostname: String,
    /// Basic fields plus the configured additional ones.
    pub required_values: BTreeSet<LogEntryValue>,
    pub static_fields: BTreeMap<String, String>,
    pub batch_actions: usize,
    pub batch_flush_interval: Duration,
    pub batch_buffer_limit: usize,
    pub batch_jitter_interval: Duration,
    pub server_endpoint: String,
    pub uri: String,
    pub server_token: String,
    pub debug: bool,
}

impl WriterConfig {
    /// Resolve against the real process environment and property store.
    pub fn resolve(explicit: &HashMap<String, String>) -> Result<Self, ConfigError> {
        ConfigResolver::default().resolve(explicit)
    }

    pub fn requires(&self, value: LogEntryValue) -> bool {
        self.required_values.contains(&value)
    }
}

impl fmt::Debug for WriterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriterConfig")
            .field("hostname", &self.hostname)
            .field("required_values", &self.required_values)
            .field("static_fields", &self.static_fields)
            .field("batch_actions", &self.batch_actions)
            .field("batch_flush_interval", &self.batch_flush_interval)
            .field("batch_buffer_limit", &self.batch_buffer_limit)
            .field("batch_jitter_interval", &self.batch_jitter_interval)
            .field("server_endpoint", &self.server_endpoint)
            .field("uri", &self.uri)
            .field("server_token", &"<redacted>")
            .field("debug", &self.debug)
            .finish()
    }
}

/// A named-value lookup used as one layer of the precedence chain.
pub trait Source: Send + Sync {
    /// Return the value for `key`, or `None` if absent or blank.
    fn lookup(&self, key: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct Environment;

impl Source for Environment {
    fn lookup(&self, key: &str) -> Option<String> {
        env::env_var(key)
    }
}

/// The process-wide [`properties`] store.
#[derive(Debug, Clone, Copy, Default)]
pub struct Properties;

impl Source for Properties {
    fn lookup(&self, key: &str) -> Option<String> {
        properties::property(key)
    }
}

impl Source for HashMap<String, String> {
    fn lookup(&self, key: &str) -> Option<String> {
        self.get(key).filter(|v| !v.trim().is_empty()).cloned()
    }
}

/// Merges the configuration layers into a [`WriterConfig`].
///
/// Precedence, applied identically to every option:
///
/// 1. the caller's explicit map, keyed by option name (`serverToken`);
/// 2. the environment, keyed by variable name (`HUMIO_SERVER_TOKEN`);
/// 3. the property store, keyed by property name (`humio.serverToken`);
/// 4. the compiled-in default.
///
/// Blank values count as absent in every layer.
pub struct ConfigResolver {
    env: Box<dyn Source>,
    properties: Box<dyn Source>,
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self {
            env: Box::new(Environment),
            properties: Box::new(Properties),
        }
    }
}

impl ConfigResolver {
    /// Replace the environment layer.
    pub fn with_env(mut self, env: impl Source + 'static) -> Self {
        self.env = Box::new(env);
        self
    }

    /// Replace the property layer.
    pub fn with_properties(mut self, properties: impl Source + 'static) -> Self {
        self.properties = Box::new(properties);
        self
    }

    /// Highest-precedence value for `key`.
    pub fn value(&self, explicit: &HashMap<String, String>, key: &OptionKey) -> String {
        explicit
            .lookup(key.name)
            .or_else(|| self.env.lookup(key.env))
            .or_else(|| self.properties.lookup(key.property))
            .unwrap_or_else(|| key.default.to_string())
    }

    pub fn resolve(&self, explicit: &HashMap<String, String>) -> Result<WriterConfig, ConfigError> {
        let server_token = self.value(explicit, &env::SERVER_TOKEN).trim().to_string();
        if server_token.is_empty() {
            return Err(ConfigError::MissingToken);
        }

        let mut required_values: BTreeSet<LogEntryValue> = LogEntryValue::BASIC.into_iter().collect();
        required_values.extend(parse_log_entry_values(&self.value(explicit, &env::ADDITIONAL_LOG_ENTRY_VALUES))?);

        let static_fields = parse_static_fields(&self.value(explicit, &env::STATIC_FIELDS))?;

        let config = WriterConfig {
            hostname: hostname::resolve(&self.value(explicit, &env::HOSTNAME)),
            required_values,
            static_fields,
            batch_actions: self.number(explicit, &env::BATCH_ACTIONS)? as usize,
            batch_flush_interval: Duration::from_secs(self.number(explicit, &env::BATCH_FLUSH_INTERVAL)?),
            batch_buffer_limit: self.number(explicit, &env::BATCH_BUFFER_LIMIT)? as usize,
            batch_jitter_interval: Duration::from_millis(self.number(explicit, &env::BATCH_JITTER_INTERVAL)?),
            server_endpoint: self.value(explicit, &env::SERVER_ENDPOINT).trim().to_string(),
            uri: self.value(explicit, &env::URI).trim().to_string(),
            server_token,
            debug: parse_bool(&env::DEBUG, &self.value(explicit, &env::DEBUG))?,
        };

        if config.debug {
            tracing::info!(config = ?config, "humio writer configuration resolved");
        }
        Ok(config)
    }

    fn number(&self, explicit: &HashMap<String, String>, key: &OptionKey) -> Result<u64, ConfigError> {
        let raw = self.value(explicit, key);
        raw.trim().parse::<u64>().map_err(|_| ConfigError::InvalidNumber {
            option: key.name,
            value: raw,
        })
    }
}

fn parse_bool(key: &OptionKey, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            option: key.name,
            value: raw.to_string(),
        }),
    }
}

/// Parse a comma-separated list of [`LogEntryValue`] names.
///
/// A blank string yields an empty set. [`ConfigResolver`] never passes one
/// in: a blank `additionalLogEntryValues` counts as absent and resolves to
/// the `EXCEPTION` default. Unknown names are an error.
pub fn parse_log_entry_values(raw: &str) -> Result<BTreeSet<LogEntryValue>, ConfigError> {
    if raw.trim().is_empty() {
        return Ok(BTreeSet::new());
    }
    raw.split(FIELD_SEPARATOR).map(str::parse).collect()
}

/// Parse `key:value` pairs separated by commas into the static tag set.
///
/// A blank string yields no tags. Every entry must contain exactly one
/// `:` with a non-empty key and value on either side; keys must be unique
/// and must not shadow a reserved event attribute.
pub fn parse_static_fields(raw: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    let mut fields = BTreeMap::new();
    if raw.trim().is_empty() {
        return Ok(fields);
    }

    for entry in raw.split(FIELD_SEPARATOR) {
        let malformed = |reason| ConfigError::MalformedStaticFields {
            entry: entry.to_string(),
            reason,
        };

        let mut parts = entry.split(FIELD_VALUE_SEPARATOR);
        let (key, value) = match (parts.next(), parts.next(), parts.next()) {
            (Some(key), Some(value), None) => (key.trim(), value.trim()),
            (_, None, _) => return Err(malformed("missing ':' between key and value")),
            (_, Some(_), Some(_)) => return Err(malformed("more than one ':'")),
            (None, _, _) => return Err(malformed("empty entry")),
        };
        if key.is_empty() {
            return Err(malformed("empty key"));
        }
        if value.is_empty() {
            return Err(malformed("empty value"));
        }
        if RESERVED_ATTRIBUTES.contains(&key) {
            return Err(ConfigError::ReservedStaticField(key.to_string()));
        }
        if fields.insert(key.to_string(), value.to_string()).is_some() {
            return Err(malformed("duplicate key"));
        }
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn isolated() -> ConfigResolver {
        ConfigResolver::default()
            .with_env(HashMap::new())
            .with_properties(HashMap::new())
    }

    #[test]
    fn explicit_token_resolves_with_defaults() {
        let config = isolated()
            .resolve(&map(&[("serverToken", "abc"), ("hostname", "web-1")]))
            .unwrap();

        assert_eq!(config.server_token, "abc");
        assert_eq!(config.hostname, "web-1");
        assert_eq!(config.batch_actions, 1000);
        assert_eq!(config.batch_flush_interval, Duration::from_secs(1));
        assert_eq!(config.batch_buffer_limit, 10_000);
        assert_eq!(config.batch_jitter_interval, Duration::ZERO);
        assert_eq!(config.server_endpoint, "https://cloud.humio.com");
        assert_eq!(config.uri, "/api/v1/ingest/humio-structured");
        assert!(!config.debug);
        assert!(config.static_fields.is_empty());
        assert!(config.requires(LogEntryValue::Exception));
        assert!(config.requires(LogEntryValue::Message));
        assert!(!config.requires(LogEntryValue::Thread));
    }

    #[test]
    fn missing_token_fails() {
        let err = isolated().resolve(&HashMap::new()).unwrap_err();
        assert_eq!(err, ConfigError::MissingToken);
    }

    #[test]
    fn blank_explicit_token_falls_through_to_env() {
        let config = isolated()
            .with_env(map(&[("HUMIO_SERVER_TOKEN", "from-env")]))
            .resolve(&map(&[("serverToken", "  "), ("hostname", "h")]))
            .unwrap();
        assert_eq!(config.server_token, "from-env");
    }

    #[test]
    fn blank_additional_values_keep_the_default() {
        let config = isolated()
            .resolve(&map(&[("serverToken", "t"), ("hostname", "h"), ("additionalLogEntryValues", " ")]))
            .unwrap();
        assert!(config.requires(LogEntryValue::Exception));
        assert_eq!(config.required_values.len(), LogEntryValue::BASIC.len() + 1);

        assert!(parse_log_entry_values("").unwrap().is_empty());
    }

    #[test]
    fn precedence_is_explicit_env_property_default() {
        let env = map(&[("HUMIO_BATCH_ACTIONS", "20"), ("HUMIO_BUFFER_LIMIT", "200")]);
        let props = map(&[
            ("humio.batchActions", "30"),
            ("humio.batchBufferLimit", "300"),
            ("humio.batchFlushInterval", "7"),
        ]);
        let explicit = map(&[("serverToken", "t"), ("hostname", "h"), ("batchActions", "10")]);

        let config = isolated()
            .with_env(env)
            .with_properties(props)
            .resolve(&explicit)
            .unwrap();

        assert_eq!(config.batch_actions, 10);
        assert_eq!(config.batch_buffer_limit, 200);
        assert_eq!(config.batch_flush_interval, Duration::from_secs(7));
        assert_eq!(config.batch_jitter_interval, Duration::ZERO);
    }

    #[test]
    fn token_from_property_layer() {
        let config = isolated()
            .with_properties(map(&[("humio.serverToken", "prop-token")]))
            .resolve(&map(&[("hostname", "h")]))
            .unwrap();
        assert_eq!(config.server_token, "prop-token");
    }

    #[test]
    fn non_numeric_option_names_the_option() {
        let err = isolated()
            .resolve(&map(&[("serverToken", "t"), ("hostname", "h"), ("batchFlushInterval", "soon")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidNumber {
                option: "batchFlushInterval",
                value: "soon".to_string()
            }
        );
    }

    #[test]
    fn debug_flag_parsing() {
        let resolver = isolated();
        let on = resolver
            .resolve(&map(&[("serverToken", "t"), ("hostname", "h"), ("debug", "TRUE")]))
            .unwrap();
        assert!(on.debug);

        let err = resolver
            .resolve(&map(&[("serverToken", "t"), ("hostname", "h"), ("debug", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { option: "debug", .. }));
    }

    #[test]
    fn static_fields_parse() {
        let fields = parse_static_fields("env:prod,region:us").unwrap();
        assert_eq!(fields, BTreeMap::from([
            ("env".to_string(), "prod".to_string()),
            ("region".to_string(), "us".to_string()),
        ]));
    }

    #[test]
    fn static_fields_blank_is_empty() {
        assert!(parse_static_fields("").unwrap().is_empty());
        assert!(parse_static_fields("   ").unwrap().is_empty());
    }

    #[test]
    fn static_fields_missing_separator_fails() {
        let err = parse_static_fields("env:prod,broken").unwrap_err();
        assert!(matches!(err, ConfigError::MalformedStaticFields { ref entry, .. } if entry == "broken"));
    }

    #[test]
    fn static_fields_extra_separator_fails() {
        let err = parse_static_fields("url:http://x").unwrap_err();
        assert!(matches!(err, ConfigError::MalformedStaticFields { .. }));
    }

    #[test]
    fn static_fields_empty_parts_fail() {
        assert!(parse_static_fields("env:").is_err());
        assert!(parse_static_fields(":prod").is_err());
        assert!(parse_static_fields("env:prod,").is_err());
        assert!(parse_static_fields("env:prod,env:dev").is_err());
    }

    #[test]
    fn static_fields_reject_reserved_keys() {
        let err = parse_static_fields("env:prod,hostname:other").unwrap_err();
        assert_eq!(err, ConfigError::ReservedStaticField("hostname".to_string()));
    }

    #[test]
    fn log_entry_values_parse() {
        let values = parse_log_entry_values("thread, line,EXCEPTION").unwrap();
        assert_eq!(
            values,
            BTreeSet::from([LogEntryValue::Thread, LogEntryValue::Line, LogEntryValue::Exception])
        );
        assert!(parse_log_entry_values("").unwrap().is_empty());
    }

    #[test]
    fn unknown_log_entry_value_fails() {
        let err = parse_log_entry_values("EXCEPTION,STACK").unwrap_err();
        assert_eq!(err, ConfigError::UnknownLogEntryValue("STACK".to_string()));
    }

    #[test]
    fn debug_output_redacts_token() {
        let config = isolated()
            .resolve(&map(&[("serverToken", "secret-token"), ("hostname", "h")]))
            .unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("<redacted>"));
    }
}
