use serial_test::serial;
use std::collections::HashMap;
use std::env;
use tracing_humio::properties::{remove_property, set_property};
use tracing_humio::{ConfigError, WriterConfig};

fn explicit(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn clear() {
    for option in tracing_humio::env::ALL_OPTIONS {
        env::remove_var(option.env);
        remove_property(option.property);
    }
}

#[test]
#[serial]
fn explicit_map_beats_environment_and_properties() {
    clear();
    env::set_var("HUMIO_SERVER_TOKEN", "env-token");
    set_property("humio.serverToken", "prop-token");

    let config = WriterConfig::resolve(&explicit(&[("serverToken", "map-token"), ("hostname", "h")])).unwrap();
    assert_eq!(config.server_token, "map-token");
    clear();
}

#[test]
#[serial]
fn environment_beats_properties() {
    clear();
    env::set_var("HUMIO_SERVER_TOKEN", "env-token");
    env::set_var("HUMIO_FLUSH_INTERVAL", "9");
    set_property("humio.serverToken", "prop-token");
    set_property("humio.batchFlushInterval", "4");
    set_property("humio.batchActions", "25");

    let config = WriterConfig::resolve(&explicit(&[("hostname", "h")])).unwrap();
    assert_eq!(config.server_token, "env-token");
    assert_eq!(config.batch_flush_interval, std::time::Duration::from_secs(9));
    assert_eq!(config.batch_actions, 25);
    clear();
}

#[test]
#[serial]
fn missing_token_everywhere_fails() {
    clear();
    let err = WriterConfig::resolve(&explicit(&[("staticFields", "env:prod")])).unwrap_err();
    assert_eq!(err, ConfigError::MissingToken);
}

#[cfg(feature = "humio")]
#[test]
#[serial]
fn writer_construction_fails_fast_without_token() {
    clear();
    let err = tracing_humio::HumioWriter::from_properties(&HashMap::new()).unwrap_err();
    assert_eq!(err, ConfigError::MissingToken);
}

#[test]
#[serial]
fn hostname_from_environment() {
    clear();
    env::set_var("HUMIO_HOSTNAME", "env-host");
    let config = WriterConfig::resolve(&explicit(&[("serverToken", "t")])).unwrap();
    assert_eq!(config.hostname, "env-host");
    clear();
}
