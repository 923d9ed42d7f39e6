use crate::error::InitError;
use crate::layer::HumioLayer;
use crate::writer::HumioWriter;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::Registry;

#[cfg(feature = "humio")]
use std::collections::HashMap;

/// Subscriber settings on top of the writer's own configuration.
///
/// **Fields**
/// - `level`: least severe level forwarded to the writer (and printed).
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt::Layer` is
///   stacked on top of [`HumioLayer`] so events also reach the console.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub level: Level,
    pub enable_stdout: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            enable_stdout: true,
        }
    }
}

/// Install `writer` as part of the global `tracing` subscriber.
///
/// **Parameters**
/// - `writer`: the writer events are forwarded to. The caller keeps its
///   own handle for [`HumioWriter::flush`] and [`HumioWriter::close`].
/// - `config`: [`LayerConfig`] controlling level and console output.
///
/// **Errors**
///
/// [`InitError::Subscriber`] if a global subscriber is already installed.
pub fn init_tracing_with_config(writer: Arc<HumioWriter>, config: LayerConfig) -> Result<(), InitError> {
    let layer = HumioLayer::new(writer).with_level(config.level);

    // Both variants need their own concrete subscriber type.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer().with_filter(LevelFilter::from_level(config.level));
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber).map_err(|e| InitError::Subscriber(e.to_string()))
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber).map_err(|e| InitError::Subscriber(e.to_string()))
    }
}

/// Resolve configuration, build a Humio writer and install it with
/// [`LayerConfig::default`].
///
/// **Parameters**
/// - `explicit`: caller-supplied options (`serverToken`, `staticFields`,
///   ...), which win over environment variables and properties.
///
/// **Returns**
///
/// The writer handle. Keep it and call [`HumioWriter::close`] before the
/// process exits so buffered events are delivered.
#[cfg(feature = "humio")]
pub fn init_tracing(explicit: &HashMap<String, String>) -> Result<Arc<HumioWriter>, InitError> {
    let writer = Arc::new(HumioWriter::from_properties(explicit)?);
    init_tracing_with_config(Arc::clone(&writer), LayerConfig::default())?;
    Ok(writer)
}
