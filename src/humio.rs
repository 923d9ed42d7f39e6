use crate::config::WriterConfig;
use crate::event::Event;
use crate::sink::{Payload, Sink, SinkError};
use async_trait::async_trait;
use chrono::{SecondsFormat, TimeZone, Utc};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for [`HumioSink`].
#[derive(Clone)]
pub struct HumioConfig {
    /// Base URL without path, e.g. "https://cloud.humio.com"
    pub endpoint: String,
    /// Ingest path, e.g. "/api/v1/ingest/humio-structured"
    pub uri: String,
    pub token: String,
    /// Tags sent with every payload.
    pub tags: BTreeMap<String, String>,
    pub debug: bool,
}

impl From<&WriterConfig> for HumioConfig {
    fn from(config: &WriterConfig) -> Self {
        Self {
            endpoint: config.server_endpoint.clone(),
            uri: config.uri.clone(),
            token: config.server_token.clone(),
            tags: config.static_fields.clone(),
            debug: config.debug,
        }
    }
}

/// Humio implementation of [`Sink`] using the structured ingest API.
#[derive(Clone)]
pub struct HumioSink {
    client: Client,
    config: HumioConfig,
}

impl HumioSink {
    /// Construct a new sink instance using the provided configuration.
    ///
    /// **Returns**
    /// - A ready-to-use [`HumioSink`].
    /// - `Err(..)` if the HTTP client could not be built (TLS backend
    ///   initialization failure).
    pub fn new(config: HumioConfig) -> Result<Self, SinkError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, config })
    }

    pub fn from_writer_config(config: &WriterConfig) -> Result<Self, SinkError> {
        Self::new(HumioConfig::from(config))
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.uri.trim_start_matches('/')
        )
    }

    fn map_event(event: &Event) -> HumioEvent<'_> {
        let timestamp = event
            .timestamp_millis()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
            .unwrap_or_else(Utc::now)
            .to_rfc3339_opts(SecondsFormat::Millis, true);
        HumioEvent {
            timestamp,
            attributes: event.attributes(),
        }
    }

    fn body(payload: &Payload) -> Vec<HumioRequest<'_>> {
        vec![HumioRequest {
            tags: &payload.tags,
            events: payload.events.iter().map(Self::map_event).collect(),
        }]
    }
}

#[derive(Serialize)]
struct HumioRequest<'a> {
    tags: &'a BTreeMap<String, String>,
    events: Vec<HumioEvent<'a>>,
}

#[derive(Serialize)]
struct HumioEvent<'a> {
    timestamp: String,
    attributes: &'a BTreeMap<String, Value>,
}

#[async_trait]
impl Sink for HumioSink {
    fn to_payload(&self, events: Vec<Event>) -> Payload {
        Payload {
            tags: self.config.tags.clone(),
            events,
        }
    }

    async fn write(&self, payload: &Payload) -> Result<(), SinkError> {
        if payload.is_empty() {
            return Ok(());
        }
        let body = serde_json::to_vec(&Self::body(payload))?;
        let resp = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.token)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?;

        if resp.status().is_success() {
            if self.config.debug {
                tracing::debug!(events = payload.len(), status = %resp.status(), "humio batch delivered");
            }
            Ok(())
        } else {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
            Err(format!("Humio ingest failed with status {}: {}", status, text).into())
        }
    }
}
