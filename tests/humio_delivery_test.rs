#![cfg(feature = "humio")]

mod common;

use common::config;
use mockito::{Matcher, Server};
use tracing_humio::record::{Level, LogRecord};
use tracing_humio::humio::{HumioConfig, HumioSink};
use tracing_humio::{Event, HumioWriter, Sink};

#[test]
fn delivers_structured_payload_with_bearer_token() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/api/v1/ingest/humio-structured")
        .match_header("authorization", "Bearer test-token")
        .match_header("content-type", "application/json")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#""tags":\{"env":"prod"\}"#.to_string()),
            Matcher::Regex(r#""message":"payment accepted""#.to_string()),
            Matcher::Regex(r#""hostname":"test-host""#.to_string()),
        ]))
        .with_status(200)
        .expect(1)
        .create();

    let writer = HumioWriter::new(config(&[
        ("serverEndpoint", server.url().as_str()),
        ("staticFields", "env:prod"),
    ]));
    writer.write(&LogRecord::new(Level::Info, "payment accepted")).unwrap();
    writer.close();

    mock.assert();
    let stats = writer.stats().unwrap();
    assert_eq!(stats.delivered, 1);
    assert_eq!(stats.failed_batches, 0);
}

#[test]
fn rejected_batch_is_retried_then_counted() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/ingest")
        .with_status(503)
        .with_body("unavailable")
        .expect(3)
        .create();

    let writer = HumioWriter::new(config(&[("serverEndpoint", server.url().as_str()), ("uri", "/ingest")]));
    writer.write(&LogRecord::new(Level::Error, "lost")).unwrap();
    writer.close();

    mock.assert();
    let stats = writer.stats().unwrap();
    assert_eq!(stats.delivered, 0);
    assert_eq!(stats.failed_batches, 1);
}

#[test]
fn flush_before_first_write_sends_nothing() {
    let mut server = Server::new();
    let mock = server.mock("POST", Matcher::Any).expect(0).create();

    let writer = HumioWriter::new(config(&[("serverEndpoint", server.url().as_str())]));
    writer.flush();
    writer.close();

    mock.assert();
    assert!(writer.stats().is_none());
}

#[tokio::test]
async fn sink_reports_status_and_body_on_failure() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/v1/ingest/humio-structured")
        .with_status(401)
        .with_body("invalid token")
        .create_async()
        .await;

    let sink = HumioSink::new(HumioConfig {
        endpoint: server.url(),
        uri: "/api/v1/ingest/humio-structured".to_string(),
        token: "wrong".to_string(),
        tags: Default::default(),
        debug: false,
    })
    .unwrap();
    let mut event = Event::new();
    event.set("message", "hello");
    let payload = sink.to_payload(vec![event]);

    let err = sink.write(&payload).await.unwrap_err().to_string();
    assert!(err.contains("401"), "{err}");
    assert!(err.contains("invalid token"), "{err}");
    mock.assert_async().await;
}
