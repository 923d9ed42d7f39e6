use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::error;

use tracing_humio::config::ConfigResolver;
use tracing_humio::init::{init_tracing_with_config, LayerConfig};
use tracing_humio::noop_sink::NoopSink;
use tracing_humio::sink::Sink;
use tracing_humio::HumioWriter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let explicit: HashMap<String, String> = [("serverToken", "load-test"), ("batchBufferLimit", "200000")]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let config = ConfigResolver::default().resolve(&explicit)?;

    let writer = Arc::new(HumioWriter::with_sink_factory(config, |_| {
        Ok(Arc::new(NoopSink) as Arc<dyn Sink>)
    }));

    init_tracing_with_config(
        Arc::clone(&writer),
        LayerConfig {
            enable_stdout: false,
            ..LayerConfig::default()
        },
    )?;

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "default load test error");
    }

    let elapsed = start.elapsed();
    writer.close();
    println!("sent {} events in {:?} (~{:.0} ev/s), stats: {:?}, rejected: {}",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64(),
        writer.stats(),
        writer.rejected()
    );
    Ok(())
}
