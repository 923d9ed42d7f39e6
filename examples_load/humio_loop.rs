//! Logs once every half second and raises an error every hundredth
//! iteration. Needs `HUMIO_SERVER_TOKEN` (and usually
//! `HUMIO_SERVER_ENDPOINT`) in the environment.

use std::collections::HashMap;
use std::thread::sleep;
use std::time::Duration;
use tracing::{error, info};

use tracing_humio::init::init_tracing;

#[derive(Debug)]
struct LoopError(u32);

impl std::fmt::Display for LoopError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "runtime error i={}", self.0)
    }
}

impl std::error::Error for LoopError {}

fn step(i: u32) -> Result<(), LoopError> {
    info!("loop {}", i);
    sleep(Duration::from_millis(500));
    if i % 100 == 0 {
        return Err(LoopError(i));
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut explicit = HashMap::new();
    explicit.insert("additionalLogEntryValues".to_string(), "THREAD,CLASS,FILE,LINE,EXCEPTION".to_string());
    let writer = init_tracing(&explicit)?;

    for i in 0..1000 {
        if let Err(e) = step(i) {
            error!(error = &e as &(dyn std::error::Error + 'static), "{}", e);
        }
    }

    writer.close();
    Ok(())
}
