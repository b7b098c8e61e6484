//! gmx demo agent.
//!
//! Publishes a few values and serves them until Ctrl-C:
//! - `demo.uptime.seconds`
//! - `demo.ticks` (counter, +1 per second)
//! - `demo.jitter` (gauge)
//!
//! Set `GMX_CONFIG` to a YAML config path to override defaults.

use std::time::{Duration, Instant};

use tracing_subscriber::{fmt, EnvFilter};

use gmx_agent::config::{self, AgentConfig};

#[tokio::main]
async fn main() -> gmx_core::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cfg = match std::env::var("GMX_CONFIG") {
        Ok(path) => config::load_from_file(&path)?,
        Err(_) => AgentConfig::default(),
    };

    let started = Instant::now();
    gmx_agent::publish("demo.uptime.seconds", move || started.elapsed().as_secs_f64());
    let ticks = gmx_agent::counter("demo.ticks");
    let jitter = gmx_agent::gauge("demo.jitter");

    let agent = gmx_agent::start(&cfg).await?;
    tracing::info!(endpoint = %agent.endpoint(), pid = std::process::id(), "gmx-agent started");

    let mut tick = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = tick.tick() => {
                ticks.inc();
                jitter.set((ticks.value() % 7) as i64 - 3);
            }
            res = tokio::signal::ctrl_c() => {
                res?;
                break;
            }
        }
    }

    agent.shutdown().await;
    Ok(())
}
