//! gmx agent: in-process registry and local query server.
//!
//! A host process registers producers (zero-argument functions returning a
//! `Value`) under string keys, then starts the agent. Local clients connect
//! to the per-process endpoint and ask for keys by name; each request is
//! answered with the current value of every known key.
//!
//! ```no_run
//! # async fn run() -> gmx_core::Result<()> {
//! let requests = gmx_agent::counter("http.requests");
//! gmx_agent::publish("build.version", || env!("CARGO_PKG_VERSION"));
//!
//! let agent = gmx_agent::start(&gmx_agent::config::AgentConfig::default()).await?;
//! requests.inc();
//! agent.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod global;
pub mod instrument;
pub mod producers;
pub mod registry;
pub mod server;
pub mod transport;

pub use global::{counter, gauge, publish, registry, start};
pub use instrument::{Counter, Gauge};
pub use registry::{Producer, Registry};
pub use server::{Agent, ServeOptions};
