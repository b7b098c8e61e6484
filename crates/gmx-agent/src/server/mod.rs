//! Local server: accept loop, per-connection handlers, shutdown.
//!
//! Each accepted connection runs in its own task on the multi-threaded
//! runtime. Handlers only meet at the registry lock. A failed accept is logged
//! and retried after a short pause. Shutdown stops the accept loop, closes
//! the listener (removing a unix socket file) and then aborts and joins every
//! handler, so none outlives the listener.

mod conn;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use gmx_core::error::Result;
use gmx_core::protocol::PROTOCOL_VERSION;
use gmx_core::{Endpoint, EndpointName};

use crate::config::AgentConfig;
use crate::producers;
use crate::registry::Registry;
use crate::transport::{self, LocalListener};

pub use conn::answer;

/// Pause after a failed accept before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Per-connection limits.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServeOptions {
    pub idle_timeout: Option<Duration>,
    pub max_connections: Option<usize>,
}

/// Handle to a running local server.
///
/// Call [`Agent::shutdown`] for a clean stop. Dropping the handle also stops
/// the server, without waiting for handlers to finish.
pub struct Agent {
    endpoint: Endpoint,
    registry: Arc<Registry>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl Agent {
    /// Bind this process's endpoint per `cfg` and start serving `registry`.
    pub async fn start(registry: Arc<Registry>, cfg: &AgentConfig) -> Result<Agent> {
        cfg.validate()?;
        let section = &cfg.agent;
        let name = EndpointName::new(std::process::id(), PROTOCOL_VERSION);
        let listener = transport::bind(section.transport, &section.socket_dir(), name).await?;

        if section.publish_cpu_time {
            producers::publish_cpu_time(&registry);
        }

        let opts = ServeOptions {
            idle_timeout: section.idle_timeout(),
            max_connections: section.max_connections,
        };
        Ok(Agent::serve(registry, listener, opts))
    }

    /// Serve `registry` on an already bound listener.
    ///
    /// Publishes the reserved `keys` and `os.args` producers first. Must be
    /// called within a tokio runtime.
    pub fn serve(
        registry: Arc<Registry>,
        listener: Box<dyn LocalListener>,
        opts: ServeOptions,
    ) -> Agent {
        producers::publish_reserved(&registry);

        let endpoint = listener.endpoint().clone();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&registry),
            opts,
            shutdown_rx,
        ));

        info!(%endpoint, "gmx: serving");
        Agent {
            endpoint,
            registry,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Stop accepting, close the endpoint and wait for every handler to end.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "gmx: accept loop ended abnormally");
            }
        }
        info!(endpoint = %self.endpoint, "gmx: shut down");
    }
}

impl Drop for Agent {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        // aborting drops the listener and the handler set, which aborts every handler
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn accept_loop(
    listener: Box<dyn LocalListener>,
    registry: Arc<Registry>,
    opts: ServeOptions,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut handlers = JoinSet::new();

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,

            // reap finished handlers so the set tracks live connections only
            Some(_) = handlers.join_next(), if !handlers.is_empty() => {}

            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(a) => a,
                    Err(e) => {
                        // usually transient (fd exhaustion, aborted handshake)
                        error!(error = %e, "gmx: accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                        continue;
                    }
                };

                if let Some(max) = opts.max_connections {
                    while handlers.try_join_next().is_some() {}
                    if handlers.len() >= max {
                        warn!(%peer, max, "gmx: rejecting connection, at capacity");
                        continue;
                    }
                }

                debug!(%peer, "gmx: client connected");
                handlers.spawn(conn::serve_connection(
                    Arc::clone(&registry),
                    stream,
                    peer,
                    opts.idle_timeout,
                ));
            }
        }
    }

    drop(listener);
    handlers.shutdown().await;
}
