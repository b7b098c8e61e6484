use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use gmx_core::error::{GmxError, Result};
use gmx_core::protocol::{Request, Response};

use crate::registry::Registry;
use crate::transport::{BoxedStream, Connection};

/// Serve requests on one connection until it closes or misbehaves.
///
/// Request N's response is fully written before request N+1 is read.
/// Producers run on the blocking pool, so a slow one delays only the
/// response it belongs to.
pub(crate) async fn serve_connection(
    registry: Arc<Registry>,
    stream: BoxedStream,
    peer: String,
    idle_timeout: Option<Duration>,
) {
    let mut conn = Connection::new(stream);

    loop {
        let request = match next_request(&mut conn, idle_timeout).await {
            Ok(Some(req)) => req,
            Ok(None) => {
                debug!(%peer, "gmx: client disconnected");
                return;
            }
            Err(GmxError::Malformed(reason)) => {
                warn!(%peer, %reason, "gmx: client sent invalid request");
                return;
            }
            Err(e) => {
                debug!(%peer, error = %e, "gmx: connection closed");
                return;
            }
        };

        // producers may block; keep them off the async workers
        let reg = Arc::clone(&registry);
        let response = match tokio::task::spawn_blocking(move || answer(&reg, &request)).await {
            Ok(r) => r,
            Err(e) => {
                warn!(%peer, error = %e, "gmx: producer task failed");
                return;
            }
        };

        if let Err(e) = conn.send(&response).await {
            warn!(%peer, error = %e, "gmx: could not send response");
            return;
        }
    }
}

async fn next_request(
    conn: &mut Connection,
    idle_timeout: Option<Duration>,
) -> Result<Option<Request>> {
    let Some(limit) = idle_timeout else {
        return conn.recv().await;
    };
    match tokio::time::timeout(limit, conn.recv()).await {
        Ok(res) => res,
        Err(_) => {
            debug!(?limit, "gmx: idle timeout");
            Ok(None)
        }
    }
}

/// Evaluate `request` against `registry`.
///
/// Unknown keys, null results and values JSON cannot carry (NaN and other
/// non-finite floats) are left out. A key repeated in one request is
/// evaluated once.
pub fn answer(registry: &Registry, request: &[String]) -> Response {
    let mut response = Response::new();
    for key in request {
        if response.contains_key(key) {
            continue;
        }
        let Some(producer) = registry.lookup(key) else {
            continue;
        };
        let value = producer();
        if value.is_null() {
            continue;
        }
        if !value.is_representable() {
            warn!(%key, "gmx: got NaN or infinite value, omitting");
            continue;
        }
        response.insert(key.clone(), value);
    }
    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use gmx_core::Value;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn keys(ks: &[&str]) -> Vec<String> {
        ks.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn unknown_keys_are_omitted() {
        let reg = Registry::new();
        reg.register("answer", || 42);
        let resp = answer(&reg, &keys(&["answer", "missing"]));
        assert_eq!(resp.len(), 1);
        assert_eq!(resp["answer"], Value::Int(42));
    }

    #[test]
    fn null_and_nan_are_omitted() {
        let reg = Registry::new();
        reg.register("none", || Value::Null);
        reg.register("opt", || None::<i64>);
        reg.register("nan", || f64::NAN);
        reg.register("inf", || vec![f64::INFINITY]);
        reg.register("ok", || 1.5);
        let resp = answer(&reg, &keys(&["none", "opt", "nan", "inf", "ok"]));
        assert_eq!(resp.keys().collect::<Vec<_>>(), vec!["ok"]);
    }

    #[test]
    fn repeated_key_invokes_producer_once() {
        let reg = Registry::new();
        let calls = Arc::new(AtomicU64::new(0));
        let c = Arc::clone(&calls);
        reg.register("n", move || c.fetch_add(1, Ordering::Relaxed));
        let resp = answer(&reg, &keys(&["n", "n", "n"]));
        assert_eq!(resp.len(), 1);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn empty_request_gets_empty_response() {
        let reg = Registry::new();
        reg.register("a", || 1);
        assert!(answer(&reg, &[]).is_empty());
    }
}
