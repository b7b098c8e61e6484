use std::io::Write;
use std::time::Duration;

use regex::Regex;
use tokio::time::Instant;

use gmx_agent::transport::{self, Connection};
use gmx_core::error::{GmxError, Result};
use gmx_core::protocol::{Response, KEYS_KEY};
use gmx_core::Endpoint;

/// Line printed between two samples.
pub const SEPARATOR: &str = "----";

#[derive(Debug, Clone, Copy, Default)]
pub struct PollOptions {
    /// Sleep between samples.
    pub delay: Duration,
    /// Keep sampling until this much time has passed. `None`: forever.
    /// Zero means exactly one sample.
    pub duration: Option<Duration>,
}

/// Compile key filters. A bad pattern fails the whole invocation.
pub fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|e| GmxError::BadPattern {
                pattern: p.clone(),
                reason: e.to_string(),
            })
        })
        .collect()
}

/// Keys to request: everything when `patterns` is empty, otherwise for each
/// pattern in turn every registered key it matches. A key matched by two
/// patterns appears twice.
pub fn select_keys(registered: &[String], patterns: &[Regex]) -> Vec<String> {
    if patterns.is_empty() {
        return registered.to_vec();
    }
    patterns
        .iter()
        .flat_map(|re| registered.iter().filter(move |k| re.is_match(k)))
        .cloned()
        .collect()
}

/// Fetch the server's key list, sorted.
pub async fn fetch_keys(conn: &mut Connection) -> Result<Vec<String>> {
    let resp = conn.query(&[KEYS_KEY.to_owned()]).await?;
    let mut keys = resp
        .get(KEYS_KEY)
        .and_then(|v| v.to_string_list())
        .ok_or(GmxError::MissingKeys)?;
    keys.sort();
    Ok(keys)
}

/// Write one sample: `key: value` for each key present, in `keys` order.
pub fn render<W: Write>(out: &mut W, keys: &[String], resp: &Response) -> std::io::Result<()> {
    for k in keys {
        if let Some(v) = resp.get(k) {
            writeln!(out, "{k}: {v}")?;
        }
    }
    Ok(())
}

/// Long-lived polling session against one process.
pub struct Poller {
    conn: Connection,
    keys: Vec<String>,
    opts: PollOptions,
}

impl Poller {
    /// Connect to `endpoint`, list its keys and apply `patterns`.
    pub async fn connect(endpoint: &Endpoint, patterns: &[Regex], opts: PollOptions) -> Result<Self> {
        let mut conn = transport::connect(endpoint).await?;
        let registered = fetch_keys(&mut conn).await?;
        let keys = select_keys(&registered, patterns);
        Ok(Self { conn, keys, opts })
    }

    /// Effective key filter.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Sample until the deadline passes. Always takes at least one sample.
    /// Returns the number of samples taken.
    pub async fn run<W: Write>(&mut self, out: &mut W) -> Result<usize> {
        let deadline = self
            .opts
            .duration
            .and_then(|d| Instant::now().checked_add(d));
        let mut samples = 0;

        loop {
            let resp = self.conn.query(&self.keys).await?;
            render(out, &self.keys, &resp)?;
            out.flush()?;
            samples += 1;

            let done = match (self.opts.duration, deadline) {
                (Some(_), Some(deadline)) => Instant::now() >= deadline,
                // unbounded, or too far out to represent
                _ => false,
            };
            if done {
                return Ok(samples);
            }

            tokio::time::sleep(self.opts.delay).await;
            writeln!(out, "{SEPARATOR}")?;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use gmx_core::Value;

    fn strings(ks: &[&str]) -> Vec<String> {
        ks.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn no_patterns_selects_everything() {
        let reg = strings(&["a", "b", "keys"]);
        assert_eq!(select_keys(&reg, &[]), reg);
    }

    #[test]
    fn patterns_apply_in_order_with_duplicates() {
        let reg = strings(&["a.x", "a.y", "b.x"]);
        let pats = compile_patterns(&strings(&["^a", "x$"])).unwrap();
        assert_eq!(select_keys(&reg, &pats), strings(&["a.x", "a.y", "a.x", "b.x"]));
    }

    #[test]
    fn patterns_are_unanchored() {
        let reg = strings(&["runtime.cpu.time", "http.requests"]);
        let pats = compile_patterns(&strings(&["cpu"])).unwrap();
        assert_eq!(select_keys(&reg, &pats), strings(&["runtime.cpu.time"]));
    }

    #[test]
    fn bad_pattern_is_reported() {
        let err = compile_patterns(&strings(&["ok", "(unclosed"])).unwrap_err();
        assert_eq!(err.kind().as_str(), "BAD_INPUT");
        assert!(err.to_string().contains("(unclosed"));
    }

    #[test]
    fn render_follows_filter_order_and_skips_absent() {
        let mut resp = Response::new();
        resp.insert("b".into(), Value::from(vec!["x", "y"]));
        resp.insert("a".into(), Value::Int(1));

        let mut out = Vec::new();
        render(&mut out, &strings(&["b", "missing", "a", "b"]), &resp).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "b: [\"x\",\"y\"]\na: 1\nb: [\"x\",\"y\"]\n"
        );
    }
}
