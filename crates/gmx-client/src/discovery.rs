use std::ffi::OsString;
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use futures_util::future::join_all;
use tracing::{debug, warn};

use gmx_agent::transport;
use gmx_core::error::{GmxError, Result};
use gmx_core::protocol::ARGS_KEY;
use gmx_core::{Endpoint, EndpointName, Value};

/// Upper bound on identifying one candidate. A stopped process still accepts
/// connections into its backlog but never answers.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// An instrumented process found by discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Process {
    pub name: EndpointName,
    pub endpoint: Endpoint,
    /// Argument vector reported under `os.args`.
    pub args: Vec<String>,
}

impl Process {
    pub fn pid(&self) -> u32 {
        self.name.pid
    }

    /// Base name of the program (`/usr/bin/worker` -> `worker`).
    pub fn program(&self) -> Option<&str> {
        let argv0 = self.args.first()?;
        Path::new(argv0).file_name()?.to_str()
    }
}

/// Outcome of resolving a program name. Not found and ambiguous are kept apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(Process),
    NotFound,
    Ambiguous(Vec<Process>),
}

impl Resolution {
    pub fn into_result(self, name: &str) -> Result<Process> {
        match self {
            Resolution::Found(p) => Ok(p),
            Resolution::NotFound => Err(GmxError::UnknownProcess(name.to_owned())),
            Resolution::Ambiguous(candidates) => Err(GmxError::Ambiguous {
                name: name.to_owned(),
                pids: candidates.iter().map(Process::pid).collect(),
            }),
        }
    }
}

/// Endpoints in `dir` whose file name follows the naming scheme, by pid.
///
/// Other entries are ignored, as are entries that cannot be read. Failing to
/// read `dir` itself is an error.
pub fn scan(dir: &Path) -> Result<Vec<Endpoint>> {
    let names = std::fs::read_dir(dir)?.map(|entry| entry.map(|e| e.file_name()));
    Ok(endpoints_in(dir, names))
}

fn endpoints_in<I>(dir: &Path, names: I) -> Vec<Endpoint>
where
    I: IntoIterator<Item = io::Result<OsString>>,
{
    let mut found = Vec::new();
    for name in names {
        let file = match name {
            Ok(f) => f,
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "gmx: skipping unreadable entry");
                continue;
            }
        };
        if let Some(name) = file.to_str().and_then(EndpointName::parse) {
            found.push((name, Endpoint::unix_in(dir, name)));
        }
    }
    found.sort_by_key(|(name, _)| (name.pid, name.version));
    found.into_iter().map(|(_, ep)| ep).collect()
}

/// Ask `endpoint` for its argument vector.
///
/// Every failure is swallowed: stale files, refused connections, dead
/// processes and servers without `os.args` all yield `None`.
pub async fn identify(endpoint: &Endpoint) -> Option<Vec<String>> {
    let probe = async {
        let mut conn = match transport::connect(endpoint).await {
            Ok(c) => c,
            Err(e) => {
                debug!(%endpoint, error = %e, "gmx: skipping unreachable endpoint");
                return None;
            }
        };
        let keys = [ARGS_KEY.to_owned()];
        match conn.query(&keys).await {
            Ok(resp) => resp.get(ARGS_KEY).and_then(|v| v.to_string_list()),
            Err(e) => {
                warn!(%endpoint, error = %e, "gmx: unable to decode response");
                None
            }
        }
    };
    match tokio::time::timeout(PROBE_TIMEOUT, probe).await {
        Ok(args) => args,
        Err(_) => {
            warn!(%endpoint, "gmx: endpoint did not answer in time");
            None
        }
    }
}

/// Every process in `dir` that answers with an argument vector, by pid.
pub async fn discover(dir: &Path) -> Result<Vec<Process>> {
    let endpoints = scan(dir)?;
    let probes = endpoints.iter().map(identify);
    let answers = join_all(probes).await;

    Ok(endpoints
        .into_iter()
        .zip(answers)
        .filter_map(|(endpoint, args)| {
            let name = endpoint.name()?;
            Some(Process {
                name,
                endpoint,
                args: args?,
            })
        })
        .collect())
}

/// Call `visitor` for each discovered process.
pub async fn visit<F>(dir: &Path, mut visitor: F) -> Result<()>
where
    F: FnMut(&Process),
{
    for p in discover(dir).await? {
        visitor(&p);
    }
    Ok(())
}

/// Write one `<endpoint name>\t<args>` line per discovered process.
///
/// Stops at the first write error and returns it. Returns the number of
/// processes listed.
pub async fn list<W: Write>(dir: &Path, out: &mut W) -> Result<usize> {
    let mut listed = 0;
    for p in discover(dir).await? {
        writeln!(out, "{}\t{}", p.name, Value::from(p.args.clone()))?;
        listed += 1;
    }
    out.flush()?;
    Ok(listed)
}

/// Pick the single process whose program base name is `name`.
pub fn resolve_name(processes: &[Process], name: &str) -> Resolution {
    let mut matches: Vec<Process> = processes
        .iter()
        .filter(|p| p.program() == Some(name))
        .cloned()
        .collect();
    match matches.len() {
        0 => Resolution::NotFound,
        1 => Resolution::Found(matches.remove(0)),
        _ => Resolution::Ambiguous(matches),
    }
}

/// Discover processes in `dir` and resolve `name` among them.
pub async fn find_by_name(dir: &Path, name: &str) -> Result<Resolution> {
    let processes = discover(dir).await?;
    Ok(resolve_name(&processes, name))
}
