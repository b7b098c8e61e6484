//! Endpoint naming and addressing.
//!
//! A serving process listens on a unix socket named `.gmx.<pid>.<version>`
//! inside the shared temporary directory. On platforms without unix sockets
//! it listens on an ephemeral loopback TCP port instead, which cannot be
//! discovered by scanning the filesystem.

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

const PREFIX: &str = ".gmx.";

/// `(pid, protocol version)` parsed from an endpoint file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointName {
    pub pid: u32,
    pub version: u32,
}

impl EndpointName {
    pub fn new(pid: u32, version: u32) -> Self {
        Self { pid, version }
    }

    /// Parse a file name of the form `.gmx.<pid>.<version>`.
    ///
    /// The whole name must match; `.gmx.12.0.bak` or `.gmx.x.0` are rejected.
    pub fn parse(name: &str) -> Option<Self> {
        let rest = name.strip_prefix(PREFIX)?;
        let (pid, version) = rest.split_once('.')?;
        Some(Self {
            pid: parse_digits(pid)?,
            version: parse_digits(version)?,
        })
    }

    pub fn file_name(&self) -> String {
        format!("{PREFIX}{}.{}", self.pid, self.version)
    }
}

impl fmt::Display for EndpointName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{PREFIX}{}.{}", self.pid, self.version)
    }
}

// `u32::from_str` accepts a leading `+`, which is not part of the naming scheme.
fn parse_digits(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Address of a local server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Unix-domain socket path.
    Unix(PathBuf),
    /// Loopback TCP address.
    Tcp(SocketAddr),
}

impl Endpoint {
    /// Unix endpoint for `(pid, version)` under `dir`.
    pub fn unix_in(dir: &Path, name: EndpointName) -> Self {
        Endpoint::Unix(dir.join(name.file_name()))
    }

    /// The filesystem artifact backing this endpoint, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Endpoint::Unix(p) => Some(p),
            Endpoint::Tcp(_) => None,
        }
    }

    /// The `(pid, version)` encoded in a unix endpoint's file name.
    pub fn name(&self) -> Option<EndpointName> {
        let file = self.path()?.file_name()?.to_str()?;
        EndpointName::parse(file)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Unix(p) => write!(f, "{}", p.display()),
            Endpoint::Tcp(addr) => write!(f, "{addr}"),
        }
    }
}

/// Platform shared temporary directory, where endpoints are created.
pub fn default_socket_dir() -> PathBuf {
    std::env::temp_dir()
}
