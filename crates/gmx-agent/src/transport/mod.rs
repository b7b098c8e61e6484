//! Local transport.
//!
//! The server needs a single capability: accept byte streams on a
//! process-local endpoint. Two implementations provide it:
//! - `unix`: a unix-domain socket file, discoverable by directory scan.
//! - `tcp`: an ephemeral loopback port, announced on stdout.
//!
//! `Connection` layers the streaming JSON codec over either stream type and
//! is shared by the server loop and the client tooling.

mod conn;
mod tcp;
#[cfg(unix)]
mod unix;

use std::io;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncWrite};

use gmx_core::error::{GmxError, Result};
use gmx_core::{Endpoint, EndpointName};

pub use conn::Connection;
pub use tcp::TcpTransport;
#[cfg(unix)]
pub use unix::UnixTransport;

/// Byte stream accepted from, or opened to, a local endpoint.
pub trait LocalStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> LocalStream for T {}

pub type BoxedStream = Box<dyn LocalStream>;

/// A bound, listening local endpoint.
#[async_trait]
pub trait LocalListener: Send + Sync {
    fn endpoint(&self) -> &Endpoint;

    /// Wait for the next client. Returns the stream and a printable peer label.
    async fn accept(&self) -> io::Result<(BoxedStream, String)>;
}

/// Which transport to bind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Unix socket where available, loopback TCP otherwise.
    #[default]
    Auto,
    Unix,
    Tcp,
}

impl TransportKind {
    /// Resolve `Auto` for the current platform.
    pub fn resolve(self) -> TransportKind {
        match self {
            TransportKind::Auto if cfg!(unix) => TransportKind::Unix,
            TransportKind::Auto => TransportKind::Tcp,
            other => other,
        }
    }
}

/// Bind the endpoint for `name` using `kind`.
///
/// For unix sockets the endpoint is `dir/.gmx.<pid>.<version>`; `dir` is
/// ignored for TCP.
pub async fn bind(
    kind: TransportKind,
    dir: &Path,
    name: EndpointName,
) -> Result<Box<dyn LocalListener>> {
    match kind.resolve() {
        TransportKind::Tcp => Ok(Box::new(TcpTransport::bind().await?)),
        #[cfg(unix)]
        TransportKind::Unix | TransportKind::Auto => {
            Ok(Box::new(UnixTransport::bind(Endpoint::unix_in(dir, name))?))
        }
        #[cfg(not(unix))]
        TransportKind::Unix | TransportKind::Auto => {
            let _ = (dir, name);
            Err(GmxError::Config(
                "unix sockets are not available on this platform".into(),
            ))
        }
    }
}

/// Open a client connection to `endpoint`.
pub async fn connect(endpoint: &Endpoint) -> Result<Connection> {
    let stream: BoxedStream = match endpoint {
        Endpoint::Tcp(addr) => Box::new(
            tokio::net::TcpStream::connect(addr)
                .await
                .map_err(|source| connect_error(endpoint, source))?,
        ),
        #[cfg(unix)]
        Endpoint::Unix(path) => Box::new(
            tokio::net::UnixStream::connect(path)
                .await
                .map_err(|source| connect_error(endpoint, source))?,
        ),
        #[cfg(not(unix))]
        Endpoint::Unix(_) => {
            return Err(connect_error(
                endpoint,
                io::Error::new(io::ErrorKind::Unsupported, "unix sockets unavailable"),
            ))
        }
    };
    Ok(Connection::new(stream))
}

fn connect_error(endpoint: &Endpoint, source: io::Error) -> GmxError {
    GmxError::Connect {
        endpoint: endpoint.to_string(),
        source,
    }
}
