use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::net::UnixListener;
use tracing::{debug, info, warn};

use gmx_core::error::{GmxError, Result};
use gmx_core::Endpoint;

use super::{BoxedStream, LocalListener};

/// Unix-domain socket listener. Removes its socket file when dropped, unless
/// the file at that path is no longer the one it bound.
pub struct UnixTransport {
    listener: UnixListener,
    endpoint: Endpoint,
    path: PathBuf,
    /// `(dev, ino)` of the socket file created by bind.
    file_id: Option<(u64, u64)>,
}

impl UnixTransport {
    /// Bind `endpoint`, first removing any stale socket file left at its path
    /// by a previous instance.
    ///
    /// A file that still accepts connections belongs to a live server and is
    /// left alone; binding then fails with `AddrInUse`. Removal is
    /// best-effort; the bind result decides success. Unlink then bind is not
    /// atomic: two instances racing for the same name can both pass the
    /// cleanup step.
    pub fn bind(endpoint: Endpoint) -> Result<Self> {
        let Some(path) = endpoint.path().map(PathBuf::from) else {
            return Err(GmxError::Config(format!("{endpoint} is not a unix endpoint")));
        };

        if path.exists() {
            if std::os::unix::net::UnixStream::connect(&path).is_ok() {
                return Err(GmxError::Bind {
                    endpoint: endpoint.to_string(),
                    source: io::Error::new(
                        io::ErrorKind::AddrInUse,
                        "endpoint is served by a live listener",
                    ),
                });
            }
            warn!(path = %path.display(), "gmx: endpoint already exists, deleting it");
            if let Err(e) = std::fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "gmx: unable to delete stale endpoint");
            }
        }

        let listener = UnixListener::bind(&path).map_err(|source| GmxError::Bind {
            endpoint: endpoint.to_string(),
            source,
        })?;
        info!(path = %path.display(), "gmx: unix endpoint bound");
        let file_id = file_id(&path);
        Ok(Self {
            listener,
            endpoint,
            path,
            file_id,
        })
    }
}

#[async_trait]
impl LocalListener for UnixTransport {
    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn accept(&self) -> io::Result<(BoxedStream, String)> {
        let (stream, _) = self.listener.accept().await?;
        // unix peers are unnamed; label them by endpoint
        Ok((Box::new(stream), format!("unix:{}", self.path.display())))
    }
}

fn file_id(path: &Path) -> Option<(u64, u64)> {
    std::fs::symlink_metadata(path)
        .ok()
        .map(|m| (m.dev(), m.ino()))
}

impl Drop for UnixTransport {
    fn drop(&mut self) {
        let current = file_id(&self.path);
        if current.is_none() || current != self.file_id {
            debug!(path = %self.path.display(), "gmx: endpoint file replaced or gone, leaving it");
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => info!(path = %self.path.display(), "gmx: endpoint removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "gmx: unable to remove endpoint"),
        }
    }
}
