use std::io;
use std::net::{Ipv4Addr, SocketAddr};

use async_trait::async_trait;
use tokio::net::TcpListener;
use tracing::info;

use gmx_core::error::{GmxError, Result};
use gmx_core::Endpoint;

use super::{BoxedStream, LocalListener};

/// Loopback TCP listener on an OS-assigned port.
///
/// Not discoverable by directory scan, so the port is printed to stdout when
/// bound and must be handed to the client manually.
pub struct TcpTransport {
    listener: TcpListener,
    endpoint: Endpoint,
}

impl TcpTransport {
    pub async fn bind() -> Result<Self> {
        let wanted = SocketAddr::from((Ipv4Addr::LOCALHOST, 0));
        let listener = TcpListener::bind(wanted)
            .await
            .map_err(|source| GmxError::Bind {
                endpoint: wanted.to_string(),
                source,
            })?;
        let addr = listener.local_addr()?;
        println!("gmx: listening on {addr}");
        info!(%addr, "gmx: tcp endpoint bound");
        Ok(Self {
            listener,
            endpoint: Endpoint::Tcp(addr),
        })
    }
}

#[async_trait]
impl LocalListener for TcpTransport {
    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn accept(&self) -> io::Result<(BoxedStream, String)> {
        let (stream, peer) = self.listener.accept().await?;
        Ok((Box::new(stream), peer.to_string()))
    }
}
