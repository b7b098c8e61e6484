use bytes::BytesMut;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use gmx_core::error::{GmxError, Result};
use gmx_core::protocol::codec::{self, Decoder};
use gmx_core::protocol::Response;

use super::BoxedStream;

const READ_CHUNK: usize = 4096;

/// A local stream speaking the streaming JSON protocol.
pub struct Connection {
    stream: BoxedStream,
    read_buf: BytesMut,
    decoder: Decoder,
    write_buf: BytesMut,
}

impl Connection {
    pub fn new(stream: BoxedStream) -> Self {
        Self {
            stream,
            read_buf: BytesMut::with_capacity(READ_CHUNK),
            decoder: Decoder::new(),
            write_buf: BytesMut::new(),
        }
    }

    /// Read the next message.
    ///
    /// `Ok(None)` means the peer closed cleanly between messages. A close in
    /// the middle of a message is `Malformed`.
    pub async fn recv<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        loop {
            if let Some(msg) = self.decoder.decode(&mut self.read_buf)? {
                return Ok(Some(msg));
            }
            self.read_buf.reserve(READ_CHUNK);
            if self.stream.read_buf(&mut self.read_buf).await? == 0 {
                if codec::is_drained(&self.read_buf) {
                    return Ok(None);
                }
                return Err(GmxError::Malformed("connection closed mid-message".into()));
            }
        }
    }

    /// Encode and flush one message.
    pub async fn send<T: Serialize + ?Sized>(&mut self, msg: &T) -> Result<()> {
        self.write_buf.clear();
        codec::encode(msg, &mut self.write_buf)?;
        self.stream.write_all(&self.write_buf).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// One request/response exchange.
    pub async fn query(&mut self, keys: &[String]) -> Result<Response> {
        self.send(keys).await?;
        self.recv::<Response>()
            .await?
            .ok_or_else(|| GmxError::Malformed("connection closed before response".into()))
    }
}
