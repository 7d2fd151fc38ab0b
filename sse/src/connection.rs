use crate::error::Result;
use crate::message::Message;
use log::*;
use std::fmt;
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

/// The raw byte stream a subscriber owns once it has been taken over.
pub type Transport = Box<dyn AsyncWrite + Send + Unpin>;

/// Unique identifier for a connection (server-generated)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(uuid::Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Buffered writer over a raw transport.
///
/// `write` only fills the buffer and `flush` pushes it onto the wire. Callers
/// treat the connection as dead after the first failure of either.
pub struct Connection<W> {
    writer: BufWriter<W>,
    write_timeout: Option<Duration>,
}

impl<W> Connection<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(transport: W) -> Self {
        Self {
            writer: BufWriter::new(transport),
            write_timeout: None,
        }
    }

    /// Bounds every write and flush; a peer that stops reading is reported
    /// as a stalled connection instead of blocking forever.
    pub fn with_write_timeout(mut self, write_timeout: Option<Duration>) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    pub async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        with_deadline(self.write_timeout, self.writer.write_all(bytes)).await
    }

    pub async fn flush(&mut self) -> Result<()> {
        with_deadline(self.write_timeout, self.writer.flush()).await
    }

    /// Writes one framed message and flushes it, as a single unit.
    pub async fn send(&mut self, message: &Message) -> Result<()> {
        self.write(&message.frame()).await?;
        self.flush().await
    }

    /// Shuts the transport down, bounded by the write timeout. Bytes still
    /// buffered are discarded, since a connection is only closed once it has
    /// failed or its stream has ended.
    pub async fn close(self) {
        let mut transport = self.writer.into_inner();
        if let Err(e) = with_deadline(self.write_timeout, transport.shutdown()).await {
            trace!("Ignoring shutdown error on closed connection: {e}");
        }
    }
}

async fn with_deadline<F>(deadline: Option<Duration>, operation: F) -> Result<()>
where
    F: Future<Output = io::Result<()>>,
{
    match deadline {
        Some(limit) => tokio::time::timeout(limit, operation).await??,
        None => operation.await?,
    }
    Ok(())
}

/// A client that took over its response stream and is now fed by broadcasts.
pub struct Subscriber {
    id: ConnectionId,
    connection: Connection<Transport>,
}

impl Subscriber {
    pub fn new(transport: Transport) -> Self {
        Self {
            id: ConnectionId::new(),
            connection: Connection::new(transport),
        }
    }

    pub fn with_write_timeout(mut self, write_timeout: Option<Duration>) -> Self {
        self.connection = self.connection.with_write_timeout(write_timeout);
        self
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub async fn send(&mut self, message: &Message) -> Result<()> {
        self.connection.send(message).await
    }

    pub async fn close(self) {
        debug!("Closing subscriber connection {}", self.id);
        self.connection.close().await;
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Subscriber").field("id", &self.id).finish()
    }
}
