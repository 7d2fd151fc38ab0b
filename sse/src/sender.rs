use crate::connection::Connection;
use crate::error::Error;
use crate::message::Message;
use log::*;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;

/// The only consumer of a pool's channel and the only writer of its response
/// stream. It reacts to the channel's lifecycle and never cancels anything.
pub struct MessageSender<W> {
    connection: Connection<W>,
    incremental_flush: bool,
}

impl<W> MessageSender<W>
where
    W: AsyncWrite + Unpin,
{
    /// `incremental_flush` is false when the transport can only deliver the
    /// response as a whole.
    pub fn new(connection: Connection<W>, incremental_flush: bool) -> Self {
        Self {
            connection,
            incremental_flush,
        }
    }

    /// Writes and flushes every message until the channel closes, then closes
    /// the stream. Returns how many messages were delivered, along with the
    /// error that ended the stream early, if any.
    ///
    /// On a write failure the receiver is dropped, so the producers' next send
    /// fails and they wind down on their own.
    pub async fn run(mut self, mut rx: mpsc::Receiver<Message>) -> (u64, Option<Error>) {
        if !self.incremental_flush {
            warn!("Client doesn't support streaming, nothing will be delivered");
            self.connection.close().await;
            return (0, Some(Error::streaming_unsupported()));
        }

        let mut delivered = 0;
        while let Some(message) = rx.recv().await {
            if let Err(e) = self.connection.send(&message).await {
                warn!("Stopping stream after {delivered} message(s): {e}");
                self.connection.close().await;
                return (delivered, Some(e));
            }
            delivered += 1;
        }

        self.connection.close().await;
        (delivered, None)
    }
}
