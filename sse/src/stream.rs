use crate::cancel::CancellationSignal;
use crate::connection::Connection;
use crate::error::{CancelReason, ErrorKind};
use crate::pool::{self, PoolReport, ProducerPool};
use crate::sender::MessageSender;
use log::*;
use std::time::Duration;
use tokio::io::AsyncWrite;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Settings for one bounded, pool-fed event stream.
#[derive(Debug, Clone)]
pub struct EventStream {
    pool: ProducerPool,
    timeout: Duration,
    write_timeout: Option<Duration>,
}

#[derive(Debug)]
pub struct StreamReport {
    pub pool: PoolReport,
    /// Messages written and flushed to the client.
    pub delivered: u64,
    pub reason: CancelReason,
    pub elapsed: Duration,
}

impl EventStream {
    pub fn new(producers: usize, interval: Duration, timeout: Duration) -> Self {
        Self {
            pool: ProducerPool::new(producers, interval),
            timeout,
            write_timeout: None,
        }
    }

    pub fn with_write_timeout(mut self, write_timeout: Option<Duration>) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn pool(&self) -> &ProducerPool {
        &self.pool
    }

    /// Feeds `transport` from a fresh producer pool until the timeout elapses
    /// or `connection` is cancelled, then closes it.
    ///
    /// Completes only after every producer has returned, the channel has
    /// closed, and the sender has drained it.
    pub async fn run<W>(
        &self,
        transport: W,
        incremental_flush: bool,
        connection: CancellationToken,
    ) -> StreamReport
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let started = Instant::now();
        let signal = CancellationSignal::new(self.timeout, connection);
        let (tx, rx) = pool::channel();

        let writer = Connection::new(transport).with_write_timeout(self.write_timeout);
        let sender = tokio::spawn(MessageSender::new(writer, incremental_flush).run(rx));

        let pool = self.pool.run(tx, signal.clone()).await;

        let delivered = match sender.await {
            Ok((delivered, None)) => delivered,
            Ok((delivered, Some(e))) => {
                if e.error_kind != ErrorKind::StreamingUnsupported {
                    debug!("Stream ended early after {delivered} message(s): {e}");
                }
                delivered
            }
            Err(e) => {
                error!("Message sender task failed: {e}");
                0
            }
        };

        // Producers only stop early when the client is gone
        let reason = signal.reason().unwrap_or(CancelReason::Disconnected);

        StreamReport {
            delivered,
            reason,
            elapsed: started.elapsed(),
            pool,
        }
    }
}
