use crate::cancel::CancellationSignal;
use crate::message::{Message, Tick};
use log::*;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;

/// Capacity of the channel between a pool and its sender. With a single slot
/// every producer waits for the sender before producing again.
pub const CHANNEL_CAPACITY: usize = 1;

/// Creates the channel shared by one pool and one [`crate::sender::MessageSender`].
pub fn channel() -> (mpsc::Sender<Message>, mpsc::Receiver<Message>) {
    mpsc::channel(CHANNEL_CAPACITY)
}

/// A fixed number of producers periodically feeding one connection.
#[derive(Debug, Clone)]
pub struct ProducerPool {
    producers: usize,
    interval: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolReport {
    /// Messages accepted by the channel, indexed by producer.
    pub sent: Vec<u64>,
    pub elapsed: Duration,
}

impl PoolReport {
    pub fn total_sent(&self) -> u64 {
        self.sent.iter().sum()
    }
}

impl ProducerPool {
    pub fn new(producers: usize, interval: Duration) -> Self {
        Self {
            producers,
            interval,
        }
    }

    pub fn producers(&self) -> usize {
        self.producers
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs every producer to completion and only then releases `tx`, which
    /// closes the channel once the producers' clones are gone too.
    pub async fn run(&self, tx: mpsc::Sender<Message>, signal: CancellationSignal) -> PoolReport {
        let started = Instant::now();
        let mut producers = JoinSet::new();

        for index in 1..=self.producers {
            producers.spawn(produce(index, self.interval, tx.clone(), signal.clone()));
        }

        let mut sent = vec![0; self.producers];
        while let Some(result) = producers.join_next().await {
            match result {
                Ok((index, count)) => sent[index - 1] = count,
                Err(e) => error!("Producer task failed: {e}"),
            }
        }

        // Every producer has returned; nothing can write to the channel anymore
        drop(tx);

        PoolReport {
            sent,
            elapsed: started.elapsed(),
        }
    }
}

async fn produce(
    index: usize,
    interval: Duration,
    tx: mpsc::Sender<Message>,
    signal: CancellationSignal,
) -> (usize, u64) {
    let mut sent = 0;

    loop {
        let message = match Message::json(&Tick::now(index, sent + 1)) {
            Ok(message) => message,
            Err(e) => {
                error!("Producer {index} failed to serialize its message: {e}");
                break;
            }
        };

        tokio::select! {
            biased;
            _ = signal.cancelled() => {
                debug!("Producer {index} abandoned a pending send");
                break;
            }
            result = tx.send(message) => {
                if result.is_err() {
                    debug!("Producer {index} stopping, stream is gone");
                    break;
                }
            }
        }
        sent += 1;

        tokio::time::sleep(interval).await;
        if signal.is_cancelled() {
            break;
        }
    }

    trace!("Producer {index} finished after {sent} message(s)");
    (index, sent)
}
