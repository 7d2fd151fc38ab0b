//! External event sources that drive broadcasts.
//!
//! The broadcast loop only needs a blocking "next trigger" primitive. It is
//! raced against shutdown, so implementations must be cancel safe: dropping a
//! pending `next_trigger` future must not lose a trigger.

use async_trait::async_trait;
use log::*;
use std::fmt;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Where a broadcast request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// An operating system signal (SIGHUP).
    Signal,
    /// An in-process request, e.g. the admin endpoint.
    Manual,
}

#[async_trait]
pub trait TriggerSource: Send {
    /// Waits for the next trigger. `None` means the source is closed for good.
    async fn next_trigger(&mut self) -> Option<Trigger>;
}

/// Returned by [`TriggerHandle::fire`] once the broadcast loop has stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerClosed;

impl fmt::Display for TriggerClosed {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "broadcast loop is no longer listening for triggers")
    }
}

impl std::error::Error for TriggerClosed {}

/// Creates an in-process trigger source and the handle used to fire it.
///
/// Up to `capacity` triggers are queued; further triggers fired while the
/// queue is full are coalesced into the ones already pending.
pub fn channel(capacity: usize) -> (TriggerHandle, ChannelTrigger) {
    let (tx, rx) = mpsc::channel(capacity);
    (TriggerHandle { tx }, ChannelTrigger { rx })
}

#[derive(Debug, Clone)]
pub struct TriggerHandle {
    tx: mpsc::Sender<Trigger>,
}

impl TriggerHandle {
    pub fn fire(&self) -> Result<(), TriggerClosed> {
        match self.tx.try_send(Trigger::Manual) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                debug!("Broadcast already pending, coalescing trigger");
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(TriggerClosed),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Debug)]
pub struct ChannelTrigger {
    rx: mpsc::Receiver<Trigger>,
}

#[async_trait]
impl TriggerSource for ChannelTrigger {
    async fn next_trigger(&mut self) -> Option<Trigger> {
        self.rx.recv().await
    }
}

/// SIGHUP delivered to this process.
#[cfg(unix)]
pub struct SignalTrigger {
    signal: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl SignalTrigger {
    pub fn hangup() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            signal: signal(SignalKind::hangup())?,
        })
    }
}

#[cfg(unix)]
#[async_trait]
impl TriggerSource for SignalTrigger {
    async fn next_trigger(&mut self) -> Option<Trigger> {
        self.signal.recv().await.map(|()| Trigger::Signal)
    }
}

/// Listens to two sources at once and keeps going until both are closed.
pub struct Merged<A, B> {
    first: Option<A>,
    second: Option<B>,
}

impl<A, B> Merged<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self {
            first: Some(first),
            second: Some(second),
        }
    }
}

enum Closed {
    First,
    Second,
}

#[async_trait]
impl<A, B> TriggerSource for Merged<A, B>
where
    A: TriggerSource,
    B: TriggerSource,
{
    async fn next_trigger(&mut self) -> Option<Trigger> {
        loop {
            let closed = match (self.first.as_mut(), self.second.as_mut()) {
                (Some(first), Some(second)) => tokio::select! {
                    trigger = first.next_trigger() => match trigger {
                        Some(trigger) => return Some(trigger),
                        None => Closed::First,
                    },
                    trigger = second.next_trigger() => match trigger {
                        Some(trigger) => return Some(trigger),
                        None => Closed::Second,
                    },
                },
                (Some(first), None) => return first.next_trigger().await,
                (None, Some(second)) => return second.next_trigger().await,
                (None, None) => return None,
            };

            match closed {
                Closed::First => self.first = None,
                Closed::Second => self.second = None,
            }
        }
    }
}
