use crate::error::CancelReason;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Per-request stop condition: whichever comes first of the request deadline
/// and the end of the client's connection.
///
/// Producers poll it between productions and never mutate it.
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    connection: CancellationToken,
    deadline: Instant,
}

impl CancellationSignal {
    /// `connection` is cancelled by whoever owns the client connection once
    /// it goes away.
    pub fn new(timeout: Duration, connection: CancellationToken) -> Self {
        Self {
            connection,
            deadline: Instant::now() + timeout,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.reason().is_some()
    }

    /// Why the signal fired, or `None` while the request is still live. A
    /// lost connection wins over an elapsed deadline.
    pub fn reason(&self) -> Option<CancelReason> {
        if self.connection.is_cancelled() {
            Some(CancelReason::Disconnected)
        } else if Instant::now() >= self.deadline {
            Some(CancelReason::Timeout)
        } else {
            None
        }
    }

    /// Resolves once the signal fires.
    pub async fn cancelled(&self) {
        tokio::select! {
            _ = self.connection.cancelled() => {}
            _ = tokio::time::sleep_until(self.deadline) => {}
        }
    }
}
