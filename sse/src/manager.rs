use crate::connection::{ConnectionId, Subscriber, Transport};
use crate::message::Message;
use crate::registry::{SubscriberRegistry, Visit, Visitor};
use crate::trigger::TriggerSource;
use async_trait::async_trait;
use log::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Lifecycle of the broadcast loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    WaitingForSignal,
    Broadcasting,
    Stopped,
}

/// Outcome of one broadcast pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub removed: usize,
}

/// Owns the subscriber registry and fans the broadcast message out to it.
pub struct Manager {
    registry: Arc<SubscriberRegistry>,
    message: Message,
    write_timeout: Option<Duration>,
    state: watch::Sender<LoopState>,
}

impl Manager {
    pub fn new(message: Message) -> Self {
        let (state, _) = watch::channel(LoopState::Idle);
        Self {
            registry: Arc::new(SubscriberRegistry::new()),
            message,
            write_timeout: None,
            state,
        }
    }

    pub fn with_write_timeout(mut self, write_timeout: Option<Duration>) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<LoopState> {
        self.state.subscribe()
    }

    /// Hands a taken-over response stream to the registry. From here on only
    /// broadcast passes write to it or close it.
    pub async fn subscribe(&self, transport: Transport) -> ConnectionId {
        let subscriber = Subscriber::new(transport).with_write_timeout(self.write_timeout);
        let connection_id = self.registry.insert(subscriber).await;
        info!("Registered new SSE subscriber {connection_id}");
        connection_id
    }

    /// Writes the broadcast message to every subscriber, dropping the ones
    /// whose connection failed. A failure never stops the pass.
    pub async fn broadcast(&self) -> BroadcastReport {
        if self.registry.is_empty().await {
            debug!("No subscribers to broadcast to");
            return BroadcastReport::default();
        }

        let mut pass = BroadcastPass {
            message: &self.message,
            delivered: 0,
        };
        let removed = self.registry.for_each_with_removal(&mut pass).await;

        BroadcastReport {
            delivered: pass.delivered,
            removed,
        }
    }

    /// Runs broadcast passes, one per trigger, until the source closes or
    /// `shutdown` fires.
    pub async fn run<S: TriggerSource>(&self, mut source: S, shutdown: CancellationToken) {
        self.state.send_replace(LoopState::WaitingForSignal);
        info!("Broadcast loop waiting for triggers");

        loop {
            let trigger = tokio::select! {
                _ = shutdown.cancelled() => None,
                trigger = source.next_trigger() => trigger,
            };
            let Some(trigger) = trigger else {
                break;
            };

            self.state.send_replace(LoopState::Broadcasting);
            let report = self.broadcast().await;
            info!(
                "Broadcast ({trigger:?}) delivered to {} subscriber(s), removed {}",
                report.delivered, report.removed
            );
            self.state.send_replace(LoopState::WaitingForSignal);
        }

        self.state.send_replace(LoopState::Stopped);
        info!("Broadcast loop stopped");
    }

    pub fn spawn<S>(self: Arc<Self>, source: S, shutdown: CancellationToken) -> JoinHandle<()>
    where
        S: TriggerSource + 'static,
    {
        tokio::spawn(async move { self.run(source, shutdown).await })
    }
}

struct BroadcastPass<'a> {
    message: &'a Message,
    delivered: usize,
}

#[async_trait]
impl<'a> Visitor for BroadcastPass<'a> {
    async fn visit(&mut self, subscriber: &mut Subscriber) -> Visit {
        match subscriber.send(self.message).await {
            Ok(()) => {
                self.delivered += 1;
                Visit::Keep
            }
            Err(e) => {
                warn!("Client disconnected, dropping subscriber {}: {e}", subscriber.id());
                Visit::Remove
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger;
    use tokio::io::{AsyncReadExt, DuplexStream};

    fn manager() -> Manager {
        Manager::new(Message::new("hello :)"))
    }

    async fn read_frame(reader: &mut DuplexStream) -> String {
        let mut buf = vec![0u8; 64];
        let n = reader.read(&mut buf).await.unwrap();
        String::from_utf8(buf[..n].to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_broadcast_to_empty_registry_is_a_no_op() {
        assert_eq!(manager().broadcast().await, BroadcastReport::default());
    }

    #[tokio::test]
    async fn test_broadcast_removes_only_the_failing_subscriber() {
        let manager = manager();
        let (healthy, mut healthy_reader) = tokio::io::duplex(1024);
        let (failing, failing_reader) = tokio::io::duplex(1024);
        let healthy_id = manager.subscribe(Box::new(healthy)).await;
        let failing_id = manager.subscribe(Box::new(failing)).await;
        drop(failing_reader);

        let report = manager.broadcast().await;

        assert_eq!(report, BroadcastReport { delivered: 1, removed: 1 });
        assert!(manager.registry().contains(healthy_id).await);
        assert!(!manager.registry().contains(failing_id).await);
        assert_eq!(read_frame(&mut healthy_reader).await, "data: hello :)\n\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_subscriber_is_dropped_after_the_write_timeout() {
        let manager = Manager::new(Message::new("a payload longer than the pipe"))
            .with_write_timeout(Some(Duration::from_secs(1)));
        // Nobody reads the 16 byte pipe, so the first flush can't complete
        let (stalled, _stalled_reader) = tokio::io::duplex(16);
        let (healthy, mut healthy_reader) = tokio::io::duplex(1024);
        let stalled_id = manager.subscribe(Box::new(stalled)).await;
        let healthy_id = manager.subscribe(Box::new(healthy)).await;
        let started = tokio::time::Instant::now();

        let report = manager.broadcast().await;

        assert_eq!(report, BroadcastReport { delivered: 1, removed: 1 });
        assert!(started.elapsed() <= Duration::from_secs(1));
        assert!(manager.registry().contains(healthy_id).await);
        assert!(!manager.registry().contains(stalled_id).await);
        assert_eq!(
            read_frame(&mut healthy_reader).await,
            "data: a payload longer than the pipe\n\n"
        );
    }

    #[tokio::test]
    async fn test_each_trigger_drives_one_pass() {
        let manager = Arc::new(manager());
        let (handle, source) = trigger::channel(1);
        let (writer, mut reader) = tokio::io::duplex(1024);
        manager.subscribe(Box::new(writer)).await;

        let shutdown = CancellationToken::new();
        let task = Arc::clone(&manager).spawn(source, shutdown.clone());

        handle.fire().unwrap();
        assert_eq!(read_frame(&mut reader).await, "data: hello :)\n\n");
        handle.fire().unwrap();
        assert_eq!(read_frame(&mut reader).await, "data: hello :)\n\n");

        shutdown.cancel();
        task.await.unwrap();
        assert_eq!(manager.state(), LoopState::Stopped);
    }

    #[tokio::test]
    async fn test_loop_stops_when_source_closes() {
        let manager = Arc::new(manager());
        assert_eq!(manager.state(), LoopState::Idle);

        let (handle, source) = trigger::channel(1);
        let mut state = manager.watch_state();
        let task = Arc::clone(&manager).spawn(source, CancellationToken::new());

        state
            .wait_for(|s| *s == LoopState::WaitingForSignal)
            .await
            .unwrap();
        drop(handle);
        task.await.unwrap();

        assert_eq!(manager.state(), LoopState::Stopped);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_inserts_racing_a_broadcast_are_never_lost() {
        let manager = Arc::new(manager());
        let mut readers = Vec::new();

        // 10 healthy, 5 already disconnected
        for _ in 0..10 {
            let (writer, reader) = tokio::io::duplex(1024);
            manager.subscribe(Box::new(writer)).await;
            readers.push(reader);
        }
        for _ in 0..5 {
            let (writer, reader) = tokio::io::duplex(1024);
            manager.subscribe(Box::new(writer)).await;
            drop(reader);
        }
        let before = manager.registry().len().await;

        let broadcaster = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.broadcast().await })
        };
        let mut inserts = Vec::new();
        for _ in 0..20 {
            let manager = Arc::clone(&manager);
            inserts.push(tokio::spawn(async move {
                let (writer, reader) = tokio::io::duplex(1024);
                let id = manager.subscribe(Box::new(writer)).await;
                (id, reader)
            }));
        }

        let report = broadcaster.await.unwrap();
        let mut inserted = Vec::new();
        for insert in inserts {
            let (id, reader) = insert.await.unwrap();
            inserted.push(id);
            readers.push(reader);
        }

        assert_eq!(report.removed, 5);
        let ids = manager.registry().ids().await;
        assert_eq!(ids.len(), before - report.removed + inserted.len());
        let unique: std::collections::HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
        for id in inserted {
            assert!(ids.contains(&id));
        }
    }
}
