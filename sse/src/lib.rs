//! Server-Sent Events (SSE) delivery core.
//!
//! This crate pushes messages to connected clients over long-lived HTTP
//! responses. It knows nothing about HTTP itself: the `web` crate hands it
//! byte streams and maps its errors onto status codes.
//!
//! # Architecture
//!
//! Two delivery models share the same connection primitives:
//!
//! - **Broadcast** (`/subscribe`): a client's response stream is taken over
//!   and stored in the [`SubscriberRegistry`]. A single long-lived loop in the
//!   [`Manager`] waits on a [`TriggerSource`] (SIGHUP, admin call) and writes
//!   one message to every subscriber, closing and removing the ones whose
//!   connection failed.
//! - **Per-connection pool** (`/events`): an [`EventStream`] spawns a
//!   [`ProducerPool`] whose producers periodically send into one shared
//!   channel, drained by a single [`MessageSender`]. The stream is bounded by
//!   a [`CancellationSignal`] combining the request timeout and the client's
//!   connection.
//!
//! # Concurrency rules
//!
//! - The registry is the only state shared across requests. It sits behind
//!   one lock that is held for exactly one insert or one full broadcast pass.
//! - A subscriber is written by at most one task at a time, and a pool's
//!   response stream is written only by its sender.
//! - A pool's channel closes exactly once, after every producer returned.
//! - Cancellation is polled between productions; a producer may overshoot
//!   the deadline by less than one interval.
//!
//! # Modules
//!
//! - `connection`: buffered [`Connection`] adapter and [`Subscriber`]
//! - `registry`: lock-guarded [`SubscriberRegistry`] with remove-during-scan
//! - `manager`: broadcast passes and the trigger loop
//! - `trigger`: trigger sources (signals, in-process channel, merge)
//! - `message`: event-stream framing
//! - `cancel`, `pool`, `sender`, `stream`: the per-connection model
//! - `error`: error kinds shared with the web layer

pub mod cancel;
pub mod connection;
pub mod error;
pub mod manager;
pub mod message;
pub mod pool;
pub mod registry;
pub mod sender;
pub mod stream;
pub mod trigger;

pub use cancel::CancellationSignal;
pub use connection::{Connection, ConnectionId, Subscriber, Transport};
pub use error::{Error, ErrorKind, Result};
pub use manager::{BroadcastReport, LoopState, Manager};
pub use message::Message;
pub use pool::{PoolReport, ProducerPool};
pub use registry::SubscriberRegistry;
pub use sender::MessageSender;
pub use stream::{EventStream, StreamReport};
pub use trigger::{TriggerHandle, TriggerSource};

pub use tokio_util::sync::CancellationToken;
