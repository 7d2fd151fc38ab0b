use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, Utc};
use serde::Serialize;

const DATA_FIELD: &[u8] = b"data: ";

/// An immutable text payload framed as one event-stream record.
///
/// Every line of the payload becomes its own `data:` line and the record is
/// terminated by a blank line, so conforming `EventSource` parsers rebuild the
/// original text (joined with `\n`) as the event's data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    data: String,
}

impl Message {
    pub fn new(data: impl Into<String>) -> Self {
        Self { data: data.into() }
    }

    /// Serializes `value` as a single-line JSON payload.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_string(value).map(Self::new)
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    /// Encodes the record as it goes on the wire.
    pub fn frame(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.data.len() + DATA_FIELD.len() + 2);
        for line in self.data.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            buf.put_slice(DATA_FIELD);
            buf.put_slice(line.as_bytes());
            buf.put_u8(b'\n');
        }
        buf.put_u8(b'\n');
        buf.freeze()
    }
}

/// Payload emitted by one producer of an `/events` stream.
#[derive(Debug, Clone, Serialize)]
pub struct Tick {
    /// Index of the producer within its pool, starting at 1.
    pub producer: usize,
    /// Per-producer counter, starting at 1.
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
}

impl Tick {
    pub fn now(producer: usize, sequence: u64) -> Self {
        Self {
            producer,
            sequence,
            timestamp: Utc::now(),
        }
    }
}
