//! Bounded output capture.
//!
//! Test suites can be chatty; only the tail matters for parsing the final
//! summary and for the report, so older bytes are dropped once the cap is hit.

use std::collections::VecDeque;
use std::fmt;

/// Byte buffer that keeps the most recent `max_bytes` bytes.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    buffer: VecDeque<u8>,
    max_bytes: usize,
    total_bytes_written: usize,
}

impl RingBuffer {
    #[must_use]
    pub fn new(max_bytes: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(max_bytes.min(8192)),
            max_bytes,
            total_bytes_written: 0,
        }
    }

    pub fn write(&mut self, data: &[u8]) {
        self.total_bytes_written += data.len();
        if self.max_bytes == 0 {
            return;
        }
        let data = if data.len() > self.max_bytes {
            &data[data.len() - self.max_bytes..]
        } else {
            data
        };
        let overflow = (self.buffer.len() + data.len()).saturating_sub(self.max_bytes);
        self.buffer.drain(..overflow);
        self.buffer.extend(data);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    #[must_use]
    pub const fn total_bytes_written(&self) -> usize {
        self.total_bytes_written
    }

    #[must_use]
    pub const fn was_truncated(&self) -> bool {
        self.total_bytes_written > self.max_bytes
    }
}

impl fmt::Display for RingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (a, b) = self.buffer.as_slices();
        let mut bytes = Vec::with_capacity(a.len() + b.len());
        bytes.extend_from_slice(a);
        bytes.extend_from_slice(b);
        write!(f, "{}", String::from_utf8_lossy(&bytes))
    }
}
