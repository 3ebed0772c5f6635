//! Bounded capture buffers for process output
//!
//! One-shot probes capture stdout/stderr through fixed-size ring buffers so
//! a misbehaving tool cannot balloon memory. When the cap is exceeded the
//! oldest bytes are dropped and the buffer remembers that truncation
//! happened.

use std::collections::VecDeque;
use std::fmt;

/// A byte ring buffer that keeps at most `max_bytes` of the newest data.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    buffer: VecDeque<u8>,
    max_bytes: usize,
    total_bytes_written: usize,
}

impl RingBuffer {
    /// Create a new ring buffer with the specified maximum size.
    #[must_use]
    pub fn new(max_bytes: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(max_bytes.min(8192)),
            max_bytes,
            total_bytes_written: 0,
        }
    }

    /// Write a chunk, dropping the oldest bytes once the cap is reached.
    pub fn write(&mut self, data: &[u8]) {
        self.total_bytes_written += data.len();

        // A chunk larger than the whole buffer reduces to its tail.
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

    /// Total bytes ever written, including bytes dropped by truncation.
    #[must_use]
    pub const fn total_bytes_written(&self) -> usize {
        self.total_bytes_written
    }

    #[must_use]
    pub const fn was_truncated(&self) -> bool {
        self.total_bytes_written > self.max_bytes
    }

    /// Consume the buffer and return the retained bytes in order.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer.into_iter().collect()
    }
}

impl fmt::Display for RingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes: Vec<u8> = self.buffer.iter().copied().collect();
        write!(f, "{}", String::from_utf8_lossy(&bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_buffer_basic() {
        let mut buffer = RingBuffer::new(10);
        buffer.write(b"hello");
        assert_eq!(buffer.to_string(), "hello");
        assert_eq!(buffer.len(), 5);
        assert!(!buffer.is_empty());
        assert!(!buffer.was_truncated());
    }

    #[test]
    fn test_ring_buffer_truncation() {
        let mut buffer = RingBuffer::new(10);
        buffer.write(b"hello");
        buffer.write(b"world");
        buffer.write(b"!");

        assert_eq!(buffer.len(), 10);
        assert_eq!(buffer.to_string(), "elloworld!");
        assert_eq!(buffer.total_bytes_written(), 11);
        assert!(buffer.was_truncated());
    }

    #[test]
    fn test_ring_buffer_oversized_chunk() {
        let mut buffer = RingBuffer::new(5);
        buffer.write(b"hello world");

        assert_eq!(buffer.len(), 5);
        assert_eq!(buffer.to_string(), "world");
        assert_eq!(buffer.total_bytes_written(), 11);
        assert!(buffer.was_truncated());
    }

    #[test]
    fn test_ring_buffer_exact_capacity() {
        let mut buffer = RingBuffer::new(10);
        buffer.write(b"1234567890");

        assert_eq!(buffer.to_string(), "1234567890");
        assert!(!buffer.was_truncated());
    }

    #[test]
    fn test_ring_buffer_multiple_writes() {
        let mut buffer = RingBuffer::new(10);
        buffer.write(b"12345");
        buffer.write(b"67890");
        buffer.write(b"ABCDE");

        assert_eq!(buffer.to_string(), "67890ABCDE");
        assert_eq!(buffer.total_bytes_written(), 15);
    }

    #[test]
    fn test_ring_buffer_into_bytes() {
        let mut buffer = RingBuffer::new(4);
        buffer.write(b"abcdef");
        assert_eq!(buffer.into_bytes(), b"cdef");
    }
}
