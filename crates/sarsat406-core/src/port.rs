//! Named Message Ports
//!
//! Each stage publishes whole-burst payloads on named ports (`"bursts"`,
//! `"bursts_1g"`, `"bursts_2g"`) in addition to its tagged sample stream.
//! A port is a bounded FIFO owned by the producer with a single consumer;
//! the stream path is the authoritative one for timing, so ports are
//! monitoring hooks with at-least-once, drop-oldest delivery.
//!
//! ## Example
//!
//! ```rust
//! use sarsat406_core::port::MessagePort;
//!
//! let mut port: MessagePort<u32> = MessagePort::new("bursts", 4);
//! port.publish(7);
//! assert_eq!(port.drain(), vec![7]);
//! assert!(port.is_empty());
//! ```

use std::collections::VecDeque;

/// A bounded single-consumer message queue with a port name.
#[derive(Debug, Clone)]
pub struct MessagePort<T> {
    name: &'static str,
    queue: VecDeque<T>,
    capacity: usize,
    /// Messages dropped because the queue was full.
    dropped: u64,
}

impl<T> MessagePort<T> {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            queue: VecDeque::new(),
            capacity: capacity.max(1),
            dropped: 0,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Publish a message. If the queue is full the oldest message is dropped
    /// so the port always reflects the most recent traffic.
    pub fn publish(&mut self, msg: T) {
        if self.queue.len() >= self.capacity {
            self.queue.pop_front();
            self.dropped += 1;
            tracing::debug!(port = self.name, dropped = self.dropped, "port overflow");
        }
        self.queue.push_back(msg);
    }

    /// Pop the oldest message, if any.
    pub fn pop(&mut self) -> Option<T> {
        self.queue.pop_front()
    }

    /// Take every queued message in publish order.
    pub fn drain(&mut self) -> Vec<T> {
        self.queue.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Messages lost to overflow since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Discard queued messages without counting them as overflow.
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let mut port = MessagePort::new("bursts", 8);
        for i in 0..5 {
            port.publish(i);
        }
        assert_eq!(port.drain(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let mut port = MessagePort::new("bursts", 2);
        port.publish(1);
        port.publish(2);
        port.publish(3);
        assert_eq!(port.dropped(), 1);
        assert_eq!(port.drain(), vec![2, 3]);
    }

    #[test]
    fn test_clear_does_not_count_as_drop() {
        let mut port = MessagePort::new("bursts", 4);
        port.publish(1);
        port.clear();
        assert_eq!(port.dropped(), 0);
        assert!(port.is_empty());
    }
}
