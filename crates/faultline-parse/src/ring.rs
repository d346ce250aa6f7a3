// Copyright (c) 2026 - present The faultline developers
// SPDX-License-Identifier: MIT

//! Fixed-capacity line buffer
//!
//! Bounds how much output is kept per test: once full, every new line
//! overwrites the oldest one.

/// Capacity used when a caller asks for a zero-sized buffer
pub const DEFAULT_CAPACITY: usize = 20;

/// A circular buffer of lines
#[derive(Debug, Clone)]
pub struct RingBuffer {
    slots: Vec<String>,
    head: usize,
    len: usize,
}

impl RingBuffer {
    /// Create a buffer holding at most `capacity` lines
    ///
    /// A capacity of zero falls back to [`DEFAULT_CAPACITY`].
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = if capacity == 0 {
            DEFAULT_CAPACITY
        } else {
            capacity
        };
        Self {
            slots: vec![String::new(); capacity],
            head: 0,
            len: 0,
        }
    }

    /// Append a line, overwriting the oldest one when full
    pub fn push(&mut self, line: impl Into<String>) {
        let capacity = self.slots.len();
        self.slots[self.head] = line.into();
        self.head = (self.head + 1) % capacity;
        if self.len < capacity {
            self.len += 1;
        }
    }

    /// Iterate over the stored lines, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        let capacity = self.slots.len();
        let start = if self.len == capacity { self.head } else { 0 };
        (0..self.len).map(move |i| self.slots[(start + i) % capacity].as_str())
    }

    /// Stored lines, oldest first
    #[must_use]
    pub fn lines(&self) -> Vec<&str> {
        self.iter().collect()
    }

    /// Stored lines concatenated with `sep`
    #[must_use]
    pub fn join(&self, sep: &str) -> String {
        self.lines().join(sep)
    }

    /// Drop every line, keeping the backing storage
    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    /// Number of stored lines
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if nothing is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Maximum number of lines
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

impl Default for RingBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    #[test]
    fn test_zero_capacity_uses_default() {
        let buffer = RingBuffer::new(0);
        assert_eq!(buffer.capacity(), DEFAULT_CAPACITY);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_empty_buffer_has_no_lines() {
        let buffer = RingBuffer::new(3);
        assert!(buffer.lines().is_empty());
        assert_eq!(buffer.join("\n"), "");
    }

    #[test]
    fn test_partial_fill_keeps_order() {
        let mut buffer = RingBuffer::new(3);
        buffer.push("a");
        buffer.push("b");
        assert_eq!(buffer.lines(), vec!["a", "b"]);
    }

    #[test]
    fn test_overwrites_oldest() {
        let mut buffer = RingBuffer::new(3);
        for line in ["a", "b", "c", "d", "e"] {
            buffer.push(line);
        }
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.lines(), vec!["c", "d", "e"]);
        assert_eq!(buffer.join(","), "c,d,e");
    }

    #[test]
    fn test_clear_keeps_capacity() {
        let mut buffer = RingBuffer::new(2);
        buffer.push("a");
        buffer.push("b");
        buffer.push("c");
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), 2);

        buffer.push("d");
        assert_eq!(buffer.lines(), vec!["d"]);
    }

    #[test]
    fn test_capacity_one() {
        let mut buffer = RingBuffer::new(1);
        buffer.push("a");
        buffer.push("b");
        assert_eq!(buffer.lines(), vec!["b"]);
    }
}
