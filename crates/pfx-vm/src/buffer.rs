//! External buffers shared between the host and running invocations.

use std::sync::atomic::{AtomicU32, Ordering};

/// A named external memory region: a data array of 32-bit words with an
/// atomic counter word at its head.
///
/// The counter is the one sanctioned cross-invocation communication
/// channel; [`Buffer::bump_counter`] hands every caller a distinct ticket,
/// which programs use for append and free-list patterns. Data words carry
/// no ordering guarantees of their own — well-formed programs write
/// disjoint, invocation-derived regions.
#[derive(Debug)]
pub struct Buffer {
    counter: AtomicU32,
    data: Vec<AtomicU32>,
}

impl Buffer {
    /// A zero-filled buffer of `words` data words.
    pub fn with_len(words: u32) -> Self {
        Self {
            counter: AtomicU32::new(0),
            data: (0..words).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    /// A buffer initialized from raw words, counter at zero.
    pub fn from_words(words: &[u32]) -> Self {
        Self {
            counter: AtomicU32::new(0),
            data: words.iter().map(|&w| AtomicU32::new(w)).collect(),
        }
    }

    /// Data length in words, not counting the counter.
    pub fn len(&self) -> u32 {
        self.data.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// One data word, or `None` outside the buffer.
    pub fn read_element(&self, index: u32) -> Option<u32> {
        self.data
            .get(index as usize)
            .map(|word| word.load(Ordering::Relaxed))
    }

    /// Writes one data word. Returns false outside the buffer.
    pub fn write_element(&self, index: u32, value: u32) -> bool {
        match self.data.get(index as usize) {
            Some(word) => {
                word.store(value, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// The counter word's current value.
    pub fn read_counter(&self) -> u32 {
        self.counter.load(Ordering::Relaxed)
    }

    /// Resets the counter, typically between dispatches.
    pub fn set_counter(&self, value: u32) {
        self.counter.store(value, Ordering::Relaxed);
    }

    /// Atomically increments the counter and returns the value it held
    /// before; concurrent callers each get a distinct ticket.
    pub fn bump_counter(&self) -> u32 {
        self.counter.fetch_add(1, Ordering::Relaxed)
    }

    /// Snapshot of the data words.
    pub fn to_words(&self) -> Vec<u32> {
        self.data
            .iter()
            .map(|word| word.load(Ordering::Relaxed))
            .collect()
    }
}
