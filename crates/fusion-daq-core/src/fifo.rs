//! Bounded synchronous FIFO shared by every stage of the pipeline
//!
//! Models a single-clock FIFO with first-word fall-through: `dout()` always
//! shows the oldest word while the queue is readable. Status flags are what
//! the writer and the reader see before the edge; [`SyncFifo::clock`] applies
//! at most one write and one read per edge and rejects operations that the
//! pre-edge status does not allow.

use ringbuf::traits::{Consumer, Observer, Producer};
use ringbuf::HeapRb;
use thiserror::Error;

/// Illegal queue operations
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FifoError {
    #[error("queue depth must be greater than zero")]
    ZeroDepth,

    #[error("write while full (depth {depth})")]
    Overflow { depth: usize },

    #[error("read while empty")]
    Underflow,
}

/// Bounded single-writer single-reader queue of fixed-width words
pub struct SyncFifo<T> {
    storage: HeapRb<T>,
    depth: usize,
    /// Highest level ever observed after an edge
    high_water: usize,
}

impl<T: Copy> SyncFifo<T> {
    /// Create an empty queue holding at most `depth` words
    pub fn new(depth: usize) -> Result<Self, FifoError> {
        if depth == 0 {
            return Err(FifoError::ZeroDepth);
        }
        Ok(Self {
            storage: HeapRb::new(depth),
            depth,
            high_water: 0,
        })
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Current occupancy
    pub fn level(&self) -> usize {
        self.storage.occupied_len()
    }

    /// Free slots
    pub fn free(&self) -> usize {
        self.depth - self.level()
    }

    pub fn writable(&self) -> bool {
        !self.storage.is_full()
    }

    pub fn readable(&self) -> bool {
        !self.storage.is_empty()
    }

    /// Oldest word, if any (first-word fall-through output)
    pub fn dout(&self) -> Option<T> {
        self.storage.try_peek().copied()
    }

    /// Highest occupancy reached so far
    pub fn high_water(&self) -> usize {
        self.high_water
    }

    /// Append one word
    pub fn push(&mut self, word: T) -> Result<(), FifoError> {
        self.storage
            .try_push(word)
            .map_err(|_| FifoError::Overflow { depth: self.depth })?;
        self.high_water = self.high_water.max(self.level());
        Ok(())
    }

    /// Remove the oldest word
    pub fn pop(&mut self) -> Result<T, FifoError> {
        self.storage.try_pop().ok_or(FifoError::Underflow)
    }

    /// Apply one clock edge with an optional write (`we` + `din`) and a read
    /// enable. Both are checked against the status before the edge, so a
    /// write into a full queue is rejected even if the same edge reads.
    ///
    /// Returns the word removed by the read, if `re` was set.
    pub fn clock(&mut self, din: Option<T>, re: bool) -> Result<Option<T>, FifoError> {
        if din.is_some() && !self.writable() {
            return Err(FifoError::Overflow { depth: self.depth });
        }
        if re && !self.readable() {
            return Err(FifoError::Underflow);
        }
        let out = if re { Some(self.pop()?) } else { None };
        if let Some(word) = din {
            self.push(word)?;
        }
        Ok(out)
    }
}

impl<T> std::fmt::Debug for SyncFifo<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncFifo")
            .field("depth", &self.depth)
            .field("level", &self.storage.occupied_len())
            .field("high_water", &self.high_water)
            .finish()
    }
}
