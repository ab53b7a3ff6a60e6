//! Per-device elastic queues
//!
//! Channel A and B each get their own queue, but both are always written and
//! read on the same edge, so their levels never diverge. Status comes from
//! channel A.

use super::Sample;
use crate::fifo::{FifoError, SyncFifo};

#[derive(Debug)]
pub struct ChannelQueues {
    a: SyncFifo<i16>,
    b: SyncFifo<i16>,
}

impl ChannelQueues {
    pub fn new(depth: usize) -> Result<Self, FifoError> {
        Ok(Self {
            a: SyncFifo::new(depth)?,
            b: SyncFifo::new(depth)?,
        })
    }

    pub fn writable(&self) -> bool {
        self.a.writable()
    }

    pub fn readable(&self) -> bool {
        self.a.readable()
    }

    pub fn level(&self) -> usize {
        self.a.level()
    }

    pub fn high_water(&self) -> usize {
        self.a.high_water()
    }

    /// Oldest sample of both channels
    pub fn dout(&self) -> Option<Sample> {
        Some(Sample {
            a: self.a.dout()?,
            b: self.b.dout()?,
        })
    }

    pub fn clock(&mut self, write: Option<Sample>, re: bool) -> Result<Option<Sample>, FifoError> {
        let a = self.a.clock(write.map(|s| s.a), re)?;
        let b = self.b.clock(write.map(|s| s.b), re)?;
        debug_assert_eq!(self.a.level(), self.b.level());
        Ok(a.zip(b).map(|(a, b)| Sample { a, b }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_step() {
        let mut q = ChannelQueues::new(4).unwrap();
        assert!(!q.readable());
        assert_eq!(q.dout(), None);

        q.clock(Some(Sample::new(1, -1)), false).unwrap();
        q.clock(Some(Sample::new(2, -2)), false).unwrap();
        assert_eq!(q.level(), 2);
        assert_eq!(q.dout(), Some(Sample::new(1, -1)));

        let read = q.clock(Some(Sample::new(3, -3)), true).unwrap();
        assert_eq!(read, Some(Sample::new(1, -1)));
        assert_eq!(q.dout(), Some(Sample::new(2, -2)));
        assert_eq!(q.level(), 2);
    }

    #[test]
    fn test_full_rejects_write() {
        let mut q = ChannelQueues::new(1).unwrap();
        q.clock(Some(Sample::new(1, 1)), false).unwrap();
        assert!(!q.writable());
        assert_eq!(
            q.clock(Some(Sample::new(2, 2)), false),
            Err(FifoError::Overflow { depth: 1 })
        );
        assert_eq!(q.level(), 1);
    }
}
