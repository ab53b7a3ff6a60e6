//! Burst-relay FIFO chain
//!
//! A chain of `n` queues joined by `n - 1` burst controllers. Controller `i`
//! moves words from queue `i` into queue `i + 1`, and only in whole bursts:
//!
//! ```text
//! Idle --(level(i) >= B && level(i+1) < depth(i+1) - B)--> Burst(B-1)
//! Burst(k) --transfer--> Burst(k-1) ... Burst(0) --transfer--> Idle
//! ```
//!
//! The entry cycle moves nothing; each burst cycle then moves one word. The
//! guards are evaluated on pre-edge levels, and since a controller is the
//! only reader of its source and the only writer of its destination, a
//! burst that starts always finishes without under- or overflow.
//!
//! A transfer pops the source and pushes the destination on the same edge,
//! so there are no words in flight. Words short of a full burst stay in
//! their stage until more data arrives; the last queue is plain and hands
//! out whatever it holds.

use crate::fifo::{FifoError, SyncFifo};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurstState {
    Idle,
    /// Transfers left after this one
    Burst { countdown: usize },
}

/// Status of the last queue, as seen by a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TailView {
    pub readable: bool,
    pub level: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageStats {
    pub depth: usize,
    pub high_water: usize,
    /// Bursts started toward the next stage (always 0 for the tail)
    pub bursts: u64,
}

#[derive(Debug)]
struct BurstController {
    state: BurstState,
    bursts: u64,
}

#[derive(Debug)]
pub struct RelayChain<T> {
    queues: Vec<SyncFifo<T>>,
    controllers: Vec<BurstController>,
    burst_size: usize,
    /// Scratch: which controllers transfer on the current edge
    transferring: Vec<bool>,
}

impl<T: Copy> RelayChain<T> {
    /// Build a chain from stage depths, head first. The caller validates the
    /// geometry; only zero depths are rejected here.
    pub fn new(depths: &[usize], burst_size: usize) -> Result<Self, FifoError> {
        let queues = depths
            .iter()
            .map(|&d| SyncFifo::new(d))
            .collect::<Result<Vec<_>, _>>()?;
        let links = queues.len().saturating_sub(1);
        let controllers = (0..links)
            .map(|_| BurstController {
                state: BurstState::Idle,
                bursts: 0,
            })
            .collect();
        Ok(Self {
            queues,
            controllers,
            burst_size,
            transferring: vec![false; links],
        })
    }

    pub fn burst_size(&self) -> usize {
        self.burst_size
    }

    pub fn stage_count(&self) -> usize {
        self.queues.len()
    }

    /// Total words the chain can hold
    pub fn capacity(&self) -> usize {
        self.queues.iter().map(SyncFifo::depth).sum()
    }

    /// Words held across all stages
    pub fn occupancy(&self) -> usize {
        self.queues.iter().map(SyncFifo::level).sum()
    }

    pub fn level(&self, stage: usize) -> usize {
        self.queues.get(stage).map_or(0, SyncFifo::level)
    }

    pub fn controller_state(&self, link: usize) -> Option<BurstState> {
        self.controllers.get(link).map(|c| c.state)
    }

    pub fn writable(&self) -> bool {
        self.queues.first().is_some_and(SyncFifo::writable)
    }

    pub fn head_free(&self) -> usize {
        self.queues.first().map_or(0, SyncFifo::free)
    }

    pub fn tail_view(&self) -> TailView {
        self.queues.last().map_or(TailView::default(), |q| TailView {
            readable: q.readable(),
            level: q.level(),
        })
    }

    pub fn tail_dout(&self) -> Option<T> {
        self.queues.last().and_then(SyncFifo::dout)
    }

    pub fn stage_stats(&self) -> Vec<StageStats> {
        self.queues
            .iter()
            .enumerate()
            .map(|(i, q)| StageStats {
                depth: q.depth(),
                high_water: q.high_water(),
                bursts: self.controllers.get(i).map_or(0, |c| c.bursts),
            })
            .collect()
    }

    fn advance_controllers(&mut self) {
        let b = self.burst_size;
        for (i, ctrl) in self.controllers.iter_mut().enumerate() {
            let src = &self.queues[i];
            let dst = &self.queues[i + 1];
            let (transfer, next) = match ctrl.state {
                BurstState::Idle => {
                    let has_data = src.level() >= b;
                    let has_space = dst.level() < dst.depth().saturating_sub(b);
                    if has_data && has_space {
                        ctrl.bursts += 1;
                        (false, BurstState::Burst { countdown: b - 1 })
                    } else {
                        (false, BurstState::Idle)
                    }
                }
                BurstState::Burst { countdown: 0 } => (true, BurstState::Idle),
                BurstState::Burst { countdown } => (
                    true,
                    BurstState::Burst {
                        countdown: countdown - 1,
                    },
                ),
            };
            self.transferring[i] = transfer;
            ctrl.state = next;
        }
    }

    /// Apply one edge: optional write into the head, optional read from the
    /// tail. Returns the word read.
    pub fn clock(&mut self, din: Option<T>, re: bool) -> Result<Option<T>, FifoError> {
        if din.is_some() && !self.writable() {
            return Err(FifoError::Overflow {
                depth: self.queues[0].depth(),
            });
        }
        if re && !self.tail_view().readable {
            return Err(FifoError::Underflow);
        }

        // Every guard sees the pre-edge levels
        self.advance_controllers();

        let last = self.queues.len() - 1;
        let out = if re {
            Some(self.queues[last].pop()?)
        } else {
            None
        };
        // Downstream first, so each queue is read before it is written
        for i in (0..self.controllers.len()).rev() {
            if self.transferring[i] {
                let word = self.queues[i].pop()?;
                self.queues[i + 1].push(word)?;
            }
        }
        if let Some(word) = din {
            self.queues[0].push(word)?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Feed `words` as fast as the head allows while reading whenever the
    /// tail is readable and `read(cycle)` says so
    fn pump(
        chain: &mut RelayChain<u32>,
        words: &[u32],
        cycles: usize,
        read: impl Fn(usize) -> bool,
    ) -> Vec<u32> {
        let mut next = 0;
        let mut out = Vec::new();
        for cycle in 0..cycles {
            let din = (next < words.len() && chain.writable()).then(|| words[next]);
            let re = chain.tail_view().readable && read(cycle);
            if let Some(w) = chain.clock(din, re).unwrap() {
                out.push(w);
            }
            if din.is_some() {
                next += 1;
            }
            for stage in 0..chain.stage_count() {
                assert!(chain.level(stage) <= chain.stage_stats()[stage].depth);
            }
        }
        out
    }

    #[test]
    fn test_single_burst_timing() {
        let mut chain = RelayChain::new(&[16, 16], 4).unwrap();
        for w in 0..4u8 {
            chain.clock(Some(w), false).unwrap();
        }
        assert_eq!(chain.level(0), 4);
        // Entry cycle: no transfer
        chain.clock(None, false).unwrap();
        assert_eq!(chain.controller_state(0), Some(BurstState::Burst { countdown: 3 }));
        assert_eq!(chain.level(1), 0);
        for moved in 1..=4 {
            chain.clock(None, false).unwrap();
            assert_eq!(chain.level(1), moved);
        }
        assert_eq!(chain.controller_state(0), Some(BurstState::Idle));
        assert_eq!(chain.stage_stats()[0].bursts, 1);
    }

    #[test]
    fn test_partial_burst_stays_resident() {
        let mut chain = RelayChain::new(&[16, 16], 4).unwrap();
        for w in 0..3u8 {
            chain.clock(Some(w), false).unwrap();
        }
        for _ in 0..50 {
            chain.clock(None, false).unwrap();
        }
        assert_eq!(chain.level(0), 3);
        assert!(!chain.tail_view().readable);
    }

    #[test]
    fn test_lossless_in_order() {
        let mut chain = RelayChain::new(&[32, 20, 24, 32], 8).unwrap();
        let words: Vec<u32> = (0..800).collect();
        let out = pump(&mut chain, &words, 5000, |_| true);
        assert_eq!(out, words);
        assert_eq!(chain.occupancy(), 0);
    }

    #[test]
    fn test_lossless_under_backpressure() {
        let mut chain = RelayChain::new(&[16, 12, 12], 4).unwrap();
        let words: Vec<u32> = (0..400).collect();
        // Reader takes one word every seventh cycle
        let out = pump(&mut chain, &words, 400 * 7 + 500, |c| c % 7 == 0);
        assert_eq!(out, words);
        for stats in chain.stage_stats() {
            assert!(stats.high_water <= stats.depth);
        }
    }

    #[test]
    fn test_space_margin_respected() {
        let mut chain = RelayChain::new(&[64, 12], 4).unwrap();
        for w in 0..64u32 {
            chain.clock(Some(w), false).unwrap();
        }
        for _ in 0..200 {
            chain.clock(None, false).unwrap();
        }
        // Bursts start only while level(1) < 12 - 4: 0 -> 4 -> 8, then stop
        assert_eq!(chain.level(1), 8);
        assert_eq!(chain.level(0), 56);
    }

    #[test]
    fn test_illegal_operations_rejected() {
        let mut chain = RelayChain::new(&[2, 8], 1).unwrap();
        assert_eq!(chain.clock(None, true), Err(FifoError::Underflow));
        chain.clock(Some(1u8), false).unwrap();
        chain.clock(Some(2), false).unwrap();
        // 2 words in the head, the controller has not drained them yet
        assert!(!chain.writable());
        assert_eq!(
            chain.clock(Some(3), false),
            Err(FifoError::Overflow { depth: 2 })
        );
    }

    #[test]
    fn test_capacity() {
        let chain = RelayChain::<u8>::new(&[256; 4], 8).unwrap();
        assert_eq!(chain.capacity(), 1024);
        assert_eq!(chain.stage_count(), 4);
    }
}
