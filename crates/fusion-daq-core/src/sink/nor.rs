//! Memory-mapped host bus sink (NOR-flash style FMC interface)
//!
//! The host polls `have_data`, then issues read transactions. Each read
//! pops one 32-bit word when the host releases NE. The address lines are not
//! decoded: every read returns the head of the word queue.
//!
//! ```text
//! Idle --NE low--> Addr --> Data --NE high / pop--> Idle
//! ```

use super::packer::WordPacker;
use super::{Sink, SinkStats};
use crate::config::SinkConfig;
use crate::fifo::{FifoError, SyncFifo};
use crate::stream::relay::TailView;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusState {
    Idle,
    Addr,
    Data,
}

/// Host-driven bus signals; all strobes active low
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NorBusIn {
    pub address: u32,
    pub ne: bool,
    pub noe: bool,
    pub nwe: bool,
}

impl Default for NorBusIn {
    fn default() -> Self {
        Self {
            address: 0,
            ne: true,
            noe: true,
            nwe: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NorBusOut {
    pub have_data: bool,
    /// `None` while the data bus is released
    pub data: Option<u32>,
}

#[derive(Debug)]
pub struct NorSink {
    packer: WordPacker,
    words: SyncFifo<u32>,
    threshold: usize,
    have_data: bool,
    state: BusState,
    stats: SinkStats,
}

impl NorSink {
    pub fn new(config: &SinkConfig) -> Result<Self, FifoError> {
        Ok(Self {
            packer: WordPacker::new(),
            words: SyncFifo::new(config.nor_fifo_depth)?,
            threshold: config.nor_have_data_threshold,
            have_data: false,
            state: BusState::Idle,
            stats: SinkStats::default(),
        })
    }

    pub fn state(&self) -> BusState {
        self.state
    }

    pub fn word_level(&self) -> usize {
        self.words.level()
    }
}

impl Sink for NorSink {
    type BusIn = NorBusIn;
    type BusOut = NorBusOut;

    fn wants_word(&self, tail: &TailView, _bus: &NorBusIn) -> bool {
        self.packer.wants_byte(tail.level, self.words.writable())
    }

    fn bus_out(&self, bus: &NorBusIn) -> NorBusOut {
        NorBusOut {
            have_data: self.have_data,
            data: (!bus.noe).then(|| self.words.dout().unwrap_or_default()),
        }
    }

    fn clock(
        &mut self,
        word: Option<u8>,
        _tail: &TailView,
        bus: &NorBusIn,
    ) -> Result<(), FifoError> {
        self.have_data = self.words.level() >= self.threshold;

        let pop = match self.state {
            BusState::Idle => {
                if !bus.ne {
                    self.state = BusState::Addr;
                }
                false
            }
            BusState::Addr => {
                self.state = BusState::Data;
                false
            }
            BusState::Data => {
                if bus.ne {
                    self.state = BusState::Idle;
                    true
                } else {
                    false
                }
            }
        };

        let pop = if pop && !self.words.readable() {
            self.stats.underruns += 1;
            tracing::warn!(underruns = self.stats.underruns, "Host read from empty sink queue");
            false
        } else {
            pop
        };

        let packed = self.packer.clock(word);
        if self.words.clock(packed, pop)?.is_some() {
            self.stats.words_delivered += 1;
            self.stats.bytes_delivered += 4;
        }
        self.stats.high_water = self.words.high_water();
        Ok(())
    }

    fn stats(&self) -> SinkStats {
        self.stats
    }
}
