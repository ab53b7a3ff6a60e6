//! FT245-style USB FIFO bridge sink
//!
//! One staging register sits between the chain tail and the bridge. A byte
//! is sent on every cycle where one is staged and the bridge reports room
//! (TXF low); the register refills from the tail whenever it is empty or
//! being sent, whether or not the bridge is currently accepting.

use super::{Sink, SinkStats};
use crate::fifo::FifoError;
use crate::stream::relay::TailView;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UsbBusIn {
    /// Transmit FIFO full, active high
    pub txf: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsbBusOut {
    /// Read strobe, held inactive
    pub rd_n: bool,
    /// Write strobe, active low
    pub wr_n: bool,
    pub data: Option<u8>,
}

#[derive(Debug, Default)]
pub struct UsbSink {
    staged: Option<u8>,
    stats: SinkStats,
}

impl UsbSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn staged(&self) -> Option<u8> {
        self.staged
    }

    fn sending(&self, bus: &UsbBusIn) -> bool {
        self.staged.is_some() && !bus.txf
    }
}

impl Sink for UsbSink {
    type BusIn = UsbBusIn;
    type BusOut = UsbBusOut;

    fn wants_word(&self, tail: &TailView, bus: &UsbBusIn) -> bool {
        tail.readable && (self.staged.is_none() || self.sending(bus))
    }

    fn bus_out(&self, bus: &UsbBusIn) -> UsbBusOut {
        UsbBusOut {
            rd_n: true,
            wr_n: !self.sending(bus),
            data: self.staged,
        }
    }

    fn clock(
        &mut self,
        word: Option<u8>,
        _tail: &TailView,
        bus: &UsbBusIn,
    ) -> Result<(), FifoError> {
        if self.sending(bus) {
            self.staged = None;
            self.stats.words_delivered += 1;
            self.stats.bytes_delivered += 1;
        }
        if let Some(byte) = word {
            debug_assert!(self.staged.is_none());
            self.staged = Some(byte);
        }
        Ok(())
    }

    fn stats(&self) -> SinkStats {
        self.stats
    }
}
