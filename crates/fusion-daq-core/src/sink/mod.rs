//! Sink adapters draining the relay chain tail
//!
//! - STM32 FMC-style memory-mapped bus with an 8→32 packer ([`nor`], [`packer`])
//! - FT245-style USB FIFO bridge ([`ft245`])

pub mod ft245;
pub mod nor;
pub mod packer;

use crate::fifo::FifoError;
use crate::stream::relay::TailView;
use serde::Serialize;
use std::fmt::Debug;

pub use ft245::{UsbBusIn, UsbBusOut, UsbSink};
pub use nor::{NorBusIn, NorBusOut, NorSink};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SinkStats {
    /// Bus words handed to the host (bytes for the USB bridge)
    pub words_delivered: u64,
    pub bytes_delivered: u64,
    /// Host reads that found nothing to return
    pub underruns: u64,
    /// Highest level of the sink's own word queue, if it has one
    pub high_water: usize,
}

/// Terminal consumer of the byte stream.
///
/// Like every component, a sink exposes its outputs for the current cycle
/// and applies one edge in [`Sink::clock`]. The pipeline asks
/// [`Sink::wants_word`] before the edge and hands over the tail word it
/// read, if any.
pub trait Sink {
    /// Signals driven by the host side
    type BusIn: Copy + Default + Debug;
    /// Signals driven toward the host side
    type BusOut: Copy + Debug;

    /// Read-enable toward the chain tail for this edge
    fn wants_word(&self, tail: &TailView, bus: &Self::BusIn) -> bool;

    fn bus_out(&self, bus: &Self::BusIn) -> Self::BusOut;

    fn clock(
        &mut self,
        word: Option<u8>,
        tail: &TailView,
        bus: &Self::BusIn,
    ) -> Result<(), FifoError>;

    fn stats(&self) -> SinkStats;
}
