//! Pipeline counters
//!
//! A snapshot of every counter the pipeline keeps, serialisable so the CLI
//! can print it as JSON.

use crate::acquisition::ads92x4::Fault;
use crate::sink::SinkStats;
use crate::stream::encoder::EncoderStats;
use crate::stream::relay::StageStats;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeviceStats {
    pub transactions: u64,
    /// Samples the averager could not take
    pub overruns: u64,
    /// Elastic queue high-water mark (0 with the synchronous encoder)
    pub queue_high_water: usize,
    pub fault: Option<Fault>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    /// System clock cycles simulated
    pub cycles: u64,
    pub devices: Vec<DeviceStats>,
    pub encoder: EncoderStats,
    /// Relay stages, head first
    pub stages: Vec<StageStats>,
    pub sink: SinkStats,
}

impl PipelineStats {
    pub fn total_transactions(&self) -> u64 {
        self.devices.iter().map(|d| d.transactions).sum()
    }

    pub fn total_overruns(&self) -> u64 {
        self.devices.iter().map(|d| d.overruns).sum()
    }

    pub fn faults(&self) -> impl Iterator<Item = (usize, Fault)> + '_ {
        self.devices
            .iter()
            .enumerate()
            .filter_map(|(i, d)| d.fault.map(|f| (i, f)))
    }

    /// No sample lost anywhere and no device fault
    pub fn is_clean(&self) -> bool {
        self.total_overruns() == 0
            && self.encoder.missed_samples == 0
            && self.sink.underruns == 0
            && self.faults().next().is_none()
    }
}
