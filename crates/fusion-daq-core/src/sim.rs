//! Closed-loop simulation
//!
//! [`Simulator`] connects a pipeline to one [`AdcEmulator`] per device and a
//! host model on the sink side, then steps everything one system cycle at a
//! time. Per cycle the order is: converters answer the engine pads, the host
//! drives its bus, the host samples what the sink drives back, then the
//! pipeline edge is applied.

use crate::acquisition::ads92x4::AdcInputs;
use crate::acquisition::emulator::AdcEmulator;
use crate::config::PipelineConfig;
use crate::pipeline::{AcquisitionPipeline, PipelineError};
use crate::sink::{NorBusIn, NorBusOut, NorSink, Sink, UsbBusIn, UsbBusOut, UsbSink};

/// Base address the host-bus model reads from
pub const NOR_BASE_ADDRESS: u32 = 0x6000_0000;

/// Default words per host read burst, matching the default have-data threshold
pub const DEFAULT_BURST_WORDS: u32 = 32;

/// Host side of a sink
pub trait SinkHost<S: Sink> {
    /// Bus inputs for this cycle
    fn drive(&mut self) -> S::BusIn;

    /// Sample what the sink drives back on this cycle
    fn observe(&mut self, bus_in: &S::BusIn, out: &S::BusOut);

    /// Every byte received so far, in stream order
    fn received(&self) -> &[u8];

    /// Hand over the received bytes, leaving the buffer empty
    fn take_received(&mut self) -> Vec<u8>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HostPhase {
    Poll,
    /// `phase` 0-1 address, 2 output, 3-4 release
    Read { remaining: u32, phase: u8 },
}

/// Host-bus master that polls `have_data` and reads in bursts
#[derive(Debug, Clone)]
pub struct NorHost {
    burst_words: u32,
    phase: HostPhase,
    received: Vec<u8>,
}

impl Default for NorHost {
    fn default() -> Self {
        Self::new(DEFAULT_BURST_WORDS)
    }
}

impl NorHost {
    pub fn new(burst_words: u32) -> Self {
        Self {
            burst_words: burst_words.max(1),
            phase: HostPhase::Poll,
            received: Vec::new(),
        }
    }

    pub fn is_reading(&self) -> bool {
        matches!(self.phase, HostPhase::Read { .. })
    }
}

impl SinkHost<NorSink> for NorHost {
    fn drive(&mut self) -> NorBusIn {
        let HostPhase::Read { remaining, phase } = self.phase else {
            return NorBusIn::default();
        };
        let word_index = self.burst_words - remaining;
        let address = NOR_BASE_ADDRESS + 4 * word_index;
        match phase {
            0 | 1 => NorBusIn {
                address,
                ne: false,
                ..Default::default()
            },
            2 => NorBusIn {
                address,
                ne: false,
                noe: false,
                nwe: true,
            },
            _ => NorBusIn::default(),
        }
    }

    fn observe(&mut self, _bus_in: &NorBusIn, out: &NorBusOut) {
        self.phase = match self.phase {
            HostPhase::Poll if out.have_data => HostPhase::Read {
                remaining: self.burst_words,
                phase: 0,
            },
            HostPhase::Poll => HostPhase::Poll,
            HostPhase::Read { remaining, phase } => {
                if phase == 2 {
                    if let Some(word) = out.data {
                        self.received.extend_from_slice(&word.to_le_bytes());
                    }
                }
                match (phase, remaining) {
                    (4, 1) => HostPhase::Poll,
                    (4, _) => HostPhase::Read {
                        remaining: remaining - 1,
                        phase: 0,
                    },
                    _ => HostPhase::Read {
                        remaining,
                        phase: phase + 1,
                    },
                }
            }
        };
    }

    fn received(&self) -> &[u8] {
        &self.received
    }

    fn take_received(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.received)
    }
}

/// USB bridge model with a deterministic busy pattern on TXF
#[derive(Debug, Clone)]
pub struct UsbBridge {
    /// Chance per cycle, in percent, that TXF is raised
    busy_percent: u32,
    seed: u32,
    txf: bool,
    received: Vec<u8>,
}

impl Default for UsbBridge {
    fn default() -> Self {
        Self::never_busy()
    }
}

impl UsbBridge {
    pub fn never_busy() -> Self {
        Self::busy(0, 0)
    }

    pub fn busy(busy_percent: u32, seed: u32) -> Self {
        Self {
            busy_percent: busy_percent.min(100),
            seed,
            txf: false,
            received: Vec::new(),
        }
    }

    fn next_busy(&mut self) -> bool {
        if self.busy_percent == 0 {
            return false;
        }
        // LCG parameters (same as glibc)
        self.seed = self.seed.wrapping_mul(1103515245).wrapping_add(12345);
        ((self.seed >> 16) & 0x7FFF) % 100 < self.busy_percent
    }
}

impl SinkHost<UsbSink> for UsbBridge {
    fn drive(&mut self) -> UsbBusIn {
        self.txf = self.next_busy();
        UsbBusIn { txf: self.txf }
    }

    fn observe(&mut self, bus_in: &UsbBusIn, out: &UsbBusOut) {
        if !out.wr_n && !bus_in.txf {
            if let Some(byte) = out.data {
                self.received.push(byte);
            }
        }
    }

    fn received(&self) -> &[u8] {
        &self.received
    }

    fn take_received(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.received)
    }
}

pub struct Simulator<S: Sink, H: SinkHost<S>> {
    pipeline: AcquisitionPipeline<S>,
    adcs: Vec<AdcEmulator>,
    host: H,
    pads: Vec<AdcInputs>,
}

impl Simulator<UsbSink, UsbBridge> {
    /// USB sink with every device fed by the cosine/ramp source
    pub fn usb(config: PipelineConfig, bridge: UsbBridge) -> Result<Self, PipelineError> {
        let adcs = cosine_ramp_devices(&config);
        let pipeline = AcquisitionPipeline::new(config, UsbSink::new())?;
        Self::new(pipeline, adcs, bridge)
    }
}

impl Simulator<NorSink, NorHost> {
    /// Host-bus sink with every device fed by the cosine/ramp source
    pub fn nor(config: PipelineConfig, host: NorHost) -> Result<Self, PipelineError> {
        let adcs = cosine_ramp_devices(&config);
        let sink = NorSink::new(&config.sink).map_err(PipelineError::fifo("sink"))?;
        let pipeline = AcquisitionPipeline::new(config, sink)?;
        Self::new(pipeline, adcs, host)
    }
}

fn cosine_ramp_devices(config: &PipelineConfig) -> Vec<AdcEmulator> {
    (0..config.device_count)
        .map(|_| AdcEmulator::cosine_ramp())
        .collect()
}

impl<S: Sink, H: SinkHost<S>> Simulator<S, H> {
    pub fn new(
        pipeline: AcquisitionPipeline<S>,
        adcs: Vec<AdcEmulator>,
        host: H,
    ) -> Result<Self, PipelineError> {
        if adcs.len() != pipeline.device_count() {
            return Err(PipelineError::PadCount {
                expected: pipeline.device_count(),
                got: adcs.len(),
            });
        }
        let pads = Vec::with_capacity(adcs.len());
        Ok(Self {
            pipeline,
            adcs,
            host,
            pads,
        })
    }

    pub fn pipeline(&self) -> &AcquisitionPipeline<S> {
        &self.pipeline
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn adc(&self, device: usize) -> Option<&AdcEmulator> {
        self.adcs.get(device)
    }

    pub fn received(&self) -> &[u8] {
        self.host.received()
    }

    pub fn take_received(&mut self) -> Vec<u8> {
        self.host.take_received()
    }

    /// One system clock cycle
    pub fn step(&mut self) -> Result<(), PipelineError> {
        self.pads.clear();
        for (device, adc) in self.adcs.iter_mut().enumerate() {
            let out = self.pipeline.adc_outputs(device).unwrap_or_default();
            self.pads.push(adc.drive(&out));
        }
        let bus_in = self.host.drive();
        let bus_out = self.pipeline.bus_out(&bus_in);
        self.host.observe(&bus_in, &bus_out);
        self.pipeline.tick(&self.pads, &bus_in)
    }

    pub fn run(&mut self, cycles: u64) -> Result<(), PipelineError> {
        for _ in 0..cycles {
            self.step()?;
        }
        Ok(())
    }

    /// Step until `done` holds or `max_cycles` have run. Returns whether
    /// `done` was reached.
    pub fn run_until<F>(&mut self, mut done: F, max_cycles: u64) -> Result<bool, PipelineError>
    where
        F: FnMut(&Self) -> bool,
    {
        for _ in 0..max_cycles {
            if done(self) {
                return Ok(true);
            }
            self.step()?;
        }
        Ok(done(self))
    }
}
