//! Top-level acquisition pipeline
//!
//! Wires the sample clock, one front end per device, the frame encoder,
//! the relay chain and a sink. [`AcquisitionPipeline::tick`] first takes a
//! snapshot of every signal that crosses a component boundary and only then
//! clocks the components, in any order, off that snapshot.

use crate::acquisition::ads92x4::{AdcInputs, AdcOutputs, Fault, TransactionEngine};
use crate::acquisition::averager::Averager;
use crate::acquisition::channels::ChannelQueues;
use crate::acquisition::clock::SampleClock;
use crate::acquisition::Sample;
use crate::config::{ConfigError, EncoderVariant, PipelineConfig};
use crate::fifo::FifoError;
use crate::sink::Sink;
use crate::stats::{DeviceStats, PipelineStats};
use crate::stream::encoder::FrameEncoder;
use crate::stream::frame::FrameLayout;
use crate::stream::relay::RelayChain;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("illegal queue operation in {stage}: {source}")]
    Fifo {
        stage: &'static str,
        #[source]
        source: FifoError,
    },

    #[error("expected pad inputs for {expected} devices, got {got}")]
    PadCount { expected: usize, got: usize },
}

impl PipelineError {
    pub(crate) fn fifo(stage: &'static str) -> impl FnOnce(FifoError) -> Self {
        move |source| PipelineError::Fifo { stage, source }
    }
}

/// Engine, averager and elastic queues of one converter
#[derive(Debug)]
struct FrontEnd {
    engine: TransactionEngine,
    averager: Averager,
    queues: ChannelQueues,
}

#[derive(Debug)]
pub struct AcquisitionPipeline<S: Sink> {
    config: PipelineConfig,
    layout: FrameLayout,
    clock: SampleClock,
    devices: Vec<FrontEnd>,
    encoder: FrameEncoder,
    chain: RelayChain<u8>,
    sink: S,
    /// One sample per device for the encoder, rebuilt every cycle
    scratch: Vec<Sample>,
    cycles: u64,
}

impl<S: Sink> AcquisitionPipeline<S> {
    pub fn new(config: PipelineConfig, sink: S) -> Result<Self, PipelineError> {
        config.validate()?;

        let devices = (0..config.device_count)
            .map(|device| -> Result<FrontEnd, PipelineError> {
                Ok(FrontEnd {
                    engine: TransactionEngine::new(device, &config),
                    averager: Averager::new(device, config.decimation),
                    queues: ChannelQueues::new(config.channel_fifo_depth)
                        .map_err(PipelineError::fifo("channel queue"))?,
                })
            })
            .collect::<Result<Vec<_>, PipelineError>>()?;

        let layout = config.frame_layout();
        let chain = RelayChain::new(&config.chain.depths, config.chain.burst_size)
            .map_err(PipelineError::fifo("relay chain"))?;

        tracing::debug!(
            devices = config.device_count,
            divisor = config.sample_clock_divisor(),
            frame_len = layout.len(),
            capacity = chain.capacity(),
            "Pipeline built"
        );

        Ok(Self {
            layout,
            clock: SampleClock::new(config.sample_clock_divisor()),
            devices,
            encoder: FrameEncoder::new(config.encoder, layout),
            chain,
            sink,
            scratch: Vec::with_capacity(config.device_count),
            cycles: 0,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn frame_layout(&self) -> FrameLayout {
        self.layout
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Current sample clock level
    pub fn sample_clock(&self) -> bool {
        self.clock.level()
    }

    /// Pads driven toward converter `device` on this cycle
    pub fn adc_outputs(&self, device: usize) -> Option<AdcOutputs> {
        let smp = self.clock.level();
        self.devices.get(device).map(|d| d.engine.outputs(smp))
    }

    pub fn bus_out(&self, bus: &S::BusIn) -> S::BusOut {
        self.sink.bus_out(bus)
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn chain(&self) -> &RelayChain<u8> {
        &self.chain
    }

    pub fn encoder(&self) -> &FrameEncoder {
        &self.encoder
    }

    pub fn engine(&self, device: usize) -> Option<&TransactionEngine> {
        self.devices.get(device).map(|d| &d.engine)
    }

    /// Devices whose watchdog has fired
    pub fn faults(&self) -> Vec<(usize, Fault)> {
        self.devices
            .iter()
            .enumerate()
            .filter_map(|(i, d)| d.engine.fault().map(|f| (i, f)))
            .collect()
    }

    pub fn stats(&self) -> PipelineStats {
        let handshake = self.config.encoder == EncoderVariant::Handshake;
        PipelineStats {
            cycles: self.cycles,
            devices: self
                .devices
                .iter()
                .map(|d| DeviceStats {
                    transactions: d.engine.transactions(),
                    overruns: d.averager.overruns(),
                    queue_high_water: if handshake { d.queues.high_water() } else { 0 },
                    fault: d.engine.fault(),
                })
                .collect(),
            encoder: self.encoder.stats(),
            stages: self.chain.stage_stats(),
            sink: self.sink.stats(),
        }
    }

    /// Gather the encoder input into `scratch`; false if any device has none
    fn collect_input(&mut self) -> bool {
        self.scratch.clear();
        for d in &self.devices {
            let sample = match self.config.encoder {
                EncoderVariant::Synchronous => d.engine.data_ready().then(|| d.engine.data()),
                EncoderVariant::Handshake => d.queues.dout(),
            };
            match sample {
                Some(s) => self.scratch.push(s),
                None => return false,
            }
        }
        true
    }

    /// Advance one system clock cycle
    pub fn tick(&mut self, adc_in: &[AdcInputs], bus_in: &S::BusIn) -> Result<(), PipelineError> {
        if adc_in.len() != self.devices.len() {
            return Err(PipelineError::PadCount {
                expected: self.devices.len(),
                got: adc_in.len(),
            });
        }

        // Pre-edge snapshot
        let smp = self.clock.level();
        let handshake = self.config.encoder == EncoderVariant::Handshake;
        let has_input = self.collect_input();
        let data_ready = self.devices.iter().all(|d| d.engine.data_ready());
        let has_space = self.chain.head_free() >= self.layout.len();
        let byte = self.encoder.write();
        let ack = self.encoder.ack();
        let tail = self.chain.tail_view();
        let sink_re = self.sink.wants_word(&tail, bus_in);

        // Edge
        self.clock.clock();
        for (front, pads) in self.devices.iter_mut().zip(adc_in) {
            let latched = front.engine.clock(smp, pads);
            if handshake {
                let offered = front.averager.output().filter(|_| front.queues.writable());
                front.averager.clock(latched, offered.is_some());
                front
                    .queues
                    .clock(offered, ack)
                    .map_err(PipelineError::fifo("channel queue"))?;
            }
        }
        let input = has_input.then_some(self.scratch.as_slice());
        self.encoder.clock(input, has_space, data_ready);
        let word = self
            .chain
            .clock(byte, sink_re)
            .map_err(PipelineError::fifo("relay chain"))?;
        self.sink
            .clock(word, &tail, bus_in)
            .map_err(PipelineError::fifo("sink"))?;

        self.cycles += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{UsbBusIn, UsbSink};

    #[test]
    fn test_rejects_invalid_config() {
        let config = PipelineConfig {
            device_count: 0,
            ..Default::default()
        };
        let err = AcquisitionPipeline::new(config, UsbSink::new()).unwrap_err();
        assert_eq!(err, PipelineError::Config(ConfigError::NoDevices));
    }

    #[test]
    fn test_rejects_wrong_pad_count() {
        let mut p = AcquisitionPipeline::new(PipelineConfig::default(), UsbSink::new()).unwrap();
        let err = p.tick(&[], &UsbBusIn::default()).unwrap_err();
        assert_eq!(err, PipelineError::PadCount { expected: 1, got: 0 });
    }

    #[test]
    fn test_sample_clock_drives_conv_st() {
        let mut p = AcquisitionPipeline::new(PipelineConfig::default(), UsbSink::new()).unwrap();
        let pads = [AdcInputs::default()];
        let mut rises = Vec::new();
        let mut prev = false;
        for cycle in 0..200 {
            let out = p.adc_outputs(0).unwrap();
            if out.conv_st && !prev {
                rises.push(cycle);
            }
            prev = out.conv_st;
            p.tick(&pads, &UsbBusIn::default()).unwrap();
        }
        assert_eq!(rises, vec![1, 41, 81, 121, 161]);
        assert_eq!(p.cycles(), 200);
    }

    #[test]
    fn test_error_display() {
        let err = PipelineError::Fifo {
            stage: "relay chain",
            source: FifoError::Underflow,
        };
        assert_eq!(
            err.to_string(),
            "illegal queue operation in relay chain: read while empty"
        );
    }
}
