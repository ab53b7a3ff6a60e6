//! Pipeline configuration
//!
//! All parameters are fixed when the pipeline is built. Numeric selectors
//! (oversampling, decimation, zone) deserialize through `TryFrom<u8>` so an
//! invalid value is rejected while parsing as well as by [`PipelineConfig::validate`].

use crate::stream::frame::FrameLayout;
use crate::MAX_SAMPLE_FREQ;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Shortest transaction (sample clock seen, ready skipped, 16 shifts, drain) in system cycles
pub const TRANSACTION_CYCLES: u32 = 20;

/// Errors rejected when a pipeline is constructed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("factor must be one of 1, 2, 4; got {0}")]
    InvalidFactor(u8),

    #[error("zone must be 1 or 2; got {0}")]
    InvalidZone(u8),

    #[error("device count must be at least 1")]
    NoDevices,

    #[error("{what} depth must be greater than zero")]
    ZeroDepth { what: &'static str },

    #[error("burst size must be greater than zero")]
    ZeroBurst,

    #[error("relay chain needs at least 2 stages, got {0}")]
    ChainTooShort(usize),

    #[error("stage {stage} depth {depth} must exceed the burst size {burst}")]
    BurstTooLarge {
        stage: usize,
        depth: usize,
        burst: usize,
    },

    #[error("relay head of depth {depth} has no room for a {frame}-byte frame beside a partial burst of {burst}")]
    HeadTooShallow {
        frame: usize,
        burst: usize,
        depth: usize,
    },

    #[error("relay tail of depth {depth} with burst {burst} can strand fewer than 4 bytes in front of the word packer")]
    TailTooShallow { depth: usize, burst: usize },

    #[error("sample frequency {freq} Hz outside (0, {max}] Hz")]
    SampleFrequency { freq: f64, max: f64 },

    #[error("system clock {sys_clk} Hz must be positive")]
    SystemClock { sys_clk: f64 },

    #[error("sample clock divisor {0} must be even")]
    OddClockDivisor(u32),

    #[error("sample period of {cycles} cycles is shorter than the {min} cycles a transaction needs")]
    SamplePeriodTooShort { cycles: u32, min: u32 },

    #[error("decimation requires the handshake frame encoder")]
    DecimationRequiresHandshake,

    #[error("have-data threshold {threshold} must be in 1..={depth}")]
    Threshold { threshold: usize, depth: usize },

    #[error("ready timeout must be greater than zero")]
    ZeroTimeout,
}

/// Averaging ratio shared by the chip oversampling and the decimating averager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Factor {
    #[default]
    X1,
    X2,
    X4,
}

impl Factor {
    pub fn value(self) -> u32 {
        match self {
            Factor::X1 => 1,
            Factor::X2 => 2,
            Factor::X4 => 4,
        }
    }

    /// Right shift turning an N-sample sum into the mean
    pub fn shift(self) -> u32 {
        self.value().trailing_zeros()
    }
}

impl TryFrom<u8> for Factor {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Factor::X1),
            2 => Ok(Factor::X2),
            4 => Ok(Factor::X4),
            other => Err(ConfigError::InvalidFactor(other)),
        }
    }
}

impl From<Factor> for u8 {
    fn from(f: Factor) -> Self {
        f.value() as u8
    }
}

/// Device timing zone, decides whether the ready strobe is sampled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Zone {
    /// Ready strobe is always registered and honoured
    One,
    /// Ready is assumed once the sample clock is seen when oversampling is 1
    #[default]
    Two,
}

impl TryFrom<u8> for Zone {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Zone::One),
            2 => Ok(Zone::Two),
            other => Err(ConfigError::InvalidZone(other)),
        }
    }
}

impl From<Zone> for u8 {
    fn from(z: Zone) -> Self {
        match z {
            Zone::One => 1,
            Zone::Two => 2,
        }
    }
}

/// Frame encoder generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncoderVariant {
    /// Reads the engines directly and re-arms on the falling data-ready level
    Synchronous,
    /// Reads the elastic queues and acknowledges each consumed sample
    #[default]
    Handshake,
}

/// Terminal consumer of the byte stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    /// Memory-mapped host bus (NOR-style address/strobe handshake)
    Nor,
    /// FT245-style USB FIFO bridge
    #[default]
    Usb,
}

/// Burst-relay chain geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Depth of every stage, head first; the last entry is the plain tail queue
    pub depths: Vec<usize>,
    /// Words moved per burst between adjacent stages
    pub burst_size: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            depths: vec![256; 4],
            burst_size: 8,
        }
    }
}

/// Sink adapter parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub kind: SinkKind,
    /// Word queue depth of the host-bus sink
    pub nor_fifo_depth: usize,
    /// Word level at which the host-bus sink raises `have_data`
    pub nor_have_data_threshold: usize,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            kind: SinkKind::default(),
            nor_fifo_depth: 64,
            nor_have_data_threshold: 32,
        }
    }
}

/// Complete, immutable pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// System clock in Hz
    pub sys_clk_freq: f64,
    /// Requested sample clock in Hz
    pub target_sample_freq: f64,
    /// Number of ADS92x4 units sharing the sample clock
    pub device_count: usize,
    /// On-chip averaging written into the device configuration word
    pub oversampling: Factor,
    pub zone: Zone,
    /// Sample clock already in the system clock domain
    pub smp_clk_synchronous: bool,
    /// Averager ratio upstream of the elastic queues
    pub decimation: Factor,
    /// Depth of each per-channel elastic queue
    pub channel_fifo_depth: usize,
    pub encoder: EncoderVariant,
    pub chain: ChainConfig,
    pub sink: SinkConfig,
    /// Cycles in the ready wait before the watchdog reports a fault
    pub ready_timeout_cycles: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sys_clk_freq: 60e6,
            target_sample_freq: 1.5e6,
            device_count: 1,
            oversampling: Factor::X1,
            zone: Zone::Two,
            smp_clk_synchronous: true,
            decimation: Factor::X1,
            channel_fifo_depth: 256,
            encoder: EncoderVariant::Handshake,
            chain: ChainConfig::default(),
            sink: SinkConfig::default(),
            ready_timeout_cycles: 4096,
        }
    }
}

/// Whether a tail of `depth` fed in bursts of `burst` always refills before
/// the 4-byte packer starves.
///
/// Between packer words the tail level is a multiple of `gcd(burst, 4)`, so
/// the largest level that can strand the packer is `4 - gcd`. The upstream
/// controller refills while `level < depth - burst`, which has to cover it.
fn tail_feeds_packer(depth: usize, burst: usize) -> bool {
    let step = [4, 2, 1]
        .into_iter()
        .find(|g| burst % g == 0)
        .unwrap_or(1);
    depth.saturating_sub(burst) > 4 - step
}

impl PipelineConfig {
    /// Check every invariant the pipeline relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_count == 0 {
            return Err(ConfigError::NoDevices);
        }
        if self.channel_fifo_depth == 0 {
            return Err(ConfigError::ZeroDepth {
                what: "channel queue",
            });
        }
        if self.ready_timeout_cycles == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.encoder == EncoderVariant::Synchronous && self.decimation != Factor::X1 {
            return Err(ConfigError::DecimationRequiresHandshake);
        }

        self.validate_clock()?;
        self.validate_chain()?;

        let sink = &self.sink;
        if sink.nor_fifo_depth == 0 {
            return Err(ConfigError::ZeroDepth { what: "sink word" });
        }
        if sink.nor_have_data_threshold == 0 || sink.nor_have_data_threshold > sink.nor_fifo_depth
        {
            return Err(ConfigError::Threshold {
                threshold: sink.nor_have_data_threshold,
                depth: sink.nor_fifo_depth,
            });
        }
        Ok(())
    }

    fn validate_clock(&self) -> Result<(), ConfigError> {
        if !(self.sys_clk_freq > 0.0) {
            return Err(ConfigError::SystemClock {
                sys_clk: self.sys_clk_freq,
            });
        }
        if !(self.target_sample_freq > 0.0 && self.target_sample_freq <= MAX_SAMPLE_FREQ) {
            return Err(ConfigError::SampleFrequency {
                freq: self.target_sample_freq,
                max: MAX_SAMPLE_FREQ,
            });
        }
        let divisor = self.raw_divisor();
        if divisor % 2 != 0 {
            return Err(ConfigError::OddClockDivisor(divisor));
        }
        let min = 2 * TRANSACTION_CYCLES;
        if divisor < min {
            return Err(ConfigError::SamplePeriodTooShort {
                cycles: divisor,
                min,
            });
        }
        Ok(())
    }

    fn validate_chain(&self) -> Result<(), ConfigError> {
        let chain = &self.chain;
        if chain.depths.len() < 2 {
            return Err(ConfigError::ChainTooShort(chain.depths.len()));
        }
        if chain.burst_size == 0 {
            return Err(ConfigError::ZeroBurst);
        }
        if chain.depths.contains(&0) {
            return Err(ConfigError::ZeroDepth { what: "relay stage" });
        }
        // Every stage that receives bursts must hold more than one burst,
        // otherwise its upstream controller never sees enough space.
        for (stage, &depth) in chain.depths.iter().enumerate().skip(1) {
            if depth <= chain.burst_size {
                return Err(ConfigError::BurstTooLarge {
                    stage,
                    depth,
                    burst: chain.burst_size,
                });
            }
        }
        // The head drains in whole bursts, so up to B - 1 bytes can stay
        // behind; a frame must still fit next to them.
        let frame = self.frame_layout().len();
        let head = chain.depths[0];
        if head < frame + chain.burst_size - 1 {
            return Err(ConfigError::HeadTooShallow {
                frame,
                burst: chain.burst_size,
                depth: head,
            });
        }
        if self.sink.kind == SinkKind::Nor {
            let tail = chain.depths[chain.depths.len() - 1];
            if !tail_feeds_packer(tail, chain.burst_size) {
                return Err(ConfigError::TailTooShallow {
                    depth: tail,
                    burst: chain.burst_size,
                });
            }
        }
        Ok(())
    }

    fn raw_divisor(&self) -> u32 {
        (self.sys_clk_freq / self.target_sample_freq).floor() as u32
    }

    /// System cycles per sample clock period
    pub fn sample_clock_divisor(&self) -> u32 {
        self.raw_divisor()
    }

    /// Sample rate actually produced by the integer divider, in Hz
    pub fn effective_sample_freq(&self) -> f64 {
        self.sys_clk_freq / self.sample_clock_divisor() as f64
    }

    pub fn frame_layout(&self) -> FrameLayout {
        FrameLayout::new(self.device_count)
    }

    /// Total words the relay chain can hold
    pub fn chain_capacity(&self) -> usize {
        self.chain.depths.iter().sum()
    }
}
