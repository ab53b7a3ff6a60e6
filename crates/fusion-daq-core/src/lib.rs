//! Fusion DAQ Core - cycle-accurate model of the acquisition gateware
//!
//! This library models the streaming pipeline that reads a dual-channel
//! ADS92x4-class converter, frames the samples into a byte stream and relays
//! that stream through a chain of burst-controlled FIFOs into one of two
//! sinks (a memory-mapped host bus or a USB-FIFO bridge).
//!
//! Every component keeps its registered state in a struct, exposes the
//! signals it drives for the current cycle through accessors, and applies one
//! rising clock edge in `clock(..)`. [`pipeline::AcquisitionPipeline`] reads
//! every signal before clocking any component, so all of them observe the
//! same cycle.

pub mod acquisition;
pub mod capture;
pub mod config;
pub mod fifo;
pub mod pipeline;
pub mod sim;
pub mod sink;
pub mod stats;
pub mod stream;

pub use acquisition::ads92x4::{AdcInputs, AdcOutputs, Fault, TransactionEngine};
pub use acquisition::emulator::{cosine_ramp, AdcEmulator, SampleSource};
pub use acquisition::Sample;
pub use capture::CaptureWriter;
pub use config::{
    ChainConfig, ConfigError, EncoderVariant, Factor, PipelineConfig, SinkConfig, SinkKind, Zone,
};
pub use fifo::{FifoError, SyncFifo};
pub use pipeline::{AcquisitionPipeline, PipelineError};
pub use sim::{NorHost, SinkHost, Simulator, UsbBridge};
pub use sink::{NorSink, Sink, UsbSink};
pub use stats::PipelineStats;
pub use stream::decoder::{Frame, FrameDecoder};
pub use stream::frame::FrameLayout;
pub use stream::relay::RelayChain;

/// Library version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date stamped by build.rs
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Two-byte pattern opening every frame
pub const SYNC_PATTERN: [u8; 2] = [0xF0, 0x0F];

/// Sync pattern plus the 16-bit frame counter
pub const FRAME_HEADER_LEN: usize = 4;

/// Maximum conversion rate of the ADS92x4 (3 MSPS)
pub const MAX_SAMPLE_FREQ: f64 = 3e6;
