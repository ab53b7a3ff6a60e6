//! Fusion DAQ - cycle-accurate acquisition pipeline model
//!
//! This library re-exports the pipeline model from `fusion-daq-core` and
//! adds the application layer: the JSON run configuration ([`config`]) and
//! the acquisition session that drives a simulator, decodes the stream and
//! optionally captures it to disk ([`session`]).

pub mod config;
pub mod session;

pub use fusion_daq_core::config as pipeline_config;
pub use fusion_daq_core::{acquisition, capture, fifo, pipeline, sim, sink, stats, stream};

pub use fusion_daq_core::{
    cosine_ramp, AcquisitionPipeline, AdcEmulator, AdcInputs, AdcOutputs, CaptureWriter,
    ChainConfig, ConfigError, EncoderVariant, Factor, Fault, FifoError, Frame, FrameDecoder,
    FrameLayout, NorHost, NorSink, PipelineConfig, PipelineError, PipelineStats, RelayChain,
    Sample, SampleSource, Simulator, Sink, SinkConfig, SinkHost, SinkKind, SyncFifo,
    TransactionEngine, UsbBridge, UsbSink, Zone,
};
pub use fusion_daq_core::{BUILD_DATE, FRAME_HEADER_LEN, MAX_SAMPLE_FREQ, SYNC_PATTERN, VERSION};

pub use config::AppConfig;
pub use session::{run_session, SessionReport};
