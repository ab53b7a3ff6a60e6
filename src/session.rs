//! Synthetic acquisition session
//!
//! Builds a simulator for the configured sink, runs it in slices, feeds the
//! received bytes through a [`FrameDecoder`] and, when a capture path is
//! set, through a [`CaptureWriter`]. The run ends once enough frames were
//! decoded, the cycle limit is reached, a device faults or `stop` is raised.

use crate::config::AppConfig;
use anyhow::{Context, Result};
use fusion_daq_core::stream::decoder::DecoderStats;
use fusion_daq_core::{
    cosine_ramp, CaptureWriter, Factor, FrameDecoder, NorHost, PipelineStats, Simulator, Sink,
    SinkHost, SinkKind, UsbBridge,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cycles simulated between decoder passes
const SLICE_CYCLES: u64 = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum StopReason {
    FramesReached,
    CycleLimit,
    DeviceFault,
    Interrupted,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub sink: SinkKind,
    pub stop_reason: StopReason,
    pub cycles: u64,
    /// Simulated time at the configured system clock
    pub simulated_seconds: f64,
    pub bytes_received: u64,
    pub frames_decoded: u64,
    /// Frames whose samples differ from the cosine/ramp source
    /// (only checked without decimation)
    pub mismatched_frames: Option<u64>,
    pub decoder: DecoderStats,
    pub pipeline: PipelineStats,
    pub capture: Option<PathBuf>,
    pub capture_bytes: u64,
}

impl SessionReport {
    /// Frames arrived in order, none lost, none corrupted, no device fault
    pub fn is_clean(&self) -> bool {
        self.decoder.lost_frames == 0
            && self.decoder.stale_frames == 0
            && self.mismatched_frames.unwrap_or(0) == 0
            && self.pipeline.is_clean()
    }
}

/// Run one acquisition as described by `config`
pub fn run_session(config: &AppConfig, stop: &AtomicBool) -> Result<SessionReport> {
    let pipeline = config.pipeline.clone();
    match pipeline.sink.kind {
        SinkKind::Usb => {
            let bridge = UsbBridge::busy(config.usb_busy_percent, config.usb_seed);
            let sim = Simulator::usb(pipeline, bridge).context("Failed to build USB pipeline")?;
            drive(sim, config, stop)
        }
        SinkKind::Nor => {
            let host = NorHost::new(config.nor_burst_words);
            let sim = Simulator::nor(pipeline, host).context("Failed to build host-bus pipeline")?;
            drive(sim, config, stop)
        }
    }
}

fn drive<S, H>(mut sim: Simulator<S, H>, config: &AppConfig, stop: &AtomicBool) -> Result<SessionReport>
where
    S: Sink,
    H: SinkHost<S>,
{
    let capture = config
        .capture
        .as_ref()
        .map(CaptureWriter::start)
        .transpose()?;
    let mut decoder = FrameDecoder::new(sim.pipeline().frame_layout());
    let check_waveform = config.pipeline.decimation == Factor::X1;
    let limit = config.cycle_limit();

    let mut frames_decoded = 0u64;
    let mut mismatched = 0u64;
    let mut bytes_received = 0u64;

    tracing::info!(
        sink = ?config.pipeline.sink.kind,
        devices = config.pipeline.device_count,
        frames = config.frames,
        sample_rate_hz = config.pipeline.effective_sample_freq(),
        "Acquisition started"
    );

    let stop_reason = loop {
        if stop.load(Ordering::SeqCst) {
            break StopReason::Interrupted;
        }
        let cycles = sim.pipeline().cycles();
        if cycles >= limit {
            tracing::warn!(cycles, frames_decoded, "Cycle limit reached");
            break StopReason::CycleLimit;
        }

        sim.run(SLICE_CYCLES.min(limit - cycles))?;

        let bytes = sim.take_received();
        bytes_received += bytes.len() as u64;
        for frame in decoder.push(&bytes) {
            if check_waveform
                && frame
                    .samples
                    .iter()
                    .any(|s| *s != cosine_ramp(frames_decoded))
            {
                mismatched += 1;
            }
            frames_decoded += 1;
        }
        if let Some(writer) = &capture {
            writer.send(bytes)?;
        }

        if frames_decoded >= config.frames {
            break StopReason::FramesReached;
        }
        if !sim.pipeline().faults().is_empty() {
            break StopReason::DeviceFault;
        }
    };

    let capture_bytes = match capture {
        Some(writer) => writer.finish()?,
        None => 0,
    };

    let pipeline = sim.pipeline().stats();
    let report = SessionReport {
        sink: config.pipeline.sink.kind,
        stop_reason,
        cycles: pipeline.cycles,
        simulated_seconds: pipeline.cycles as f64 / config.pipeline.sys_clk_freq,
        bytes_received,
        frames_decoded,
        mismatched_frames: check_waveform.then_some(mismatched),
        decoder: decoder.stats(),
        pipeline,
        capture: config.capture.clone(),
        capture_bytes,
    };
    tracing::info!(
        frames = report.frames_decoded,
        lost = report.decoder.lost_frames,
        cycles = report.cycles,
        reason = ?report.stop_reason,
        "Acquisition finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_usb_session() {
        let config = AppConfig {
            frames: 20,
            ..Default::default()
        };
        let stop = AtomicBool::new(false);
        let report = run_session(&config, &stop).unwrap();
        assert_eq!(report.stop_reason, StopReason::FramesReached);
        assert!(report.frames_decoded >= 20);
        assert!(report.is_clean(), "{:?}", report);
    }

    #[test]
    fn test_stop_flag_interrupts() {
        let config = AppConfig::default();
        let stop = AtomicBool::new(true);
        let report = run_session(&config, &stop).unwrap();
        assert_eq!(report.stop_reason, StopReason::Interrupted);
        assert_eq!(report.cycles, 0);
    }

    #[test]
    fn test_capture_matches_received_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.bin");
        let config = AppConfig {
            frames: 10,
            capture: Some(path.clone()),
            ..Default::default()
        };
        let report = run_session(&config, &AtomicBool::new(false)).unwrap();
        assert_eq!(report.capture_bytes, report.bytes_received);
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len() as u64, report.bytes_received);
        assert_eq!(&bytes[..2], &[0xF0, 0x0F]);
    }
}
