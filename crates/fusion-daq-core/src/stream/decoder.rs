//! Host-side frame decoder
//!
//! Consumes the raw sink byte stream in arbitrary chunks. Bytes that do not
//! start with the sync pattern are skipped until the frame boundary is found
//! again. The frame counter is tracked across the 16-bit wrap: a forward
//! jump of less than half the counter range is reported as lost frames,
//! anything else as a stale (repeated or reordered) frame.

use super::frame::FrameLayout;
use crate::acquisition::Sample;
use crate::SYNC_PATTERN;
use serde::Serialize;

/// Half of the 16-bit counter range
const HALF_RANGE: u16 = 32768;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub counter: u16,
    /// One sample per device, in device order
    pub samples: Vec<Sample>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecoderStats {
    pub frames: u64,
    /// Frames missing between consecutive counters
    pub lost_frames: u64,
    /// Frames whose counter went backwards or repeated
    pub stale_frames: u64,
    /// Times the decoder had to skip bytes to find a sync pattern
    pub resyncs: u64,
    pub skipped_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct FrameDecoder {
    layout: FrameLayout,
    pending: Vec<u8>,
    expected: Option<u16>,
    stats: DecoderStats,
}

impl FrameDecoder {
    pub fn new(layout: FrameLayout) -> Self {
        Self {
            layout,
            pending: Vec::with_capacity(layout.len() * 2),
            expected: None,
            stats: DecoderStats::default(),
        }
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Bytes held back waiting for the rest of a frame
    pub fn pending_bytes(&self) -> usize {
        self.pending.len()
    }

    /// Decode every complete frame in `bytes` plus whatever was pending
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Frame> {
        self.pending.extend_from_slice(bytes);
        let frame_len = self.layout.len();
        let mut frames = Vec::new();
        let mut start = 0;

        loop {
            let rest = &self.pending[start..];
            let Some(pos) = rest.windows(2).position(|w| w == SYNC_PATTERN) else {
                // Keep a trailing first sync byte, it may pair with the next chunk
                let keep = usize::from(rest.last() == Some(&SYNC_PATTERN[0]));
                let skipped = rest.len() - keep;
                if skipped > 0 {
                    self.stats.resyncs += 1;
                    self.stats.skipped_bytes += skipped as u64;
                }
                start += skipped;
                break;
            };
            if pos > 0 {
                self.stats.resyncs += 1;
                self.stats.skipped_bytes += pos as u64;
                tracing::debug!(skipped = pos, "Frame decoder resynchronised");
                start += pos;
            }
            let Some((counter, samples)) = self.layout.parse(&self.pending[start..]) else {
                break;
            };
            self.track_counter(counter);
            frames.push(Frame { counter, samples });
            start += frame_len;
        }

        self.pending.drain(..start);
        frames
    }

    fn track_counter(&mut self, counter: u16) {
        self.stats.frames += 1;
        if let Some(expected) = self.expected {
            let diff = counter.wrapping_sub(expected);
            if diff >= HALF_RANGE {
                self.stats.stale_frames += 1;
            } else if diff > 0 {
                self.stats.lost_frames += u64::from(diff);
                tracing::warn!(expected, received = counter, lost = diff, "Frame counter gap");
            }
        }
        self.expected = Some(counter.wrapping_add(1));
    }
}
