//! Frame layout
//!
//! ```text
//! 0xF0 0x0F cnt_lo cnt_hi | a_lo a_hi b_lo b_hi (device 0) | ... (device N-1)
//! ```

use crate::acquisition::Sample;
use crate::{FRAME_HEADER_LEN, SYNC_PATTERN};

/// Bytes per device: two channels, two bytes each
pub const BYTES_PER_DEVICE: usize = 4;

/// Fixed frame geometry for a given device count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    device_count: usize,
}

impl FrameLayout {
    pub fn new(device_count: usize) -> Self {
        Self { device_count }
    }

    pub fn device_count(&self) -> usize {
        self.device_count
    }

    /// Frame length in bytes, constant for the lifetime of the pipeline
    pub fn len(&self) -> usize {
        FRAME_HEADER_LEN + BYTES_PER_DEVICE * self.device_count
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Render one frame into `buf`, replacing its contents
    pub fn render(&self, counter: u16, samples: &[Sample], buf: &mut Vec<u8>) {
        debug_assert_eq!(samples.len(), self.device_count);
        buf.clear();
        buf.extend_from_slice(&SYNC_PATTERN);
        buf.extend_from_slice(&counter.to_le_bytes());
        for sample in samples {
            buf.extend_from_slice(&sample.a.to_le_bytes());
            buf.extend_from_slice(&sample.b.to_le_bytes());
        }
    }

    /// Parse one aligned frame; `None` if the slice is short or unsynchronised
    pub fn parse(&self, bytes: &[u8]) -> Option<(u16, Vec<Sample>)> {
        if bytes.len() < self.len() || bytes[..2] != SYNC_PATTERN {
            return None;
        }
        let counter = u16::from_le_bytes([bytes[2], bytes[3]]);
        let samples = bytes[FRAME_HEADER_LEN..self.len()]
            .chunks_exact(BYTES_PER_DEVICE)
            .map(|c| Sample {
                a: i16::from_le_bytes([c[0], c[1]]),
                b: i16::from_le_bytes([c[2], c[3]]),
            })
            .collect();
        Some((counter, samples))
    }
}
