//! Acquisition front end
//!
//! - Sample clock divider ([`clock`])
//! - Fixed-width shift accumulator ([`shift`])
//! - ADS92x4 serial transaction engine ([`ads92x4`])
//! - Decimating averager ([`averager`])
//! - Per-channel elastic queues ([`channels`])
//! - Behavioural ADC model answering the serial protocol ([`emulator`])

pub mod ads92x4;
pub mod averager;
pub mod channels;
pub mod clock;
pub mod emulator;
pub mod shift;

use serde::{Deserialize, Serialize};

/// One acquisition instant of a dual-channel converter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Sample {
    /// Channel A
    pub a: i16,
    /// Channel B
    pub b: i16,
}

impl Sample {
    pub fn new(a: i16, b: i16) -> Self {
        Self { a, b }
    }
}
