//! Behavioural model of an ADS92x4 answering the serial protocol
//!
//! [`AdcEmulator::drive`] is called once per cycle with the pad outputs of
//! the engine for that cycle and returns what the converter drives back, so
//! the engine samples MISO on the same edge the emulator moved to the next
//! bit.

use super::ads92x4::{AdcInputs, AdcOutputs};
use super::Sample;
use std::f64::consts::PI;

/// Default conversion latency in system cycles
pub const DEFAULT_CONVERSION_CYCLES: u32 = 8;

/// Produces the analog value of conversion `index`
pub trait SampleSource: Send {
    fn sample(&mut self, index: u64) -> Sample;
}

impl<F> SampleSource for F
where
    F: FnMut(u64) -> Sample + Send,
{
    fn sample(&mut self, index: u64) -> Sample {
        self(index)
    }
}

/// Channel A: 16-point cosine at 32765 amplitude. Channel B: 16-bit ramp.
pub fn cosine_ramp(index: u64) -> Sample {
    let phase = 2.0 * PI * (index % 16) as f64 / 16.0;
    Sample {
        a: (phase.cos() * 32765.0) as i16,
        b: (index & 0xFFFF) as u16 as i16,
    }
}

pub struct AdcEmulator {
    source: Box<dyn SampleSource>,
    conversion_cycles: u32,
    stuck: bool,
    countdown: u32,
    ready: bool,
    prev_conv: bool,
    prev_cs_n: bool,
    current: Sample,
    bit_pos: u32,
    conversions: u64,
    mosi_word: u16,
    mosi_bits: u8,
    config_word: Option<u16>,
}

impl AdcEmulator {
    pub fn new(source: Box<dyn SampleSource>) -> Self {
        Self {
            source,
            conversion_cycles: DEFAULT_CONVERSION_CYCLES,
            stuck: false,
            countdown: 0,
            ready: false,
            prev_conv: false,
            prev_cs_n: true,
            current: Sample::default(),
            bit_pos: 15,
            conversions: 0,
            mosi_word: 0,
            mosi_bits: 0,
            config_word: None,
        }
    }

    /// Emulator fed by [`cosine_ramp`]
    pub fn cosine_ramp() -> Self {
        Self::new(Box::new(cosine_ramp))
    }

    pub fn with_conversion_cycles(mut self, cycles: u32) -> Self {
        self.conversion_cycles = cycles.max(1);
        self
    }

    /// Never raise the ready strobe
    pub fn stuck(mut self) -> Self {
        self.stuck = true;
        self
    }

    /// Samples handed out so far
    pub fn conversions(&self) -> u64 {
        self.conversions
    }

    /// First 16 MOSI bits clocked in after a select, MSB first
    pub fn config_word_seen(&self) -> Option<u16> {
        self.config_word
    }

    fn capture_mosi(&mut self, bit: bool) {
        if self.mosi_bits < 16 {
            self.mosi_word = (self.mosi_word << 1) | u16::from(bit);
            self.mosi_bits += 1;
            if self.mosi_bits == 16 && self.config_word.is_none() {
                self.config_word = Some(self.mosi_word);
            }
        }
    }

    pub fn drive(&mut self, out: &AdcOutputs) -> AdcInputs {
        if out.conv_st && !self.prev_conv {
            self.countdown = self.conversion_cycles;
        }
        if self.countdown > 0 {
            self.countdown -= 1;
            if self.countdown == 0 && !self.stuck {
                self.ready = true;
            }
        }

        if !out.cs_n && self.prev_cs_n {
            self.ready = false;
            self.current = self.source.sample(self.conversions);
            self.conversions += 1;
            self.bit_pos = 15;
            self.mosi_word = 0;
            self.mosi_bits = 0;
            self.capture_mosi(out.mosi);
        } else if !out.cs_n && out.sclk {
            self.bit_pos = self.bit_pos.saturating_sub(1);
            self.capture_mosi(out.mosi);
        }

        self.prev_conv = out.conv_st;
        self.prev_cs_n = out.cs_n;

        AdcInputs {
            ready_strobe: self.ready,
            miso_a: ((self.current.a as u16) >> self.bit_pos) & 1 == 1,
            miso_b: ((self.current.b as u16) >> self.bit_pos) & 1 == 1,
        }
    }
}

impl std::fmt::Debug for AdcEmulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdcEmulator")
            .field("conversion_cycles", &self.conversion_cycles)
            .field("stuck", &self.stuck)
            .field("ready", &self.ready)
            .field("conversions", &self.conversions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::ads92x4::TransactionEngine;
    use crate::config::{Factor, PipelineConfig, Zone};

    fn run(engine: &mut TransactionEngine, adc: &mut AdcEmulator, cycles: usize) -> Vec<Sample> {
        let mut out = Vec::new();
        for cycle in 0..cycles {
            let smp = cycle % 40 < 20;
            let pads = adc.drive(&engine.outputs(smp));
            if let Some(s) = engine.clock(smp, &pads) {
                out.push(s);
            }
        }
        out
    }

    #[test]
    fn test_cosine_ramp_values() {
        assert_eq!(cosine_ramp(0), Sample::new(32765, 0));
        assert_eq!(cosine_ramp(8).a, -32765);
        assert_eq!(cosine_ramp(4).a, 0);
        assert_eq!(cosine_ramp(65537).b, 1);
        assert_eq!(cosine_ramp(40000).b, 40000u16 as i16);
    }

    #[test]
    fn test_engine_reads_emulated_samples() {
        let config = PipelineConfig::default();
        let mut engine = TransactionEngine::new(0, &config);
        let mut adc = AdcEmulator::cosine_ramp();
        let samples = run(&mut engine, &mut adc, 40 * 20);
        assert!(samples.len() >= 18);
        for (i, s) in samples.iter().enumerate() {
            assert_eq!(*s, cosine_ramp(i as u64));
        }
    }

    #[test]
    fn test_zone1_with_ready_latency() {
        let config = PipelineConfig {
            zone: Zone::One,
            ..Default::default()
        };
        let mut engine = TransactionEngine::new(0, &config);
        let mut adc = AdcEmulator::cosine_ramp().with_conversion_cycles(6);
        let samples = run(&mut engine, &mut adc, 40 * 10);
        assert!(samples.len() >= 8);
        for (i, s) in samples.iter().enumerate() {
            assert_eq!(*s, cosine_ramp(i as u64));
        }
        assert_eq!(engine.fault(), None);
    }

    #[test]
    fn test_config_word_recorded() {
        let config = PipelineConfig {
            oversampling: Factor::X2,
            zone: Zone::One,
            ..Default::default()
        };
        let mut engine = TransactionEngine::new(0, &config);
        let mut adc = AdcEmulator::cosine_ramp();
        run(&mut engine, &mut adc, 40 * 3);
        assert_eq!(adc.config_word_seen(), Some(0x1602));
    }

    #[test]
    fn test_stuck_device_never_ready() {
        let mut adc = AdcEmulator::cosine_ramp().stuck();
        let mut out = AdcOutputs {
            conv_st: true,
            cs_n: true,
            ..Default::default()
        };
        for _ in 0..100 {
            assert!(!adc.drive(&out).ready_strobe);
            out.conv_st = !out.conv_st;
        }
    }
}
