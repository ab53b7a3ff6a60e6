//! ADS92x4 serial transaction engine
//!
//! Runs one protocol transaction per sample clock period:
//!
//! ```text
//! Idle -> WaitReady -> AssertSelect -> Shift (x15) -> DrainClock -> Idle
//! ```
//!
//! `AssertSelect` performs the first of the 16 shifts and `Shift` the other
//! 15. SCLK is gated on only while in `Shift`, so the converter sees 16
//! clock pulses and moves to the next bit on each of them before the engine
//! samples MISO at the end of the cycle.
//!
//! ## Ready strobe
//!
//! In zone 1, and in zone 2 with on-chip oversampling, the ready strobe is
//! registered for one cycle and honoured. In zone 2 without oversampling the
//! device guarantees readiness by the time the sample clock rises, so the
//! engine skips the wait entirely; this is a precondition of the device
//! timing, not something the engine checks.
//!
//! ## Liveness
//!
//! A device that never raises ready stalls the engine in `WaitReady`. A
//! watchdog turns that stall into an observable [`Fault`] once
//! `ready_timeout_cycles` have passed; the engine keeps waiting and does not
//! resynchronise, since that could corrupt a partially shifted word.

use super::shift::ShiftRegister16;
use super::Sample;
use crate::config::{Factor, PipelineConfig, Zone};
use serde::Serialize;

/// Number of bits per channel word
pub const WORD_BITS: u8 = 16;

/// Base of the device configuration word; the low bits carry the averaging code
pub const CONFIG_WORD_BASE: u16 = 0x1600;

/// Device configuration word written during the first transaction
pub fn config_word(oversampling: Factor) -> u16 {
    let averaging = match oversampling {
        Factor::X1 => 0,
        Factor::X2 => 2,
        Factor::X4 => 3,
    };
    CONFIG_WORD_BASE + averaging
}

/// Transaction engine states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Latch the last transaction, wait for the sample clock
    Idle,
    /// Wait for the device ready strobe
    WaitReady,
    /// Chip-select asserted, first bit shifted
    AssertSelect,
    /// Remaining bits, SCLK running
    Shift { count: u8 },
    /// Chip-select released, wait for the sample clock to fall
    DrainClock,
}

/// Hardware condition observed by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Fault {
    /// The ready strobe did not arrive within the watchdog window
    ReadyTimeout { waited_cycles: u64 },
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Fault::ReadyTimeout { waited_cycles } => {
                write!(f, "device ready strobe missing for {} cycles", waited_cycles)
            }
        }
    }
}

/// Signals driven toward the converter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AdcOutputs {
    /// Conversion start, follows the sample clock
    pub conv_st: bool,
    /// Chip-select, active low
    pub cs_n: bool,
    pub sclk: bool,
    pub mosi: bool,
}

/// Signals driven by the converter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AdcInputs {
    pub ready_strobe: bool,
    pub miso_a: bool,
    pub miso_b: bool,
}

/// Serial transaction engine for one converter
#[derive(Debug, Clone)]
pub struct TransactionEngine {
    device: usize,
    state: EngineState,
    zone: Zone,
    oversampling: Factor,
    synchronous_clock: bool,
    /// Two-flop synchroniser for an asynchronous sample clock
    smp_sync: [bool; 2],
    ready_reg: bool,
    cs_n: bool,
    shift_a: ShiftRegister16,
    shift_b: ShiftRegister16,
    config_reg: ShiftRegister16,
    /// Channel outputs, separate from the shift registers
    data: Sample,
    data_ready: bool,
    /// A transaction finished and has not been latched yet
    pending: bool,
    transactions: u64,
    waited: u64,
    timeout: u64,
    fault: Option<Fault>,
}

impl TransactionEngine {
    pub fn new(device: usize, config: &PipelineConfig) -> Self {
        Self {
            device,
            state: EngineState::Idle,
            zone: config.zone,
            oversampling: config.oversampling,
            synchronous_clock: config.smp_clk_synchronous,
            smp_sync: [false; 2],
            ready_reg: false,
            cs_n: true,
            shift_a: ShiftRegister16::default(),
            shift_b: ShiftRegister16::default(),
            config_reg: ShiftRegister16::new(config_word(config.oversampling)),
            data: Sample::default(),
            data_ready: false,
            pending: false,
            transactions: 0,
            waited: 0,
            timeout: u64::from(config.ready_timeout_cycles),
            fault: None,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Pad outputs for the current cycle; `conv_st` mirrors the sample clock
    pub fn outputs(&self, smp_clk: bool) -> AdcOutputs {
        AdcOutputs {
            conv_st: smp_clk,
            cs_n: self.cs_n,
            sclk: matches!(self.state, EngineState::Shift { .. }),
            mosi: self.config_reg.msb(),
        }
    }

    /// Last latched channel words
    pub fn data(&self) -> Sample {
        self.data
    }

    /// High from the latch of a completed transaction until the next one starts
    pub fn data_ready(&self) -> bool {
        self.data_ready
    }

    /// Completed transactions
    pub fn transactions(&self) -> u64 {
        self.transactions
    }

    pub fn fault(&self) -> Option<Fault> {
        self.fault
    }

    fn skips_ready_wait(&self) -> bool {
        self.zone == Zone::Two && self.oversampling == Factor::X1
    }

    fn shift(&mut self, pads: &AdcInputs) {
        self.shift_a.shift_in(pads.miso_a);
        self.shift_b.shift_in(pads.miso_b);
        self.config_reg.shift_in(true);
    }

    /// Apply one system clock edge.
    ///
    /// Returns the sample latched on this edge, once per completed transaction.
    pub fn clock(&mut self, smp_clk: bool, pads: &AdcInputs) -> Option<Sample> {
        let smp = if self.synchronous_clock {
            smp_clk
        } else {
            self.smp_sync[1]
        };
        let ready = if self.skips_ready_wait() {
            true
        } else {
            self.ready_reg
        };

        self.smp_sync = [smp_clk, self.smp_sync[0]];
        self.ready_reg = pads.ready_strobe;

        let mut latched = None;
        match self.state {
            EngineState::Idle => {
                self.cs_n = true;
                if self.pending {
                    self.pending = false;
                    self.data = Sample {
                        a: self.shift_a.value() as i16,
                        b: self.shift_b.value() as i16,
                    };
                    self.data_ready = true;
                    self.transactions += 1;
                    if self.transactions == 1 {
                        tracing::debug!(device = self.device, "First transaction completed");
                    }
                    latched = Some(self.data);
                }
                if smp {
                    self.state = EngineState::WaitReady;
                    self.waited = 0;
                }
            }
            EngineState::WaitReady => {
                if ready {
                    self.state = EngineState::AssertSelect;
                    self.cs_n = false;
                    self.data_ready = false;
                } else {
                    self.waited += 1;
                    if self.waited >= self.timeout && self.fault.is_none() {
                        let fault = Fault::ReadyTimeout {
                            waited_cycles: self.waited,
                        };
                        tracing::error!(device = self.device, %fault, "ADC stalled waiting for ready");
                        self.fault = Some(fault);
                    }
                }
            }
            EngineState::AssertSelect => {
                self.shift(pads);
                self.state = EngineState::Shift { count: 0 };
            }
            EngineState::Shift { count } => {
                if count == WORD_BITS - 1 {
                    self.cs_n = true;
                    self.pending = true;
                    self.state = EngineState::DrainClock;
                } else {
                    self.shift(pads);
                    self.state = EngineState::Shift { count: count + 1 };
                }
            }
            EngineState::DrainClock => {
                self.cs_n = true;
                if !smp {
                    self.state = EngineState::Idle;
                }
            }
        }
        latched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(zone: Zone, oversampling: Factor) -> TransactionEngine {
        let config = PipelineConfig {
            zone,
            oversampling,
            ready_timeout_cycles: 50,
            ..Default::default()
        };
        TransactionEngine::new(0, &config)
    }

    /// Drive one transaction with a device presenting `a`/`b` MSB first
    fn run_transaction(engine: &mut TransactionEngine, a: u16, b: u16) -> Option<Sample> {
        let mut bit = 15i32;
        let mut selected = false;
        let mut latched = None;
        for cycle in 0..40 {
            let smp = cycle < 20;
            let out = engine.outputs(smp);
            if !out.cs_n && !selected {
                selected = true;
                bit = 15;
            } else if out.sclk {
                bit -= 1;
            }
            let pads = if bit >= 0 {
                AdcInputs {
                    ready_strobe: true,
                    miso_a: (a >> bit) & 1 == 1,
                    miso_b: (b >> bit) & 1 == 1,
                }
            } else {
                AdcInputs::default()
            };
            latched = latched.or(engine.clock(smp, &pads));
        }
        // One more idle cycle latches the words
        latched.or(engine.clock(false, &AdcInputs::default()))
    }

    #[test]
    fn test_config_word() {
        assert_eq!(config_word(Factor::X1), 0x1600);
        assert_eq!(config_word(Factor::X2), 0x1602);
        assert_eq!(config_word(Factor::X4), 0x1603);
    }

    #[test]
    fn test_state_sequence_zone2() {
        let mut e = engine(Zone::Two, Factor::X1);
        let pads = AdcInputs::default();
        assert_eq!(e.state(), EngineState::Idle);
        e.clock(true, &pads);
        assert_eq!(e.state(), EngineState::WaitReady);
        e.clock(true, &pads);
        assert_eq!(e.state(), EngineState::AssertSelect);
        assert!(!e.outputs(true).cs_n);
        assert!(!e.outputs(true).sclk);
        e.clock(true, &pads);
        for count in 0..15 {
            assert_eq!(e.state(), EngineState::Shift { count });
            assert!(e.outputs(true).sclk);
            e.clock(true, &pads);
        }
        assert_eq!(e.state(), EngineState::Shift { count: 15 });
        e.clock(true, &pads);
        assert_eq!(e.state(), EngineState::DrainClock);
        assert!(e.outputs(true).cs_n);
        // Sample clock still high: stay
        e.clock(true, &pads);
        assert_eq!(e.state(), EngineState::DrainClock);
        e.clock(false, &pads);
        assert_eq!(e.state(), EngineState::Idle);
    }

    #[test]
    fn test_sclk_pulse_count() {
        let mut e = engine(Zone::Two, Factor::X1);
        let pads = AdcInputs::default();
        let mut pulses = 0;
        for cycle in 0..40 {
            if e.outputs(cycle < 20).sclk {
                pulses += 1;
            }
            e.clock(cycle < 20, &pads);
        }
        assert_eq!(pulses, 16);
    }

    #[test]
    fn test_words_captured_msb_first() {
        let mut e = engine(Zone::Two, Factor::X1);
        let sample = run_transaction(&mut e, 0x8001, 0x7FFE).unwrap();
        assert_eq!(sample, Sample::new(0x8001u16 as i16, 0x7FFE));
        assert_eq!(e.data(), sample);
        assert!(e.data_ready());
        assert_eq!(e.transactions(), 1);
    }

    #[test]
    fn test_no_sample_before_first_transaction() {
        let mut e = engine(Zone::Two, Factor::X1);
        assert_eq!(e.clock(false, &AdcInputs::default()), None);
        assert!(!e.data_ready());
    }

    #[test]
    fn test_config_word_shifted_then_ones() {
        let mut e = engine(Zone::Two, Factor::X4);
        let mut mosi = Vec::new();
        for cycle in 0..40 {
            let out = e.outputs(cycle < 20);
            if (!out.cs_n && !out.sclk) || out.sclk {
                mosi.push(out.mosi);
            }
            e.clock(cycle < 20, &AdcInputs::default());
        }
        // Select cycle plus the first 15 clock pulses carry the word
        let word = mosi
            .iter()
            .take(16)
            .fold(0u16, |w, &b| (w << 1) | u16::from(b));
        assert_eq!(word, 0x1603);
        assert!(mosi[16..].iter().all(|&b| b));
    }

    #[test]
    fn test_zone1_waits_for_registered_ready() {
        let mut e = engine(Zone::One, Factor::X1);
        let idle = AdcInputs::default();
        e.clock(true, &idle);
        assert_eq!(e.state(), EngineState::WaitReady);
        e.clock(true, &idle);
        assert_eq!(e.state(), EngineState::WaitReady);

        let ready = AdcInputs {
            ready_strobe: true,
            ..Default::default()
        };
        // Strobe is registered: seen one edge later
        e.clock(true, &ready);
        assert_eq!(e.state(), EngineState::WaitReady);
        e.clock(true, &idle);
        assert_eq!(e.state(), EngineState::AssertSelect);
    }

    #[test]
    fn test_zone2_oversampling_honours_ready() {
        let mut e = engine(Zone::Two, Factor::X2);
        let idle = AdcInputs::default();
        e.clock(true, &idle);
        for _ in 0..5 {
            e.clock(true, &idle);
            assert_eq!(e.state(), EngineState::WaitReady);
        }
    }

    #[test]
    fn test_watchdog_reports_stall_without_resync() {
        let mut e = engine(Zone::One, Factor::X1);
        let idle = AdcInputs::default();
        for _ in 0..200 {
            e.clock(true, &idle);
        }
        assert_eq!(e.state(), EngineState::WaitReady);
        assert_eq!(e.fault(), Some(Fault::ReadyTimeout { waited_cycles: 50 }));
        assert_eq!(e.transactions(), 0);
    }

    #[test]
    fn test_asynchronous_clock_is_synchronised() {
        let config = PipelineConfig {
            smp_clk_synchronous: false,
            ..Default::default()
        };
        let mut e = TransactionEngine::new(0, &config);
        let pads = AdcInputs::default();
        e.clock(true, &pads);
        assert_eq!(e.state(), EngineState::Idle);
        e.clock(true, &pads);
        assert_eq!(e.state(), EngineState::Idle);
        e.clock(true, &pads);
        assert_eq!(e.state(), EngineState::WaitReady);
    }
}
