//! Sample clock divider
//!
//! Toggles its output every `divisor / 2` system cycles, giving a square wave
//! with a period of `divisor` cycles that starts low and rises on the first edge.

#[derive(Debug, Clone)]
pub struct SampleClock {
    half_period: u32,
    counter: u32,
    level: bool,
}

impl SampleClock {
    /// `divisor` must be even and at least 2 (checked by the configuration)
    pub fn new(divisor: u32) -> Self {
        debug_assert!(divisor >= 2 && divisor % 2 == 0);
        Self {
            half_period: (divisor / 2).max(1),
            counter: 0,
            level: false,
        }
    }

    /// Output level during the current cycle
    pub fn level(&self) -> bool {
        self.level
    }

    pub fn period(&self) -> u32 {
        self.half_period * 2
    }

    pub fn clock(&mut self) {
        if self.counter == 0 {
            self.level = !self.level;
        }
        self.counter = if self.counter + 1 < self.half_period {
            self.counter + 1
        } else {
            0
        };
    }
}
