//! Decimating averager
//!
//! Sums `N` consecutive samples per channel and emits their mean, rounded
//! toward negative infinity by the arithmetic shift. With `N = 1` the averager
//! is a single register stage.

use super::Sample;
use crate::config::Factor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AveragerState {
    Idle,
    /// Collecting; `count` samples summed so far
    Sum { count: u32 },
    /// Holding a result until the downstream queue takes it
    WaitAccept,
}

#[derive(Debug, Clone)]
pub struct Averager {
    device: usize,
    factor: Factor,
    state: AveragerState,
    acc_a: i32,
    acc_b: i32,
    out: Sample,
    overruns: u64,
}

impl Averager {
    pub fn new(device: usize, factor: Factor) -> Self {
        Self {
            device,
            factor,
            state: AveragerState::Idle,
            acc_a: 0,
            acc_b: 0,
            out: Sample::default(),
            overruns: 0,
        }
    }

    pub fn state(&self) -> AveragerState {
        self.state
    }

    /// Can take a sample on this edge
    pub fn ready(&self) -> bool {
        self.state != AveragerState::WaitAccept
    }

    /// Averaged sample offered downstream
    pub fn output(&self) -> Option<Sample> {
        (self.state == AveragerState::WaitAccept).then_some(self.out)
    }

    /// Samples the averager could not take
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    /// Apply one edge. `accepted` tells whether downstream took [`output`](Self::output).
    pub fn clock(&mut self, input: Option<Sample>, accepted: bool) {
        let Some(sample) = input else {
            if accepted && self.state == AveragerState::WaitAccept {
                self.state = AveragerState::Idle;
            }
            return;
        };

        let count = match self.state {
            AveragerState::Idle => 0,
            AveragerState::Sum { count } => count,
            AveragerState::WaitAccept => {
                self.overruns += 1;
                tracing::warn!(
                    device = self.device,
                    overruns = self.overruns,
                    "Averager overrun, sample dropped"
                );
                if accepted {
                    self.state = AveragerState::Idle;
                }
                return;
            }
        };

        if count == 0 {
            self.acc_a = i32::from(sample.a);
            self.acc_b = i32::from(sample.b);
        } else {
            self.acc_a += i32::from(sample.a);
            self.acc_b += i32::from(sample.b);
        }

        let count = count + 1;
        if count == self.factor.value() {
            let shift = self.factor.shift();
            self.out = Sample {
                a: (self.acc_a >> shift) as i16,
                b: (self.acc_b >> shift) as i16,
            };
            self.state = AveragerState::WaitAccept;
        } else {
            self.state = AveragerState::Sum { count };
        }
    }
}
