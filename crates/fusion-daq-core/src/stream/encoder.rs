//! Frame encoder
//!
//! Turns one sample per device into a frame and writes it into the relay
//! head one byte per cycle. Space for the whole frame is checked once, on
//! entry, so a started frame never stalls halfway.

use super::frame::FrameLayout;
use crate::acquisition::Sample;
use crate::config::EncoderVariant;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderState {
    Idle,
    /// Driving byte `index` of the current frame
    Push { index: usize },
    Drain,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EncoderStats {
    pub frames_emitted: u64,
    /// Cycles a sample was available but the relay head lacked room
    pub deferred_cycles: u64,
    /// Samples lost because data-ready fell while deferring (synchronous only)
    pub missed_samples: u64,
}

#[derive(Debug, Clone)]
pub struct FrameEncoder {
    variant: EncoderVariant,
    layout: FrameLayout,
    state: EncoderState,
    counter: u16,
    frame: Vec<u8>,
    deferring: bool,
    stats: EncoderStats,
}

impl FrameEncoder {
    pub fn new(variant: EncoderVariant, layout: FrameLayout) -> Self {
        Self {
            variant,
            layout,
            state: EncoderState::Idle,
            counter: 0,
            frame: Vec::with_capacity(layout.len()),
            deferring: false,
            stats: EncoderStats::default(),
        }
    }

    pub fn state(&self) -> EncoderState {
        self.state
    }

    pub fn variant(&self) -> EncoderVariant {
        self.variant
    }

    /// Counter that the next frame will carry
    pub fn counter(&self) -> u16 {
        self.counter
    }

    /// Byte written into the relay head on this edge
    pub fn write(&self) -> Option<u8> {
        match self.state {
            EncoderState::Push { index } => self.frame.get(index).copied(),
            _ => None,
        }
    }

    /// Read-enable toward the elastic queues
    pub fn ack(&self) -> bool {
        self.variant == EncoderVariant::Handshake && self.state == EncoderState::Drain
    }

    pub fn stats(&self) -> EncoderStats {
        self.stats
    }

    /// Apply one edge.
    ///
    /// `input` is one sample per device when every source has one, `has_space`
    /// is `head free >= frame length`, and `data_ready` is the engines'
    /// data-ready level, used by the synchronous variant to re-arm.
    pub fn clock(&mut self, input: Option<&[Sample]>, has_space: bool, data_ready: bool) {
        match self.state {
            EncoderState::Idle => match input {
                Some(samples) if has_space => {
                    self.layout.render(self.counter, samples, &mut self.frame);
                    self.deferring = false;
                    self.state = EncoderState::Push { index: 0 };
                }
                Some(_) => {
                    self.stats.deferred_cycles += 1;
                    self.deferring = true;
                }
                None => {
                    if self.deferring && self.variant == EncoderVariant::Synchronous {
                        self.stats.missed_samples += 1;
                        tracing::warn!(
                            counter = self.counter,
                            "Sample missed while waiting for relay space"
                        );
                    }
                    self.deferring = false;
                }
            },
            EncoderState::Push { index } => {
                if index + 1 == self.layout.len() {
                    self.counter = self.counter.wrapping_add(1);
                    self.stats.frames_emitted += 1;
                    self.state = EncoderState::Drain;
                } else {
                    self.state = EncoderState::Push { index: index + 1 };
                }
            }
            EncoderState::Drain => match self.variant {
                EncoderVariant::Handshake => self.state = EncoderState::Idle,
                EncoderVariant::Synchronous => {
                    if !data_ready {
                        self.state = EncoderState::Idle;
                    }
                }
            },
        }
    }
}
