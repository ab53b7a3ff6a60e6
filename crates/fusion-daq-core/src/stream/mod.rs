//! Byte stream side of the pipeline
//!
//! - Frame layout and rendering ([`frame`])
//! - Frame encoder state machine ([`encoder`])
//! - Burst-relay FIFO chain ([`relay`])
//! - Host-side frame decoder with counter gap detection ([`decoder`])

pub mod decoder;
pub mod encoder;
pub mod frame;
pub mod relay;
