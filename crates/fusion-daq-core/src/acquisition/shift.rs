//! 16-bit shift accumulator
//!
//! Bits enter at the LSB and move toward the MSB, so a word clocked in MSB
//! first ends up in its natural order after 16 shifts. The same register
//! drives a serial output from its MSB.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShiftRegister16 {
    bits: u16,
}

impl ShiftRegister16 {
    pub fn new(initial: u16) -> Self {
        Self { bits: initial }
    }

    /// Shift left by one, inserting `bit` at the LSB
    pub fn shift_in(&mut self, bit: bool) {
        self.bits = (self.bits << 1) | u16::from(bit);
    }

    /// Bit presented on a serial output line
    pub fn msb(&self) -> bool {
        self.bits & 0x8000 != 0
    }

    pub fn value(&self) -> u16 {
        self.bits
    }
}
