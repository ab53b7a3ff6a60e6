//! 8→32 word packer
//!
//! Reads four consecutive bytes and assembles them little-endian, so the
//! first byte of the stream ends up in bits 0..8 of the word.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackerState {
    Idle,
    /// `have` bytes of the current word collected
    Collect { have: u32 },
}

#[derive(Debug, Clone)]
pub struct WordPacker {
    state: PackerState,
    word: u32,
}

impl Default for WordPacker {
    fn default() -> Self {
        Self::new()
    }
}

impl WordPacker {
    pub fn new() -> Self {
        Self {
            state: PackerState::Idle,
            word: 0,
        }
    }

    pub fn state(&self) -> PackerState {
        self.state
    }

    /// Read-enable for this edge. A word is only started when the source
    /// holds all four bytes and the destination has room, both checked once.
    pub fn wants_byte(&self, source_level: usize, dest_writable: bool) -> bool {
        match self.state {
            PackerState::Idle => source_level >= 4 && dest_writable,
            PackerState::Collect { .. } => true,
        }
    }

    /// Apply one edge with the byte read on it. Returns the finished word.
    pub fn clock(&mut self, byte: Option<u8>) -> Option<u32> {
        let byte = byte?;
        let have = match self.state {
            PackerState::Idle => {
                self.word = 0;
                0
            }
            PackerState::Collect { have } => have,
        };
        self.word |= u32::from(byte) << (8 * have);
        if have == 3 {
            self.state = PackerState::Idle;
            Some(self.word)
        } else {
            self.state = PackerState::Collect { have: have + 1 };
            None
        }
    }
}
