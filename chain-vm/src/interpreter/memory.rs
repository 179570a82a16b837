//! Byte-addressed frame memory
//!
//! Memory grows in 32-byte words. Callers pay for expansion through
//! [`expansion_cost`] before touching a region; reads and writes assume the
//! region has already been expanded.

use crate::params::CommonGasParams;
use chain_core::Gas;
use primitive_types::U256;

/// Number of 32-byte words covering `size` bytes
pub fn words(size: usize) -> u64 {
    (size as u64).div_ceil(32)
}

/// Total cost of a memory of `words` words
pub fn memory_cost(words: u64, params: &CommonGasParams) -> Gas {
    let linear = words.saturating_mul(params.memory);
    let quadratic = words.saturating_mul(words) / params.quad_coeff_div.max(1);
    linear.saturating_add(quadratic)
}

/// Gas to grow memory from `current` bytes so that `end` bytes are addressable
pub fn expansion_cost(current: usize, end: usize, params: &CommonGasParams) -> Gas {
    let (old, new) = (words(current), words(end));
    if new <= old {
        return 0;
    }
    memory_cost(new, params) - memory_cost(old, params)
}

#[derive(Debug, Clone, Default)]
pub struct Memory {
    data: Vec<u8>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size in bytes, always a multiple of 32
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Make `end` bytes addressable
    pub fn expand(&mut self, end: usize) {
        let size = words(end) as usize * 32;
        if size > self.data.len() {
            self.data.resize(size, 0);
        }
    }

    pub fn read(&self, offset: usize, size: usize) -> Vec<u8> {
        if size == 0 {
            return Vec::new();
        }
        self.data[offset..offset + size].to_vec()
    }

    pub fn write(&mut self, offset: usize, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Copy `size` bytes of `source` starting at `source_offset`, zero padded
    pub fn write_padded(&mut self, offset: usize, source: &[u8], source_offset: usize, size: usize) {
        if size == 0 {
            return;
        }
        let target = &mut self.data[offset..offset + size];
        target.fill(0);
        if source_offset < source.len() {
            let available = (source.len() - source_offset).min(size);
            target[..available].copy_from_slice(&source[source_offset..source_offset + available]);
        }
    }

    pub fn read_word(&self, offset: usize) -> U256 {
        U256::from_big_endian(&self.data[offset..offset + 32])
    }

    pub fn write_word(&mut self, offset: usize, value: U256) {
        value.to_big_endian(&mut self.data[offset..offset + 32]);
    }

    pub fn write_byte(&mut self, offset: usize, value: u8) {
        self.data[offset] = value;
    }
}
