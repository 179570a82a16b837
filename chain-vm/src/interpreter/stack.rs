//! Operand stack

use crate::{VmError, VmResult};
use primitive_types::U256;

/// Maximum number of words on the stack
pub const STACK_LIMIT: usize = 1024;

/// Word stack of one frame
#[derive(Debug, Clone, Default)]
pub struct Stack {
    data: Vec<U256>,
}

impl Stack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn push(&mut self, value: U256) -> VmResult<()> {
        if self.data.len() >= STACK_LIMIT {
            return Err(VmError::StackOverflow);
        }
        self.data.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> VmResult<U256> {
        self.data.pop().ok_or(VmError::StackUnderflow)
    }

    /// Pop `N` words, top first
    pub fn pop_n<const N: usize>(&mut self) -> VmResult<[U256; N]> {
        if self.data.len() < N {
            return Err(VmError::StackUnderflow);
        }
        let mut words = [U256::zero(); N];
        for word in words.iter_mut() {
            *word = self.pop()?;
        }
        Ok(words)
    }

    /// Push a copy of the `n`th word from the top (1-based)
    pub fn dup(&mut self, n: usize) -> VmResult<()> {
        let len = self.data.len();
        if n == 0 || len < n {
            return Err(VmError::StackUnderflow);
        }
        self.push(self.data[len - n])
    }

    /// Exchange the top with the word `n` below it
    pub fn swap(&mut self, n: usize) -> VmResult<()> {
        let len = self.data.len();
        if n == 0 || len <= n {
            return Err(VmError::StackUnderflow);
        }
        self.data.swap(len - 1, len - 1 - n);
        Ok(())
    }
}
