//! Read-only execution environment handed to the interpreter

use crate::view::StateView;
use crate::VmResult;
use chain_core::{Address, BlockHeader, BlockNumber, Gas, Hash, Timestamp, Wei};

/// Balance guard checked before every value-carrying frame
pub type CanTransferFn = fn(&StateView, &Address, Wei) -> VmResult<bool>;

/// Value movement between two accounts
pub type TransferFn = fn(&mut StateView, &Address, &Address, Wei) -> VmResult<()>;

/// True iff `account` holds at least `amount`
pub fn can_transfer(state: &StateView, account: &Address, amount: Wei) -> VmResult<bool> {
    Ok(state.get_balance(account)? >= amount)
}

/// Debit `from` and credit `to`.
///
/// Sufficiency is the caller's job; see [`can_transfer`].
pub fn transfer(state: &mut StateView, from: &Address, to: &Address, amount: Wei) -> VmResult<()> {
    state.sub_balance(from, amount)?;
    state.add_balance(to, amount)
}

/// Environment of one top-level transition
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Signer of the instruction
    pub origin: Address,
    /// Block proposer
    pub coinbase: Address,
    /// Block timestamp
    pub timestamp: Timestamp,
    /// Block number
    pub block_number: BlockNumber,
    /// Gas handed to the top-level frame
    pub gas_limit: Gas,
    /// Transfer guard
    pub can_transfer: CanTransferFn,
    /// Value transfer
    pub transfer: TransferFn,
    previous_block_hash: Hash,
}

impl ExecutionContext {
    /// Build the context from the ambient block header
    pub fn new(header: &BlockHeader, origin: Address, gas_limit: Gas) -> Self {
        Self {
            origin,
            coinbase: header.proposer,
            timestamp: header.timestamp,
            block_number: header.number,
            gas_limit,
            can_transfer,
            transfer,
            previous_block_hash: header.previous_block_hash(),
        }
    }

    /// Hash of the block preceding the one being executed
    pub fn get_ancestor_hash(&self) -> Hash {
        self.previous_block_hash
    }

    /// Bounded history lookup: only the immediate ancestor is known.
    ///
    /// Any other height yields the zero hash.
    pub fn block_hash(&self, number: BlockNumber) -> Hash {
        if self.block_number > 0 && number == self.block_number - 1 {
            self.previous_block_hash
        } else {
            Hash::zero()
        }
    }
}
