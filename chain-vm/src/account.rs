//! Account model and batched changes

use crate::{VmError, VmResult};
use chain_core::{Address, Hash, Nonce, Wei};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Account information
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Transactions sent, or contracts created for a contract account
    pub nonce: Nonce,
    /// Account balance
    pub balance: Wei,
    /// Code hash (zero for externally owned accounts)
    pub code_hash: Hash,
}

impl Account {
    /// Create a new empty account
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an account with initial balance
    pub fn with_balance(balance: Wei) -> Self {
        Self {
            balance,
            ..Self::default()
        }
    }

    /// Check if account is empty
    pub fn is_empty(&self) -> bool {
        self.nonce == 0 && self.balance == 0 && self.code_hash.is_zero()
    }

    /// Check if account is a contract
    pub fn is_contract(&self) -> bool {
        !self.code_hash.is_zero()
    }

    /// Increment nonce
    pub fn increment_nonce(&mut self) {
        self.nonce += 1;
    }

    /// Add to balance
    pub fn add_balance(&mut self, address: &Address, amount: Wei) -> VmResult<()> {
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(VmError::BalanceOverflow(*address))?;
        Ok(())
    }

    /// Subtract from balance
    pub fn sub_balance(&mut self, amount: Wei) -> VmResult<()> {
        if self.balance < amount {
            return Err(VmError::InsufficientBalance {
                required: amount,
                available: self.balance,
            });
        }
        self.balance -= amount;
        Ok(())
    }
}

/// Account changes for batch updates
///
/// Maps are ordered so applying a change set is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountChanges {
    /// Updated accounts
    pub accounts: BTreeMap<Address, Account>,
    /// Storage changes; an empty value clears the slot
    pub storage_changes: BTreeMap<Address, BTreeMap<Hash, Vec<u8>>>,
    /// Code changes
    pub code_changes: BTreeMap<Address, Vec<u8>>,
}

impl AccountChanges {
    /// Create new empty changes
    pub fn new() -> Self {
        Self::default()
    }

    /// Update account
    pub fn update_account(&mut self, address: Address, account: Account) {
        self.accounts.insert(address, account);
    }

    /// Update storage
    pub fn update_storage(&mut self, address: Address, key: Hash, value: Vec<u8>) {
        self.storage_changes
            .entry(address)
            .or_default()
            .insert(key, value);
    }

    /// Update code
    pub fn update_code(&mut self, address: Address, code: Vec<u8>) {
        self.code_changes.insert(address, code);
    }

    /// Check if changes are empty
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty() && self.storage_changes.is_empty() && self.code_changes.is_empty()
    }
}
