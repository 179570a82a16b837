//! Transactional view over the durable store
//!
//! A [`StateView`] owns the dirty set of one transition. Writes land in the
//! top layer of a stack of copy-on-write layers; call frames push a layer with
//! [`StateView::checkpoint`] and either fold it into the one below or drop it.
//! Nothing reaches the store until [`StateView::finalize`] is called with
//! `commit = true`.

use crate::account::{Account, AccountChanges};
use crate::state::SharedStateDB;
use crate::{VmError, VmResult};
use chain_core::{Address, Hash, Log, Nonce, Wei};
use std::collections::BTreeMap;

/// Handle to a pushed layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct Checkpoint(usize);

#[derive(Debug, Clone, Default)]
struct Layer {
    accounts: BTreeMap<Address, Account>,
    storage: BTreeMap<(Address, Hash), Vec<u8>>,
    code: BTreeMap<Address, Vec<u8>>,
    logs: Vec<Log>,
}

impl Layer {
    fn absorb(&mut self, upper: Layer) {
        self.accounts.extend(upper.accounts);
        self.storage.extend(upper.storage);
        self.code.extend(upper.code);
        self.logs.extend(upper.logs);
    }
}

/// Dirty-tracking projection of account state for one transition
pub struct StateView {
    store: SharedStateDB,
    /// Authoritative accounts read from the store on first write
    cache: BTreeMap<Address, Account>,
    /// `layers[0]` is the transition scope, later entries are open checkpoints
    layers: Vec<Layer>,
    tx_hash: Hash,
    readonly: bool,
}

impl StateView {
    /// Writable view over `store`
    pub fn new(store: SharedStateDB) -> Self {
        Self {
            store,
            cache: BTreeMap::new(),
            layers: vec![Layer::default()],
            tx_hash: Hash::zero(),
            readonly: false,
        }
    }

    /// View whose changes can never be finalized
    pub fn readonly(store: SharedStateDB) -> Self {
        Self {
            readonly: true,
            ..Self::new(store)
        }
    }

    /// Attribute logs and events of this scope to a transaction
    pub fn tag_with(mut self, tx_hash: Hash) -> Self {
        self.tx_hash = tx_hash;
        self
    }

    /// Transaction identity of this scope
    pub fn tx_hash(&self) -> Hash {
        self.tx_hash
    }

    /// Whether finalize is refused
    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    /// Drop cached authoritative reads so the next access hits the store.
    ///
    /// Pending writes are kept.
    pub fn resync_accounts(&mut self) {
        self.cache.clear();
    }

    /// Number of open checkpoints
    pub fn depth(&self) -> usize {
        self.layers.len() - 1
    }

    // ---- reads ----

    /// Current account, default if it does not exist
    pub fn account(&self, address: &Address) -> VmResult<Account> {
        if let Some(account) = self.layers.iter().rev().find_map(|l| l.accounts.get(address)) {
            return Ok(account.clone());
        }
        if let Some(account) = self.cache.get(address) {
            return Ok(account.clone());
        }
        Ok(self.store.get_account(address)?.unwrap_or_default())
    }

    /// Current balance
    pub fn get_balance(&self, address: &Address) -> VmResult<Wei> {
        Ok(self.account(address)?.balance)
    }

    /// Current nonce
    pub fn get_nonce(&self, address: &Address) -> VmResult<Nonce> {
        Ok(self.account(address)?.nonce)
    }

    /// Deployed code, empty for accounts without code
    pub fn get_code(&self, address: &Address) -> VmResult<Vec<u8>> {
        if let Some(code) = self.layers.iter().rev().find_map(|l| l.code.get(address)) {
            return Ok(code.clone());
        }
        Ok(self.store.get_code(address)?.unwrap_or_default())
    }

    /// Storage slot value, empty if unset
    pub fn get_storage(&self, address: &Address, key: &Hash) -> VmResult<Vec<u8>> {
        let slot = (*address, *key);
        if let Some(value) = self.layers.iter().rev().find_map(|l| l.storage.get(&slot)) {
            return Ok(value.clone());
        }
        Ok(self.store.get_storage(address, key)?.unwrap_or_default())
    }

    // ---- writes ----

    fn account_mut(&mut self, address: &Address) -> VmResult<&mut Account> {
        let top = self.layers.len() - 1;
        if !self.layers[top].accounts.contains_key(address) {
            let current = match self.layers[..top]
                .iter()
                .rev()
                .find_map(|l| l.accounts.get(address))
            {
                Some(account) => account.clone(),
                None => match self.cache.get(address) {
                    Some(account) => account.clone(),
                    None => {
                        let loaded = self.store.get_account(address)?.unwrap_or_default();
                        self.cache.insert(*address, loaded.clone());
                        loaded
                    }
                },
            };
            self.layers[top].accounts.insert(*address, current);
        }

        self.layers[top]
            .accounts
            .get_mut(address)
            .ok_or_else(|| VmError::State(format!("account {address} missing from dirty set")))
    }

    /// Credit an account
    pub fn add_balance(&mut self, address: &Address, amount: Wei) -> VmResult<()> {
        self.account_mut(address)?.add_balance(address, amount)
    }

    /// Debit an account
    pub fn sub_balance(&mut self, address: &Address, amount: Wei) -> VmResult<()> {
        self.account_mut(address)?.sub_balance(amount)
    }

    /// Bump an account nonce
    pub fn increment_nonce(&mut self, address: &Address) -> VmResult<()> {
        self.account_mut(address)?.increment_nonce();
        Ok(())
    }

    /// Set the nonce of an account
    pub fn set_nonce(&mut self, address: &Address, nonce: Nonce) -> VmResult<()> {
        self.account_mut(address)?.nonce = nonce;
        Ok(())
    }

    /// Deploy code at an address
    pub fn set_code(&mut self, address: &Address, code: Vec<u8>) -> VmResult<()> {
        self.account_mut(address)?.code_hash = if code.is_empty() {
            Hash::zero()
        } else {
            Hash::digest(&code)
        };
        let top = self.layers.len() - 1;
        self.layers[top].code.insert(*address, code);
        Ok(())
    }

    /// Write a storage slot; an empty value clears it
    pub fn set_storage(&mut self, address: &Address, key: Hash, value: Vec<u8>) {
        let top = self.layers.len() - 1;
        self.layers[top].storage.insert((*address, key), value);
    }

    /// Record a log emitted by executed code
    pub fn add_log(&mut self, log: Log) {
        let top = self.layers.len() - 1;
        self.layers[top].logs.push(log);
    }

    // ---- scopes ----

    /// Open a nested scope
    pub fn checkpoint(&mut self) -> Checkpoint {
        self.layers.push(Layer::default());
        Checkpoint(self.layers.len() - 1)
    }

    /// Drop every change made since `checkpoint`
    pub fn revert_to(&mut self, checkpoint: Checkpoint) {
        self.layers.truncate(checkpoint.0.max(1));
    }

    /// Keep the changes made since `checkpoint` in the enclosing scope
    pub fn commit_to(&mut self, checkpoint: Checkpoint) {
        while self.layers.len() > checkpoint.0.max(1) {
            if let Some(upper) = self.layers.pop() {
                if let Some(lower) = self.layers.last_mut() {
                    lower.absorb(upper);
                }
            }
        }
    }

    // ---- finalize ----

    /// All pending changes, oldest layer first
    pub fn dirty_set(&self) -> AccountChanges {
        let mut changes = AccountChanges::new();
        for layer in &self.layers {
            for (address, account) in &layer.accounts {
                changes.update_account(*address, account.clone());
            }
            for ((address, key), value) in &layer.storage {
                changes.update_storage(*address, *key, value.clone());
            }
            for (address, code) in &layer.code {
                changes.update_code(*address, code.clone());
            }
        }
        changes
    }

    /// Logs emitted so far, in emission order
    pub fn logs(&self) -> Vec<Log> {
        self.layers.iter().flat_map(|l| l.logs.iter().cloned()).collect()
    }

    /// Sum of balance changes against the store
    pub fn net_balance_change(&self) -> VmResult<i128> {
        let mut net: i128 = 0;
        for (address, account) in self.dirty_set().accounts {
            let before = self.store.get_account(&address)?.unwrap_or_default().balance;
            let delta = i128::try_from(account.balance)
                .ok()
                .zip(i128::try_from(before).ok())
                .map(|(after, before)| after - before)
                .ok_or(VmError::BalanceOverflow(address))?;
            net = net.checked_add(delta).ok_or(VmError::BalanceOverflow(address))?;
        }
        Ok(net)
    }

    /// Write the dirty set to the store when `commit` is set, otherwise drop it.
    ///
    /// Returns the logs that became part of the store's history.
    pub fn finalize(self, commit: bool) -> VmResult<Vec<Log>> {
        if !commit {
            return Ok(Vec::new());
        }
        if self.readonly {
            return Err(VmError::ReadOnlyState);
        }

        let logs = self.logs();
        let changes = self.dirty_set();
        if !changes.is_empty() {
            self.store.apply_changes(changes)?;
        }
        Ok(logs)
    }
}
