//! Durable account store

use crate::account::{Account, AccountChanges};
use crate::VmResult;
use chain_core::{Address, Hash};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// State database trait
pub trait StateDB: Send + Sync {
    /// Get account by address
    fn get_account(&self, address: &Address) -> VmResult<Option<Account>>;

    /// Set account; an empty account is removed
    fn set_account(&mut self, address: Address, account: Account) -> VmResult<()>;

    /// Get storage value
    fn get_storage(&self, address: &Address, key: &Hash) -> VmResult<Option<Vec<u8>>>;

    /// Set storage value; an empty value clears the slot
    fn set_storage(&mut self, address: Address, key: Hash, value: Vec<u8>) -> VmResult<()>;

    /// Get contract code
    fn get_code(&self, address: &Address) -> VmResult<Option<Vec<u8>>>;

    /// Set contract code
    fn set_code(&mut self, address: Address, code: Vec<u8>) -> VmResult<()>;

    /// Apply batch changes
    fn apply_changes(&mut self, changes: AccountChanges) -> VmResult<()> {
        for (address, account) in changes.accounts {
            self.set_account(address, account)?;
        }

        for (address, storage_changes) in changes.storage_changes {
            for (key, value) in storage_changes {
                self.set_storage(address, key, value)?;
            }
        }

        for (address, code) in changes.code_changes {
            self.set_code(address, code)?;
        }

        Ok(())
    }

    /// Get state root hash
    fn state_root(&self) -> Hash;

    /// Independent copy of the current state
    fn fork(&self) -> Box<dyn StateDB>;
}

/// In-memory state database implementation
#[derive(Debug, Clone, Default)]
pub struct MemoryStateDB {
    /// Account data
    accounts: BTreeMap<Address, Account>,
    /// Storage data
    storage: BTreeMap<Address, BTreeMap<Hash, Vec<u8>>>,
    /// Contract code
    code: BTreeMap<Address, Vec<u8>>,
}

impl MemoryStateDB {
    /// Create new memory state DB
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with initial accounts
    pub fn with_accounts(accounts: impl IntoIterator<Item = (Address, Account)>) -> Self {
        let mut db = Self::new();
        for (address, account) in accounts {
            if !account.is_empty() {
                db.accounts.insert(address, account);
            }
        }
        db
    }
}

impl StateDB for MemoryStateDB {
    fn get_account(&self, address: &Address) -> VmResult<Option<Account>> {
        Ok(self.accounts.get(address).cloned())
    }

    fn set_account(&mut self, address: Address, account: Account) -> VmResult<()> {
        if account.is_empty() {
            self.accounts.remove(&address);
        } else {
            self.accounts.insert(address, account);
        }
        Ok(())
    }

    fn get_storage(&self, address: &Address, key: &Hash) -> VmResult<Option<Vec<u8>>> {
        Ok(self
            .storage
            .get(address)
            .and_then(|storage| storage.get(key))
            .cloned())
    }

    fn set_storage(&mut self, address: Address, key: Hash, value: Vec<u8>) -> VmResult<()> {
        if value.is_empty() {
            if let Some(storage) = self.storage.get_mut(&address) {
                storage.remove(&key);
                if storage.is_empty() {
                    self.storage.remove(&address);
                }
            }
        } else {
            self.storage.entry(address).or_default().insert(key, value);
        }
        Ok(())
    }

    fn get_code(&self, address: &Address) -> VmResult<Option<Vec<u8>>> {
        Ok(self.code.get(address).cloned())
    }

    fn set_code(&mut self, address: Address, code: Vec<u8>) -> VmResult<()> {
        if code.is_empty() {
            self.code.remove(&address);
        } else {
            self.code.insert(address, code);
        }
        Ok(())
    }

    fn state_root(&self) -> Hash {
        // Flat hash over ordered contents; a Merkle trie would replace this
        let mut hasher = blake3::Hasher::new();

        for (address, account) in &self.accounts {
            hasher.update(address.as_bytes());
            hasher.update(&account.nonce.to_le_bytes());
            hasher.update(&account.balance.to_le_bytes());
            hasher.update(account.code_hash.as_bytes());
        }

        for (address, storage) in &self.storage {
            for (key, value) in storage {
                hasher.update(address.as_bytes());
                hasher.update(key.as_bytes());
                hasher.update(&(value.len() as u64).to_le_bytes());
                hasher.update(value);
            }
        }

        for (address, code) in &self.code {
            hasher.update(address.as_bytes());
            hasher.update(&(code.len() as u64).to_le_bytes());
            hasher.update(code);
        }

        Hash::new(*hasher.finalize().as_bytes())
    }

    fn fork(&self) -> Box<dyn StateDB> {
        Box::new(self.clone())
    }
}

/// Thread-safe handle to the durable store
pub struct SharedStateDB {
    inner: Arc<RwLock<Box<dyn StateDB>>>,
}

impl SharedStateDB {
    /// Create new shared state DB
    pub fn new(state_db: Box<dyn StateDB>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(state_db)),
        }
    }

    /// Create from memory state
    pub fn memory() -> Self {
        Self::new(Box::new(MemoryStateDB::new()))
    }

    /// Get account (read-only)
    pub fn get_account(&self, address: &Address) -> VmResult<Option<Account>> {
        self.inner.read().get_account(address)
    }

    /// Get storage value (read-only)
    pub fn get_storage(&self, address: &Address, key: &Hash) -> VmResult<Option<Vec<u8>>> {
        self.inner.read().get_storage(address, key)
    }

    /// Get contract code (read-only)
    pub fn get_code(&self, address: &Address) -> VmResult<Option<Vec<u8>>> {
        self.inner.read().get_code(address)
    }

    /// Apply changes atomically
    pub fn apply_changes(&self, changes: AccountChanges) -> VmResult<()> {
        self.inner.write().apply_changes(changes)
    }

    /// Independent store with the same contents
    pub fn fork(&self) -> SharedStateDB {
        Self::new(self.inner.read().fork())
    }

    /// Get state root
    pub fn state_root(&self) -> Hash {
        self.inner.read().state_root()
    }
}

impl Clone for SharedStateDB {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_state_db() {
        let mut state = MemoryStateDB::new();
        let address = Address::new([1u8; 20]);

        assert!(state.get_account(&address).unwrap().is_none());

        state.set_account(address, Account::with_balance(1000)).unwrap();
        assert_eq!(state.get_account(&address).unwrap().unwrap().balance, 1000);

        let key = Hash::digest(b"test_key");
        state.set_storage(address, key, b"test_value".to_vec()).unwrap();
        assert_eq!(state.get_storage(&address, &key).unwrap().unwrap(), b"test_value".to_vec());

        state.set_storage(address, key, Vec::new()).unwrap();
        assert!(state.get_storage(&address, &key).unwrap().is_none());

        state.set_code(address, b"contract code".to_vec()).unwrap();
        assert_eq!(state.get_code(&address).unwrap().unwrap(), b"contract code".to_vec());
    }

    #[test]
    fn test_empty_account_is_removed() {
        let address = Address::new([1u8; 20]);
        let mut state = MemoryStateDB::with_accounts([(address, Account::with_balance(5))]);
        let root = state.state_root();

        state.set_account(address, Account::new()).unwrap();
        assert!(state.get_account(&address).unwrap().is_none());
        assert_ne!(state.state_root(), root);
        assert_eq!(state.state_root(), MemoryStateDB::new().state_root());
    }

    #[test]
    fn test_state_root_tracks_contents() {
        let address = Address::new([1u8; 20]);
        let a = MemoryStateDB::with_accounts([(address, Account::with_balance(1))]);
        let b = MemoryStateDB::with_accounts([(address, Account::with_balance(1))]);
        let c = MemoryStateDB::with_accounts([(address, Account::with_balance(2))]);

        assert_eq!(a.state_root(), b.state_root());
        assert_ne!(a.state_root(), c.state_root());
    }

    #[test]
    fn test_shared_state_db() {
        let shared = SharedStateDB::memory();
        let address = Address::new([1u8; 20]);

        let mut changes = AccountChanges::new();
        changes.update_account(address, Account::with_balance(1000));
        changes.update_storage(address, Hash::digest(b"k"), b"v".to_vec());
        shared.apply_changes(changes).unwrap();
        assert_eq!(shared.get_account(&address).unwrap().unwrap().balance, 1000);

        // A fork is detached from later writes
        let forked = shared.fork();
        let mut changes = AccountChanges::new();
        changes.update_account(address, Account::with_balance(1));
        shared.apply_changes(changes).unwrap();

        assert_eq!(forked.get_account(&address).unwrap().unwrap().balance, 1000);
        assert_ne!(forked.state_root(), shared.state_root());

        // A clone shares the same store
        assert_eq!(shared.clone().state_root(), shared.state_root());
    }
}
