//! Block data structures and execution receipts

use crate::{Address, BlockNumber, CoreError, CoreResult, Gas, Hash, Timestamp, Transaction};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

/// Block header containing metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode)]
pub struct BlockHeader {
    /// Hash of the parent block
    pub parent_hash: Hash,
    /// Block number (height)
    pub number: BlockNumber,
    /// Root hash of the state after the previous block
    pub state_root: Hash,
    /// Root hash of the transaction list
    pub transactions_root: Hash,
    /// Block timestamp in seconds
    pub timestamp: Timestamp,
    /// Address of the block proposer, credited as coinbase
    pub proposer: Address,
    /// Extra data (arbitrary bytes)
    pub extra_data: Vec<u8>,
    /// Gas limit for all transactions in this block
    pub gas_limit: Gas,
}

impl BlockHeader {
    /// Create a header on top of `parent_hash`
    pub fn new(
        parent_hash: Hash,
        number: BlockNumber,
        timestamp: Timestamp,
        proposer: Address,
        gas_limit: Gas,
    ) -> Self {
        Self {
            parent_hash,
            number,
            state_root: Hash::zero(),
            transactions_root: Hash::zero(),
            timestamp,
            proposer,
            extra_data: Vec::new(),
            gas_limit,
        }
    }

    /// Calculate the hash of this block header
    pub fn hash(&self) -> CoreResult<Hash> {
        let encoded = bincode::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| CoreError::Bincode(e.to_string()))?;
        Ok(Hash::digest(&encoded))
    }

    /// Hash of the block this one extends
    pub fn previous_block_hash(&self) -> Hash {
        self.parent_hash
    }

    /// Get the genesis block header
    pub fn genesis() -> Self {
        Self {
            parent_hash: Hash::zero(),
            number: 0,
            state_root: Hash::zero(),
            transactions_root: Hash::zero(),
            timestamp: 0,
            proposer: Address::zero(),
            extra_data: b"RustChain Genesis Block".to_vec(),
            gas_limit: 8_000_000,
        }
    }
}

/// Outcome of one transaction inside a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Transaction hash
    pub transaction_hash: Hash,
    /// Transaction index in block
    pub transaction_index: u64,
    /// Block number
    pub block_number: BlockNumber,
    /// Sender address
    pub from: Address,
    /// Recipient address (None for contract creation)
    pub to: Option<Address>,
    /// Gas charged for this transaction
    pub gas_used: Gas,
    /// Status (1 for success, 0 for failure)
    pub status: u8,
    /// Contract address (if contract creation succeeded)
    pub contract_address: Option<Address>,
    /// Logs emitted by executed code
    pub logs: Vec<Log>,
}

impl Receipt {
    /// Whether the transaction applied its state changes
    pub fn succeeded(&self) -> bool {
        self.status == 1
    }
}

/// Event log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    /// Contract address that emitted the log
    pub address: Address,
    /// Topics (indexed parameters)
    pub topics: Vec<Hash>,
    /// Data (non-indexed parameters)
    pub data: Vec<u8>,
}

/// Complete block with header and transactions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Block header
    pub header: BlockHeader,
    /// Transactions, in execution order
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Create a new block
    pub fn new(header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        Self {
            header,
            transactions,
        }
    }

    /// Create a block whose header commits to `transactions`
    pub fn seal(header: BlockHeader, transactions: Vec<Transaction>) -> CoreResult<Self> {
        let mut block = Self::new(header, transactions);
        block.header.transactions_root = block.calculate_transactions_root()?;
        Ok(block)
    }

    /// Create genesis block
    pub fn genesis() -> Self {
        Self {
            header: BlockHeader::genesis(),
            transactions: Vec::new(),
        }
    }

    /// Get the block hash (same as header hash)
    pub fn hash(&self) -> CoreResult<Hash> {
        self.header.hash()
    }

    /// Hash of the concatenated transaction hashes, zero for an empty block
    pub fn calculate_transactions_root(&self) -> CoreResult<Hash> {
        if self.transactions.is_empty() {
            return Ok(Hash::zero());
        }

        let mut hasher = Keccak256::new();
        for tx in &self.transactions {
            hasher.update(tx.hash()?.as_bytes());
        }

        Ok(Hash::from_slice(hasher.finalize().as_slice()))
    }

    /// Check the transactions root and that every transaction is signed
    pub fn validate(&self) -> CoreResult<bool> {
        if self.calculate_transactions_root()? != self.header.transactions_root {
            return Ok(false);
        }

        for tx in &self.transactions {
            if !tx.verify_signature()? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Check if block is genesis
    pub fn is_genesis(&self) -> bool {
        self.header.number == 0 && self.header.parent_hash == Hash::zero()
    }
}
