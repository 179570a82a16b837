//! Sequential block execution

use crate::gas::GasMeter;
use crate::instruction::Instruction;
use crate::params::VmParams;
use crate::router::Router;
use crate::state::SharedStateDB;
use crate::transition::{AmbientContext, StateTransition, TransitionEvent};
use crate::{VmError, VmResult};
use chain_core::{Block, Gas, Hash, Receipt};
use tracing::{debug, info, warn};

/// Result of applying a block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockExecution {
    /// One receipt per transaction, in block order
    pub receipts: Vec<Receipt>,
    /// Gas charged across all transactions
    pub gas_used: Gas,
    /// Events of successful transitions, in block order
    pub events: Vec<TransitionEvent>,
    /// Store root after the block
    pub state_root: Hash,
}

/// Applies the transactions of a block one at a time through a [`Router`]
pub struct BlockProcessor {
    router: Router,
}

impl BlockProcessor {
    /// Processor with the state transition registered under [`Instruction::ROUTE`]
    pub fn new(params: VmParams) -> VmResult<Self> {
        let mut transition = StateTransition::new(params);
        let mut router = Router::new();
        router.add_route(
            Instruction::ROUTE,
            Box::new(move |ambient: &mut AmbientContext<'_>, instruction: &Instruction| {
                Ok(transition.execute(instruction, ambient))
            }),
        )?;
        Ok(Self::with_router(router))
    }

    pub fn with_router(router: Router) -> Self {
        Self { router }
    }

    pub fn router_mut(&mut self) -> &mut Router {
        &mut self.router
    }

    /// Execute every transaction of `block` against `store`.
    ///
    /// The block is rejected before anything runs when its transactions root
    /// does not match, a transaction is not properly signed or has no route,
    /// or the declared gas limits add up to more than the header allows.
    /// Failed transactions are charged and receive a receipt.
    pub fn execute_block(&mut self, block: &Block, store: &SharedStateDB) -> VmResult<BlockExecution> {
        let header = &block.header;
        let invalid = |reason: String| {
            warn!("Rejecting block #{}: {}", header.number, reason);
            VmError::InvalidBlock {
                number: header.number,
                reason,
            }
        };

        if !block.validate()? {
            return Err(invalid("transactions root or signature mismatch".to_string()));
        }

        let mut prepared = Vec::with_capacity(block.transactions.len());
        let mut declared: Gas = 0;
        for tx in &block.transactions {
            let instruction = Instruction::from_transaction(tx)?;
            if !self.router.has_route(instruction.route()) {
                return Err(invalid(format!("no route for {}", instruction.route())));
            }
            prepared.push((instruction, tx.encode()?));
            declared = declared.saturating_add(tx.gas_limit);
        }
        if declared > header.gas_limit {
            warn!(
                "Rejecting block #{}: declared gas {} above limit {}",
                header.number, declared, header.gas_limit
            );
            return Err(VmError::BlockGasLimitExceeded {
                used: declared,
                limit: header.gas_limit,
            });
        }

        let mut receipts = Vec::with_capacity(prepared.len());
        let mut events = Vec::new();
        let mut gas_used: Gas = 0;

        for (index, (tx, (instruction, tx_bytes))) in block.transactions.iter().zip(&prepared).enumerate() {
            let transaction_hash = Hash::digest(tx_bytes);
            let mut meter = GasMeter::new(tx.gas_limit);

            let transition = {
                let mut ambient = AmbientContext {
                    gas_meter: &mut meter,
                    header,
                    tx_bytes,
                    state: store,
                };
                self.router.dispatch(&mut ambient, instruction)?
            };

            if !transition.is_success() {
                // Failed attempts are still paid for
                let charged = transition.outcome.gas_used().saturating_sub(meter.consumed());
                meter.record(charged, "failed_attempt");
            }
            let tx_gas = meter.consumed();
            gas_used = gas_used.saturating_add(tx_gas);
            debug!(
                "Transaction {} in block #{}: success {}, gas {}",
                index,
                header.number,
                transition.is_success(),
                tx_gas
            );

            receipts.push(Receipt {
                transaction_hash,
                transaction_index: index as u64,
                block_number: header.number,
                from: instruction.sender(),
                to: instruction.recipient(),
                gas_used: tx_gas,
                status: u8::from(transition.is_success()),
                contract_address: transition.outcome.contract_address(),
                logs: transition.logs(),
            });
            events.extend(transition.events);
        }

        let state_root = store.state_root();
        info!(
            "Executed block #{}: {} transactions, gas used {}, state root {}",
            header.number,
            receipts.len(),
            gas_used,
            state_root
        );

        Ok(BlockExecution {
            receipts,
            gas_used,
            events,
            state_root,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Account;
    use crate::state::MemoryStateDB;
    use chain_core::{address_of_secret, Address, BlockHeader, Transaction};

    const ALICE: [u8; 32] = [21u8; 32];
    const BOB: Address = Address::new([0xb0; 20]);

    fn funded_store(balance: u128) -> SharedStateDB {
        let alice = address_of_secret(&ALICE).unwrap();
        SharedStateDB::new(Box::new(MemoryStateDB::with_accounts([(
            alice,
            Account::with_balance(balance),
        )])))
    }

    fn signed(mut tx: Transaction) -> Transaction {
        tx.sign(&ALICE).unwrap();
        tx
    }

    fn block(gas_limit: Gas, transactions: Vec<Transaction>) -> Block {
        let header = BlockHeader::new(Hash::digest(b"parent"), 1, 1_000, Address::new([7u8; 20]), gas_limit);
        Block::seal(header, transactions).unwrap()
    }

    #[test]
    fn test_transactions_apply_in_order() {
        let store = funded_store(100);
        let mut processor = BlockProcessor::new(VmParams::default()).unwrap();

        // The second transfer only fits once the first has been applied
        let block = block(
            1_000_000,
            vec![
                signed(Transaction::transfer(0, BOB, 60, 20_000)),
                signed(Transaction::transfer(1, BOB, 60, 20_000)),
                signed(Transaction::transfer(2, BOB, 40, 20_000)),
            ],
        );

        let execution = processor.execute_block(&block, &store).unwrap();
        let statuses: Vec<u8> = execution.receipts.iter().map(|r| r.status).collect();
        assert_eq!(statuses, vec![1, 0, 1]);
        assert_eq!(store.get_account(&BOB).unwrap().unwrap().balance, 100);

        // Transfers cost the call base plus the value transfer; the denied one
        // fails before any gas is spent
        assert_eq!(execution.receipts[0].gas_used, 9_700);
        assert_eq!(execution.receipts[1].gas_used, 0);
        assert_eq!(execution.gas_used, 19_400);
        assert_eq!(execution.receipts[2].transaction_hash, block.transactions[2].hash().unwrap());
        assert_eq!(execution.state_root, store.state_root());
    }

    #[test]
    fn test_failed_attempt_is_charged() {
        let store = funded_store(100);
        let mut processor = BlockProcessor::new(VmParams::default()).unwrap();
        // Init code that hits INVALID
        let block = block(1_000_000, vec![signed(Transaction::create_contract(0, 0, 50_000, vec![0xfe]))]);

        let execution = processor.execute_block(&block, &store).unwrap();
        let receipt = &execution.receipts[0];
        assert!(!receipt.succeeded());
        assert_eq!(receipt.gas_used, 50_000);
        assert_eq!(receipt.contract_address, None);
        assert!(execution.events.is_empty());
    }

    #[test]
    fn test_block_gas_limit() {
        let store = funded_store(100);
        let root = store.state_root();
        let mut processor = BlockProcessor::new(VmParams::default()).unwrap();
        let block = block(
            30_000,
            vec![
                signed(Transaction::transfer(0, BOB, 1, 20_000)),
                signed(Transaction::transfer(1, BOB, 1, 20_000)),
            ],
        );

        assert_eq!(
            processor.execute_block(&block, &store),
            Err(VmError::BlockGasLimitExceeded {
                used: 40_000,
                limit: 30_000
            })
        );
        assert_eq!(store.state_root(), root);
    }

    #[test]
    fn test_unsigned_transaction_rejects_block() {
        let store = funded_store(100);
        let root = store.state_root();
        let mut processor = BlockProcessor::new(VmParams::default()).unwrap();
        let block = block(
            1_000_000,
            vec![
                signed(Transaction::transfer(0, BOB, 1, 20_000)),
                Transaction::transfer(1, BOB, 1, 20_000),
            ],
        );

        assert!(matches!(
            processor.execute_block(&block, &store),
            Err(VmError::InvalidBlock { number: 1, .. })
        ));
        assert_eq!(store.state_root(), root);
    }

    #[test]
    fn test_mismatched_transactions_root_rejects_block() {
        let store = funded_store(100);
        let root = store.state_root();
        let mut processor = BlockProcessor::new(VmParams::default()).unwrap();
        let mut block = block(1_000_000, vec![signed(Transaction::transfer(0, BOB, 30, 20_000))]);
        block.header.transactions_root = Hash::digest(b"other transactions");

        assert!(matches!(
            processor.execute_block(&block, &store),
            Err(VmError::InvalidBlock { number: 1, .. })
        ));
        assert_eq!(store.get_account(&BOB).unwrap(), None);
        assert_eq!(store.state_root(), root);
    }

    #[test]
    fn test_missing_route_rejects_block_before_execution() {
        let store = funded_store(100);
        let root = store.state_root();
        let mut processor = BlockProcessor::with_router(Router::new());
        let block = block(
            1_000_000,
            vec![
                signed(Transaction::transfer(0, BOB, 30, 20_000)),
                signed(Transaction::transfer(1, BOB, 30, 20_000)),
            ],
        );

        assert!(matches!(
            processor.execute_block(&block, &store),
            Err(VmError::InvalidBlock { .. })
        ));
        assert_eq!(store.state_root(), root);
    }
}
