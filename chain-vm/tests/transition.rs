use chain_core::{address_of_secret, Address, Block, BlockHeader, Gas, Hash, Transaction, Wei};
use chain_vm::{
    contract_address, Account, AmbientContext, BlockProcessor, Environment, ExecutionContext, GasMeter, Instruction,
    Interpreter, MemoryStateDB, SharedStateDB, StateDB, StateTransition, StateView, Transition, TransitionEvent,
    TransitionOutcome, Vm, VmParams,
};
use proptest::prelude::*;

const ALICE: Address = Address::new([0xa1; 20]);
const BOB: Address = Address::new([0xb0; 20]);
const CAROL: Address = Address::new([0xc4; 20]);
const FORWARDER: Address = Address::new([0xf0; 20]);
const METER: Address = Address::new([0x5a; 20]);

/// Runtime code returning the word 42
const RUNTIME: [u8; 10] = [0x60, 0x2a, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3];

/// Init code copying `runtime` out of itself and returning it
fn init_code(runtime: &[u8]) -> Vec<u8> {
    let len = runtime.len() as u8;
    let mut code = vec![0x60, len, 0x60, 0x0c, 0x60, 0x00, 0x39, 0x60, len, 0x60, 0x00, 0xf3];
    code.extend_from_slice(runtime);
    code
}

fn store(balances: &[(Address, Wei)]) -> SharedStateDB {
    SharedStateDB::new(Box::new(MemoryStateDB::with_accounts(
        balances
            .iter()
            .map(|(address, balance)| (*address, Account::with_balance(*balance))),
    )))
}

fn balance(store: &SharedStateDB, address: &Address) -> Wei {
    store
        .get_account(address)
        .unwrap()
        .map(|account| account.balance)
        .unwrap_or(0)
}

fn store_with_code(balances: &[(Address, Wei)], code: &[(Address, Vec<u8>)]) -> SharedStateDB {
    let mut db = MemoryStateDB::with_accounts(
        balances
            .iter()
            .map(|(address, balance)| (*address, Account::with_balance(*balance))),
    );
    for (address, bytecode) in code {
        db.set_code(*address, bytecode.clone()).unwrap();
    }
    SharedStateDB::new(Box::new(db))
}

/// Forwards `calldata[0..32]` to BOB with CALL, then endows a child created
/// from empty init code with `calldata[32..64]`
fn forwarder_code() -> Vec<u8> {
    let mut code = vec![0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x35, 0x73];
    code.extend_from_slice(BOB.as_bytes());
    code.extend_from_slice(&[0x5a, 0xf1, 0x50]);
    code.extend_from_slice(&[0x60, 0x00, 0x60, 0x00, 0x60, 0x20, 0x35, 0xf0, 0x50, 0x00]);
    code
}

/// Stores GAS in slot 0, then GAS again in slot 1
const GAS_SAMPLER: [u8; 9] = [0x5a, 0x60, 0x00, 0x55, 0x5a, 0x60, 0x01, 0x55, 0x00];

fn calldata(words: &[Wei]) -> Vec<u8> {
    let mut data = Vec::with_capacity(words.len() * 32);
    for word in words {
        data.extend_from_slice(&[0u8; 16]);
        data.extend_from_slice(&word.to_be_bytes());
    }
    data
}

fn slot(index: u8) -> Hash {
    let mut key = [0u8; 32];
    key[31] = index;
    Hash::new(key)
}

fn stored_gas(store: &SharedStateDB, address: &Address, index: u8) -> Gas {
    let value = store.get_storage(address, &slot(index)).unwrap().unwrap();
    let mut low = [0u8; 8];
    low.copy_from_slice(&value[value.len() - 8..]);
    Gas::from_be_bytes(low)
}

fn transfer(sender: Address, recipient: Address, value: Wei, gas_limit: Gas) -> Instruction {
    Instruction::Invoke {
        sender,
        recipient,
        value,
        payload: Vec::new(),
        gas_limit,
    }
}

fn execute(store: &SharedStateDB, meter: &mut GasMeter, instruction: &Instruction) -> Transition {
    let header = BlockHeader::genesis();
    let mut ambient = AmbientContext {
        gas_meter: meter,
        header: &header,
        tx_bytes: b"integration",
        state: store,
    };
    StateTransition::new(VmParams::default()).execute(instruction, &mut ambient)
}

#[test]
fn test_simple_transfer() {
    let store = store(&[(ALICE, 100)]);
    let mut meter = GasMeter::new(1_000_000);

    let result = execute(&store, &mut meter, &transfer(ALICE, BOB, 30, 100_000));
    assert_eq!(
        result.outcome,
        TransitionOutcome::Success {
            return_data: Vec::new(),
            gas_used: 9_700,
            contract_address: None,
        }
    );
    assert!(result.events.is_empty());
    assert_eq!(meter.consumed(), 9_700);
    assert_eq!(balance(&store, &ALICE), 70);
    assert_eq!(balance(&store, &BOB), 30);
}

#[test]
fn test_insufficient_funds_is_denied() {
    let store = store(&[(ALICE, 10)]);
    let root = store.state_root();
    let mut meter = GasMeter::new(1_000_000);

    let result = execute(&store, &mut meter, &transfer(ALICE, BOB, 30, 100_000));
    assert_eq!(result.outcome, TransitionOutcome::TransferDenied { gas_used: 0 });
    assert_eq!(meter.consumed(), 0);
    assert_eq!(store.state_root(), root);
}

#[test]
fn test_contract_creation_and_call() {
    let store = store(&[(ALICE, 1_000)]);
    let mut meter = GasMeter::new(1_000_000);
    let create = Instruction::Create {
        sender: ALICE,
        value: 0,
        init_code: init_code(&RUNTIME),
        gas_limit: 200_000,
    };

    let result = execute(&store, &mut meter, &create);
    let expected = contract_address(&ALICE, 0);
    assert!(result.is_success());
    assert_eq!(result.outcome.contract_address(), Some(expected));
    assert_eq!(
        result.events,
        vec![TransitionEvent::ContractCreated {
            address: expected,
            tx_hash: Hash::digest(b"integration"),
        }]
    );
    assert_eq!(store.get_code(&expected).unwrap(), Some(RUNTIME.to_vec()));
    assert_eq!(store.get_account(&expected).unwrap().unwrap().nonce, 1);
    assert_eq!(store.get_account(&ALICE).unwrap().unwrap().nonce, 1);

    let result = execute(&store, &mut meter, &transfer(ALICE, expected, 0, 50_000));
    match result.outcome {
        TransitionOutcome::Success { return_data, .. } => {
            assert_eq!(return_data.len(), 32);
            assert_eq!(return_data[31], 42);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[test]
fn test_exhaustion_applies_nothing() {
    let store = store(&[(ALICE, 100)]);
    let root = store.state_root();
    let mut meter = GasMeter::new(1_000_000);

    // One short of call base plus value transfer
    let result = execute(&store, &mut meter, &transfer(ALICE, BOB, 30, 9_699));
    assert_eq!(result.outcome, TransitionOutcome::OutOfGas { gas_used: 9_699 });
    assert!(result.events.is_empty());
    assert_eq!(meter.consumed(), 0);
    assert_eq!(store.state_root(), root);
}

#[test]
fn test_outer_meter_caps_declared_gas() {
    let store = store(&[(ALICE, 100)]);
    let root = store.state_root();
    let mut meter = GasMeter::new(20_000);
    meter.consume(15_000, "ante").unwrap();

    // Only 5_000 of the declared 100_000 is actually available
    let result = execute(&store, &mut meter, &transfer(ALICE, BOB, 30, 100_000));
    assert_eq!(result.outcome, TransitionOutcome::OutOfGas { gas_used: 20_000 });
    assert_eq!(store.state_root(), root);
}

#[test]
fn test_simulation_leaves_store_untouched() {
    let store = store(&[(ALICE, 100)]);
    let root = store.state_root();

    let result = StateTransition::new(VmParams::default()).simulate(
        &transfer(ALICE, BOB, 30, 0),
        &BlockHeader::genesis(),
        &store,
    );
    assert!(result.is_success());
    assert_eq!(result.outcome.gas_used(), 9_700);
    assert_eq!(store.state_root(), root);
    assert_eq!(balance(&store, &BOB), 0);
}

#[test]
fn test_block_with_create_and_call() {
    let key = [5u8; 32];
    let sender = address_of_secret(&key).unwrap();
    let store = store(&[(sender, 1_000_000)]);
    let contract = contract_address(&sender, 0);

    let mut transactions = vec![
        Transaction::transfer(0, BOB, 1_000, 21_000),
        Transaction::create_contract(1, 0, 200_000, init_code(&RUNTIME)),
        Transaction::call(2, contract, 0, 50_000, Vec::new()),
    ];
    for tx in &mut transactions {
        tx.sign(&key).unwrap();
    }
    let header = BlockHeader::new(Hash::digest(b"parent"), 1, 1_000, CAROL, 1_000_000);
    let block = Block::seal(header, transactions).unwrap();

    let mut processor = BlockProcessor::new(VmParams::default()).unwrap();
    let execution = processor.execute_block(&block, &store).unwrap();

    assert_eq!(execution.receipts.len(), 3);
    assert!(execution.receipts.iter().all(|receipt| receipt.succeeded()));
    assert_eq!(execution.receipts[1].contract_address, Some(contract));
    assert_eq!(
        execution.gas_used,
        execution.receipts.iter().map(|receipt| receipt.gas_used).sum::<Gas>()
    );
    assert!(execution
        .events
        .iter()
        .any(|event| matches!(event, TransitionEvent::ContractCreated { address, .. } if *address == contract)));
    assert_eq!(balance(&store, &BOB), 1_000);
    assert_eq!(execution.state_root, store.state_root());
}

#[test]
fn test_gas_never_increases_during_execution() {
    let store = store_with_code(&[(ALICE, 100)], &[(METER, GAS_SAMPLER.to_vec())]);
    let mut meter = GasMeter::new(1_000_000);

    let result = execute(&store, &mut meter, &transfer(ALICE, METER, 0, 100_000));
    assert!(result.is_success());

    let first = stored_gas(&store, &METER, 0);
    let second = stored_gas(&store, &METER, 1);
    assert!(first < 100_000);
    assert!(second < first);
    assert!(result.outcome.gas_used() > 100_000 - second);
}

#[test]
fn test_contract_value_movement_is_conserved() {
    let child = contract_address(&FORWARDER, 0);
    let store = store_with_code(&[(ALICE, 1_000), (FORWARDER, 50)], &[(FORWARDER, forwarder_code())]);
    let mut meter = GasMeter::new(1_000_000);
    let call = Instruction::Invoke {
        sender: ALICE,
        recipient: FORWARDER,
        value: 100,
        payload: calldata(&[70, 40]),
        gas_limit: 500_000,
    };

    let result = execute(&store, &mut meter, &call);
    assert!(result.is_success());
    assert_eq!(balance(&store, &ALICE), 900);
    assert_eq!(balance(&store, &BOB), 70);
    assert_eq!(balance(&store, &child), 40);
    assert_eq!(balance(&store, &FORWARDER), 40);
}

fn account() -> impl Strategy<Value = Address> {
    prop_oneof![Just(ALICE), Just(BOB), Just(CAROL)]
}

fn transfers() -> impl Strategy<Value = Vec<(Address, Address, Wei, Gas)>> {
    prop::collection::vec((account(), account(), 0u128..150, 0u64..20_000), 1..12)
}

proptest! {
    #[test]
    fn prop_transfers_conserve_value(steps in transfers()) {
        let store = store(&[(ALICE, 100), (BOB, 50), (CAROL, 0)]);
        for (sender, recipient, value, gas_limit) in steps {
            let mut meter = GasMeter::new(1_000_000);
            execute(&store, &mut meter, &transfer(sender, recipient, value, gas_limit));
            let total: Wei = [ALICE, BOB, CAROL].iter().map(|address| balance(&store, address)).sum();
            prop_assert_eq!(total, 150);
        }
    }

    #[test]
    fn prop_execution_is_deterministic(steps in transfers()) {
        let first = store(&[(ALICE, 100), (BOB, 50)]);
        let second = first.fork();
        for (sender, recipient, value, gas_limit) in steps {
            let instruction = transfer(sender, recipient, value, gas_limit);
            let mut a = GasMeter::new(1_000_000);
            let mut b = GasMeter::new(1_000_000);
            prop_assert_eq!(execute(&first, &mut a, &instruction), execute(&second, &mut b, &instruction));
            prop_assert_eq!(a.consumed(), b.consumed());
        }
        prop_assert_eq!(first.state_root(), second.state_root());
    }

    #[test]
    fn prop_failure_discards_everything(steps in transfers()) {
        let store = store(&[(ALICE, 100), (BOB, 50)]);
        for (sender, recipient, value, gas_limit) in steps {
            let root = store.state_root();
            let mut meter = GasMeter::new(1_000_000);
            let result = execute(&store, &mut meter, &transfer(sender, recipient, value, gas_limit));
            if !result.is_success() {
                prop_assert_eq!(store.state_root(), root);
                prop_assert_eq!(meter.consumed(), 0);
                prop_assert!(result.events.is_empty());
            }
        }
    }

    #[test]
    fn prop_outer_meter_bounds_gas_used(
        limit in 0u64..30_000,
        spent in 0u64..30_000,
        declared in 0u64..30_000,
        value in 0u128..200,
    ) {
        let spent = spent.min(limit);
        let store = store(&[(ALICE, 100)]);
        let mut meter = GasMeter::new(limit);
        meter.consume(spent, "ante").unwrap();

        let result = execute(&store, &mut meter, &transfer(ALICE, BOB, value, declared));
        prop_assert!(result.outcome.gas_used() <= limit);
        prop_assert!(meter.consumed() <= limit);
        if result.is_success() {
            prop_assert_eq!(meter.consumed(), spent + result.outcome.gas_used());
        } else {
            prop_assert_eq!(meter.consumed(), spent);
            prop_assert!(result.outcome.gas_used() >= spent);
        }
    }

    #[test]
    fn prop_more_gas_never_hurts(value in 0u128..100, gas_limit in 0u64..20_000, extra in 0u64..20_000) {
        let low = store(&[(ALICE, 100)]);
        let high = low.fork();

        let mut meter = GasMeter::new(1_000_000);
        let constrained = execute(&low, &mut meter, &transfer(ALICE, BOB, value, gas_limit));
        let mut meter = GasMeter::new(1_000_000);
        let generous = execute(&high, &mut meter, &transfer(ALICE, BOB, value, gas_limit + extra));

        if constrained.is_success() {
            prop_assert!(generous.is_success());
            prop_assert_eq!(constrained.outcome.gas_used(), generous.outcome.gas_used());
        }
    }

    #[test]
    fn prop_contract_value_movement_conserves_balances(
        endowment in 0u128..300,
        held in 0u128..100,
        forwarded in 0u128..400,
        created in 0u128..400,
        gas_limit in 0u64..400_000,
    ) {
        let child = contract_address(&FORWARDER, 0);
        let accounts = [ALICE, BOB, FORWARDER, child];
        let store = store_with_code(&[(ALICE, 200), (FORWARDER, held)], &[(FORWARDER, forwarder_code())]);
        let total: Wei = accounts.iter().map(|address| balance(&store, address)).sum();

        let header = BlockHeader::genesis();
        let context = ExecutionContext::new(&header, ALICE, gas_limit);
        let mut view = StateView::new(store.clone());
        let mut accounting = GasMeter::untracked();
        let out = {
            let mut env = Environment {
                context: &context,
                state: &mut view,
                accounting: &mut accounting,
            };
            Interpreter::new(VmParams::default()).call(
                &mut env,
                ALICE,
                FORWARDER,
                &calldata(&[forwarded, created]),
                gas_limit,
                endowment,
            )
        };

        prop_assert_eq!(view.net_balance_change().unwrap(), 0);
        prop_assert!(out.gas_remaining <= gas_limit);
        prop_assert_eq!(accounting.consumed(), gas_limit - out.gas_remaining);

        view.finalize(out.error.is_none()).unwrap();
        let after: Wei = accounts.iter().map(|address| balance(&store, address)).sum();
        prop_assert_eq!(after, total);
    }

    #[test]
    fn prop_sampled_gas_is_non_increasing(gas_limit in 60_000u64..1_000_000) {
        let store = store_with_code(&[(ALICE, 100)], &[(METER, GAS_SAMPLER.to_vec())]);
        let mut meter = GasMeter::new(2_000_000);

        let result = execute(&store, &mut meter, &transfer(ALICE, METER, 0, gas_limit));
        prop_assert!(result.is_success());
        let first = stored_gas(&store, &METER, 0);
        let second = stored_gas(&store, &METER, 1);
        prop_assert!(first <= gas_limit);
        prop_assert!(second <= first);
        prop_assert!(result.outcome.gas_used() <= gas_limit);
    }
}
