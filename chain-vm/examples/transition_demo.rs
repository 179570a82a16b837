//! Example applying a small block through the state transition engine

use anyhow::Result;
use chain_core::{address_of_secret, Address, Block, BlockHeader, Transaction};
use chain_vm::{
    contract_address, Account, BlockProcessor, Instruction, MemoryStateDB, SharedStateDB,
    StateTransition, VmParams,
};
use tracing_subscriber::EnvFilter;

const ALICE_KEY: [u8; 32] = [42u8; 32];

/// Runtime code returning the word 42
const RUNTIME: [u8; 10] = [0x60, 0x2a, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3];

fn init_code(runtime: &[u8]) -> Vec<u8> {
    let len = runtime.len() as u8;
    let mut code = vec![0x60, len, 0x60, 0x0c, 0x60, 0x00, 0x39, 0x60, len, 0x60, 0x00, 0xf3];
    code.extend_from_slice(runtime);
    code
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("🦀 Rust Chain State Transition Demo");
    println!("===================================");

    println!("\n1. Loading parameters...");
    let params = VmParams::from_toml(
        r#"
        max_call_depth = 256

        [common_gas]
        sstore_set = 20000
        "#,
    )?;
    println!("   Max call depth: {}", params.max_call_depth);
    println!("   Call base cost: {}", params.common_gas.call);

    println!("\n2. Funding genesis accounts...");
    let alice = address_of_secret(&ALICE_KEY)?;
    let bob = Address::from_hex("abcdef1234567890abcdef1234567890abcdef12")?;
    let store = SharedStateDB::new(Box::new(MemoryStateDB::with_accounts([(
        alice,
        Account::with_balance(1_000_000),
    )])));
    println!("   Alice: {}", alice);
    println!("   Genesis root: {}", store.state_root());

    println!("\n3. Building block #1...");
    let contract = contract_address(&alice, 0);
    let mut transactions = vec![
        Transaction::transfer(0, bob, 250_000, 21_000),
        Transaction::create_contract(1, 0, 200_000, init_code(&RUNTIME)),
        Transaction::call(2, contract, 0, 50_000, Vec::new()),
        // Alice cannot cover this one
        Transaction::transfer(3, bob, 5_000_000, 21_000),
    ];
    for tx in &mut transactions {
        tx.sign(&ALICE_KEY)?;
    }
    let header = BlockHeader::new(BlockHeader::genesis().hash()?, 1, 1_700_000_000, alice, 8_000_000);
    let block = Block::seal(header, transactions)?;

    println!("\n4. Executing block...");
    let mut processor = BlockProcessor::new(params.clone())?;
    let execution = processor.execute_block(&block, &store)?;
    for receipt in &execution.receipts {
        println!(
            "   tx {} status {} gas {} contract {:?}",
            receipt.transaction_index, receipt.status, receipt.gas_used, receipt.contract_address
        );
    }
    println!("   Block gas used: {}", execution.gas_used);
    println!("   Events: {}", execution.events.len());
    println!("   State root: {}", execution.state_root);
    println!("   Bob balance: {}", store.get_account(&bob)?.map(|a| a.balance).unwrap_or(0));

    println!("\n5. Simulating a read-only call...");
    let query = Instruction::Invoke {
        sender: bob,
        recipient: contract,
        value: 0,
        payload: Vec::new(),
        gas_limit: 0,
    };
    let root_before = store.state_root();
    let simulated = StateTransition::new(params).simulate(&query, &block.header, &store);
    println!("   Outcome: {:?}", simulated.outcome);
    println!("   Store untouched: {}", store.state_root() == root_before);

    println!("\n✅ Demo completed successfully!");
    Ok(())
}
