//! Bytecode interpreter
//!
//! A stack machine over 256-bit words. Each call or create frame runs against
//! its own bounded [`GasMeter`] and its own checkpoint of the [`StateView`];
//! a failing frame drops its checkpoint and reports its leftover gas to the
//! parent, which decides what to do with it. Every charge a frame makes is
//! mirrored into the untracked accounting meter of the [`Environment`], so the
//! accounting meter always holds exactly `gas_limit - gas_remaining` of the
//! top-level invocation.

mod memory;
mod opcode;
mod stack;

pub use memory::Memory;
pub use opcode::{jump_destinations, Opcode};
pub use stack::{Stack, STACK_LIMIT};

use crate::context::ExecutionContext;
use crate::gas::GasMeter;
use crate::params::VmParams;
use crate::view::{Checkpoint, StateView};
use crate::{VmError, VmResult};
use chain_core::{Address, Gas, Hash, Log, Nonce, Wei};
use primitive_types::U256;
use tracing::{debug, trace};

/// Everything a frame can reach outside itself
pub struct Environment<'a> {
    pub context: &'a ExecutionContext,
    pub state: &'a mut StateView,
    /// Untracked meter receiving a copy of every charge
    pub accounting: &'a mut GasMeter,
}

/// Result of a call entry point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutput {
    /// Return data, or revert data when `error` is a revert
    pub output: Vec<u8>,
    pub gas_remaining: Gas,
    pub error: Option<VmError>,
}

/// Result of a create entry point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOutput {
    /// Deployed code, or revert data when `error` is a revert
    pub output: Vec<u8>,
    /// Address of the new contract, set only on success
    pub address: Option<Address>,
    pub gas_remaining: Gas,
    pub error: Option<VmError>,
}

/// Entry points of an execution engine
pub trait Vm {
    /// Run `init_code` and deploy what it returns at a fresh address
    fn create(
        &mut self,
        env: &mut Environment<'_>,
        sender: Address,
        init_code: &[u8],
        gas_limit: Gas,
        value: Wei,
    ) -> CreateOutput;

    /// Move `value` to `recipient` and run its code, if any
    fn call(
        &mut self,
        env: &mut Environment<'_>,
        sender: Address,
        recipient: Address,
        payload: &[u8],
        gas_limit: Gas,
        value: Wei,
    ) -> CallOutput;
}

/// Address of the contract created by `creator` at `nonce`
pub fn contract_address(creator: &Address, nonce: Nonce) -> Address {
    let mut preimage = Vec::with_capacity(28);
    preimage.extend_from_slice(creator.as_bytes());
    preimage.extend_from_slice(&nonce.to_be_bytes());
    Address::from_hash(&Hash::digest(&preimage))
}

/// Storage key for a word
pub fn word_key(word: U256) -> Hash {
    Hash::new(word_bytes(word))
}

fn word_bytes(word: U256) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    word.to_big_endian(&mut bytes);
    bytes
}

fn bool_word(value: bool) -> U256 {
    if value {
        U256::one()
    } else {
        U256::zero()
    }
}

fn address_word(address: &Address) -> U256 {
    U256::from_big_endian(address.as_bytes())
}

fn word_address(word: U256) -> Address {
    Address::from_slice(&word_bytes(word)[12..])
}

fn word_wei(word: U256) -> Option<Wei> {
    (word <= U256::from(Wei::MAX)).then(|| word.low_u128())
}

/// Storage values are big-endian words; an empty slot reads as zero
fn storage_word(bytes: &[u8]) -> U256 {
    let start = bytes.len().saturating_sub(32);
    U256::from_big_endian(&bytes[start..])
}

/// Offset into a buffer of `len` bytes, clamped to its end
fn clamp_offset(word: U256, len: usize) -> usize {
    if word > U256::from(len as u64) {
        len
    } else {
        word.low_u64() as usize
    }
}

/// Gas left in a bounded frame meter
fn remaining(gas: &GasMeter) -> Gas {
    gas.remaining().unwrap_or(0)
}

/// All but one 64th of what is left
fn forwardable(gas: &GasMeter) -> Gas {
    let available = remaining(gas);
    available - available / 64
}

fn charge(
    gas: &mut GasMeter,
    accounting: &mut GasMeter,
    amount: Gas,
    operation: &'static str,
) -> VmResult<()> {
    gas.consume(amount, operation)?;
    accounting.record(amount, operation);
    Ok(())
}

enum Exit {
    Return(Vec<u8>),
    Revert(Vec<u8>),
}

enum Control {
    Next,
    Jump,
    Exit(Exit),
}

struct Frame {
    address: Address,
    caller: Address,
    value: Wei,
    input: Vec<u8>,
    code: Vec<u8>,
    jumpdests: Vec<bool>,
    pc: usize,
    stack: Stack,
    memory: Memory,
    return_data: Vec<u8>,
    depth: usize,
}

impl Frame {
    fn new(
        address: Address,
        caller: Address,
        value: Wei,
        input: Vec<u8>,
        code: Vec<u8>,
        depth: usize,
    ) -> Self {
        Self {
            address,
            caller,
            value,
            input,
            jumpdests: jump_destinations(&code),
            code,
            pc: 0,
            stack: Stack::new(),
            memory: Memory::new(),
            return_data: Vec::new(),
            depth,
        }
    }

    fn jump_target(&self, dest: U256) -> VmResult<usize> {
        let target = clamp_offset(dest, self.code.len());
        if self.jumpdests.get(target).copied().unwrap_or(false) {
            Ok(target)
        } else {
            Err(VmError::InvalidJump(target))
        }
    }
}

/// Reference interpreter
#[derive(Debug, Clone, Default)]
pub struct Interpreter {
    params: VmParams,
}

impl Interpreter {
    pub fn new(params: VmParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &VmParams {
        &self.params
    }

    /// Depth and balance checks done before a frame is entered.
    ///
    /// Failing here leaves the frame's gas untouched.
    fn admit(&self, env: &Environment<'_>, caller: &Address, value: Wei, depth: usize) -> VmResult<()> {
        if depth > self.params.max_call_depth {
            return Err(VmError::CallDepthExceeded(self.params.max_call_depth));
        }
        if !(env.context.can_transfer)(&*env.state, caller, value)? {
            return Err(VmError::InsufficientBalance {
                required: value,
                available: env.state.get_balance(caller)?,
            });
        }
        Ok(())
    }

    /// Close a frame's checkpoint according to how it exited
    fn settle(
        env: &mut Environment<'_>,
        checkpoint: Checkpoint,
        gas: &mut GasMeter,
        result: VmResult<Exit>,
    ) -> (Vec<u8>, Gas, Option<VmError>) {
        match result {
            Ok(Exit::Return(output)) => {
                env.state.commit_to(checkpoint);
                (output, remaining(gas), None)
            }
            Ok(Exit::Revert(output)) => {
                env.state.revert_to(checkpoint);
                (output, remaining(gas), Some(VmError::ExecutionReverted))
            }
            Err(error) => {
                env.state.revert_to(checkpoint);
                if error.consumes_all_gas() {
                    let left = remaining(gas);
                    gas.consume_all("exhausted");
                    env.accounting.record(left, "exhausted");
                }
                debug!("Frame failed: {}", error);
                (Vec::new(), remaining(gas), Some(error))
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn call_frame(
        &self,
        env: &mut Environment<'_>,
        caller: Address,
        address: Address,
        input: &[u8],
        gas_limit: Gas,
        value: Wei,
        depth: usize,
    ) -> CallOutput {
        trace!(
            "Call {} -> {}: gas {}, value {}, depth {}",
            caller, address, gas_limit, value, depth
        );
        if let Err(error) = self.admit(env, &caller, value, depth) {
            return CallOutput {
                output: Vec::new(),
                gas_remaining: gas_limit,
                error: Some(error),
            };
        }

        let checkpoint = env.state.checkpoint();
        let mut gas = GasMeter::new(gas_limit);
        let result = self.enter_call(env, &mut gas, caller, address, input, value, depth);
        let (output, gas_remaining, error) = Self::settle(env, checkpoint, &mut gas, result);
        CallOutput {
            output,
            gas_remaining,
            error,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn enter_call(
        &self,
        env: &mut Environment<'_>,
        gas: &mut GasMeter,
        caller: Address,
        address: Address,
        input: &[u8],
        value: Wei,
        depth: usize,
    ) -> VmResult<Exit> {
        let common = &self.params.common_gas;
        charge(gas, env.accounting, common.call, "call")?;
        if value > 0 {
            charge(gas, env.accounting, common.call_value_transfer, "call_value_transfer")?;
            (env.context.transfer)(&mut *env.state, &caller, &address, value)?;
        }

        let code = env.state.get_code(&address)?;
        if code.is_empty() {
            return Ok(Exit::Return(Vec::new()));
        }

        let mut frame = Frame::new(address, caller, value, input.to_vec(), code, depth);
        self.run(env, gas, &mut frame)
    }

    fn create_frame(
        &self,
        env: &mut Environment<'_>,
        creator: Address,
        init_code: &[u8],
        gas_limit: Gas,
        value: Wei,
        depth: usize,
    ) -> CreateOutput {
        trace!("Create by {}: gas {}, value {}, depth {}", creator, gas_limit, value, depth);
        let failed = |error: VmError| CreateOutput {
            output: Vec::new(),
            address: None,
            gas_remaining: gas_limit,
            error: Some(error),
        };

        if let Err(error) = self.admit(env, &creator, value, depth) {
            return failed(error);
        }
        let nonce = match env.state.get_nonce(&creator) {
            Ok(nonce) => nonce,
            Err(error) => return failed(error),
        };
        let address = contract_address(&creator, nonce);
        if let Err(error) = env.state.increment_nonce(&creator) {
            return failed(error);
        }

        let checkpoint = env.state.checkpoint();
        let mut gas = GasMeter::new(gas_limit);
        let result = self.enter_create(env, &mut gas, creator, address, init_code, value, depth);
        let (output, gas_remaining, error) = Self::settle(env, checkpoint, &mut gas, result);
        CreateOutput {
            address: error.is_none().then_some(address),
            output,
            gas_remaining,
            error,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn enter_create(
        &self,
        env: &mut Environment<'_>,
        gas: &mut GasMeter,
        creator: Address,
        address: Address,
        init_code: &[u8],
        value: Wei,
        depth: usize,
    ) -> VmResult<Exit> {
        let common = &self.params.common_gas;
        charge(gas, env.accounting, common.create, "create")?;

        let existing = env.state.account(&address)?;
        if existing.nonce != 0 || existing.is_contract() {
            return Err(VmError::ContractAddressCollision(address));
        }
        env.state.set_nonce(&address, 1)?;
        if value > 0 {
            (env.context.transfer)(&mut *env.state, &creator, &address, value)?;
        }

        let mut frame = Frame::new(address, creator, value, Vec::new(), init_code.to_vec(), depth);
        match self.run(env, gas, &mut frame)? {
            Exit::Return(code) => {
                if code.len() > self.params.max_code_size {
                    return Err(VmError::CodeSizeExceeded {
                        size: code.len(),
                        limit: self.params.max_code_size,
                    });
                }
                let deposit = (code.len() as Gas).saturating_mul(common.create_data);
                charge(gas, env.accounting, deposit, "code_deposit")?;
                env.state.set_code(&address, code.clone())?;
                Ok(Exit::Return(code))
            }
            revert => Ok(revert),
        }
    }

    fn run(&self, env: &mut Environment<'_>, gas: &mut GasMeter, frame: &mut Frame) -> VmResult<Exit> {
        while frame.pc < frame.code.len() {
            let op = Opcode(frame.code[frame.pc]);
            match self.step(env, gas, frame, op)? {
                Control::Next => frame.pc += 1,
                Control::Jump => {}
                Control::Exit(exit) => return Ok(exit),
            }
        }
        Ok(Exit::Return(Vec::new()))
    }

    /// Charge for and expand memory to cover `offset..offset + size`
    fn memory_region(
        &self,
        gas: &mut GasMeter,
        accounting: &mut GasMeter,
        memory: &mut Memory,
        offset: U256,
        size: U256,
    ) -> VmResult<(usize, usize)> {
        if size.is_zero() {
            return Ok((0, 0));
        }
        let bound = U256::from(u32::MAX);
        let out_of_gas = || VmError::OutOfGas {
            required: Gas::MAX,
            available: remaining(gas),
        };
        if offset > bound || size > bound {
            return Err(out_of_gas());
        }
        let (offset, size) = (offset.low_u64() as usize, size.low_u64() as usize);
        let end = offset.checked_add(size).ok_or_else(out_of_gas)?;

        let cost = memory::expansion_cost(memory.len(), end, &self.params.common_gas);
        charge(gas, accounting, cost, "memory")?;
        memory.expand(end);
        Ok((offset, size))
    }

    fn step(
        &self,
        env: &mut Environment<'_>,
        gas: &mut GasMeter,
        frame: &mut Frame,
        op: Opcode,
    ) -> VmResult<Control> {
        let cost = op
            .const_gas(&self.params.op_const_gas)
            .ok_or(VmError::InvalidOpcode(op.0))?;
        charge(gas, env.accounting, cost, op.name())?;
        let common = &self.params.common_gas;

        match op {
            Opcode::STOP => return Ok(Control::Exit(Exit::Return(Vec::new()))),

            Opcode::ADD => {
                let [a, b] = frame.stack.pop_n()?;
                frame.stack.push(a.overflowing_add(b).0)?;
            }
            Opcode::MUL => {
                let [a, b] = frame.stack.pop_n()?;
                frame.stack.push(a.overflowing_mul(b).0)?;
            }
            Opcode::SUB => {
                let [a, b] = frame.stack.pop_n()?;
                frame.stack.push(a.overflowing_sub(b).0)?;
            }
            Opcode::DIV => {
                let [a, b] = frame.stack.pop_n()?;
                frame.stack.push(if b.is_zero() { U256::zero() } else { a / b })?;
            }
            Opcode::MOD => {
                let [a, b] = frame.stack.pop_n()?;
                frame.stack.push(if b.is_zero() { U256::zero() } else { a % b })?;
            }

            Opcode::LT => {
                let [a, b] = frame.stack.pop_n()?;
                frame.stack.push(bool_word(a < b))?;
            }
            Opcode::GT => {
                let [a, b] = frame.stack.pop_n()?;
                frame.stack.push(bool_word(a > b))?;
            }
            Opcode::EQ => {
                let [a, b] = frame.stack.pop_n()?;
                frame.stack.push(bool_word(a == b))?;
            }
            Opcode::ISZERO => {
                let a = frame.stack.pop()?;
                frame.stack.push(bool_word(a.is_zero()))?;
            }
            Opcode::AND => {
                let [a, b] = frame.stack.pop_n()?;
                frame.stack.push(a & b)?;
            }
            Opcode::OR => {
                let [a, b] = frame.stack.pop_n()?;
                frame.stack.push(a | b)?;
            }
            Opcode::XOR => {
                let [a, b] = frame.stack.pop_n()?;
                frame.stack.push(a ^ b)?;
            }
            Opcode::NOT => {
                let a = frame.stack.pop()?;
                frame.stack.push(!a)?;
            }

            Opcode::KECCAK256 => {
                let [offset, size] = frame.stack.pop_n()?;
                let (offset, size) =
                    self.memory_region(gas, env.accounting, &mut frame.memory, offset, size)?;
                let word_cost = common.keccak_word.saturating_mul(memory::words(size));
                charge(gas, env.accounting, word_cost, op.name())?;
                let digest = Hash::digest(&frame.memory.read(offset, size));
                frame.stack.push(U256::from_big_endian(digest.as_bytes()))?;
            }

            Opcode::ADDRESS => frame.stack.push(address_word(&frame.address))?,
            Opcode::BALANCE => {
                let address = word_address(frame.stack.pop()?);
                frame.stack.push(U256::from(env.state.get_balance(&address)?))?;
            }
            Opcode::ORIGIN => frame.stack.push(address_word(&env.context.origin))?,
            Opcode::CALLER => frame.stack.push(address_word(&frame.caller))?,
            Opcode::CALLVALUE => frame.stack.push(U256::from(frame.value))?,
            Opcode::CALLDATALOAD => {
                let start = clamp_offset(frame.stack.pop()?, frame.input.len());
                let end = start.saturating_add(32).min(frame.input.len());
                let mut word = [0u8; 32];
                word[..end - start].copy_from_slice(&frame.input[start..end]);
                frame.stack.push(U256::from_big_endian(&word))?;
            }
            Opcode::CALLDATASIZE => frame.stack.push(U256::from(frame.input.len() as u64))?,
            Opcode::CALLDATACOPY => {
                let [memory_offset, data_offset, size] = frame.stack.pop_n()?;
                let (offset, size) =
                    self.memory_region(gas, env.accounting, &mut frame.memory, memory_offset, size)?;
                charge(gas, env.accounting, common.copy.saturating_mul(memory::words(size)), op.name())?;
                let source_offset = clamp_offset(data_offset, frame.input.len());
                frame.memory.write_padded(offset, &frame.input, source_offset, size);
            }
            Opcode::CODESIZE => frame.stack.push(U256::from(frame.code.len() as u64))?,
            Opcode::CODECOPY => {
                let [memory_offset, code_offset, size] = frame.stack.pop_n()?;
                let (offset, size) =
                    self.memory_region(gas, env.accounting, &mut frame.memory, memory_offset, size)?;
                charge(gas, env.accounting, common.copy.saturating_mul(memory::words(size)), op.name())?;
                let source_offset = clamp_offset(code_offset, frame.code.len());
                frame.memory.write_padded(offset, &frame.code, source_offset, size);
            }
            Opcode::RETURNDATASIZE => frame.stack.push(U256::from(frame.return_data.len() as u64))?,

            Opcode::BLOCKHASH => {
                let number = frame.stack.pop()?;
                let hash = if number > U256::from(u64::MAX) {
                    Hash::zero()
                } else {
                    env.context.block_hash(number.low_u64())
                };
                frame.stack.push(U256::from_big_endian(hash.as_bytes()))?;
            }
            Opcode::COINBASE => frame.stack.push(address_word(&env.context.coinbase))?,
            Opcode::TIMESTAMP => frame.stack.push(U256::from(env.context.timestamp))?,
            Opcode::NUMBER => frame.stack.push(U256::from(env.context.block_number))?,
            Opcode::GASLIMIT => frame.stack.push(U256::from(env.context.gas_limit))?,
            Opcode::SELFBALANCE => {
                let balance = env.state.get_balance(&frame.address)?;
                frame.stack.push(U256::from(balance))?;
            }

            Opcode::POP => {
                frame.stack.pop()?;
            }
            Opcode::MLOAD => {
                let offset = frame.stack.pop()?;
                let (offset, _) =
                    self.memory_region(gas, env.accounting, &mut frame.memory, offset, U256::from(32u64))?;
                let word = frame.memory.read_word(offset);
                frame.stack.push(word)?;
            }
            Opcode::MSTORE => {
                let [offset, value] = frame.stack.pop_n()?;
                let (offset, _) =
                    self.memory_region(gas, env.accounting, &mut frame.memory, offset, U256::from(32u64))?;
                frame.memory.write_word(offset, value);
            }
            Opcode::MSTORE8 => {
                let [offset, value] = frame.stack.pop_n()?;
                let (offset, _) =
                    self.memory_region(gas, env.accounting, &mut frame.memory, offset, U256::one())?;
                frame.memory.write_byte(offset, (value.low_u32() & 0xff) as u8);
            }
            Opcode::SLOAD => {
                charge(gas, env.accounting, common.sload, op.name())?;
                let key = word_key(frame.stack.pop()?);
                let value = env.state.get_storage(&frame.address, &key)?;
                frame.stack.push(storage_word(&value))?;
            }
            Opcode::SSTORE => {
                let [key, value] = frame.stack.pop_n()?;
                let key = word_key(key);
                let current = storage_word(&env.state.get_storage(&frame.address, &key)?);
                let cost = if current.is_zero() && !value.is_zero() {
                    common.sstore_set
                } else {
                    common.sstore_reset
                };
                charge(gas, env.accounting, cost, op.name())?;
                let stored = if value.is_zero() {
                    Vec::new()
                } else {
                    word_bytes(value).to_vec()
                };
                env.state.set_storage(&frame.address, key, stored);
            }
            Opcode::JUMP => {
                let dest = frame.stack.pop()?;
                frame.pc = frame.jump_target(dest)?;
                return Ok(Control::Jump);
            }
            Opcode::JUMPI => {
                let [dest, condition] = frame.stack.pop_n()?;
                if !condition.is_zero() {
                    frame.pc = frame.jump_target(dest)?;
                    return Ok(Control::Jump);
                }
            }
            Opcode::PC => frame.stack.push(U256::from(frame.pc as u64))?,
            Opcode::MSIZE => frame.stack.push(U256::from(frame.memory.len() as u64))?,
            Opcode::GAS => frame.stack.push(U256::from(remaining(gas)))?,
            Opcode::JUMPDEST => {}

            Opcode::CREATE => {
                let [value, offset, size] = frame.stack.pop_n()?;
                let (offset, size) =
                    self.memory_region(gas, env.accounting, &mut frame.memory, offset, size)?;
                let init_code = frame.memory.read(offset, size);
                let Some(value) = word_wei(value) else {
                    frame.return_data.clear();
                    frame.stack.push(U256::zero())?;
                    return Ok(Control::Next);
                };

                let child_gas = forwardable(gas);
                gas.consume(child_gas, op.name())?;
                let created =
                    self.create_frame(env, frame.address, &init_code, child_gas, value, frame.depth + 1);
                gas.refund(created.gas_remaining, op.name());

                frame.return_data = if created.error.is_some() {
                    created.output
                } else {
                    Vec::new()
                };
                let pushed = created.address.map(|a| address_word(&a)).unwrap_or_default();
                frame.stack.push(pushed)?;
            }
            Opcode::CALL => {
                let [requested, target, value, in_offset, in_size, out_offset, out_size] =
                    frame.stack.pop_n()?;
                let (in_offset, in_size) =
                    self.memory_region(gas, env.accounting, &mut frame.memory, in_offset, in_size)?;
                let (out_offset, out_size) =
                    self.memory_region(gas, env.accounting, &mut frame.memory, out_offset, out_size)?;
                let input = frame.memory.read(in_offset, in_size);
                let Some(value) = word_wei(value) else {
                    frame.return_data.clear();
                    frame.stack.push(U256::zero())?;
                    return Ok(Control::Next);
                };

                let cap = forwardable(gas);
                let child_gas = if requested > U256::from(cap) {
                    cap
                } else {
                    requested.low_u64()
                };
                gas.consume(child_gas, op.name())?;
                let called = self.call_frame(
                    env,
                    frame.address,
                    word_address(target),
                    &input,
                    child_gas,
                    value,
                    frame.depth + 1,
                );
                gas.refund(called.gas_remaining, op.name());

                let copied = out_size.min(called.output.len());
                frame.memory.write(out_offset, &called.output[..copied]);
                frame.return_data = called.output;
                frame.stack.push(bool_word(called.error.is_none()))?;
            }
            Opcode::RETURN | Opcode::REVERT => {
                let [offset, size] = frame.stack.pop_n()?;
                let (offset, size) =
                    self.memory_region(gas, env.accounting, &mut frame.memory, offset, size)?;
                let data = frame.memory.read(offset, size);
                let exit = if op == Opcode::RETURN {
                    Exit::Return(data)
                } else {
                    Exit::Revert(data)
                };
                return Ok(Control::Exit(exit));
            }

            op => {
                if let Some(n) = op.push_size() {
                    let start = frame.pc + 1;
                    let end = (start + n).min(frame.code.len());
                    let immediate = frame.code.get(start..end).unwrap_or(&[]);
                    let mut word = [0u8; 32];
                    word[32 - n..32 - n + immediate.len()].copy_from_slice(immediate);
                    frame.stack.push(U256::from_big_endian(&word))?;
                    frame.pc += n;
                } else if let Some(n) = op.dup_position() {
                    frame.stack.dup(n)?;
                } else if let Some(n) = op.swap_position() {
                    frame.stack.swap(n)?;
                } else if let Some(n) = op.log_topics() {
                    let [offset, size] = frame.stack.pop_n()?;
                    let mut topics = Vec::with_capacity(n);
                    for _ in 0..n {
                        topics.push(word_key(frame.stack.pop()?));
                    }
                    let (offset, size) =
                        self.memory_region(gas, env.accounting, &mut frame.memory, offset, size)?;
                    let cost = common
                        .log
                        .saturating_add(common.log_topic.saturating_mul(n as Gas))
                        .saturating_add(common.log_data.saturating_mul(size as Gas));
                    charge(gas, env.accounting, cost, op.name())?;
                    env.state.add_log(Log {
                        address: frame.address,
                        topics,
                        data: frame.memory.read(offset, size),
                    });
                } else {
                    return Err(VmError::InvalidOpcode(op.0));
                }
            }
        }

        Ok(Control::Next)
    }
}

impl Vm for Interpreter {
    fn create(
        &mut self,
        env: &mut Environment<'_>,
        sender: Address,
        init_code: &[u8],
        gas_limit: Gas,
        value: Wei,
    ) -> CreateOutput {
        self.create_frame(env, sender, init_code, gas_limit, value, 0)
    }

    fn call(
        &mut self,
        env: &mut Environment<'_>,
        sender: Address,
        recipient: Address,
        payload: &[u8],
        gas_limit: Gas,
        value: Wei,
    ) -> CallOutput {
        self.call_frame(env, sender, recipient, payload, gas_limit, value, 0)
    }
}
