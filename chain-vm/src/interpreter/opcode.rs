//! Instruction set

use crate::params::OpConstGasParams;
use chain_core::Gas;

/// Opcode byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Opcode(pub u8);

impl Opcode {
    pub const STOP: Opcode = Opcode(0x00);
    pub const ADD: Opcode = Opcode(0x01);
    pub const MUL: Opcode = Opcode(0x02);
    pub const SUB: Opcode = Opcode(0x03);
    pub const DIV: Opcode = Opcode(0x04);
    pub const MOD: Opcode = Opcode(0x06);

    pub const LT: Opcode = Opcode(0x10);
    pub const GT: Opcode = Opcode(0x11);
    pub const EQ: Opcode = Opcode(0x14);
    pub const ISZERO: Opcode = Opcode(0x15);
    pub const AND: Opcode = Opcode(0x16);
    pub const OR: Opcode = Opcode(0x17);
    pub const XOR: Opcode = Opcode(0x18);
    pub const NOT: Opcode = Opcode(0x19);

    pub const KECCAK256: Opcode = Opcode(0x20);

    pub const ADDRESS: Opcode = Opcode(0x30);
    pub const BALANCE: Opcode = Opcode(0x31);
    pub const ORIGIN: Opcode = Opcode(0x32);
    pub const CALLER: Opcode = Opcode(0x33);
    pub const CALLVALUE: Opcode = Opcode(0x34);
    pub const CALLDATALOAD: Opcode = Opcode(0x35);
    pub const CALLDATASIZE: Opcode = Opcode(0x36);
    pub const CALLDATACOPY: Opcode = Opcode(0x37);
    pub const CODESIZE: Opcode = Opcode(0x38);
    pub const CODECOPY: Opcode = Opcode(0x39);
    pub const RETURNDATASIZE: Opcode = Opcode(0x3d);

    pub const BLOCKHASH: Opcode = Opcode(0x40);
    pub const COINBASE: Opcode = Opcode(0x41);
    pub const TIMESTAMP: Opcode = Opcode(0x42);
    pub const NUMBER: Opcode = Opcode(0x43);
    pub const GASLIMIT: Opcode = Opcode(0x45);
    pub const SELFBALANCE: Opcode = Opcode(0x47);

    pub const POP: Opcode = Opcode(0x50);
    pub const MLOAD: Opcode = Opcode(0x51);
    pub const MSTORE: Opcode = Opcode(0x52);
    pub const MSTORE8: Opcode = Opcode(0x53);
    pub const SLOAD: Opcode = Opcode(0x54);
    pub const SSTORE: Opcode = Opcode(0x55);
    pub const JUMP: Opcode = Opcode(0x56);
    pub const JUMPI: Opcode = Opcode(0x57);
    pub const PC: Opcode = Opcode(0x58);
    pub const MSIZE: Opcode = Opcode(0x59);
    pub const GAS: Opcode = Opcode(0x5a);
    pub const JUMPDEST: Opcode = Opcode(0x5b);

    pub const PUSH1: Opcode = Opcode(0x60);
    pub const PUSH32: Opcode = Opcode(0x7f);
    pub const DUP1: Opcode = Opcode(0x80);
    pub const DUP16: Opcode = Opcode(0x8f);
    pub const SWAP1: Opcode = Opcode(0x90);
    pub const SWAP16: Opcode = Opcode(0x9f);
    pub const LOG0: Opcode = Opcode(0xa0);
    pub const LOG4: Opcode = Opcode(0xa4);

    pub const CREATE: Opcode = Opcode(0xf0);
    pub const CALL: Opcode = Opcode(0xf1);
    pub const RETURN: Opcode = Opcode(0xf3);
    pub const REVERT: Opcode = Opcode(0xfd);
    pub const INVALID: Opcode = Opcode(0xfe);

    /// Number of immediate bytes for PUSH1..PUSH32
    pub fn push_size(self) -> Option<usize> {
        (Self::PUSH1..=Self::PUSH32)
            .contains(&self)
            .then(|| (self.0 - Self::PUSH1.0) as usize + 1)
    }

    /// Stack position duplicated by DUP1..DUP16
    pub fn dup_position(self) -> Option<usize> {
        (Self::DUP1..=Self::DUP16)
            .contains(&self)
            .then(|| (self.0 - Self::DUP1.0) as usize + 1)
    }

    /// Stack position exchanged with the top by SWAP1..SWAP16
    pub fn swap_position(self) -> Option<usize> {
        (Self::SWAP1..=Self::SWAP16)
            .contains(&self)
            .then(|| (self.0 - Self::SWAP1.0) as usize + 1)
    }

    /// Topic count of LOG0..LOG4
    pub fn log_topics(self) -> Option<usize> {
        (Self::LOG0..=Self::LOG4)
            .contains(&self)
            .then(|| (self.0 - Self::LOG0.0) as usize)
    }

    /// Label used in gas breakdowns
    pub fn name(self) -> &'static str {
        match self {
            Self::STOP => "STOP",
            Self::ADD => "ADD",
            Self::MUL => "MUL",
            Self::SUB => "SUB",
            Self::DIV => "DIV",
            Self::MOD => "MOD",
            Self::LT => "LT",
            Self::GT => "GT",
            Self::EQ => "EQ",
            Self::ISZERO => "ISZERO",
            Self::AND => "AND",
            Self::OR => "OR",
            Self::XOR => "XOR",
            Self::NOT => "NOT",
            Self::KECCAK256 => "KECCAK256",
            Self::ADDRESS => "ADDRESS",
            Self::BALANCE => "BALANCE",
            Self::ORIGIN => "ORIGIN",
            Self::CALLER => "CALLER",
            Self::CALLVALUE => "CALLVALUE",
            Self::CALLDATALOAD => "CALLDATALOAD",
            Self::CALLDATASIZE => "CALLDATASIZE",
            Self::CALLDATACOPY => "CALLDATACOPY",
            Self::CODESIZE => "CODESIZE",
            Self::CODECOPY => "CODECOPY",
            Self::RETURNDATASIZE => "RETURNDATASIZE",
            Self::BLOCKHASH => "BLOCKHASH",
            Self::COINBASE => "COINBASE",
            Self::TIMESTAMP => "TIMESTAMP",
            Self::NUMBER => "NUMBER",
            Self::GASLIMIT => "GASLIMIT",
            Self::SELFBALANCE => "SELFBALANCE",
            Self::POP => "POP",
            Self::MLOAD => "MLOAD",
            Self::MSTORE => "MSTORE",
            Self::MSTORE8 => "MSTORE8",
            Self::SLOAD => "SLOAD",
            Self::SSTORE => "SSTORE",
            Self::JUMP => "JUMP",
            Self::JUMPI => "JUMPI",
            Self::PC => "PC",
            Self::MSIZE => "MSIZE",
            Self::GAS => "GAS",
            Self::JUMPDEST => "JUMPDEST",
            Self::CREATE => "CREATE",
            Self::CALL => "CALL",
            Self::RETURN => "RETURN",
            Self::REVERT => "REVERT",
            op if op.push_size().is_some() => "PUSH",
            op if op.dup_position().is_some() => "DUP",
            op if op.swap_position().is_some() => "SWAP",
            op if op.log_topics().is_some() => "LOG",
            _ => "INVALID",
        }
    }

    /// Constant cost of the instruction, `None` if it is not part of the set
    pub fn const_gas(self, params: &OpConstGasParams) -> Option<Gas> {
        let cost = match self {
            Self::STOP | Self::RETURN | Self::REVERT | Self::CREATE | Self::CALL | Self::SLOAD
            | Self::SSTORE => params.zero,

            Self::ADDRESS
            | Self::ORIGIN
            | Self::CALLER
            | Self::CALLVALUE
            | Self::CALLDATASIZE
            | Self::CODESIZE
            | Self::RETURNDATASIZE
            | Self::COINBASE
            | Self::TIMESTAMP
            | Self::NUMBER
            | Self::GASLIMIT
            | Self::POP
            | Self::PC
            | Self::MSIZE
            | Self::GAS => params.base,

            Self::ADD
            | Self::SUB
            | Self::LT
            | Self::GT
            | Self::EQ
            | Self::ISZERO
            | Self::AND
            | Self::OR
            | Self::XOR
            | Self::NOT
            | Self::CALLDATALOAD
            | Self::CALLDATACOPY
            | Self::CODECOPY
            | Self::MLOAD
            | Self::MSTORE
            | Self::MSTORE8 => params.very_low,

            Self::MUL | Self::DIV | Self::MOD | Self::SELFBALANCE => params.low,
            Self::JUMP => params.mid,
            Self::JUMPI => params.high,
            Self::JUMPDEST => params.jumpdest,
            Self::BALANCE => params.balance,
            Self::BLOCKHASH => params.blockhash,
            Self::KECCAK256 => params.keccak,

            op if op.push_size().is_some()
                || op.dup_position().is_some()
                || op.swap_position().is_some() =>
            {
                params.very_low
            }
            op if op.log_topics().is_some() => params.zero,

            _ => return None,
        };
        Some(cost)
    }
}

/// Valid jump targets: JUMPDEST bytes that are not PUSH immediates
pub fn jump_destinations(code: &[u8]) -> Vec<bool> {
    let mut valid = vec![false; code.len()];
    let mut pc = 0;
    while pc < code.len() {
        let op = Opcode(code[pc]);
        if op == Opcode::JUMPDEST {
            valid[pc] = true;
        }
        pc += 1 + op.push_size().unwrap_or(0);
    }
    valid
}
