//! VM parameters supplied per block from on-chain configuration

use crate::VmResult;
use chain_core::Gas;
use serde::{Deserialize, Serialize};

/// Constant per-instruction costs, grouped in tiers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpConstGasParams {
    /// STOP, RETURN, REVERT
    pub zero: Gas,
    /// Environment and block information
    pub base: Gas,
    /// Arithmetic, comparison, stack and memory access
    pub very_low: Gas,
    /// Multiplication and division
    pub low: Gas,
    /// JUMP
    pub mid: Gas,
    /// JUMPI
    pub high: Gas,
    /// JUMPDEST
    pub jumpdest: Gas,
    /// BALANCE
    pub balance: Gas,
    /// BLOCKHASH
    pub blockhash: Gas,
    /// KECCAK256 base cost
    pub keccak: Gas,
}

impl Default for OpConstGasParams {
    fn default() -> Self {
        Self {
            zero: 0,
            base: 2,
            very_low: 3,
            low: 5,
            mid: 8,
            high: 10,
            jumpdest: 1,
            balance: 400,
            blockhash: 20,
            keccak: 30,
        }
    }
}

/// Costs that depend on operands or state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommonGasParams {
    /// Entering a call frame
    pub call: Gas,
    /// Extra cost of a frame carrying value
    pub call_value_transfer: Gas,
    /// Entering a creation frame
    pub create: Gas,
    /// Per byte of deployed code
    pub create_data: Gas,
    /// Storage read
    pub sload: Gas,
    /// Storage write of a non-zero value into an empty slot
    pub sstore_set: Gas,
    /// Any other storage write
    pub sstore_reset: Gas,
    /// LOG base cost
    pub log: Gas,
    /// Per LOG topic
    pub log_topic: Gas,
    /// Per byte of LOG data
    pub log_data: Gas,
    /// Per word of memory expansion
    pub memory: Gas,
    /// Divisor of the quadratic memory term
    pub quad_coeff_div: Gas,
    /// Per word hashed by KECCAK256
    pub keccak_word: Gas,
    /// Per word copied by *COPY instructions
    pub copy: Gas,
}

impl Default for CommonGasParams {
    fn default() -> Self {
        Self {
            call: 700,
            call_value_transfer: 9000,
            create: 32000,
            create_data: 200,
            sload: 800,
            sstore_set: 20000,
            sstore_reset: 5000,
            log: 375,
            log_topic: 375,
            log_data: 8,
            memory: 3,
            quad_coeff_div: 512,
            keccak_word: 6,
            copy: 3,
        }
    }
}

/// Parameters read once per block and held fixed for every transition in it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmParams {
    /// Constant instruction costs
    pub op_const_gas: OpConstGasParams,
    /// Dynamic costs
    pub common_gas: CommonGasParams,
    /// Maximum nesting of call/create frames
    pub max_call_depth: usize,
    /// Maximum size of deployed code in bytes
    pub max_code_size: usize,
    /// Call gas for read-only simulation
    pub default_gas_limit: Gas,
}

impl Default for VmParams {
    fn default() -> Self {
        Self {
            op_const_gas: OpConstGasParams::default(),
            common_gas: CommonGasParams::default(),
            max_call_depth: 1024,
            max_code_size: 24_576,
            default_gas_limit: 100_000_000,
        }
    }
}

impl VmParams {
    /// Load parameters from TOML configuration
    pub fn from_toml(toml_str: &str) -> VmResult<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Convert to TOML string
    pub fn to_toml(&self) -> VmResult<String> {
        Ok(toml::to_string(self)?)
    }

    /// Load parameters from a JSON parameter blob
    pub fn from_json(json: &str) -> VmResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Convert to JSON string
    pub fn to_json(&self) -> VmResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}
