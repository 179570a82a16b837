//! VM error types

use chain_core::{Address, CoreError};
use thiserror::Error;

/// VM error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    /// Insufficient gas
    #[error("Out of gas: required {required}, available {available}")]
    OutOfGas { required: u64, available: u64 },

    /// Executed code requested an explicit revert
    #[error("Execution reverted")]
    ExecutionReverted,

    /// Transfer guard rejected a value transfer
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: u128, available: u128 },

    /// Balance arithmetic overflow
    #[error("Balance overflow for {0}")]
    BalanceOverflow(Address),

    /// Opcode not part of the instruction set
    #[error("Invalid opcode: 0x{0:02x}")]
    InvalidOpcode(u8),

    /// Jump to a location that is not a JUMPDEST
    #[error("Invalid jump destination: {0}")]
    InvalidJump(usize),

    /// Stack underflow
    #[error("Stack underflow")]
    StackUnderflow,

    /// Stack overflow
    #[error("Stack overflow")]
    StackOverflow,

    /// Nested calls exceeded the configured depth
    #[error("Max call depth {0} exceeded")]
    CallDepthExceeded(usize),

    /// Contract creation targeted an occupied address
    #[error("Contract address collision at {0}")]
    ContractAddressCollision(Address),

    /// Deployed code exceeds the configured maximum
    #[error("Contract code size {size} exceeds limit {limit}")]
    CodeSizeExceeded { size: usize, limit: usize },

    /// Interpreter reported more gas left than it was given
    #[error("Gas accounting violation: {remaining} remaining of {limit}")]
    GasAccounting { remaining: u64, limit: u64 },

    /// Attempt to finalize a read-only state view
    #[error("State view is read-only")]
    ReadOnlyState,

    /// Invalid transaction
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Route key rejected at registration
    #[error("Invalid route key: {0:?}")]
    InvalidRoute(String),

    /// Route key registered twice
    #[error("Route {0} already registered")]
    DuplicateRoute(String),

    /// No handler for an instruction kind
    #[error("No route for {0}")]
    UnknownRoute(String),

    /// Block failed structural validation
    #[error("Invalid block #{number}: {reason}")]
    InvalidBlock { number: u64, reason: String },

    /// Block transactions exceed the block gas limit
    #[error("Block gas limit exceeded: used {used}, limit {limit}")]
    BlockGasLimitExceeded { used: u64, limit: u64 },

    /// State error
    #[error("State error: {0}")]
    State(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Core error
    #[error("Core error: {0}")]
    Core(String),
}

impl VmError {
    /// Whether the error is the explicit revert kind
    pub fn is_revert(&self) -> bool {
        matches!(self, VmError::ExecutionReverted)
    }

    /// Errors that consume all gas handed to the failing frame
    pub fn consumes_all_gas(&self) -> bool {
        !matches!(
            self,
            VmError::ExecutionReverted
                | VmError::InsufficientBalance { .. }
                | VmError::CallDepthExceeded(_)
        )
    }
}

impl From<CoreError> for VmError {
    fn from(err: CoreError) -> Self {
        VmError::Core(err.to_string())
    }
}

impl From<toml::de::Error> for VmError {
    fn from(err: toml::de::Error) -> Self {
        VmError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for VmError {
    fn from(err: toml::ser::Error) -> Self {
        VmError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for VmError {
    fn from(err: serde_json::Error) -> Self {
        VmError::Config(err.to_string())
    }
}

/// Result type for VM operations
pub type VmResult<T> = Result<T, VmError>;
