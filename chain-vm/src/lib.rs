//! Contract execution and state transition engine
//!
//! This crate applies signed instructions to account state:
//! - Gas metering with an outer (transaction) and inner (interpreter) tier
//! - A durable account store and a transactional view over it
//! - A bytecode interpreter with nested calls and contract creation
//! - The state transition orchestrator, a dispatch router and a block processor

pub mod account;
pub mod context;
pub mod error;
pub mod gas;
pub mod instruction;
pub mod interpreter;
pub mod params;
pub mod processor;
pub mod router;
pub mod state;
pub mod transition;
pub mod view;

pub use account::{Account, AccountChanges};
pub use context::{can_transfer, transfer, ExecutionContext};
pub use error::{VmError, VmResult};
pub use gas::{GasAccounting, GasLimit, GasMeter, Reconciliation};
pub use instruction::Instruction;
pub use interpreter::{contract_address, CallOutput, CreateOutput, Environment, Interpreter, Vm};
pub use params::{CommonGasParams, OpConstGasParams, VmParams};
pub use processor::{BlockExecution, BlockProcessor};
pub use router::{Handler, Router};
pub use state::{MemoryStateDB, SharedStateDB, StateDB};
pub use transition::{AmbientContext, StateTransition, Transition, TransitionEvent, TransitionOutcome};
pub use view::{Checkpoint, StateView};
