//! State transition orchestration
//!
//! One call to [`StateTransition::execute`] applies one instruction: it sizes
//! the interpreter's gas from the ambient meter, runs the interpreter against
//! a fresh [`StateView`], classifies what came back and then either commits
//! the view and charges the ambient meter, or drops the view.

use crate::context::ExecutionContext;
use crate::gas::{GasAccounting, GasMeter, Reconciliation};
use crate::instruction::Instruction;
use crate::interpreter::{Environment, Interpreter, Vm};
use crate::params::VmParams;
use crate::state::SharedStateDB;
use crate::view::StateView;
use crate::VmError;
use chain_core::{Address, BlockHeader, Gas, Hash, Log};
use tracing::{debug, info, warn};

/// Resources of the enclosing block and transaction
pub struct AmbientContext<'a> {
    /// Transaction-level meter; advanced only when a transition succeeds
    pub gas_meter: &'a mut GasMeter,
    pub header: &'a BlockHeader,
    /// Canonical bytes of the enclosing transaction
    pub tx_bytes: &'a [u8],
    pub state: &'a SharedStateDB,
}

/// Classified result of one instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    Success {
        return_data: Vec<u8>,
        gas_used: Gas,
        contract_address: Option<Address>,
    },
    Reverted {
        return_data: Vec<u8>,
        gas_used: Gas,
    },
    OutOfGas {
        gas_used: Gas,
    },
    /// The sender could not cover the value
    TransferDenied {
        gas_used: Gas,
    },
    Fatal {
        cause: VmError,
        gas_used: Gas,
    },
}

impl TransitionOutcome {
    /// Map an interpreter error onto a failure outcome
    fn from_error(error: VmError, return_data: Vec<u8>, gas_used: Gas) -> Self {
        match error {
            VmError::ExecutionReverted => TransitionOutcome::Reverted { return_data, gas_used },
            VmError::OutOfGas { .. } => TransitionOutcome::OutOfGas { gas_used },
            VmError::InsufficientBalance { .. } => TransitionOutcome::TransferDenied { gas_used },
            cause => TransitionOutcome::Fatal { cause, gas_used },
        }
    }

    /// Gas charged for the attempt, reported on every path
    pub fn gas_used(&self) -> Gas {
        match self {
            TransitionOutcome::Success { gas_used, .. }
            | TransitionOutcome::Reverted { gas_used, .. }
            | TransitionOutcome::OutOfGas { gas_used }
            | TransitionOutcome::TransferDenied { gas_used }
            | TransitionOutcome::Fatal { gas_used, .. } => *gas_used,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TransitionOutcome::Success { .. })
    }

    /// Address of a contract deployed by a successful creation
    pub fn contract_address(&self) -> Option<Address> {
        match self {
            TransitionOutcome::Success { contract_address, .. } => *contract_address,
            _ => None,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            TransitionOutcome::Success { .. } => "success",
            TransitionOutcome::Reverted { .. } => "reverted",
            TransitionOutcome::OutOfGas { .. } => "out of gas",
            TransitionOutcome::TransferDenied { .. } => "transfer denied",
            TransitionOutcome::Fatal { .. } => "fatal",
        }
    }
}

/// Event produced by a successful transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionEvent {
    /// Log emitted by executed code
    Log { tx_hash: Hash, log: Log },
    /// A contract was deployed
    ContractCreated { address: Address, tx_hash: Hash },
}

/// Outcome plus the ordered events it produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub outcome: TransitionOutcome,
    pub events: Vec<TransitionEvent>,
}

impl Transition {
    fn failed(outcome: TransitionOutcome) -> Self {
        Self {
            outcome,
            events: Vec::new(),
        }
    }

    fn succeeded(outcome: TransitionOutcome, tx_hash: Hash, logs: Vec<Log>) -> Self {
        let mut events: Vec<TransitionEvent> = logs
            .into_iter()
            .map(|log| TransitionEvent::Log { tx_hash, log })
            .collect();
        if let Some(address) = outcome.contract_address() {
            events.push(TransitionEvent::ContractCreated { address, tx_hash });
        }
        Self { outcome, events }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    /// Logs carried by the events, in emission order
    pub fn logs(&self) -> Vec<Log> {
        self.events
            .iter()
            .filter_map(|event| match event {
                TransitionEvent::Log { log, .. } => Some(log.clone()),
                TransitionEvent::ContractCreated { .. } => None,
            })
            .collect()
    }
}

/// What the interpreter handed back
struct Invocation {
    output: Vec<u8>,
    address: Option<Address>,
    gas_remaining: Gas,
    error: Option<VmError>,
}

/// Applies instructions to the store through an interpreter
pub struct StateTransition<V: Vm = Interpreter> {
    params: VmParams,
    vm: V,
}

impl StateTransition<Interpreter> {
    /// Orchestrator backed by the bytecode interpreter
    pub fn new(params: VmParams) -> Self {
        let vm = Interpreter::new(params.clone());
        Self::with_vm(params, vm)
    }
}

impl<V: Vm> StateTransition<V> {
    pub fn with_vm(params: VmParams, vm: V) -> Self {
        Self { params, vm }
    }

    pub fn params(&self) -> &VmParams {
        &self.params
    }

    pub fn vm(&self) -> &V {
        &self.vm
    }

    /// Apply `instruction`, committing its effects only on success
    pub fn execute(&mut self, instruction: &Instruction, ambient: &mut AmbientContext<'_>) -> Transition {
        let mut accounting = GasAccounting::begin(&*ambient.gas_meter, instruction.gas_limit());
        let tx_hash = Hash::digest(ambient.tx_bytes);
        let mut view = StateView::new(ambient.state.clone()).tag_with(tx_hash);
        debug!(
            "Executing {} for tx {}: call gas {}, outer consumed {}",
            instruction.route(),
            tx_hash,
            accounting.call_gas(),
            accounting.outer_consumed()
        );

        let mut invocation = self.invoke(instruction, ambient.header, &mut view, &mut accounting);
        let reconciliation = match Self::reconcile(&mut invocation, &accounting) {
            Ok(reconciliation) => reconciliation,
            Err(outcome) => {
                info!("Transition {} {}: gas used {}", tx_hash, outcome.label(), outcome.gas_used());
                // Dropping the view discards its dirty set
                drop(view);
                return Transition::failed(outcome);
            }
        };

        if let Err(cause) = ambient.gas_meter.consume(reconciliation.consumed, "vm_execution") {
            return Transition::failed(TransitionOutcome::Fatal {
                cause,
                gas_used: reconciliation.total,
            });
        }
        let logs = match view.finalize(true) {
            Ok(logs) => logs,
            Err(cause) => {
                warn!("Failed to commit transition {}: {}", tx_hash, cause);
                return Transition::failed(TransitionOutcome::Fatal {
                    cause,
                    gas_used: reconciliation.total,
                });
            }
        };

        let outcome = TransitionOutcome::Success {
            return_data: invocation.output,
            gas_used: reconciliation.consumed,
            contract_address: invocation.address,
        };
        info!("Transition {} success: gas used {}", tx_hash, reconciliation.consumed);
        Transition::succeeded(outcome, tx_hash, logs)
    }

    /// Run `instruction` against `store` without committing anything.
    ///
    /// The outer meter is untracked and the interpreter gets the configured
    /// default gas limit regardless of the declared one.
    pub fn simulate(&mut self, instruction: &Instruction, header: &BlockHeader, store: &SharedStateDB) -> Transition {
        let outer = GasMeter::untracked();
        let mut accounting = GasAccounting::begin(&outer, self.params.default_gas_limit);
        let mut view = StateView::readonly(store.clone());

        let mut invocation = self.invoke(instruction, header, &mut view, &mut accounting);
        let reconciliation = match Self::reconcile(&mut invocation, &accounting) {
            Ok(reconciliation) => reconciliation,
            Err(outcome) => return Transition::failed(outcome),
        };

        let logs = view.logs();
        let outcome = TransitionOutcome::Success {
            return_data: invocation.output,
            gas_used: reconciliation.consumed,
            contract_address: invocation.address,
        };
        debug!("Simulated {}: gas used {}", instruction.route(), reconciliation.consumed);
        Transition::succeeded(outcome, view.tx_hash(), logs)
    }

    fn invoke(
        &mut self,
        instruction: &Instruction,
        header: &BlockHeader,
        view: &mut StateView,
        accounting: &mut GasAccounting,
    ) -> Invocation {
        // Accounts may have changed outside this view since it was derived
        view.resync_accounts();

        let call_gas = accounting.call_gas();
        let context = ExecutionContext::new(header, instruction.sender(), call_gas);
        let mut env = Environment {
            context: &context,
            state: view,
            accounting: accounting.inner_mut(),
        };

        match instruction {
            Instruction::Create {
                sender,
                value,
                init_code,
                ..
            } => {
                let out = self.vm.create(&mut env, *sender, init_code, call_gas, *value);
                debug!(
                    "Create: consumed {}, left over {}, error {:?}",
                    call_gas.saturating_sub(out.gas_remaining),
                    out.gas_remaining,
                    out.error
                );
                Invocation {
                    output: out.output,
                    address: out.address,
                    gas_remaining: out.gas_remaining,
                    error: out.error,
                }
            }
            Instruction::Invoke {
                sender,
                recipient,
                value,
                payload,
                ..
            } => {
                let out = self.vm.call(&mut env, *sender, *recipient, payload, call_gas, *value);
                if out.error == Some(VmError::ExecutionReverted) && out.output.len() > 4 {
                    warn!("Execution reverted: {}", String::from_utf8_lossy(&out.output[4..]));
                }
                debug!(
                    "Call {}: consumed {}, left over {}, error {:?}",
                    recipient,
                    call_gas.saturating_sub(out.gas_remaining),
                    out.gas_remaining,
                    out.error
                );
                Invocation {
                    output: out.output,
                    address: None,
                    gas_remaining: out.gas_remaining,
                    error: out.error,
                }
            }
        }
    }

    /// Fold the invocation into the outer figures, or classify its failure
    fn reconcile(
        invocation: &mut Invocation,
        accounting: &GasAccounting,
    ) -> Result<Reconciliation, TransitionOutcome> {
        let reconciliation = match accounting.reconcile(invocation.gas_remaining) {
            Ok(reconciliation) => reconciliation,
            Err(cause) => {
                warn!("Interpreter gas accounting violated: {}", cause);
                return Err(TransitionOutcome::Fatal {
                    cause,
                    gas_used: accounting.failure_total(accounting.call_gas()),
                });
            }
        };

        if let Some(error) = invocation.error.take() {
            let return_data = std::mem::take(&mut invocation.output);
            return Err(TransitionOutcome::from_error(error, return_data, reconciliation.total));
        }
        if reconciliation.exceeds_outer {
            return Err(TransitionOutcome::OutOfGas {
                gas_used: reconciliation.total,
            });
        }
        Ok(reconciliation)
    }
}
