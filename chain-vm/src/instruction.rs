//! Instructions admitted to the state-transition layer

use crate::VmResult;
use chain_core::{Address, Gas, Transaction, Wei};

/// A unit of work, fixed once admitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Deploy the code returned by running `init_code`
    Create {
        sender: Address,
        value: Wei,
        init_code: Vec<u8>,
        gas_limit: Gas,
    },
    /// Call `recipient`, moving `value` to it
    Invoke {
        sender: Address,
        recipient: Address,
        value: Wei,
        payload: Vec<u8>,
        gas_limit: Gas,
    },
}

impl Instruction {
    /// Route key of instructions handled by the state transition
    pub const ROUTE: &'static str = "vm";

    /// Build from a signed transaction; a missing recipient means creation
    pub fn from_transaction(tx: &Transaction) -> VmResult<Self> {
        let sender = tx.sender()?;
        Ok(match tx.to {
            None => Instruction::Create {
                sender,
                value: tx.value,
                init_code: tx.data.clone(),
                gas_limit: tx.gas_limit,
            },
            Some(recipient) => Instruction::Invoke {
                sender,
                recipient,
                value: tx.value,
                payload: tx.data.clone(),
                gas_limit: tx.gas_limit,
            },
        })
    }

    /// Route key of this instruction
    pub fn route(&self) -> &'static str {
        Self::ROUTE
    }

    pub fn sender(&self) -> Address {
        match self {
            Instruction::Create { sender, .. } | Instruction::Invoke { sender, .. } => *sender,
        }
    }

    /// Recipient, `None` for creation
    pub fn recipient(&self) -> Option<Address> {
        match self {
            Instruction::Create { .. } => None,
            Instruction::Invoke { recipient, .. } => Some(*recipient),
        }
    }

    pub fn value(&self) -> Wei {
        match self {
            Instruction::Create { value, .. } | Instruction::Invoke { value, .. } => *value,
        }
    }

    /// Declared gas limit
    pub fn gas_limit(&self) -> Gas {
        match self {
            Instruction::Create { gas_limit, .. } | Instruction::Invoke { gas_limit, .. } => *gas_limit,
        }
    }

    /// Init code or call payload
    pub fn payload(&self) -> &[u8] {
        match self {
            Instruction::Create { init_code, .. } => init_code,
            Instruction::Invoke { payload, .. } => payload,
        }
    }
}
