//! Instruction kind to handler dispatch

use crate::instruction::Instruction;
use crate::transition::{AmbientContext, Transition};
use crate::{VmError, VmResult};
use std::collections::BTreeMap;
use tracing::debug;

/// Handler applying one instruction within its ambient context
pub type Handler = Box<dyn FnMut(&mut AmbientContext<'_>, &Instruction) -> VmResult<Transition>>;

/// Dispatch table keyed by instruction kind
#[derive(Default)]
pub struct Router {
    routes: BTreeMap<String, Handler>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind`.
    ///
    /// Keys must be non-empty and alphanumeric; the wildcard `*` and
    /// duplicates are rejected.
    pub fn add_route(&mut self, kind: &str, handler: Handler) -> VmResult<&mut Self> {
        if kind.is_empty() || !kind.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(VmError::InvalidRoute(kind.to_string()));
        }
        if self.routes.contains_key(kind) {
            return Err(VmError::DuplicateRoute(kind.to_string()));
        }

        debug!("Registered route {}", kind);
        self.routes.insert(kind.to_string(), handler);
        Ok(self)
    }

    /// Handler registered for `kind`
    pub fn route(&mut self, kind: &str) -> Option<&mut Handler> {
        self.routes.get_mut(kind)
    }

    /// Whether a handler exists for `kind`
    pub fn has_route(&self, kind: &str) -> bool {
        self.routes.contains_key(kind)
    }

    /// Run the handler matching the instruction's kind
    pub fn dispatch(
        &mut self,
        ambient: &mut AmbientContext<'_>,
        instruction: &Instruction,
    ) -> VmResult<Transition> {
        let kind = instruction.route();
        let handler = self
            .route(kind)
            .ok_or_else(|| VmError::UnknownRoute(kind.to_string()))?;
        handler(ambient, instruction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gas::GasMeter;
    use crate::state::SharedStateDB;
    use crate::transition::TransitionOutcome;
    use chain_core::{Address, BlockHeader};

    fn noop() -> Handler {
        Box::new(|_: &mut AmbientContext<'_>, _: &Instruction| {
            Ok(Transition {
                outcome: TransitionOutcome::OutOfGas { gas_used: 1 },
                events: Vec::new(),
            })
        })
    }

    #[test]
    fn test_add_route_rejects_bad_keys() {
        let mut router = Router::new();
        assert!(matches!(router.add_route("*", noop()), Err(VmError::InvalidRoute(_))));
        assert!(matches!(router.add_route("", noop()), Err(VmError::InvalidRoute(_))));
        assert!(matches!(router.add_route("v m", noop()), Err(VmError::InvalidRoute(_))));

        router.add_route("vm", noop()).unwrap();
        assert!(matches!(router.add_route("vm", noop()), Err(VmError::DuplicateRoute(_))));
        assert!(router.has_route("vm"));
        assert!(router.route("bank").is_none());
    }

    #[test]
    fn test_chained_registration() {
        let mut router = Router::new();
        router
            .add_route("vm", noop())
            .unwrap()
            .add_route("bank2", noop())
            .unwrap();
        assert!(router.has_route("bank2"));
    }

    #[test]
    fn test_dispatch() {
        let instruction = Instruction::Invoke {
            sender: Address::new([1u8; 20]),
            recipient: Address::new([2u8; 20]),
            value: 0,
            payload: Vec::new(),
            gas_limit: 10,
        };
        let header = BlockHeader::genesis();
        let store = SharedStateDB::memory();
        let mut meter = GasMeter::new(10);
        let mut ambient = AmbientContext {
            gas_meter: &mut meter,
            header: &header,
            tx_bytes: &[],
            state: &store,
        };

        let mut router = Router::new();
        assert!(matches!(
            router.dispatch(&mut ambient, &instruction),
            Err(VmError::UnknownRoute(_))
        ));

        router.add_route(Instruction::ROUTE, noop()).unwrap();
        let transition = router.dispatch(&mut ambient, &instruction).unwrap();
        assert_eq!(transition.outcome.gas_used(), 1);
    }
}
