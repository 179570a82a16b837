//! Gas metering and two-tier accounting

use crate::{VmError, VmResult};
use chain_core::Gas;
use std::collections::BTreeMap;

/// Limit a gas meter enforces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasLimit {
    /// Consumption beyond the limit fails
    Bounded(Gas),
    /// Consumption is recorded but never rejected
    Untracked,
}

/// Gas meter for tracking gas consumption
#[derive(Debug, Clone)]
pub struct GasMeter {
    /// Gas limit for the scope
    limit: GasLimit,
    /// Gas consumed so far
    consumed: Gas,
    /// Consumption by operation
    breakdown: BTreeMap<&'static str, Gas>,
}

impl GasMeter {
    /// Create a bounded gas meter
    pub fn new(limit: Gas) -> Self {
        Self::with_limit(GasLimit::Bounded(limit))
    }

    /// Create a meter that only records consumption
    pub fn untracked() -> Self {
        Self::with_limit(GasLimit::Untracked)
    }

    fn with_limit(limit: GasLimit) -> Self {
        Self {
            limit,
            consumed: 0,
            breakdown: BTreeMap::new(),
        }
    }

    /// Get gas limit
    pub fn limit(&self) -> GasLimit {
        self.limit
    }

    /// Get consumed gas
    pub fn consumed(&self) -> Gas {
        self.consumed
    }

    /// Remaining gas, `None` for an untracked meter
    pub fn remaining(&self) -> Option<Gas> {
        match self.limit {
            GasLimit::Bounded(limit) => Some(limit.saturating_sub(self.consumed)),
            GasLimit::Untracked => None,
        }
    }

    /// Whether this meter never rejects consumption
    pub fn is_untracked(&self) -> bool {
        self.limit == GasLimit::Untracked
    }

    /// Check if we have enough gas for an operation
    pub fn check_gas(&self, required: Gas) -> VmResult<()> {
        let total = self.consumed.checked_add(required);
        match (self.limit, total) {
            (GasLimit::Untracked, Some(_)) => Ok(()),
            (GasLimit::Bounded(limit), Some(total)) if total <= limit => Ok(()),
            _ => Err(VmError::OutOfGas {
                required,
                available: self.remaining().unwrap_or(Gas::MAX - self.consumed),
            }),
        }
    }

    /// Consume gas for an operation
    pub fn consume(&mut self, amount: Gas, operation: &'static str) -> VmResult<()> {
        self.check_gas(amount)?;
        self.consumed += amount;
        *self.breakdown.entry(operation).or_insert(0) += amount;
        Ok(())
    }

    /// Record consumption without checking the limit
    pub fn record(&mut self, amount: Gas, operation: &'static str) {
        self.consumed = self.consumed.saturating_add(amount);
        let entry = self.breakdown.entry(operation).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    /// Burn whatever is left of a bounded meter
    pub fn consume_all(&mut self, operation: &'static str) {
        if let Some(left) = self.remaining() {
            self.consumed += left;
            *self.breakdown.entry(operation).or_insert(0) += left;
        }
    }

    /// Return gas previously consumed under `operation`
    pub fn refund(&mut self, amount: Gas, operation: &'static str) {
        self.consumed = self.consumed.saturating_sub(amount);
        if let Some(current) = self.breakdown.get_mut(operation) {
            *current = current.saturating_sub(amount);
        }
    }

    /// Get gas consumption breakdown
    pub fn breakdown(&self) -> &BTreeMap<&'static str, Gas> {
        &self.breakdown
    }
}

/// Gas bookkeeping of one transition across the outer and inner boundary
///
/// The outer figures are captured from the ambient meter before execution;
/// the inner meter is untracked and receives every charge the interpreter makes.
#[derive(Debug, Clone)]
pub struct GasAccounting {
    outer_limit: GasLimit,
    outer_consumed: Gas,
    call_gas: Gas,
    inner: GasMeter,
}

/// Result of folding inner consumption back into the outer figures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciliation {
    /// Gas consumed by the interpreter invocation
    pub consumed: Gas,
    /// Outer consumption including this invocation
    pub total: Gas,
    /// Whether `total` is beyond the outer limit
    pub exceeds_outer: bool,
}

impl GasAccounting {
    /// Capture the outer meter and derive the gas handed to the interpreter.
    ///
    /// `ceiling` caps the call gas; for an untracked outer meter it is the call gas.
    pub fn begin(outer: &GasMeter, ceiling: Gas) -> Self {
        let call_gas = match outer.remaining() {
            Some(available) => ceiling.min(available),
            None => ceiling,
        };

        Self {
            outer_limit: outer.limit(),
            outer_consumed: outer.consumed(),
            call_gas,
            inner: GasMeter::untracked(),
        }
    }

    /// Gas the interpreter invocation may use
    pub fn call_gas(&self) -> Gas {
        self.call_gas
    }

    /// Outer consumption captured before execution
    pub fn outer_consumed(&self) -> Gas {
        self.outer_consumed
    }

    /// Inner accounting meter
    pub fn inner(&self) -> &GasMeter {
        &self.inner
    }

    /// Inner accounting meter, for the interpreter to charge
    pub fn inner_mut(&mut self) -> &mut GasMeter {
        &mut self.inner
    }

    /// Outer consumption to report when nothing was reconciled
    pub fn failure_total(&self, consumed: Gas) -> Gas {
        self.outer_consumed.saturating_add(consumed)
    }

    /// Fold the interpreter's leftover gas into the outer figures.
    ///
    /// The inner meter must hold exactly what the interpreter consumed.
    pub fn reconcile(&self, gas_remaining: Gas) -> VmResult<Reconciliation> {
        if gas_remaining > self.call_gas {
            return Err(VmError::GasAccounting {
                remaining: gas_remaining,
                limit: self.call_gas,
            });
        }

        let consumed = self.call_gas - gas_remaining;
        debug_assert_eq!(
            self.inner.consumed(),
            consumed,
            "inner meter out of step with the interpreter's leftover gas"
        );
        let total = self.outer_consumed.saturating_add(consumed);
        let exceeds_outer = match self.outer_limit {
            GasLimit::Bounded(limit) => total > limit,
            GasLimit::Untracked => false,
        };

        Ok(Reconciliation {
            consumed,
            total,
            exceeds_outer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gas_meter_basic() {
        let mut meter = GasMeter::new(100_000);

        assert_eq!(meter.remaining(), Some(100_000));
        assert_eq!(meter.consumed(), 0);

        meter.consume(1000, "test").unwrap();
        assert_eq!(meter.consumed(), 1000);
        assert_eq!(meter.remaining(), Some(99_000));
    }

    #[test]
    fn test_gas_meter_out_of_gas() {
        let mut meter = GasMeter::new(1000);

        let result = meter.consume(2000, "test");
        match result.unwrap_err() {
            VmError::OutOfGas { required, available } => {
                assert_eq!(required, 2000);
                assert_eq!(available, 1000);
            }
            other => panic!("Expected OutOfGas error, got {other:?}"),
        }
        // A rejected charge leaves the meter untouched
        assert_eq!(meter.consumed(), 0);
    }

    #[test]
    fn test_untracked_meter_records_without_limit() {
        let mut meter = GasMeter::untracked();
        assert!(meter.is_untracked());
        assert_eq!(meter.remaining(), None);

        meter.consume(u64::MAX / 2, "big").unwrap();
        meter.consume(10, "small").unwrap();
        assert_eq!(meter.consumed(), u64::MAX / 2 + 10);
        assert_eq!(meter.breakdown()["small"], 10);

        // Overflow is still rejected
        assert!(meter.consume(u64::MAX, "overflow").is_err());
    }

    #[test]
    fn test_consume_all_and_refund() {
        let mut meter = GasMeter::new(500);
        meter.consume(100, "call").unwrap();
        meter.refund(40, "call");
        assert_eq!(meter.consumed(), 60);
        assert_eq!(meter.breakdown()["call"], 60);

        meter.consume_all("exhausted");
        assert_eq!(meter.consumed(), 500);
        assert_eq!(meter.remaining(), Some(0));
    }

    #[test]
    fn test_record_ignores_limit() {
        let mut meter = GasMeter::new(10);
        meter.record(25, "mirror");
        assert_eq!(meter.consumed(), 25);
        assert_eq!(meter.remaining(), Some(0));
        meter.record(u64::MAX, "mirror");
        assert_eq!(meter.consumed(), u64::MAX);
    }

    #[test]
    fn test_accounting_bounded_by_outer_remaining() {
        let mut outer = GasMeter::new(50_000);
        outer.consume(20_000, "ante").unwrap();

        // Declared limit larger than what is left: the outer budget wins
        let accounting = GasAccounting::begin(&outer, 1_000_000);
        assert_eq!(accounting.call_gas(), 30_000);
        assert_eq!(accounting.outer_consumed(), 20_000);

        // Declared limit smaller: it is the ceiling
        let accounting = GasAccounting::begin(&outer, 10_000);
        assert_eq!(accounting.call_gas(), 10_000);
    }

    #[test]
    fn test_reconcile() {
        let mut outer = GasMeter::new(50_000);
        outer.consume(20_000, "ante").unwrap();
        let mut accounting = GasAccounting::begin(&outer, 1_000_000);

        accounting.inner_mut().record(5_000, "call");
        let rec = accounting.reconcile(25_000).unwrap();
        assert_eq!(rec.consumed, 5_000);
        assert_eq!(rec.total, 25_000);
        assert!(!rec.exceeds_outer);

        accounting.inner_mut().record(25_000, "exhausted");
        let rec = accounting.reconcile(0).unwrap();
        assert_eq!(rec.total, 50_000);
        assert!(!rec.exceeds_outer);

        assert!(matches!(
            accounting.reconcile(30_001),
            Err(VmError::GasAccounting { .. })
        ));
    }

    #[test]
    fn test_untracked_outer_uses_ceiling() {
        let mut accounting = GasAccounting::begin(&GasMeter::untracked(), 7_000);
        assert_eq!(accounting.call_gas(), 7_000);
        assert!(accounting.inner().is_untracked());
        accounting.inner_mut().record(7_000, "exhausted");
        assert!(!accounting.reconcile(0).unwrap().exceeds_outer);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "inner meter out of step")]
    fn test_reconcile_rejects_unmirrored_consumption() {
        let mut accounting = GasAccounting::begin(&GasMeter::new(50_000), 10_000);
        accounting.inner_mut().record(100, "call");
        // 4_000 consumed according to the leftover, 100 according to the inner meter
        let _ = accounting.reconcile(6_000);
    }
}
