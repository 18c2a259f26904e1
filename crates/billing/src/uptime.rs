//! Instance-minute accounting with monthly billing resets.

use crate::ledger::InstanceLedger;
use cirrus_core::Timestamp;

/// Sums instance-minutes over every active batch up to a reference time.
///
/// A batch launched in an earlier calendar month than the reference only counts
/// from the first instant of the reference month: minutes from a closed period are
/// never billed twice.
#[derive(Debug, Clone, Copy)]
pub struct UptimeAccountant<'a> {
    ledger: &'a InstanceLedger,
}

impl<'a> UptimeAccountant<'a> {
    /// Accountant over `ledger`.
    pub const fn new(ledger: &'a InstanceLedger) -> Self {
        Self { ledger }
    }

    /// Instance-minutes consumed up to `reference`; zero without a reference or batches.
    pub fn compute_uptime(&self, reference: Option<Timestamp>) -> i64 {
        let Some(reference) = reference else {
            return 0;
        };
        self.ledger
            .iter()
            .map(|(launched, count)| {
                let start = if launched.precedes_month_of(&reference) {
                    reference.start_of_month()
                } else {
                    launched
                };
                start.minutes_until(&reference) * i64::from(count)
            })
            .sum()
    }
}
