//! Linear projection of the instant the fee limit runs out.

use cirrus_core::Timestamp;
use plan::Tariff;

/// Projects when the running instance count exhausts the remaining fee budget.
///
/// The projection assumes the instance count stays constant and is recomputed from
/// scratch whenever consumption, instances or the fee limit change.
#[derive(Debug, Clone, Copy)]
pub struct ShutdownPredictor<'a> {
    tariff: &'a Tariff,
    fee_limit: f64,
    fee_accrued: f64,
    /// Instance-minutes already rolled over this period by an earlier auto-shutdown.
    cumulative_uptime: i64,
}

impl<'a> ShutdownPredictor<'a> {
    /// Predictor over the current fee position.
    pub const fn new(
        tariff: &'a Tariff,
        fee_limit: f64,
        fee_accrued: f64,
        cumulative_uptime: i64,
    ) -> Self {
        Self { tariff, fee_limit, fee_accrued, cumulative_uptime }
    }

    /// Instance-minutes the period can still afford before accounting for `uptime_spent`.
    pub fn budget_minutes(&self, uptime_spent: i64) -> f64 {
        self.tariff.minutes_for_fee(self.fee_limit - self.fee_accrued)
            + self.tariff.server_free_minutes
            - self.cumulative_uptime as f64
            - uptime_spent as f64
    }

    /// `None` when nothing is running.
    pub fn predict(
        &self,
        reference: Timestamp,
        total_instances: u64,
        uptime_spent: i64,
    ) -> Option<Timestamp> {
        if total_instances == 0 {
            return None;
        }
        let per_instance = (self.budget_minutes(uptime_spent) / total_instances as f64).floor();
        Some(reference.plus_minutes((per_instance as i64).saturating_add(1)))
    }
}
