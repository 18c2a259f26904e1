//! The stateful request processor.

use crate::forecast::ShutdownPredictor;
use crate::ledger::InstanceLedger;
use crate::uptime::UptimeAccountant;
use cirrus_core::{LimitKind, Outcome, Receipt, Rejection, Request, Timestamp};
use plan::{PlanConfig, PlanRegistry, Tariff, Upgrade};
use telemetry::OutcomeMetrics;
use tracing::{debug, info, instrument, warn};

/// Usage counters for the current billing period.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Consumption {
    /// Bytes uploaded plus downloaded this period.
    pub transfer: u64,
    /// Current storage footprint (not reset by a period close).
    pub storage: u64,
    /// Usage fee accrued this period.
    pub fee: f64,
}

impl Consumption {
    /// The counter a limit of `kind` is checked against.
    pub fn get(&self, kind: LimitKind) -> f64 {
        match kind {
            LimitKind::Transfer => self.transfer as f64,
            LimitKind::Storage => self.storage as f64,
            LimitKind::Fee => self.fee,
        }
    }
}

/// Clock and projection state scoped to one billing period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BillingPeriod {
    /// Time of the latest timestamped request, pushed one month ahead by a period close.
    pub current: Option<Timestamp>,
    /// Projected auto-shutdown; an active one at or before a request's time gates it.
    pub shutdown: Option<Timestamp>,
    /// Instance-minutes rolled over by auto-shutdowns since the last close.
    pub cumulative_uptime: i64,
    /// Highest storage footprint seen this period.
    pub peak_storage: u64,
}

/// Applies requests in order to one account and reports each result.
#[derive(Debug, Clone)]
pub struct RequestProcessor {
    plan: PlanRegistry,
    tariff: Tariff,
    consumption: Consumption,
    ledger: InstanceLedger,
    period: BillingPeriod,
    metrics: OutcomeMetrics,
}

impl RequestProcessor {
    /// Fresh account: free tier, zero consumption, nothing running.
    pub fn new(cfg: &PlanConfig) -> Self {
        Self {
            plan: PlanRegistry::new(cfg),
            tariff: cfg.tariff,
            consumption: Consumption::default(),
            ledger: InstanceLedger::new(),
            period: BillingPeriod::default(),
            metrics: OutcomeMetrics::new(),
        }
    }

    /// Record outcomes into a shared counter set.
    #[must_use]
    pub fn with_metrics(mut self, metrics: OutcomeMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Tier and limits.
    pub const fn plan(&self) -> &PlanRegistry {
        &self.plan
    }
    /// Prices in force.
    pub const fn tariff(&self) -> &Tariff {
        &self.tariff
    }
    /// Counters for the current period.
    pub const fn consumption(&self) -> &Consumption {
        &self.consumption
    }
    /// Running instance batches.
    pub const fn ledger(&self) -> &InstanceLedger {
        &self.ledger
    }
    /// Clock and projection.
    pub const fn period(&self) -> &BillingPeriod {
        &self.period
    }
    /// Outcome counters.
    pub const fn metrics(&self) -> &OutcomeMetrics {
        &self.metrics
    }

    /// Process a whole log, one outcome per request.
    pub fn run<'r, I>(&mut self, requests: I) -> Vec<Outcome>
    where
        I: IntoIterator<Item = &'r Request>,
    {
        requests.into_iter().map(|r| self.process(r)).collect()
    }

    /// Apply one request. A rejection leaves consumption, ledger, plan and
    /// projection untouched; only the clock follows the request's timestamp.
    #[instrument(level = "debug", skip_all, fields(kind = %req.kind()))]
    pub fn process(&mut self, req: &Request) -> Outcome {
        if let Some(at) = req.timestamp() {
            self.period.current = Some(at);
        }
        let result = self.check_overrun_gate(req).and_then(|()| self.dispatch(req));
        match &result {
            Ok(receipt) => debug!(%receipt, "committed"),
            Err(Rejection::OverrunGate) => {
                warn!(shutdown = ?self.period.shutdown, "blocked by usage fee overrun");
            }
            Err(rejection) => debug!(%rejection, "rejected"),
        }
        self.metrics.record(result.is_ok());
        Outcome { kind: req.kind(), result }
    }

    fn check_overrun_gate(&self, req: &Request) -> Result<(), Rejection> {
        match (self.period.shutdown, req.timestamp()) {
            (Some(shutdown), Some(at))
                if at >= shutdown && !req.kind().bypasses_overrun_gate() =>
            {
                Err(Rejection::OverrunGate)
            }
            _ => Ok(()),
        }
    }

    fn dispatch(&mut self, req: &Request) -> Result<Receipt, Rejection> {
        match *req {
            Request::Upload { at, size } => self.upload(at, size),
            Request::Download { at, size } => self.download(at, size),
            Request::Delete { size, .. } => self.delete(size),
            Request::Launch { at, count } => Ok(self.launch(at, count)),
            Request::Stop { at, launched_at, count } => self.stop(at, launched_at, count),
            Request::Calc => Ok(self.calc()),
            Request::Upgrade { at, fee_ceiling } => self.upgrade(at, fee_ceiling),
            Request::Change { at, kind, value } => self.change(at, kind, value),
        }
    }

    fn upload(&mut self, at: Timestamp, size: u64) -> Result<Receipt, Rejection> {
        let uptime_spent = self.uptime(Some(at));
        let transfer = self.consumption.transfer.saturating_add(size);
        let storage = self.consumption.storage.saturating_add(size);
        let fee = self.consumption.fee
            + self.tariff.transfer_fee(transfer)
            + self.tariff.storage_fee(storage);
        self.check_limits(transfer, storage, fee)?;

        self.consumption = Consumption { transfer, storage, fee };
        self.period.peak_storage = self.period.peak_storage.max(storage);
        let shutdown = self.reforecast(at, uptime_spent);
        Ok(Receipt::Upload { transfer, storage, shutdown })
    }

    fn download(&mut self, at: Timestamp, size: u64) -> Result<Receipt, Rejection> {
        let uptime_spent = self.uptime(Some(at));
        let transfer = self.consumption.transfer.saturating_add(size);
        let fee = self.consumption.fee + self.tariff.transfer_fee(transfer);
        // limit breaches take precedence over missing data
        self.check_limits(transfer, self.consumption.storage, fee)?;
        if size > self.consumption.storage {
            return Err(Rejection::MissingResource);
        }

        self.consumption.transfer = transfer;
        self.consumption.fee = fee;
        let shutdown = self.reforecast(at, uptime_spent);
        Ok(Receipt::Download { transfer, shutdown })
    }

    fn delete(&mut self, size: u64) -> Result<Receipt, Rejection> {
        if size > self.consumption.storage {
            return Err(Rejection::MissingResource);
        }
        self.consumption.storage -= size;
        Ok(Receipt::Delete { storage: self.consumption.storage, shutdown: self.period.shutdown })
    }

    fn launch(&mut self, at: Timestamp, count: u32) -> Receipt {
        let uptime_spent = self.uptime(Some(at));
        self.ledger.record_launch(at, count);
        let shutdown = self.reforecast(at, uptime_spent);
        // a shutdown in a later month is preempted by the period close
        Receipt::Launch {
            instances: self.ledger.total(),
            shutdown: shutdown.filter(|s| !at.precedes_month_of(s)),
        }
    }

    fn stop(
        &mut self,
        at: Timestamp,
        launched_at: Timestamp,
        count: u32,
    ) -> Result<Receipt, Rejection> {
        let uptime_spent = self.uptime(Some(at));
        self.ledger.stop(launched_at, count)?;
        let shutdown = self.reforecast(at, uptime_spent);
        Ok(Receipt::Stop { instances: self.ledger.total(), shutdown })
    }

    fn calc(&mut self) -> Receipt {
        let accrued = self.consumption.fee;
        let (fee, carried_until) = match (self.period.current, self.period.shutdown) {
            (Some(now), Some(shutdown)) if now.precedes_month_of(&shutdown) => {
                let end = now.end_of_month();
                (accrued + self.server_fee_until(end), Some(end))
            }
            (_, Some(shutdown)) => {
                let fee = accrued + self.server_fee_until(shutdown.minus_minutes(1));
                self.ledger.clear();
                (fee, None)
            }
            (_, None) => (accrued, None),
        };
        info!(fee, carried = carried_until.is_some(), "billing period closed");

        self.consumption.transfer = 0;
        self.consumption.fee = 0.0;
        self.period = BillingPeriod {
            current: self.period.current.map(|t| t.plus_months(1)),
            shutdown: None,
            cumulative_uptime: 0,
            peak_storage: self.consumption.storage,
        };
        Receipt::Calc { fee, carried_until }
    }

    fn upgrade(&mut self, at: Timestamp, fee_ceiling: f64) -> Result<Receipt, Rejection> {
        match self.plan.upgrade_to_paid(fee_ceiling)? {
            Upgrade::CeilingRaised => Ok(Receipt::CeilingRaised),
            Upgrade::Promoted => {
                info!(fee_ceiling, "promoted to paid plan");
                let uptime_spent = self.uptime(Some(at));
                let shutdown = self.reforecast(at, uptime_spent);
                Ok(Receipt::Upgrade { shutdown })
            }
        }
    }

    fn change(&mut self, at: Timestamp, kind: LimitKind, value: f64) -> Result<Receipt, Rejection> {
        if !self.plan.is_paid() {
            return Err(Rejection::FreePlanRestriction);
        }
        if !self.plan.within_bounds(kind, value) || value < self.consumption.get(kind) {
            return Err(Rejection::InvalidValue);
        }
        self.plan.set_limit(kind, value);

        match self.period.shutdown {
            Some(shutdown) if at < shutdown => {
                let uptime_spent = self.uptime(Some(at));
                self.reforecast(at, uptime_spent);
            }
            Some(shutdown) => {
                // servers already stopped at the projected instant
                self.period.cumulative_uptime += self.uptime(Some(shutdown));
                self.ledger.clear();
                self.period.shutdown = None;
            }
            None => {}
        }
        Ok(Receipt::Change { shutdown: self.period.shutdown })
    }

    fn check_limits(&self, transfer: u64, storage: u64, fee: f64) -> Result<(), Rejection> {
        let proposed = Consumption { transfer, storage, fee };
        match LimitKind::ALL.into_iter().find(|k| proposed.get(*k) > self.plan.limit(*k)) {
            Some(kind) => Err(Rejection::LimitExceeded(kind)),
            None => Ok(()),
        }
    }

    fn uptime(&self, at: Option<Timestamp>) -> i64 {
        UptimeAccountant::new(&self.ledger).compute_uptime(at)
    }

    /// Recompute and store the shutdown projection as of `at`.
    fn reforecast(&mut self, at: Timestamp, uptime_spent: i64) -> Option<Timestamp> {
        let predictor = ShutdownPredictor::new(
            &self.tariff,
            self.plan.limit(LimitKind::Fee),
            self.consumption.fee,
            self.period.cumulative_uptime,
        );
        self.period.shutdown = predictor.predict(at, self.ledger.total(), uptime_spent);
        self.period.shutdown
    }

    fn server_fee_until(&self, until: Timestamp) -> f64 {
        let minutes = self.period.cumulative_uptime + self.uptime(Some(until));
        self.tariff.server_fee(minutes as f64)
    }
}

impl Default for RequestProcessor {
    fn default() -> Self {
        Self::new(&PlanConfig::default())
    }
}
