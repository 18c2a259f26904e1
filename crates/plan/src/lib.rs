//! Subscription plan: tier, limits, bounds and the tariff that prices usage.
//!
//! A [`PlanRegistry`] is owned by exactly one simulation run. It starts on the free
//! tier with fixed limits; [`PlanRegistry::upgrade_to_paid`] moves it to the paid
//! defaults, after which only the fee limit's upper bound (the fee ceiling) may be
//! raised.

#![deny(unsafe_code)]

use cirrus_core::{LimitKind, LimitTable, Rejection};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading a plan configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    /// The document is not valid YAML for this shape.
    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// Parsed, but a value is out of range.
    #[error("invalid plan config: {0}")]
    Invalid(String),
}

/// Usage prices and free allowances.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tariff {
    /// Bytes of transfer per period charged nothing.
    pub transfer_free_tier: f64,
    /// Bytes of storage charged nothing.
    pub storage_free_tier: f64,
    /// Fee per byte of transfer beyond the free tier.
    pub transfer_rate: f64,
    /// Fee per byte of storage beyond the free tier.
    pub storage_rate: f64,
    /// Fee per instance-hour beyond the free server minutes.
    pub instance_hourly_fee: f64,
    /// Instance-minutes per period charged nothing.
    pub server_free_minutes: f64,
}

impl Default for Tariff {
    fn default() -> Self {
        Self {
            transfer_free_tier: 10_000_000_000.0,
            storage_free_tier: 20_000_000_000.0,
            transfer_rate: 1.0 / 100_000_000.0,
            storage_rate: 1.0 / 1_000_000_000.0,
            instance_hourly_fee: 100.0,
            server_free_minutes: 6000.0,
        }
    }
}

impl Tariff {
    /// Fee implied by a period transfer total; zero inside the free tier.
    pub fn transfer_fee(&self, transfer: u64) -> f64 {
        (self.transfer_rate * (transfer as f64 - self.transfer_free_tier)).max(0.0)
    }

    /// Fee implied by a storage footprint; zero inside the free tier.
    pub fn storage_fee(&self, storage: u64) -> f64 {
        (self.storage_rate * (storage as f64 - self.storage_free_tier)).max(0.0)
    }

    /// Instance fee for `uptime_minutes` of server time. Only whole hours past the
    /// free allowance are charged.
    pub fn server_fee(&self, uptime_minutes: f64) -> f64 {
        let billable = (uptime_minutes - self.server_free_minutes).max(0.0);
        self.instance_hourly_fee * (billable / 60.0).floor()
    }

    /// Instance-minutes that `fee` pays for.
    pub fn minutes_for_fee(&self, fee: f64) -> f64 {
        fee / self.instance_hourly_fee * 60.0
    }
}

/// Plan configuration; every field falls back to the built-in default when omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanConfig {
    /// Prices and free allowances.
    pub tariff: Tariff,
    /// Limits in force on the free tier.
    pub free_limits: LimitTable,
    /// Lowest value a limit may be changed to.
    pub min_bounds: LimitTable,
    /// Highest value a limit may be changed to; the fee entry becomes the fee ceiling once paid.
    pub max_bounds: LimitTable,
    /// Limits applied on promotion to the paid tier.
    pub paid_limits: LimitTable,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            tariff: Tariff::default(),
            free_limits: LimitTable::new(10_000_000_000.0, 20_000_000_000.0, 0.0),
            min_bounds: LimitTable::new(1.0, 1.0, 100.0),
            max_bounds: LimitTable::new(100_000_000_000_000.0, 100_000_000_000_000.0, 100.0),
            paid_limits: LimitTable::new(100_000_000_000.0, 100_000_000_000.0, 10_000.0),
        }
    }
}

impl PlanConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_yaml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a YAML file.
    pub fn from_yaml_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let s = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&s)
    }

    /// Reject negative or non-finite values, a zero hourly fee, and inverted bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.tariff;
        let scalars = [
            ("tariff.transfer_free_tier", t.transfer_free_tier),
            ("tariff.storage_free_tier", t.storage_free_tier),
            ("tariff.transfer_rate", t.transfer_rate),
            ("tariff.storage_rate", t.storage_rate),
            ("tariff.instance_hourly_fee", t.instance_hourly_fee),
            ("tariff.server_free_minutes", t.server_free_minutes),
        ];
        for (name, v) in scalars {
            if !v.is_finite() || v < 0.0 {
                return Err(ConfigError::Invalid(format!("{name} must be a non-negative number")));
            }
        }
        if t.instance_hourly_fee == 0.0 {
            return Err(ConfigError::Invalid("tariff.instance_hourly_fee must be positive".into()));
        }
        let tables = [
            ("free_limits", &self.free_limits),
            ("min_bounds", &self.min_bounds),
            ("max_bounds", &self.max_bounds),
            ("paid_limits", &self.paid_limits),
        ];
        for (name, table) in tables {
            for kind in LimitKind::ALL {
                let v = table.get(kind);
                if !v.is_finite() || v < 0.0 {
                    return Err(ConfigError::Invalid(format!(
                        "{name}.{kind:?} must be a non-negative number"
                    )));
                }
            }
        }
        for kind in LimitKind::ALL {
            if self.min_bounds.get(kind) > self.max_bounds.get(kind) {
                return Err(ConfigError::Invalid(format!("min bound above max bound for {kind:?}")));
            }
        }
        Ok(())
    }
}

/// Subscription tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Fixed limits, no fee allowance.
    Free,
    /// Paid defaults with adjustable limits.
    Paid,
}

/// What an accepted upgrade did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upgrade {
    /// Free tier promoted to paid defaults.
    Promoted,
    /// Already paid; only the fee ceiling moved.
    CeilingRaised,
}

/// Active tier, limits and bounds of one account.
#[derive(Debug, Clone)]
pub struct PlanRegistry {
    tier: Tier,
    limits: LimitTable,
    min_bounds: LimitTable,
    max_bounds: LimitTable,
    paid_limits: LimitTable,
}

impl PlanRegistry {
    /// Free-tier registry built from `cfg`.
    pub fn new(cfg: &PlanConfig) -> Self {
        Self {
            tier: Tier::Free,
            limits: cfg.free_limits,
            min_bounds: cfg.min_bounds,
            max_bounds: cfg.max_bounds,
            paid_limits: cfg.paid_limits,
        }
    }

    /// Active tier.
    pub const fn tier(&self) -> Tier {
        self.tier
    }

    /// Whether the plan has been promoted.
    pub fn is_paid(&self) -> bool {
        self.tier == Tier::Paid
    }

    /// Limit currently in force for `kind`.
    pub const fn limit(&self, kind: LimitKind) -> f64 {
        self.limits.get(kind)
    }

    /// Overwrite the limit for `kind`; callers check bounds first.
    pub fn set_limit(&mut self, kind: LimitKind, value: f64) {
        self.limits.set(kind, value);
    }

    /// All limits in force.
    pub const fn limits(&self) -> &LimitTable {
        &self.limits
    }

    /// Lowest value `kind` may be changed to.
    pub const fn min_bound(&self, kind: LimitKind) -> f64 {
        self.min_bounds.get(kind)
    }

    /// Highest value `kind` may be changed to.
    pub const fn max_bound(&self, kind: LimitKind) -> f64 {
        self.max_bounds.get(kind)
    }

    /// Upper bound on the fee limit.
    pub const fn fee_ceiling(&self) -> f64 {
        self.max_bounds.get(LimitKind::Fee)
    }

    /// Whether `value` lies within `[min_bound, max_bound]` for `kind`.
    pub fn within_bounds(&self, kind: LimitKind, value: f64) -> bool {
        (self.min_bound(kind)..=self.max_bound(kind)).contains(&value)
    }

    /// Promote to the paid tier with `fee_ceiling` as the fee limit's upper bound.
    /// On an already-paid plan this is a ceiling raise.
    pub fn upgrade_to_paid(&mut self, fee_ceiling: f64) -> Result<Upgrade, Rejection> {
        if self.is_paid() {
            return self.raise_fee_ceiling(fee_ceiling).map(|()| Upgrade::CeilingRaised);
        }
        self.limits = self.paid_limits;
        self.max_bounds.set(LimitKind::Fee, fee_ceiling);
        self.tier = Tier::Paid;
        Ok(Upgrade::Promoted)
    }

    /// Replace the fee ceiling. Paid tier only; the ceiling never moves down.
    pub fn raise_fee_ceiling(&mut self, fee_ceiling: f64) -> Result<(), Rejection> {
        if !self.is_paid() || fee_ceiling < self.fee_ceiling() {
            return Err(Rejection::InvalidValue);
        }
        self.max_bounds.set(LimitKind::Fee, fee_ceiling);
        Ok(())
    }
}

impl Default for PlanRegistry {
    fn default() -> Self {
        Self::new(&PlanConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_tier_defaults() {
        let p = PlanRegistry::default();
        assert_eq!(p.tier(), Tier::Free);
        assert!(!p.is_paid());
        assert_eq!(p.limit(LimitKind::Transfer), 1e10);
        assert_eq!(p.limit(LimitKind::Storage), 2e10);
        assert_eq!(p.limit(LimitKind::Fee), 0.0);
        assert_eq!(p.min_bound(LimitKind::Fee), 100.0);
        assert_eq!(p.max_bound(LimitKind::Fee), 100.0);
        assert_eq!(p.min_bound(LimitKind::Storage), 1.0);
        assert_eq!(p.max_bound(LimitKind::Transfer), 1e14);
    }

    #[test]
    fn promotion_applies_paid_defaults() {
        let mut p = PlanRegistry::default();
        assert_eq!(p.upgrade_to_paid(20_000.0), Ok(Upgrade::Promoted));
        assert!(p.is_paid());
        assert_eq!(p.limit(LimitKind::Transfer), 1e11);
        assert_eq!(p.limit(LimitKind::Storage), 1e11);
        assert_eq!(p.limit(LimitKind::Fee), 10_000.0);
        assert_eq!(p.fee_ceiling(), 20_000.0);
    }

    #[test]
    fn second_upgrade_only_raises_ceiling() {
        let mut p = PlanRegistry::default();
        p.upgrade_to_paid(20_000.0).unwrap();
        p.set_limit(LimitKind::Fee, 15_000.0);

        assert_eq!(p.upgrade_to_paid(19_999.0), Err(Rejection::InvalidValue));
        assert_eq!(p.fee_ceiling(), 20_000.0);

        assert_eq!(p.upgrade_to_paid(20_000.0), Ok(Upgrade::CeilingRaised));
        assert_eq!(p.upgrade_to_paid(30_000.0), Ok(Upgrade::CeilingRaised));
        assert_eq!(p.fee_ceiling(), 30_000.0);
        // limits are untouched by a ceiling raise
        assert_eq!(p.limit(LimitKind::Fee), 15_000.0);
    }

    #[test]
    fn ceiling_raise_requires_paid_tier() {
        let mut p = PlanRegistry::default();
        assert_eq!(p.raise_fee_ceiling(1_000.0), Err(Rejection::InvalidValue));
    }

    #[test]
    fn bounds_are_inclusive() {
        let mut p = PlanRegistry::default();
        p.upgrade_to_paid(500.0).unwrap();
        assert!(p.within_bounds(LimitKind::Fee, 100.0));
        assert!(p.within_bounds(LimitKind::Fee, 500.0));
        assert!(!p.within_bounds(LimitKind::Fee, 99.0));
        assert!(!p.within_bounds(LimitKind::Fee, 501.0));
        assert!(!p.within_bounds(LimitKind::Transfer, 0.0));
    }

    #[test]
    fn tariff_charges_only_the_excess() {
        let t = Tariff::default();
        assert_eq!(t.transfer_fee(5_000_000_000), 0.0);
        assert!((t.transfer_fee(20_000_000_000) - 100.0).abs() < 1e-9);
        assert_eq!(t.storage_fee(20_000_000_000), 0.0);
        assert!((t.storage_fee(21_000_000_000) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn server_fee_truncates_to_whole_hours() {
        let t = Tariff::default();
        assert_eq!(t.server_fee(5_999.0), 0.0);
        assert_eq!(t.server_fee(6_059.0), 0.0);
        assert_eq!(t.server_fee(6_060.0), 100.0);
        assert_eq!(t.server_fee(8_638.0), 4_300.0);
        assert_eq!(t.minutes_for_fee(10_000.0), 6_000.0);
    }
}
