//! Deterministic billing and capacity accounting for a metered compute service.
//!
//! A [`RequestProcessor`] consumes an ordered log of [`cirrus_core::Request`]s and
//! returns one [`cirrus_core::Outcome`] per request. State is owned exclusively by
//! the processor; every handler is synchronous and order-dependent.
//!
//! Components, leaves first:
//! - [`InstanceLedger`] holds running instance batches keyed by launch time.
//! - [`UptimeAccountant`] sums instance-minutes, clamped at monthly resets.
//! - [`ShutdownPredictor`] projects when the fee budget runs out.
//! - [`RequestProcessor`] validates, mutates and reports.

#![deny(unsafe_code)]

pub mod forecast;
pub mod ledger;
pub mod processor;
pub mod uptime;

pub use forecast::ShutdownPredictor;
pub use ledger::InstanceLedger;
pub use processor::{BillingPeriod, Consumption, RequestProcessor};
pub use uptime::UptimeAccountant;
