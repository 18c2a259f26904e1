//! Cirrus core primitives and shared types.

#![deny(unsafe_code)]

/// Version of the Cirrus core library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod outcome;
pub mod request;

pub use limits::{LimitKind, LimitTable, UnknownLimitKind};
pub use outcome::{Outcome, Receipt, Rejection};
pub use request::{ParseError, Request, RequestKind};
pub use time::Timestamp;

pub mod time {
    //! Minute-granularity timestamps with calendar-month arithmetic.

    use chrono::{Datelike, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};
    use serde::{Deserialize, Serialize};
    use std::fmt;

    /// Wall-clock instant without zone. All billing arithmetic is in whole minutes.
    #[derive(
        Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    )]
    #[serde(transparent)]
    pub struct Timestamp(NaiveDateTime);

    impl Timestamp {
        /// Build from calendar fields; `None` if the date or time does not exist.
        pub fn from_ymd_hm(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> Option<Self> {
            NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, 0).map(Self)
        }

        /// Parse a `YYYY-MM-DD` date token and an `HH:MM` (or `HH:MM:SS`) time token.
        pub fn parse(date: &str, time: &str) -> Option<Self> {
            let d = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
            let t = NaiveTime::parse_from_str(time, "%H:%M")
                .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M:%S"))
                .ok()?;
            Some(Self(d.and_time(t)))
        }

        /// Calendar year.
        pub fn year(&self) -> i32 {
            self.0.year()
        }
        /// Month, 1-based.
        pub fn month(&self) -> u32 {
            self.0.month()
        }
        /// Day of month, 1-based.
        pub fn day(&self) -> u32 {
            self.0.day()
        }
        /// Hour, 0-23.
        pub fn hour(&self) -> u32 {
            self.0.hour()
        }
        /// Minute, 0-59.
        pub fn minute(&self) -> u32 {
            self.0.minute()
        }

        /// Shift forward by `minutes` (negative shifts backward), saturating at the
        /// representable range.
        pub fn plus_minutes(&self, minutes: i64) -> Self {
            let shifted = TimeDelta::try_minutes(minutes).and_then(|d| self.0.checked_add_signed(d));
            match shifted {
                Some(t) => Self(t),
                None if minutes < 0 => Self(NaiveDateTime::MIN),
                None => Self(NaiveDateTime::MAX),
            }
        }

        /// Shift backward by `minutes`, saturating.
        pub fn minus_minutes(&self, minutes: i64) -> Self {
            self.plus_minutes(minutes.saturating_neg())
        }

        /// Add calendar months. The day is clamped to the target month's length.
        pub fn plus_months(&self, months: u32) -> Self {
            self.0.checked_add_months(Months::new(months)).map_or(*self, Self)
        }

        /// First instant (00:00) of this timestamp's month.
        pub fn start_of_month(&self) -> Self {
            let first = NaiveDate::from_ymd_opt(self.year(), self.month(), 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .expect("midnight on day 1 exists in every month");
            Self(first)
        }

        /// Last minute (23:59 on the final day) of this timestamp's month.
        pub fn end_of_month(&self) -> Self {
            self.start_of_month().plus_months(1).minus_minutes(1)
        }

        /// Whole minutes from `self` to `later`, truncated toward zero.
        pub fn minutes_until(&self, later: &Self) -> i64 {
            later.0.signed_duration_since(self.0).num_minutes()
        }

        /// True when this timestamp's calendar year/month is strictly before `other`'s.
        pub fn precedes_month_of(&self, other: &Self) -> bool {
            (self.year(), self.month()) < (other.year(), other.month())
        }
    }

    impl fmt::Display for Timestamp {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.0.format("%Y-%m-%d %H:%M"))
        }
    }

}

pub mod limits {
    //! Resource limit kinds and a fixed per-kind value table.

    use serde::{Deserialize, Serialize};
    use std::fmt;
    use std::str::FromStr;
    use thiserror::Error;

    /// The three limits a plan carries.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum LimitKind {
        /// Bytes moved this period (`t`).
        Transfer,
        /// Bytes currently stored (`s`).
        Storage,
        /// Usage fee accrued this period (`u`).
        Fee,
    }

    /// A limit code other than `t`, `s` or `u`.
    #[derive(Debug, Clone, PartialEq, Eq, Error)]
    #[error("unknown limit kind: {0}")]
    pub struct UnknownLimitKind(pub String);

    impl LimitKind {
        /// Breach checks run in this order.
        pub const ALL: [Self; 3] = [Self::Transfer, Self::Storage, Self::Fee];

        /// Single-character code used in request lines and rejection payloads.
        pub const fn abbreviation(self) -> char {
            match self {
                Self::Transfer => 't',
                Self::Storage => 's',
                Self::Fee => 'u',
            }
        }

        /// Inverse of [`LimitKind::abbreviation`].
        pub const fn from_abbreviation(c: char) -> Option<Self> {
            match c {
                't' => Some(Self::Transfer),
                's' => Some(Self::Storage),
                'u' => Some(Self::Fee),
                _ => None,
            }
        }
    }

    impl fmt::Display for LimitKind {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.abbreviation())
        }
    }

    impl FromStr for LimitKind {
        type Err = UnknownLimitKind;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            let mut chars = s.chars();
            match (chars.next().and_then(Self::from_abbreviation), chars.next()) {
                (Some(kind), None) => Ok(kind),
                _ => Err(UnknownLimitKind(s.to_string())),
            }
        }
    }

    /// One numeric value per [`LimitKind`].
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct LimitTable {
        /// Transfer entry.
        pub transfer: f64,
        /// Storage entry.
        pub storage: f64,
        /// Fee entry.
        pub fee: f64,
    }

    impl LimitTable {
        /// Table from its three entries.
        pub const fn new(transfer: f64, storage: f64, fee: f64) -> Self {
            Self { transfer, storage, fee }
        }

        /// Entry for `kind`.
        pub const fn get(&self, kind: LimitKind) -> f64 {
            match kind {
                LimitKind::Transfer => self.transfer,
                LimitKind::Storage => self.storage,
                LimitKind::Fee => self.fee,
            }
        }

        /// Overwrite the entry for `kind`.
        pub fn set(&mut self, kind: LimitKind, value: f64) {
            match kind {
                LimitKind::Transfer => self.transfer = value,
                LimitKind::Storage => self.storage = value,
                LimitKind::Fee => self.fee = value,
            }
        }
    }

}
