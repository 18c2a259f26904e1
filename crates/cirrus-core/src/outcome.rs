//! Per-request results and their one-line rendering.

use crate::limits::LimitKind;
use crate::request::RequestKind;
use crate::time::Timestamp;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Why a request was refused. Every rejection leaves the account state untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    /// The projected shutdown has passed and the fee limit must be raised first.
    #[error("please increase usage fee limit")]
    OverrunGate,
    /// Committing would push a counter over its plan limit.
    #[error("{0}")]
    LimitExceeded(LimitKind),
    /// More bytes requested than are currently stored.
    #[error("no such files")]
    MissingResource,
    /// Stop named a batch that does not exist or is too small.
    #[error("please correctly specify the instances")]
    InvalidInstanceReference,
    /// Value outside its bounds or below current usage.
    #[error("invalid value")]
    InvalidValue,
    /// Limits can only be changed on the paid tier.
    #[error("free plan")]
    FreePlanRestriction,
}

/// Success payload of a handled request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Receipt {
    /// Counters after the upload.
    Upload { transfer: u64, storage: u64, shutdown: Option<Timestamp> },
    /// Transfer after the download.
    Download { transfer: u64, shutdown: Option<Timestamp> },
    /// Storage left after the delete.
    Delete { storage: u64, shutdown: Option<Timestamp> },
    /// `shutdown` is withheld when it falls in a later month than the request.
    Launch { instances: u64, shutdown: Option<Timestamp> },
    /// Instances left running.
    Stop { instances: u64, shutdown: Option<Timestamp> },
    /// `carried_until` is the end of the closed month when instances keep running past it.
    Calc { fee: f64, carried_until: Option<Timestamp> },
    /// Free to paid promotion.
    Upgrade { shutdown: Option<Timestamp> },
    /// Fee ceiling raised on an already-paid plan.
    CeilingRaised,
    /// Limit updated.
    Change { shutdown: Option<Timestamp> },
}

impl fmt::Display for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upload { transfer, storage, shutdown } => {
                write!(f, "{transfer} {storage} {}", Dash(*shutdown))
            }
            Self::Download { transfer, shutdown } => write!(f, "{transfer} {}", Dash(*shutdown)),
            Self::Delete { storage, shutdown } => write!(f, "{storage} {}", Dash(*shutdown)),
            Self::Launch { instances, shutdown } | Self::Stop { instances, shutdown } => {
                write!(f, "{instances} {}", Dash(*shutdown))
            }
            Self::Calc { fee, carried_until } => write!(f, "{fee:.0} {}", Dash(*carried_until)),
            Self::Upgrade { shutdown } | Self::Change { shutdown } => {
                write!(f, "{}", Dash(*shutdown))
            }
            Self::CeilingRaised => f.write_str("accepted"),
        }
    }
}

/// Renders a missing timestamp as `-`.
struct Dash(Option<Timestamp>);

impl fmt::Display for Dash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(t) => write!(f, "{t}"),
            None => f.write_str("-"),
        }
    }
}

/// Result of processing one request; displays as `TYPE: payload`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    /// Type of the request that produced this.
    pub kind: RequestKind,
    /// Receipt on success, the reason otherwise.
    pub result: Result<Receipt, Rejection>,
}

impl Outcome {
    /// Successful outcome.
    pub const fn accepted(kind: RequestKind, receipt: Receipt) -> Self {
        Self { kind, result: Ok(receipt) }
    }

    /// Refused outcome.
    pub const fn rejected(kind: RequestKind, rejection: Rejection) -> Self {
        Self { kind, result: Err(rejection) }
    }

    /// True unless rejected.
    pub const fn is_accepted(&self) -> bool {
        self.result.is_ok()
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.result {
            Ok(receipt) => write!(f, "{}: {receipt}", self.kind),
            Err(rejection) => write!(f, "{}: {rejection}", self.kind),
        }
    }
}
