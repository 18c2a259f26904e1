//! Typed request records and the line tokenizer that produces them.
//!
//! Line grammar (whitespace separated):
//!
//! ```text
//! UPLOAD   <date> <time> <size>
//! DOWNLOAD <date> <time> <size>
//! DELETE   <date> <time> <size>
//! LAUNCH   <date> <time> <instances>
//! STOP     <date> <time> <launch-date> <launch-time> <instances>
//! UPGRADE  <date> <time> <fee-ceiling>
//! CHANGE   <date> <time> <t|s|u> <value>
//! CALC
//! ```
//!
//! Tokens past the last field are ignored.

use crate::limits::LimitKind;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Request type tag, rendered upper-case in output lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestKind {
    /// File upload.
    Upload,
    /// File download.
    Download,
    /// File deletion.
    Delete,
    /// Instance launch.
    Launch,
    /// Instance stop.
    Stop,
    /// Period close.
    Calc,
    /// Plan upgrade.
    Upgrade,
    /// Limit change.
    Change,
}

impl RequestKind {
    /// Upper-case wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Upload => "UPLOAD",
            Self::Download => "DOWNLOAD",
            Self::Delete => "DELETE",
            Self::Launch => "LAUNCH",
            Self::Stop => "STOP",
            Self::Calc => "CALC",
            Self::Upgrade => "UPGRADE",
            Self::Change => "CHANGE",
        }
    }

    /// Upgrade and Change are the only ways out of the overrun gate, so they bypass it.
    pub const fn bypasses_overrun_gate(self) -> bool {
        matches!(self, Self::Upgrade | Self::Change)
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "UPLOAD" => Self::Upload,
            "DOWNLOAD" => Self::Download,
            "DELETE" => Self::Delete,
            "LAUNCH" => Self::Launch,
            "STOP" => Self::Stop,
            "CALC" => Self::Calc,
            "UPGRADE" => Self::Upgrade,
            "CHANGE" => Self::Change,
            other => return Err(ParseError::UnknownKind(other.to_string())),
        })
    }
}

/// One entry of the usage log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    /// Store `size` bytes; counts toward transfer and storage.
    Upload { at: Timestamp, size: u64 },
    /// Read back `size` bytes; counts toward transfer only.
    Download { at: Timestamp, size: u64 },
    /// Free `size` bytes of storage. `at` only advances the clock.
    Delete { at: Timestamp, size: u64 },
    /// Start a batch of `count` instances keyed by `at`.
    Launch { at: Timestamp, count: u32 },
    /// Stop `count` instances from the batch launched at `launched_at`.
    Stop { at: Timestamp, launched_at: Timestamp, count: u32 },
    /// Close the billing period.
    Calc,
    /// Promote to the paid tier, or raise the fee ceiling once paid.
    Upgrade { at: Timestamp, fee_ceiling: f64 },
    /// Set a new value for one limit.
    Change { at: Timestamp, kind: LimitKind, value: f64 },
}

impl Request {
    /// Type tag of this request.
    pub const fn kind(&self) -> RequestKind {
        match self {
            Self::Upload { .. } => RequestKind::Upload,
            Self::Download { .. } => RequestKind::Download,
            Self::Delete { .. } => RequestKind::Delete,
            Self::Launch { .. } => RequestKind::Launch,
            Self::Stop { .. } => RequestKind::Stop,
            Self::Calc => RequestKind::Calc,
            Self::Upgrade { .. } => RequestKind::Upgrade,
            Self::Change { .. } => RequestKind::Change,
        }
    }

    /// Time the request was sent; `None` only for [`Request::Calc`].
    pub const fn timestamp(&self) -> Option<Timestamp> {
        match self {
            Self::Upload { at, .. }
            | Self::Download { at, .. }
            | Self::Delete { at, .. }
            | Self::Launch { at, .. }
            | Self::Stop { at, .. }
            | Self::Upgrade { at, .. }
            | Self::Change { at, .. } => Some(*at),
            Self::Calc => None,
        }
    }

    /// Parse one request line.
    pub fn parse_line(line: &str) -> Result<Self, ParseError> {
        let mut tokens = Tokens { kind: RequestKind::Calc, inner: line.split_whitespace() };
        let kind: RequestKind = tokens.inner.next().ok_or(ParseError::Empty)?.parse()?;
        tokens.kind = kind;
        let req = match kind {
            RequestKind::Calc => Self::Calc,
            RequestKind::Upload => {
                Self::Upload { at: tokens.sent_at()?, size: tokens.number("size")? }
            }
            RequestKind::Download => {
                Self::Download { at: tokens.sent_at()?, size: tokens.number("size")? }
            }
            RequestKind::Delete => {
                Self::Delete { at: tokens.sent_at()?, size: tokens.number("size")? }
            }
            RequestKind::Launch => {
                Self::Launch { at: tokens.sent_at()?, count: tokens.number("instances")? }
            }
            RequestKind::Stop => Self::Stop {
                at: tokens.sent_at()?,
                launched_at: tokens.timestamp("launch date", "launch time")?,
                count: tokens.number("instances")?,
            },
            RequestKind::Upgrade => Self::Upgrade {
                at: tokens.sent_at()?,
                fee_ceiling: tokens.amount("fee ceiling")?,
            },
            RequestKind::Change => {
                let at = tokens.sent_at()?;
                let limit = tokens
                    .field("limit kind")?
                    .parse::<LimitKind>()
                    .map_err(|e| ParseError::UnknownLimitKind { kind, value: e.0 })?;
                Self::Change { at, kind: limit, value: tokens.amount("value")? }
            }
        };
        Ok(req)
    }
}

impl FromStr for Request {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_line(s)
    }
}

/// Why a request line could not be turned into a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Nothing but whitespace.
    #[error("empty request line")]
    Empty,
    /// First token is not a request type.
    #[error("unknown request type: {0}")]
    UnknownKind(String),
    /// Line ended before `field`.
    #[error("{kind}: missing {field}")]
    MissingField { kind: RequestKind, field: &'static str },
    /// `field` is not a valid number.
    #[error("{kind}: invalid {field}: {value}")]
    InvalidNumber { kind: RequestKind, field: &'static str, value: String },
    /// Date or time token does not parse.
    #[error("{kind}: invalid timestamp: {value}")]
    InvalidTimestamp { kind: RequestKind, value: String },
    /// Limit code other than t, s or u.
    #[error("{kind}: unknown limit kind: {value}")]
    UnknownLimitKind { kind: RequestKind, value: String },
}

struct Tokens<'a> {
    kind: RequestKind,
    inner: std::str::SplitWhitespace<'a>,
}

impl<'a> Tokens<'a> {
    fn field(&mut self, field: &'static str) -> Result<&'a str, ParseError> {
        self.inner.next().ok_or(ParseError::MissingField { kind: self.kind, field })
    }

    fn sent_at(&mut self) -> Result<Timestamp, ParseError> {
        self.timestamp("date", "time")
    }

    fn timestamp(
        &mut self,
        date_field: &'static str,
        time_field: &'static str,
    ) -> Result<Timestamp, ParseError> {
        let date = self.field(date_field)?;
        let time = self.field(time_field)?;
        Timestamp::parse(date, time).ok_or_else(|| ParseError::InvalidTimestamp {
            kind: self.kind,
            value: format!("{date} {time}"),
        })
    }

    fn number<N: FromStr>(&mut self, field: &'static str) -> Result<N, ParseError> {
        let raw = self.field(field)?;
        raw.parse().map_err(|_| ParseError::InvalidNumber {
            kind: self.kind,
            field,
            value: raw.to_string(),
        })
    }

    fn amount(&mut self, field: &'static str) -> Result<f64, ParseError> {
        let kind = self.kind;
        let value: f64 = self.number(field)?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(ParseError::InvalidNumber { kind, field, value: value.to_string() })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> Timestamp {
        Timestamp::from_ymd_hm(y, mo, d, h, mi).unwrap()
    }

    #[test]
    fn parses_every_request_shape() {
        let at = ts(2023, 1, 1, 10, 0);
        assert_eq!(
            Request::parse_line("UPLOAD 2023-01-01 10:00 500").unwrap(),
            Request::Upload { at, size: 500 }
        );
        assert_eq!(
            Request::parse_line("DOWNLOAD 2023-01-01 10:00 20").unwrap(),
            Request::Download { at, size: 20 }
        );
        assert_eq!(
            Request::parse_line("DELETE 2023-01-01 10:00 20").unwrap(),
            Request::Delete { at, size: 20 }
        );
        assert_eq!(
            Request::parse_line("LAUNCH 2023-01-01 10:00 5").unwrap(),
            Request::Launch { at, count: 5 }
        );
        assert_eq!(
            Request::parse_line("STOP 2023-01-01 10:00 2023-01-01 00:00 2").unwrap(),
            Request::Stop { at, launched_at: ts(2023, 1, 1, 0, 0), count: 2 }
        );
        assert_eq!(Request::parse_line("CALC").unwrap(), Request::Calc);
        assert_eq!(
            Request::parse_line("UPGRADE 2023-01-01 10:00 20000").unwrap(),
            Request::Upgrade { at, fee_ceiling: 20000.0 }
        );
        assert_eq!(
            Request::parse_line("CHANGE 2023-01-01 10:00 u 5000").unwrap(),
            Request::Change { at, kind: LimitKind::Fee, value: 5000.0 }
        );
    }

    #[test]
    fn tolerates_extra_whitespace() {
        let req = Request::parse_line("  LAUNCH   2023-01-01\t10:00  3 ").unwrap();
        assert_eq!(req.kind(), RequestKind::Launch);
        assert_eq!(req.timestamp(), Some(ts(2023, 1, 1, 10, 0)));
    }

    #[test]
    fn reports_malformed_lines() {
        assert_eq!(Request::parse_line("   "), Err(ParseError::Empty));
        assert_eq!(
            Request::parse_line("RESIZE 2023-01-01 10:00 1"),
            Err(ParseError::UnknownKind("RESIZE".into()))
        );
        assert_eq!(
            Request::parse_line("UPLOAD 2023-01-01 10:00"),
            Err(ParseError::MissingField { kind: RequestKind::Upload, field: "size" })
        );
        assert!(matches!(
            Request::parse_line("LAUNCH 2023-01-01 10:00 -3"),
            Err(ParseError::InvalidNumber { field: "instances", .. })
        ));
        assert!(matches!(
            Request::parse_line("STOP 2023-01-01 10:00 2023-02-30 00:00 1"),
            Err(ParseError::InvalidTimestamp { kind: RequestKind::Stop, .. })
        ));
        assert_eq!(
            Request::parse_line("CHANGE 2023-01-01 10:00 x 1"),
            Err(ParseError::UnknownLimitKind { kind: RequestKind::Change, value: "x".into() })
        );
        assert!(matches!(
            Request::parse_line("UPGRADE 2023-01-01 10:00 NaN"),
            Err(ParseError::InvalidNumber { field: "fee ceiling", .. })
        ));
    }

    #[test]
    fn only_upgrade_and_change_bypass_the_gate() {
        let bypass: Vec<_> = [
            RequestKind::Upload,
            RequestKind::Download,
            RequestKind::Delete,
            RequestKind::Launch,
            RequestKind::Stop,
            RequestKind::Calc,
            RequestKind::Upgrade,
            RequestKind::Change,
        ]
        .into_iter()
        .filter(|k| k.bypasses_overrun_gate())
        .collect();
        assert_eq!(bypass, vec![RequestKind::Upgrade, RequestKind::Change]);
    }
}
