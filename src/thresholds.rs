//! Admin-tunable abuse thresholds.
//!
//! Five integers govern the violation scans and the meeting protocol. They
//! are mutated only through [`Thresholds::set`] keyed by [`ThresholdKind`];
//! no other configuration surface exists.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for one of the five tunable thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThresholdKind {
    MaxIncompleteTrades,
    MaxWeeklyTransactions,
    MinLendBorrowDiff,
    MaxMeetingEdits,
    MaxMeetingLateDays,
}

impl ThresholdKind {
    pub const ALL: [ThresholdKind; 5] = [
        ThresholdKind::MaxIncompleteTrades,
        ThresholdKind::MaxWeeklyTransactions,
        ThresholdKind::MinLendBorrowDiff,
        ThresholdKind::MaxMeetingEdits,
        ThresholdKind::MaxMeetingLateDays,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ThresholdKind::MaxIncompleteTrades => "max_incomplete_trades",
            ThresholdKind::MaxWeeklyTransactions => "max_weekly_transactions",
            ThresholdKind::MinLendBorrowDiff => "min_lend_borrow_diff",
            ThresholdKind::MaxMeetingEdits => "max_meeting_edits",
            ThresholdKind::MaxMeetingLateDays => "max_meeting_late_days",
        }
    }
}

impl fmt::Display for ThresholdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for ThresholdKind {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "max_incomplete_trades" => Ok(ThresholdKind::MaxIncompleteTrades),
            "max_weekly_transactions" => Ok(ThresholdKind::MaxWeeklyTransactions),
            "min_lend_borrow_diff" => Ok(ThresholdKind::MinLendBorrowDiff),
            "max_meeting_edits" => Ok(ThresholdKind::MaxMeetingEdits),
            "max_meeting_late_days" => Ok(ThresholdKind::MaxMeetingLateDays),
            _ => Err(format!("Unknown threshold kind: {}", s)),
        }
    }
}

/// The full threshold set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Incomplete (ongoing, abandoned or cancelled) trades a user may carry.
    #[serde(default = "default_max_incomplete_trades")]
    pub max_incomplete_trades: u32,
    /// Completed trades a user may log in one Sunday-to-Sunday window.
    #[serde(default = "default_max_weekly_transactions")]
    pub max_weekly_transactions: u32,
    /// A user must lend at least this many items more than they borrow.
    #[serde(default = "default_min_lend_borrow_diff")]
    pub min_lend_borrow_diff: i64,
    /// Meeting edits a single side may make before the trade is cancelled.
    #[serde(default = "default_max_meeting_edits")]
    pub max_meeting_edits: u32,
    /// Days after the proposed time before an unconfirmed meeting counts as
    /// late and abandons its trade.
    #[serde(default = "default_max_meeting_late_days")]
    pub max_meeting_late_days: i64,
}

fn default_max_incomplete_trades() -> u32 {
    3
}

fn default_max_weekly_transactions() -> u32 {
    3
}

fn default_min_lend_borrow_diff() -> i64 {
    1
}

fn default_max_meeting_edits() -> u32 {
    3
}

fn default_max_meeting_late_days() -> i64 {
    7
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            max_incomplete_trades: default_max_incomplete_trades(),
            max_weekly_transactions: default_max_weekly_transactions(),
            min_lend_borrow_diff: default_min_lend_borrow_diff(),
            max_meeting_edits: default_max_meeting_edits(),
            max_meeting_late_days: default_max_meeting_late_days(),
        }
    }
}

impl Thresholds {
    pub fn get(&self, kind: ThresholdKind) -> i64 {
        match kind {
            ThresholdKind::MaxIncompleteTrades => i64::from(self.max_incomplete_trades),
            ThresholdKind::MaxWeeklyTransactions => i64::from(self.max_weekly_transactions),
            ThresholdKind::MinLendBorrowDiff => self.min_lend_borrow_diff,
            ThresholdKind::MaxMeetingEdits => i64::from(self.max_meeting_edits),
            ThresholdKind::MaxMeetingLateDays => self.max_meeting_late_days,
        }
    }

    pub fn set(&mut self, kind: ThresholdKind, value: i64) {
        match kind {
            ThresholdKind::MaxIncompleteTrades => {
                self.max_incomplete_trades = value.max(0) as u32;
            }
            ThresholdKind::MaxWeeklyTransactions => {
                self.max_weekly_transactions = value.max(0) as u32;
            }
            ThresholdKind::MinLendBorrowDiff => self.min_lend_borrow_diff = value,
            ThresholdKind::MaxMeetingEdits => self.max_meeting_edits = value.max(0) as u32,
            ThresholdKind::MaxMeetingLateDays => self.max_meeting_late_days = value.max(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let t = Thresholds::default();
        assert_eq!(t.max_incomplete_trades, 3);
        assert_eq!(t.max_weekly_transactions, 3);
        assert_eq!(t.min_lend_borrow_diff, 1);
        assert_eq!(t.max_meeting_edits, 3);
        assert_eq!(t.max_meeting_late_days, 7);
    }

    #[test]
    fn test_get_set_roundtrip() {
        let mut t = Thresholds::default();
        for kind in ThresholdKind::ALL {
            t.set(kind, 9);
            assert_eq!(t.get(kind), 9, "{kind}");
        }
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!(
            ThresholdKind::try_from("max_meeting_edits").unwrap(),
            ThresholdKind::MaxMeetingEdits
        );
        assert!(ThresholdKind::try_from("max_whatever").is_err());
    }
}
