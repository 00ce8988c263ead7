//! Threshold-violation scans.
//!
//! Read-only analytics over the ledger and directory. Each scan returns
//! username to overshoot magnitude; freezing anyone it names is a separate
//! administrator decision.

use crate::directory::AccountDirectory;
use crate::domain::{Party, GUEST_USERNAME};
use crate::ledger::TradeLedger;
use chrono::{DateTime, Datelike, Duration, Utc};
use std::collections::BTreeMap;

/// Weekly-transaction scans count against a Sunday-to-Sunday window fixed at
/// construction time; rebuild the enforcer to move the window.
#[derive(Debug, Clone)]
pub struct ThresholdEnforcer {
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
}

impl ThresholdEnforcer {
    /// Anchors the window at `now`: it opens at the previous Sunday at this
    /// time of day (or at `now` itself when `now` falls on a Sunday) and
    /// closes seven days later.
    pub fn new(now: DateTime<Utc>) -> Self {
        let since_sunday = i64::from(now.weekday().num_days_from_sunday());
        let window_start = now - Duration::days(since_sunday);
        ThresholdEnforcer {
            window_start,
            window_end: window_start + Duration::days(7),
        }
    }

    pub fn window(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.window_start, self.window_end)
    }

    /// Users with more incomplete trades (ongoing, abandoned or cancelled)
    /// than allowed, mapped to how far over the limit they sit.
    pub fn over_incomplete_limit(
        &self,
        ledger: &TradeLedger,
        max_incomplete: u32,
    ) -> BTreeMap<String, u32> {
        let mut counts: BTreeMap<String, u32> = BTreeMap::new();
        for trade in ledger.trades() {
            if !trade.status().is_incomplete() {
                continue;
            }
            for party in [Party::Initiator, Party::Responder] {
                *counts.entry(trade.username(party).to_string()).or_default() += 1;
            }
        }
        overshoots(counts, max_incomplete)
    }

    /// Users whose completed trades inside the window (strict lower bound,
    /// inclusive upper) exceed the weekly allowance.
    pub fn over_weekly_transactions(
        &self,
        ledger: &TradeLedger,
        max_weekly: u32,
    ) -> BTreeMap<String, u32> {
        let mut counts: BTreeMap<String, u32> = BTreeMap::new();
        for trade in ledger.trades() {
            let Some(completed_at) = trade.completed_at() else {
                continue;
            };
            if completed_at <= self.window_start || completed_at > self.window_end {
                continue;
            }
            for party in [Party::Initiator, Party::Responder] {
                *counts.entry(trade.username(party).to_string()).or_default() += 1;
            }
        }
        overshoots(counts, max_weekly)
    }

    /// Users who have borrowed too much relative to what they lend, mapped to
    /// the absolute lent/borrowed gap. The guest login is exempt.
    pub fn under_lend_borrow_minimum(
        &self,
        directory: &AccountDirectory,
        min_diff: i64,
    ) -> BTreeMap<String, u32> {
        directory
            .accounts()
            .filter(|a| a.username() != GUEST_USERNAME)
            .filter(|a| a.lend_borrow_diff() < min_diff)
            .map(|a| {
                (
                    a.username().to_string(),
                    a.lend_borrow_diff().unsigned_abs() as u32,
                )
            })
            .collect()
    }

    /// Currently frozen accounts. No threshold applies; magnitude is zero.
    pub fn frozen_users(&self, directory: &AccountDirectory) -> BTreeMap<String, u32> {
        directory
            .frozen_usernames()
            .into_iter()
            .map(|u| (u.to_string(), 0))
            .collect()
    }
}

fn overshoots(counts: BTreeMap<String, u32>, max: u32) -> BTreeMap<String, u32> {
    counts
        .into_iter()
        .filter(|(_, n)| *n > max)
        .map(|(u, n)| (u, n - max))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ItemId, MeetingId};
    use chrono::TimeZone;

    #[test]
    fn test_window_anchors_to_previous_sunday() {
        // 2026-09-02 is a Wednesday
        let wednesday = Utc.with_ymd_and_hms(2026, 9, 2, 12, 30, 0).unwrap();
        let enforcer = ThresholdEnforcer::new(wednesday);
        let (start, end) = enforcer.window();
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 8, 30, 12, 30, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 9, 6, 12, 30, 0).unwrap());
    }

    #[test]
    fn test_window_on_sunday_starts_that_instant() {
        // 2026-08-30 is a Sunday
        let sunday = Utc.with_ymd_and_hms(2026, 8, 30, 9, 0, 0).unwrap();
        let enforcer = ThresholdEnforcer::new(sunday);
        let (start, end) = enforcer.window();
        assert_eq!(start, sunday);
        assert_eq!(end, sunday + Duration::days(7));
    }

    #[test]
    fn test_over_incomplete_limit() {
        let mut ledger = TradeLedger::new();
        // three ongoing trades for alice, one each for bob/carol/dave
        for responder in ["bob", "carol", "dave"] {
            let id = ledger.request_trade("alice", responder, None, ItemId(20), true);
            ledger.agree(id, responder).unwrap();
        }
        let enforcer = ThresholdEnforcer::new(Utc::now());
        let over = enforcer.over_incomplete_limit(&ledger, 2);
        assert_eq!(over.get("alice"), Some(&1));
        assert!(!over.contains_key("bob"));
    }

    #[test]
    fn test_weekly_transactions_bounds() {
        // 2026-09-01 is a Tuesday; completions stamped explicitly so the
        // result does not depend on when the test runs
        let completed = Utc.with_ymd_and_hms(2026, 9, 1, 10, 0, 0).unwrap();
        let mut ledger = TradeLedger::new();
        for responder in ["bob", "carol"] {
            let id = ledger.request_trade("alice", responder, None, ItemId(20), true);
            ledger.agree(id, responder).unwrap();
            ledger.attach_meeting(id, MeetingId(id.0)).unwrap();
            ledger.record_meeting_occurred(id);
            ledger.trade_mut(id).unwrap().stamp_completed(completed);
        }
        let enforcer = ThresholdEnforcer::new(completed + Duration::days(1));

        let over = enforcer.over_weekly_transactions(&ledger, 1);
        assert_eq!(over.get("alice"), Some(&1));
        assert!(!over.contains_key("bob"));

        // completions before the window opened do not count
        let next_week = ThresholdEnforcer::new(completed + Duration::days(8));
        assert!(next_week.over_weekly_transactions(&ledger, 1).is_empty());
    }

    #[test]
    fn test_weekly_window_exact_boundaries() {
        fn complete_at(ledger: &mut TradeLedger, stamp: DateTime<Utc>) {
            let id = ledger.request_trade("alice", "bob", None, ItemId(20), true);
            ledger.agree(id, "bob").unwrap();
            ledger.attach_meeting(id, MeetingId(id.0)).unwrap();
            ledger.record_meeting_occurred(id);
            ledger.trade_mut(id).unwrap().stamp_completed(stamp);
        }

        let mut ledger = TradeLedger::new();
        let anchor = Utc.with_ymd_and_hms(2026, 8, 30, 9, 0, 0).unwrap(); // a Sunday
        let enforcer = ThresholdEnforcer::new(anchor);
        let (start, end) = enforcer.window();

        // strict lower bound: a completion exactly at window start is out
        complete_at(&mut ledger, start);
        assert!(enforcer.over_weekly_transactions(&ledger, 0).is_empty());

        // inclusive upper bound: exactly at window end is in
        complete_at(&mut ledger, end);
        let over = enforcer.over_weekly_transactions(&ledger, 0);
        assert_eq!(over.get("alice"), Some(&1));

        complete_at(&mut ledger, end + Duration::seconds(1));
        let over = enforcer.over_weekly_transactions(&ledger, 0);
        assert_eq!(over.get("alice"), Some(&1));
    }

    #[test]
    fn test_lend_borrow_scan_exempts_guest() {
        let mut directory = AccountDirectory::new();
        directory.register("alice", "pw");
        directory.register("bob", "pw");
        directory.account_mut("alice").unwrap().record_borrowed();
        directory.account_mut("alice").unwrap().record_borrowed();
        directory.account_mut("bob").unwrap().record_lent();

        let enforcer = ThresholdEnforcer::new(Utc::now());
        let under = enforcer.under_lend_borrow_minimum(&directory, 1);
        assert_eq!(under.get("alice"), Some(&2));
        assert!(!under.contains_key("bob"));
        assert!(!under.contains_key(GUEST_USERNAME));
    }
}
