//! Trade ledger.
//!
//! Owns every [`Trade`] and drives the lifecycle state machine. Meeting
//! negotiation lives in [`crate::meetings`]; the ledger only records which
//! meeting slots a trade carries and when they occurred.

use crate::domain::{IdCounter, ItemId, MeetingId, Party, Trade, TradeId, TradeStatus};
use crate::error::TradeError;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TradeLedger {
    trades: BTreeMap<TradeId, Trade>,
    ids: IdCounter,
}

impl TradeLedger {
    pub fn new() -> Self {
        TradeLedger::default()
    }

    /// Files a new trade request in `NotStarted`, awaiting the responder.
    pub fn request_trade(
        &mut self,
        initiator: impl Into<String>,
        responder: impl Into<String>,
        initiator_gives: Option<ItemId>,
        responder_gives: ItemId,
        permanent: bool,
    ) -> TradeId {
        let id = TradeId(self.ids.next());
        let trade = Trade::new(id, initiator, responder, initiator_gives, responder_gives, permanent);
        info!(trade = %id, "trade requested: {}", trade.summary());
        self.trades.insert(id, trade);
        id
    }

    pub fn trade(&self, id: TradeId) -> Option<&Trade> {
        self.trades.get(&id)
    }

    pub(crate) fn trade_mut(&mut self, id: TradeId) -> Option<&mut Trade> {
        self.trades.get_mut(&id)
    }

    pub fn trades(&self) -> impl Iterator<Item = &Trade> {
        self.trades.values()
    }

    /// Trades involving `username`, newest first, optionally filtered by
    /// status.
    pub fn trades_of(&self, username: &str, status: Option<TradeStatus>) -> Vec<&Trade> {
        let mut out: Vec<&Trade> = self
            .trades
            .values()
            .filter(|t| t.involves(username))
            .filter(|t| status.is_none_or(|s| t.status() == s))
            .collect();
        out.reverse();
        out
    }

    fn checked(&mut self, id: TradeId) -> Result<&mut Trade, TradeError> {
        self.trades
            .get_mut(&id)
            .ok_or(TradeError::NotFound { trade: id })
    }

    fn answer(
        &mut self,
        id: TradeId,
        actor: &str,
        target: TradeStatus,
    ) -> Result<(), TradeError> {
        let trade = self.checked(id)?;
        if trade.party_of(actor) != Some(Party::Responder) {
            return Err(TradeError::NotResponder { trade: id });
        }
        if trade.status() != TradeStatus::NotStarted {
            return Err(TradeError::WrongState {
                trade: id,
                status: trade.status().to_string(),
                expected: TradeStatus::NotStarted.to_string(),
            });
        }
        trade.transition(target);
        info!(trade = %id, status = %target, "trade answered");
        Ok(())
    }

    /// Responder accepts; the trade moves to `Ongoing`.
    pub fn agree(&mut self, id: TradeId, actor: &str) -> Result<(), TradeError> {
        self.answer(id, actor, TradeStatus::Ongoing)
    }

    /// Responder declines; the trade moves to `Denied`.
    pub fn deny(&mut self, id: TradeId, actor: &str) -> Result<(), TradeError> {
        self.answer(id, actor, TradeStatus::Denied)
    }

    /// System cancellation after an edit-limit breach. Returns false if the
    /// trade was not ongoing.
    pub fn cancel(&mut self, id: TradeId) -> bool {
        let Some(trade) = self.trades.get_mut(&id) else {
            return false;
        };
        if trade.transition(TradeStatus::Cancelled) {
            info!(trade = %id, "trade cancelled");
            true
        } else {
            false
        }
    }

    pub fn attach_meeting(&mut self, id: TradeId, meeting: MeetingId) -> Result<(), TradeError> {
        let trade = self.checked(id)?;
        if trade.attach_meeting(meeting) {
            Ok(())
        } else {
            Err(TradeError::MeetingCapacity { trade: id })
        }
    }

    /// Marks the trade's current meeting slot occurred. When that was the
    /// last required meeting the trade completes and is stamped with the
    /// completion time; returns true exactly in that case.
    pub fn record_meeting_occurred(&mut self, id: TradeId) -> bool {
        let Some(trade) = self.trades.get_mut(&id) else {
            return false;
        };
        trade.mark_current_meeting_occurred();
        if trade.all_meetings_occurred() && trade.transition(TradeStatus::Completed) {
            trade.stamp_completed(Utc::now());
            info!(trade = %id, "trade completed");
            true
        } else {
            false
        }
    }

    /// Abandons every ongoing trade whose current meeting appears in
    /// `late_meetings`. Returns the usernames of every party involved, one
    /// entry per side per abandoned trade.
    pub fn abandon_late(&mut self, late_meetings: &[MeetingId]) -> Vec<String> {
        let mut penalized = Vec::new();
        for trade in self.trades.values_mut() {
            if trade.status() != TradeStatus::Ongoing {
                continue;
            }
            let Some(current) = trade.current_meeting() else {
                continue;
            };
            if late_meetings.contains(&current) && trade.transition(TradeStatus::Abandoned) {
                info!(trade = %trade.id(), meeting = %current, "trade abandoned, meeting overdue");
                penalized.push(trade.username(Party::Initiator).to_string());
                penalized.push(trade.username(Party::Responder).to_string());
            }
        }
        penalized
    }

    /// Deletes a trade outright. Used only when reverting a trade request
    /// that the responder never answered.
    pub(crate) fn remove(&mut self, id: TradeId) -> Option<Trade> {
        self.trades.remove(&id)
    }

    /// The `limit` most recently completed trades involving `username`,
    /// reduced to the items the counterpart lent them.
    pub fn recent_borrowed_items(&self, username: &str, limit: usize) -> Vec<ItemId> {
        let mut completed: Vec<&Trade> = self
            .trades
            .values()
            .filter(|t| t.status() == TradeStatus::Completed && t.involves(username))
            .collect();
        completed.sort_by_key(|t| std::cmp::Reverse(t.completed_at()));
        completed
            .iter()
            .filter_map(|t| {
                let party = t.party_of(username)?;
                t.item_given_by(party.other())
            })
            .take(limit)
            .collect()
    }

    /// Most frequent counterparts across `username`'s completed trades,
    /// ties broken alphabetically.
    pub fn top_partners(&self, username: &str, limit: usize) -> Vec<(String, u32)> {
        let mut counts: BTreeMap<&str, u32> = BTreeMap::new();
        for trade in self.trades.values() {
            if trade.status() != TradeStatus::Completed {
                continue;
            }
            if let Some(party) = trade.party_of(username) {
                *counts.entry(trade.username(party.other())).or_default() += 1;
            }
        }
        let mut ranked: Vec<(String, u32)> =
            counts.into_iter().map(|(u, n)| (u.to_string(), n)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(limit);
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger_with_ongoing() -> (TradeLedger, TradeId) {
        let mut ledger = TradeLedger::new();
        let id = ledger.request_trade("alice", "bob", Some(ItemId(10)), ItemId(20), true);
        ledger.agree(id, "bob").unwrap();
        (ledger, id)
    }

    #[test]
    fn test_only_responder_may_answer() {
        let mut ledger = TradeLedger::new();
        let id = ledger.request_trade("alice", "bob", None, ItemId(20), true);

        assert_eq!(
            ledger.agree(id, "alice"),
            Err(TradeError::NotResponder { trade: id })
        );
        assert_eq!(
            ledger.deny(id, "mallory"),
            Err(TradeError::NotResponder { trade: id })
        );
        assert!(ledger.agree(id, "bob").is_ok());
        assert_eq!(ledger.trade(id).unwrap().status(), TradeStatus::Ongoing);
    }

    #[test]
    fn test_double_agree_is_a_state_conflict() {
        let (mut ledger, id) = ledger_with_ongoing();
        let err = ledger.agree(id, "bob").unwrap_err();
        assert!(matches!(err, TradeError::WrongState { .. }));
    }

    #[test]
    fn test_unknown_trade() {
        let mut ledger = TradeLedger::new();
        assert_eq!(
            ledger.agree(TradeId(99), "bob"),
            Err(TradeError::NotFound {
                trade: TradeId(99)
            })
        );
    }

    #[test]
    fn test_permanent_trade_completes_after_one_meeting() {
        let (mut ledger, id) = ledger_with_ongoing();
        ledger.attach_meeting(id, MeetingId(1)).unwrap();
        assert!(ledger.record_meeting_occurred(id));
        let trade = ledger.trade(id).unwrap();
        assert_eq!(trade.status(), TradeStatus::Completed);
        assert!(trade.completed_at().is_some());
    }

    #[test]
    fn test_temporary_trade_needs_both_meetings() {
        let mut ledger = TradeLedger::new();
        let id = ledger.request_trade("alice", "bob", Some(ItemId(10)), ItemId(20), false);
        ledger.agree(id, "bob").unwrap();
        ledger.attach_meeting(id, MeetingId(1)).unwrap();
        assert!(!ledger.record_meeting_occurred(id));
        assert_eq!(ledger.trade(id).unwrap().status(), TradeStatus::Ongoing);
        ledger.attach_meeting(id, MeetingId(2)).unwrap();
        assert!(ledger.record_meeting_occurred(id));
        assert_eq!(ledger.trade(id).unwrap().status(), TradeStatus::Completed);
    }

    #[test]
    fn test_cancel_only_moves_ongoing_trades() {
        let mut ledger = TradeLedger::new();
        let unanswered = ledger.request_trade("alice", "bob", None, ItemId(20), true);
        assert!(!ledger.cancel(unanswered));
        assert_eq!(
            ledger.trade(unanswered).unwrap().status(),
            TradeStatus::NotStarted
        );

        let (mut ledger, id) = ledger_with_ongoing();
        assert!(ledger.cancel(id));
        assert_eq!(ledger.trade(id).unwrap().status(), TradeStatus::Cancelled);
        // already terminal, the second cancel is a no-op
        assert!(!ledger.cancel(id));
        assert!(!ledger.cancel(TradeId(99)));
    }

    #[test]
    fn test_abandon_late_collects_both_parties() {
        let (mut ledger, id) = ledger_with_ongoing();
        ledger.attach_meeting(id, MeetingId(1)).unwrap();

        let untouched = ledger.abandon_late(&[MeetingId(9)]);
        assert!(untouched.is_empty());

        let penalized = ledger.abandon_late(&[MeetingId(1)]);
        assert_eq!(penalized, vec!["alice".to_string(), "bob".to_string()]);
        assert_eq!(ledger.trade(id).unwrap().status(), TradeStatus::Abandoned);

        // already abandoned, nothing more to do
        assert!(ledger.abandon_late(&[MeetingId(1)]).is_empty());
    }

    #[test]
    fn test_top_partners_ranked_by_frequency() {
        let mut ledger = TradeLedger::new();
        for responder in ["bob", "bob", "carol"] {
            let id = ledger.request_trade("alice", responder, None, ItemId(20), true);
            ledger.agree(id, responder).unwrap();
            ledger.attach_meeting(id, MeetingId(id.0)).unwrap();
            ledger.record_meeting_occurred(id);
        }
        assert_eq!(
            ledger.top_partners("alice", 3),
            vec![("bob".to_string(), 2), ("carol".to_string(), 1)]
        );
    }

    #[test]
    fn test_recent_borrowed_items() {
        let mut ledger = TradeLedger::new();
        for item in [20, 21, 22, 23] {
            let id = ledger.request_trade("alice", "bob", None, ItemId(item), true);
            ledger.agree(id, "bob").unwrap();
            ledger.attach_meeting(id, MeetingId(id.0)).unwrap();
            ledger.record_meeting_occurred(id);
        }
        let recent = ledger.recent_borrowed_items("alice", 3);
        assert_eq!(recent.len(), 3);
        // bob lent nothing in these one-way trades seen from his side
        assert!(ledger.recent_borrowed_items("bob", 3).is_empty());
    }
}
