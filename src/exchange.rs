//! The exchange facade.
//!
//! Single entry point for users and administrators. Owns every aggregate,
//! files a reverter for each undoable mutation, and applies the cross-cutting
//! consequences (ownership bookkeeping, credit, cancellations, abandonment)
//! that no single aggregate can see on its own.

use crate::directory::{AccountDirectory, ItemRequest, Report};
use crate::domain::{
    Account, ItemId, MeetingId, Party, ReverterId, TradeId, TradeStatus,
    ABANDONMENT_CREDIT_PENALTY, OCCURRENCE_CREDIT_BONUS,
};
use crate::enforcer::ThresholdEnforcer;
use crate::error::{MeetingError, Result, SwapError, TradeError};
use crate::ledger::TradeLedger;
use crate::meetings::MeetingCoordinator;
use crate::reverter::{RevertCtx, RevertOutcome, Reverter, ReverterLog};
use crate::thresholds::{ThresholdKind, Thresholds};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Exchange {
    directory: AccountDirectory,
    ledger: TradeLedger,
    meetings: MeetingCoordinator,
    thresholds: Thresholds,
    log: ReverterLog,
}

impl Exchange {
    pub fn new() -> Self {
        Exchange::with_thresholds(Thresholds::default())
    }

    pub fn with_thresholds(thresholds: Thresholds) -> Self {
        Exchange {
            directory: AccountDirectory::new(),
            ledger: TradeLedger::new(),
            meetings: MeetingCoordinator::new(),
            thresholds,
            log: ReverterLog::new(),
        }
    }

    // --- snapshot ---

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(snapshot: &str) -> Result<Self> {
        Ok(serde_json::from_str(snapshot)?)
    }

    // --- read access ---

    pub fn directory(&self) -> &AccountDirectory {
        &self.directory
    }

    pub fn ledger(&self) -> &TradeLedger {
        &self.ledger
    }

    pub fn meetings(&self) -> &MeetingCoordinator {
        &self.meetings
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn reverter_log(&self) -> &ReverterLog {
        &self.log
    }

    // --- accounts ---

    pub fn register(&mut self, username: &str, password: &str) -> bool {
        self.directory.register(username, password)
    }

    pub fn authenticate(&self, username: &str, password: &str) -> bool {
        self.directory
            .account(username)
            .is_some_and(|a| a.password() == password)
    }

    fn require_account(&self, username: &str) -> Result<()> {
        if self.directory.contains(username) {
            Ok(())
        } else {
            Err(SwapError::NotFound(format!("no account named {username}")))
        }
    }

    fn account_mut(&mut self, username: &str) -> Result<&mut Account> {
        self.directory
            .account_mut(username)
            .ok_or_else(|| SwapError::NotFound(format!("no account named {username}")))
    }

    pub fn set_password(&mut self, username: &str, new: &str) -> Result<ReverterId> {
        let account = self.account_mut(username)?;
        let old = account.password().to_string();
        account.set_password(new);
        Ok(self.log.file(Reverter::SetPassword {
            username: username.to_string(),
            old,
            new: new.to_string(),
        }))
    }

    pub fn set_city(&mut self, username: &str, city: &str) -> Result<ReverterId> {
        let account = self.account_mut(username)?;
        let old = account.city().to_string();
        account.set_city(city);
        Ok(self.log.file(Reverter::SetCity {
            username: username.to_string(),
            old,
            new: city.to_string(),
        }))
    }

    pub fn block_user(&mut self, username: &str, blocked: &str) -> Result<ReverterId> {
        self.require_account(blocked)?;
        if username == blocked {
            return Err(SwapError::Validation("cannot block yourself".into()));
        }
        let account = self.account_mut(username)?;
        if account.has_blocked(blocked) {
            return Err(SwapError::StateConflict(format!(
                "{blocked} is already blocked"
            )));
        }
        account.add_to_blocklist(blocked);
        Ok(self.log.file(Reverter::AddToBlockList {
            username: username.to_string(),
            blocked: blocked.to_string(),
        }))
    }

    pub fn unblock_user(&mut self, username: &str, blocked: &str) -> Result<ReverterId> {
        let account = self.account_mut(username)?;
        if !account.remove_from_blocklist(blocked) {
            return Err(SwapError::StateConflict(format!(
                "{blocked} is not blocked"
            )));
        }
        Ok(self.log.file(Reverter::RemoveFromBlockList {
            username: username.to_string(),
            blocked: blocked.to_string(),
        }))
    }

    pub fn switch_vacation(&mut self, username: &str) -> Result<ReverterId> {
        let account = self.account_mut(username)?;
        let restore = account.on_vacation();
        account.set_on_vacation(!restore);
        Ok(self.log.file(Reverter::SwitchVacation {
            username: username.to_string(),
            restore,
        }))
    }

    pub fn send_private_message(
        &mut self,
        sender: &str,
        receiver: &str,
        body: &str,
    ) -> Result<ReverterId> {
        let Some(formatted) = self.directory.send_message(sender, receiver, body) else {
            return Err(SwapError::NotFound(
                "sender or receiver does not exist".into(),
            ));
        };
        Ok(self.log.file(Reverter::PrivateMessage {
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            message: formatted,
        }))
    }

    // --- items and wishlists ---

    /// Creates the item and queues it for administrator approval.
    pub fn request_item(
        &mut self,
        username: &str,
        kind: &str,
        name: &str,
        description: &str,
    ) -> Result<ItemId> {
        self.require_account(username)?;
        let item = self.directory.create_item(kind, name, description);
        let id = item.id;
        self.directory.file_item_request(username, item.clone());
        self.log.file(Reverter::ItemRequest {
            username: username.to_string(),
            item,
        });
        Ok(id)
    }

    pub fn add_to_wishlist(&mut self, username: &str, item: ItemId) -> Result<ReverterId> {
        self.require_account(username)?;
        let Some(catalogued) = self.directory.item(item).cloned() else {
            return Err(SwapError::NotFound(format!("no item {item}")));
        };
        let account = self.account_mut(username)?;
        if account.has_wished(item) {
            return Err(SwapError::StateConflict(format!(
                "item {item} is already wished for"
            )));
        }
        account.add_to_wishlist(catalogued);
        Ok(self.log.file(Reverter::AddToWishlist {
            username: username.to_string(),
            item,
        }))
    }

    pub fn remove_from_wishlist(&mut self, username: &str, item: ItemId) -> Result<ReverterId> {
        let account = self.account_mut(username)?;
        let Some(removed) = account.remove_from_wishlist(item) else {
            return Err(SwapError::NotFound(format!(
                "item {item} is not on the wishlist"
            )));
        };
        Ok(self.log.file(Reverter::RemoveFromWishlist {
            username: username.to_string(),
            item: removed,
        }))
    }

    pub fn report_user(&mut self, reporter: &str, reported: &str, reason: &str) -> Result<()> {
        if self.directory.file_report(reporter, reported, reason) {
            Ok(())
        } else {
            Err(SwapError::Validation(
                "report rejected: unknown user or self-report".into(),
            ))
        }
    }

    pub fn request_unfreeze(&mut self, username: &str) -> Result<()> {
        self.require_account(username)?;
        if self.directory.request_unfreeze(username) {
            Ok(())
        } else {
            Err(SwapError::StateConflict(format!(
                "{username} is not frozen"
            )))
        }
    }

    // --- trades ---

    /// Files a trade request for `wanted`, resolved to its current owner.
    /// `offered` makes the trade two-way.
    pub fn request_trade(
        &mut self,
        initiator: &str,
        wanted: ItemId,
        offered: Option<ItemId>,
        permanent: bool,
    ) -> Result<TradeId> {
        self.require_account(initiator)?;
        let Some(owner) = self.directory.owner_of(wanted).map(str::to_string) else {
            return Err(TradeError::ItemUnavailable { item: wanted.0 }.into());
        };
        let eligible = self
            .directory
            .eligible_partners(initiator)
            .iter()
            .any(|a| a.username() == owner);
        if !eligible {
            return Err(SwapError::PermissionDenied(format!(
                "{initiator} may not trade with {owner}"
            )));
        }
        if let Some(offered) = offered {
            if !self.directory.is_lendable(initiator, offered) {
                return Err(TradeError::ItemUnavailable { item: offered.0 }.into());
            }
        }
        let trade = self
            .ledger
            .request_trade(initiator, owner.clone(), offered, wanted, permanent);
        self.log.file(Reverter::RequestTrade {
            trade,
            initiator: initiator.to_string(),
            responder: owner,
        });
        Ok(trade)
    }

    /// Responder accepts. Item availability is re-checked here, at accept
    /// time, so an item lent elsewhere in the meantime blocks the trade
    /// instead of being lent twice. On success ownership bookkeeping runs
    /// for every item in the trade.
    pub fn agree_to_trade(&mut self, trade: TradeId, actor: &str) -> Result<()> {
        let snapshot = self
            .ledger
            .trade(trade)
            .ok_or(TradeError::NotFound { trade })?
            .clone();
        for party in [Party::Initiator, Party::Responder] {
            if let Some(item) = snapshot.item_given_by(party) {
                if !self.directory.is_lendable(snapshot.username(party), item) {
                    return Err(TradeError::ItemUnavailable { item: item.0 }.into());
                }
            }
        }
        self.ledger.agree(trade, actor)?;
        for party in [Party::Initiator, Party::Responder] {
            if let Some(item) = snapshot.item_given_by(party) {
                let lender = snapshot.username(party).to_string();
                let borrower = snapshot.username(party.other()).to_string();
                self.directory.transfer_bookkeeping(&lender, &borrower, item);
            }
        }
        Ok(())
    }

    pub fn deny_trade(&mut self, trade: TradeId, actor: &str) -> Result<ReverterId> {
        self.ledger.deny(trade, actor)?;
        Ok(self.log.file(Reverter::DenyTrade {
            trade,
            responder: actor.to_string(),
        }))
    }

    pub fn trades_of(&self, username: &str, status: Option<TradeStatus>) -> Vec<String> {
        self.ledger
            .trades_of(username, status)
            .iter()
            .map(|t| t.summary())
            .collect()
    }

    // --- meetings ---

    fn party_in(&self, trade: TradeId, actor: &str) -> Result<Party> {
        let live = self.ledger.trade(trade).ok_or(TradeError::NotFound { trade })?;
        live.party_of(actor).ok_or_else(|| {
            SwapError::PermissionDenied(format!("{actor} is not part of trade {trade}"))
        })
    }

    fn current_meeting(&self, trade: TradeId) -> Result<MeetingId> {
        let live = self.ledger.trade(trade).ok_or(TradeError::NotFound { trade })?;
        live.current_meeting().ok_or_else(|| {
            SwapError::StateConflict(format!("trade {trade} has no meeting in progress"))
        })
    }

    /// Proposes the next meeting of an ongoing trade. Refused while the
    /// previous meeting is still pending or the trade has no slot left.
    pub fn propose_meeting(
        &mut self,
        trade: TradeId,
        actor: &str,
        location: &str,
        time: DateTime<Utc>,
    ) -> Result<MeetingId> {
        let party = self.party_in(trade, actor)?;
        let live = self.ledger.trade(trade).ok_or(TradeError::NotFound { trade })?;
        if live.current_meeting().is_some() {
            return Err(SwapError::StateConflict(format!(
                "trade {trade} already has a meeting in progress"
            )));
        }
        if !live.can_attach_meeting() {
            return Err(TradeError::MeetingCapacity { trade }.into());
        }
        let meeting = self.meetings.propose(location, time, party);
        self.ledger.attach_meeting(trade, meeting)?;
        Ok(meeting)
    }

    /// Edits the trade's current meeting. Returns true when the edit landed.
    /// An edit past the limit cancels the trade instead, notifies both
    /// parties once, and returns false; repeating the attempt afterwards
    /// does neither again.
    pub fn edit_meeting(
        &mut self,
        trade: TradeId,
        actor: &str,
        location: &str,
        time: DateTime<Utc>,
    ) -> Result<bool> {
        let party = self.party_in(trade, actor)?;
        let meeting = self.current_meeting(trade)?;
        match self
            .meetings
            .edit(meeting, location, time, party, self.thresholds.max_meeting_edits)
        {
            Ok(undo) => {
                self.log.file(Reverter::EditMeeting {
                    meeting,
                    username: actor.to_string(),
                    party,
                    old_location: undo.old_location,
                    old_time: undo.old_time,
                    counterpart_was_arranged: undo.counterpart_was_arranged,
                });
                Ok(true)
            }
            Err(MeetingError::EditLimit { edits, limit }) => {
                if self.ledger.cancel(trade) {
                    warn!(
                        trade = %trade,
                        meeting = %meeting,
                        edits,
                        limit,
                        "edit limit breached, trade cancelled"
                    );
                    let notice = format!(
                        "Trade {trade} was cancelled: the meeting edit limit was reached"
                    );
                    for side in [Party::Initiator, Party::Responder] {
                        let username = self
                            .ledger
                            .trade(trade)
                            .map(|t| t.username(side).to_string());
                        if let Some(username) = username {
                            self.directory.notify(&username, notice.clone());
                        }
                    }
                }
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn confirm_arrangement(&mut self, trade: TradeId, actor: &str) -> Result<ReverterId> {
        let party = self.party_in(trade, actor)?;
        let meeting = self.current_meeting(trade)?;
        self.meetings.confirm_arrangement(meeting, party)?;
        Ok(self.log.file(Reverter::ConfirmArrangement {
            meeting,
            username: actor.to_string(),
            party,
        }))
    }

    /// Confirms the current meeting occurred. Only valid while the trade is
    /// ongoing. Returns true when this confirmation completed the trade; the
    /// confirming party then earns the credit bonus. Occurrence
    /// confirmations on intermediate meetings award nothing.
    pub fn confirm_occurrence(&mut self, trade: TradeId, actor: &str) -> Result<bool> {
        let party = self.party_in(trade, actor)?;
        let live = self.ledger.trade(trade).ok_or(TradeError::NotFound { trade })?;
        if live.status() != TradeStatus::Ongoing {
            return Err(TradeError::WrongState {
                trade,
                status: live.status().to_string(),
                expected: TradeStatus::Ongoing.to_string(),
            }
            .into());
        }
        let meeting = self.current_meeting(trade)?;
        let fully_occurred = self.meetings.confirm_occurrence(meeting, party)?;
        self.log.file(Reverter::ConfirmOccurrence {
            meeting,
            username: actor.to_string(),
            party,
        });
        if !fully_occurred {
            return Ok(false);
        }
        let completed = self.ledger.record_meeting_occurred(trade);
        if completed {
            self.directory.adjust_credit(actor, OCCURRENCE_CREDIT_BONUS);
            info!(trade = %trade, user = actor, "completion credit awarded");
        }
        Ok(completed)
    }

    /// Pull-based lateness sweep: abandons every ongoing trade whose current
    /// meeting is overdue, fines both parties, and tells them. Run before
    /// credit-sensitive reads. Returns the penalized usernames.
    pub fn refresh_lateness(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let late = self
            .meetings
            .late_meeting_ids(now, self.thresholds.max_meeting_late_days);
        if late.is_empty() {
            return Vec::new();
        }
        let penalized = self.ledger.abandon_late(&late);
        for username in &penalized {
            self.directory
                .adjust_credit(username, -ABANDONMENT_CREDIT_PENALTY);
            self.directory.notify(
                username,
                "A trade of yours was abandoned: its meeting never took place",
            );
        }
        penalized
    }

    // --- digests ---

    pub fn recent_borrowed_items(&self, username: &str, limit: usize) -> Vec<ItemId> {
        self.ledger.recent_borrowed_items(username, limit)
    }

    pub fn top_partners(&self, username: &str, limit: usize) -> Vec<(String, u32)> {
        self.ledger.top_partners(username, limit)
    }

    /// Most borrowed item kinds across the user's completed trades.
    pub fn top_item_kinds(&self, username: &str, limit: usize) -> Vec<(String, u32)> {
        let mut counts: BTreeMap<&str, u32> = BTreeMap::new();
        for trade in self.ledger.trades() {
            if trade.status() != TradeStatus::Completed || !trade.involves(username) {
                continue;
            }
            for item in trade.items() {
                if let Some(entry) = self.directory.item(item) {
                    *counts.entry(entry.kind.as_str()).or_default() += 1;
                }
            }
        }
        let mut ranked: Vec<(String, u32)> =
            counts.into_iter().map(|(k, n)| (k.to_string(), n)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(limit);
        ranked
    }

    // --- administration ---

    pub fn threshold(&self, kind: ThresholdKind) -> i64 {
        self.thresholds.get(kind)
    }

    pub fn set_threshold(&mut self, kind: ThresholdKind, value: i64) {
        info!(kind = %kind, value, "threshold changed");
        self.thresholds.set(kind, value);
    }

    pub fn enforcer_at(&self, now: DateTime<Utc>) -> ThresholdEnforcer {
        ThresholdEnforcer::new(now)
    }

    pub fn over_incomplete_limit(&self, enforcer: &ThresholdEnforcer) -> BTreeMap<String, u32> {
        enforcer.over_incomplete_limit(&self.ledger, self.thresholds.max_incomplete_trades)
    }

    pub fn over_weekly_transactions(
        &self,
        enforcer: &ThresholdEnforcer,
    ) -> BTreeMap<String, u32> {
        enforcer.over_weekly_transactions(&self.ledger, self.thresholds.max_weekly_transactions)
    }

    pub fn under_lend_borrow_minimum(
        &self,
        enforcer: &ThresholdEnforcer,
    ) -> BTreeMap<String, u32> {
        enforcer.under_lend_borrow_minimum(&self.directory, self.thresholds.min_lend_borrow_diff)
    }

    pub fn frozen_users(&self, enforcer: &ThresholdEnforcer) -> BTreeMap<String, u32> {
        enforcer.frozen_users(&self.directory)
    }

    pub fn freeze(&mut self, username: &str) -> bool {
        self.directory.freeze(username)
    }

    pub fn unfreeze(&mut self, username: &str) -> bool {
        self.directory.unfreeze(username)
    }

    pub fn item_requests(&self) -> &[ItemRequest] {
        self.directory.item_requests()
    }

    pub fn process_item_request(&mut self, username: &str, item: ItemId, accept: bool) -> bool {
        self.directory.process_item_request(username, item, accept)
    }

    pub fn unfreeze_requests(&self) -> &[String] {
        self.directory.unfreeze_requests()
    }

    pub fn process_unfreeze_request(&mut self, username: &str, accept: bool) -> bool {
        self.directory.process_unfreeze_request(username, accept)
    }

    pub fn reports(&self) -> &[Report] {
        self.directory.reports()
    }

    pub fn process_report(&mut self, report: &Report, accept: bool) -> bool {
        self.directory.process_report(report, accept)
    }

    pub fn reverters(&self) -> Vec<(ReverterId, &'static str, String)> {
        self.log.entries()
    }

    pub fn reverters_by_actor(&self) -> BTreeMap<&str, Vec<ReverterId>> {
        self.log.by_actor()
    }

    pub fn reverters_by_kind(&self) -> BTreeMap<&'static str, Vec<ReverterId>> {
        self.log.by_kind()
    }

    /// Executes a filed reverter. The entry leaves the log either way; the
    /// outcome reports whether the undo applied or was stale.
    pub fn undo(&mut self, id: ReverterId) -> Option<RevertOutcome> {
        let mut ctx = RevertCtx {
            directory: &mut self.directory,
            ledger: &mut self.ledger,
            meetings: &mut self.meetings,
        };
        self.log.execute(id, &mut ctx)
    }

    pub fn discard_reverter(&mut self, id: ReverterId) -> bool {
        self.log.discard(id)
    }

    /// Grants an item straight into an account, bypassing the approval
    /// queue. Test and bootstrap helper.
    pub fn grant_item(
        &mut self,
        username: &str,
        kind: &str,
        name: &str,
        description: &str,
    ) -> Result<ItemId> {
        self.require_account(username)?;
        let item = self.directory.create_item(kind, name, description);
        let id = item.id;
        if let Some(account) = self.directory.account_mut(username) {
            account.add_available(item);
        }
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::INITIAL_CREDIT;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, day, hour, 0, 0).unwrap()
    }

    fn exchange_with_pair() -> (Exchange, ItemId) {
        let mut ex = Exchange::new();
        ex.register("alice", "pw-a");
        ex.register("bob", "pw-b");
        let wanted = ex.grant_item("bob", "book", "atlas", "world atlas").unwrap();
        (ex, wanted)
    }

    #[test]
    fn test_request_trade_resolves_owner() {
        let (mut ex, wanted) = exchange_with_pair();
        let trade = ex.request_trade("alice", wanted, None, true).unwrap();
        let live = ex.ledger().trade(trade).unwrap();
        assert_eq!(live.username(Party::Responder), "bob");
        assert_eq!(live.status(), TradeStatus::NotStarted);
    }

    #[test]
    fn test_request_trade_rejects_blocked_owner() {
        let (mut ex, wanted) = exchange_with_pair();
        ex.block_user("bob", "alice").unwrap();
        let err = ex.request_trade("alice", wanted, None, true).unwrap_err();
        assert!(matches!(err, SwapError::PermissionDenied(_)));
    }

    #[test]
    fn test_agree_runs_bookkeeping_once() {
        let (mut ex, wanted) = exchange_with_pair();
        let trade = ex.request_trade("alice", wanted, None, true).unwrap();
        ex.agree_to_trade(trade, "bob").unwrap();

        assert!(!ex.directory().is_lendable("bob", wanted));
        assert_eq!(ex.directory().account("bob").unwrap().num_lent(), 1);
        assert_eq!(ex.directory().account("alice").unwrap().num_borrowed(), 1);

        let err = ex.agree_to_trade(trade, "bob").unwrap_err();
        assert!(matches!(err, SwapError::StateConflict(_)));
        assert_eq!(ex.directory().account("bob").unwrap().num_lent(), 1);
    }

    #[test]
    fn test_agree_rechecks_availability() {
        let (mut ex, wanted) = exchange_with_pair();
        let first = ex.request_trade("alice", wanted, None, true).unwrap();
        ex.register("carol", "pw-c");
        let second = ex.request_trade("carol", wanted, None, true).unwrap();

        ex.agree_to_trade(first, "bob").unwrap();
        let err = ex.agree_to_trade(second, "bob").unwrap_err();
        assert!(matches!(err, SwapError::StateConflict(_)));
    }

    #[test]
    fn test_edit_limit_cancels_and_notifies_once() {
        let (mut ex, wanted) = exchange_with_pair();
        let trade = ex.request_trade("alice", wanted, None, true).unwrap();
        ex.agree_to_trade(trade, "bob").unwrap();
        ex.propose_meeting(trade, "alice", "Library", at(1, 15)).unwrap();

        let max = ex.threshold(ThresholdKind::MaxMeetingEdits) as u32;
        // alternate edits until alice's attempt crosses the limit
        for _ in 0..max {
            assert!(ex.edit_meeting(trade, "bob", "Cafe", at(2, 10)).unwrap());
            assert!(ex.edit_meeting(trade, "alice", "Library", at(1, 15)).unwrap());
        }
        assert!(ex.edit_meeting(trade, "bob", "Cafe", at(2, 10)).unwrap());
        assert!(!ex.edit_meeting(trade, "alice", "Park", at(3, 9)).unwrap());

        assert_eq!(
            ex.ledger().trade(trade).unwrap().status(),
            TradeStatus::Cancelled
        );
        let notices = ex
            .directory()
            .account("alice")
            .unwrap()
            .messages_received()
            .len();
        assert_eq!(notices, 1);

        // repeating the attempt neither re-cancels nor re-notifies
        assert!(!ex.edit_meeting(trade, "alice", "Park", at(3, 9)).unwrap());
        assert_eq!(
            ex.directory()
                .account("alice")
                .unwrap()
                .messages_received()
                .len(),
            1
        );
    }

    #[test]
    fn test_no_occurrence_confirmation_on_cancelled_trade() {
        let (mut ex, wanted) = exchange_with_pair();
        let trade = ex.request_trade("alice", wanted, None, true).unwrap();
        ex.agree_to_trade(trade, "bob").unwrap();
        ex.propose_meeting(trade, "alice", "Library", at(1, 15)).unwrap();

        // drive the edit counter over the limit so the trade cancels
        let max = ex.threshold(ThresholdKind::MaxMeetingEdits) as u32;
        for _ in 0..=max {
            ex.edit_meeting(trade, "bob", "Cafe", at(2, 10)).unwrap();
            ex.edit_meeting(trade, "alice", "Library", at(1, 15)).unwrap();
        }
        assert_eq!(
            ex.ledger().trade(trade).unwrap().status(),
            TradeStatus::Cancelled
        );

        // finish the arrangement handshake, then try to confirm occurrence
        ex.confirm_arrangement(trade, "alice").unwrap();
        for actor in ["alice", "bob"] {
            let err = ex.confirm_occurrence(trade, actor).unwrap_err();
            assert!(matches!(err, SwapError::StateConflict(_)));
        }

        let meeting = ex.ledger().trade(trade).unwrap().current_meeting().unwrap();
        assert!(!ex
            .meetings()
            .meeting(meeting)
            .unwrap()
            .occurrence_confirmed_by_either());
        assert_eq!(
            ex.directory().account("alice").unwrap().credit(),
            INITIAL_CREDIT
        );
    }

    #[test]
    fn test_lateness_sweep_fines_both_parties() {
        let (mut ex, wanted) = exchange_with_pair();
        let trade = ex.request_trade("alice", wanted, None, true).unwrap();
        ex.agree_to_trade(trade, "bob").unwrap();
        ex.propose_meeting(trade, "alice", "Library", at(1, 15)).unwrap();
        ex.confirm_arrangement(trade, "bob").unwrap();

        let before = ex.directory().account("alice").unwrap().credit();
        let penalized = ex.refresh_lateness(at(20, 0));
        assert_eq!(penalized.len(), 2);
        assert_eq!(
            ex.ledger().trade(trade).unwrap().status(),
            TradeStatus::Abandoned
        );
        assert_eq!(
            ex.directory().account("alice").unwrap().credit(),
            before - ABANDONMENT_CREDIT_PENALTY
        );

        // the sweep is idempotent
        assert!(ex.refresh_lateness(at(21, 0)).is_empty());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let (mut ex, wanted) = exchange_with_pair();
        let trade = ex.request_trade("alice", wanted, None, true).unwrap();
        ex.agree_to_trade(trade, "bob").unwrap();

        let snapshot = ex.to_json().unwrap();
        let restored = Exchange::from_json(&snapshot).unwrap();
        assert_eq!(
            restored.ledger().trade(trade).unwrap().status(),
            TradeStatus::Ongoing
        );
        assert!(restored.authenticate("alice", "pw-a"));
    }
}
