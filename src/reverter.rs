//! Undo subsystem.
//!
//! Every undoable mutation files a [`Reverter`] carrying its own pre-image.
//! An administrator later executes or discards it. Execution re-validates
//! the pre-image against live state; a stale revert fails cleanly with an
//! explanation and mutates nothing. Outcomes are reported, never thrown.

use crate::directory::AccountDirectory;
use crate::domain::{
    IdCounter, Item, ItemId, MeetingId, Party, ReverterId, TradeId, TradeStatus,
};
use crate::ledger::TradeLedger;
use crate::meetings::MeetingCoordinator;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// Result of executing a reverter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevertOutcome {
    pub reverted: bool,
    pub message: String,
}

impl RevertOutcome {
    fn done(message: impl Into<String>) -> Self {
        RevertOutcome {
            reverted: true,
            message: message.into(),
        }
    }

    fn stale(message: impl Into<String>) -> Self {
        RevertOutcome {
            reverted: false,
            message: message.into(),
        }
    }
}

/// Mutable borrows of the aggregates a revert may touch.
pub struct RevertCtx<'a> {
    pub directory: &'a mut AccountDirectory,
    pub ledger: &'a mut TradeLedger,
    pub meetings: &'a mut MeetingCoordinator,
}

/// One undoable action and its pre-image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reverter {
    SetPassword {
        username: String,
        old: String,
        new: String,
    },
    SetCity {
        username: String,
        old: String,
        new: String,
    },
    AddToBlockList {
        username: String,
        blocked: String,
    },
    RemoveFromBlockList {
        username: String,
        blocked: String,
    },
    SwitchVacation {
        username: String,
        /// Vacation flag value before the switch.
        restore: bool,
    },
    PrivateMessage {
        sender: String,
        receiver: String,
        /// The formatted body as delivered.
        message: String,
    },
    ItemRequest {
        username: String,
        item: Item,
    },
    AddToWishlist {
        username: String,
        item: ItemId,
    },
    RemoveFromWishlist {
        username: String,
        item: Item,
    },
    RequestTrade {
        trade: TradeId,
        initiator: String,
        responder: String,
    },
    DenyTrade {
        trade: TradeId,
        responder: String,
    },
    ConfirmArrangement {
        meeting: MeetingId,
        username: String,
        party: Party,
    },
    ConfirmOccurrence {
        meeting: MeetingId,
        username: String,
        party: Party,
    },
    EditMeeting {
        meeting: MeetingId,
        username: String,
        party: Party,
        old_location: String,
        old_time: DateTime<Utc>,
        counterpart_was_arranged: bool,
    },
}

impl Reverter {
    /// The user whose action this would undo.
    pub fn actor(&self) -> &str {
        match self {
            Reverter::SetPassword { username, .. }
            | Reverter::SetCity { username, .. }
            | Reverter::AddToBlockList { username, .. }
            | Reverter::RemoveFromBlockList { username, .. }
            | Reverter::SwitchVacation { username, .. }
            | Reverter::ItemRequest { username, .. }
            | Reverter::AddToWishlist { username, .. }
            | Reverter::RemoveFromWishlist { username, .. }
            | Reverter::ConfirmArrangement { username, .. }
            | Reverter::ConfirmOccurrence { username, .. }
            | Reverter::EditMeeting { username, .. } => username,
            Reverter::PrivateMessage { sender, .. } => sender,
            Reverter::RequestTrade { initiator, .. } => initiator,
            Reverter::DenyTrade { responder, .. } => responder,
        }
    }

    /// Short label for grouped administrator views.
    pub fn kind(&self) -> &'static str {
        match self {
            Reverter::SetPassword { .. } => "set-password",
            Reverter::SetCity { .. } => "set-city",
            Reverter::AddToBlockList { .. } => "add-to-blocklist",
            Reverter::RemoveFromBlockList { .. } => "remove-from-blocklist",
            Reverter::SwitchVacation { .. } => "switch-vacation",
            Reverter::PrivateMessage { .. } => "private-message",
            Reverter::ItemRequest { .. } => "item-request",
            Reverter::AddToWishlist { .. } => "add-to-wishlist",
            Reverter::RemoveFromWishlist { .. } => "remove-from-wishlist",
            Reverter::RequestTrade { .. } => "request-trade",
            Reverter::DenyTrade { .. } => "deny-trade",
            Reverter::ConfirmArrangement { .. } => "confirm-arrangement",
            Reverter::ConfirmOccurrence { .. } => "confirm-occurrence",
            Reverter::EditMeeting { .. } => "edit-meeting",
        }
    }

    /// Long description of the action that would be undone.
    pub fn describe(&self) -> String {
        match self {
            Reverter::SetPassword { username, .. } => {
                format!("{username} changed their password")
            }
            Reverter::SetCity { username, new, .. } => {
                format!("{username} set their city to {new}")
            }
            Reverter::AddToBlockList { username, blocked } => {
                format!("{username} blocked {blocked}")
            }
            Reverter::RemoveFromBlockList { username, blocked } => {
                format!("{username} unblocked {blocked}")
            }
            Reverter::SwitchVacation { username, restore } => {
                let direction = if *restore { "off" } else { "on" };
                format!("{username} switched vacation mode {direction}")
            }
            Reverter::PrivateMessage {
                sender, receiver, ..
            } => format!("{sender} sent a private message to {receiver}"),
            Reverter::ItemRequest { username, item } => {
                format!("{username} requested to lend item {}", item.id)
            }
            Reverter::AddToWishlist { username, item } => {
                format!("{username} wished for item {item}")
            }
            Reverter::RemoveFromWishlist { username, item } => {
                format!("{username} removed item {} from their wishlist", item.id)
            }
            Reverter::RequestTrade {
                trade,
                initiator,
                responder,
            } => format!("{initiator} requested trade {trade} with {responder}"),
            Reverter::DenyTrade { trade, responder } => {
                format!("{responder} denied trade {trade}")
            }
            Reverter::ConfirmArrangement {
                meeting, username, ..
            } => format!("{username} confirmed the arrangement of meeting {meeting}"),
            Reverter::ConfirmOccurrence {
                meeting, username, ..
            } => format!("{username} confirmed meeting {meeting} occurred"),
            Reverter::EditMeeting {
                meeting, username, ..
            } => format!("{username} edited meeting {meeting}"),
        }
    }

    /// Re-validates the pre-image against live state, then applies the
    /// inverse. Stale pre-images fail without mutating anything.
    pub fn execute(&self, ctx: &mut RevertCtx<'_>) -> RevertOutcome {
        match self {
            Reverter::SetPassword { username, old, new } => {
                let Some(account) = ctx.directory.account_mut(username) else {
                    return RevertOutcome::stale(format!("no account named {username}"));
                };
                if account.password() != new {
                    return RevertOutcome::stale(format!(
                        "{username} has changed their password again"
                    ));
                }
                account.set_password(old.clone());
                RevertOutcome::done(format!("restored the previous password of {username}"))
            }
            Reverter::SetCity { username, old, new } => {
                let Some(account) = ctx.directory.account_mut(username) else {
                    return RevertOutcome::stale(format!("no account named {username}"));
                };
                if account.city() != new {
                    return RevertOutcome::stale(format!("{username} has moved city again"));
                }
                account.set_city(old.clone());
                RevertOutcome::done(format!("restored the previous city of {username}"))
            }
            Reverter::AddToBlockList { username, blocked } => {
                let Some(account) = ctx.directory.account_mut(username) else {
                    return RevertOutcome::stale(format!("no account named {username}"));
                };
                if account.remove_from_blocklist(blocked) {
                    RevertOutcome::done(format!("{blocked} is no longer blocked by {username}"))
                } else {
                    RevertOutcome::stale(format!("{username} has already unblocked {blocked}"))
                }
            }
            Reverter::RemoveFromBlockList { username, blocked } => {
                let Some(account) = ctx.directory.account_mut(username) else {
                    return RevertOutcome::stale(format!("no account named {username}"));
                };
                if account.has_blocked(blocked) {
                    return RevertOutcome::stale(format!(
                        "{username} has already re-blocked {blocked}"
                    ));
                }
                account.add_to_blocklist(blocked.clone());
                RevertOutcome::done(format!("{blocked} is blocked by {username} again"))
            }
            Reverter::SwitchVacation { username, restore } => {
                let Some(account) = ctx.directory.account_mut(username) else {
                    return RevertOutcome::stale(format!("no account named {username}"));
                };
                if account.on_vacation() == *restore {
                    return RevertOutcome::stale(format!(
                        "{username} has already switched vacation mode back"
                    ));
                }
                account.set_on_vacation(*restore);
                RevertOutcome::done(format!("restored the vacation status of {username}"))
            }
            Reverter::PrivateMessage {
                sender,
                receiver,
                message,
            } => {
                let deleted = ctx
                    .directory
                    .account_mut(sender)
                    .is_some_and(|a| a.delete_sent(message));
                if !deleted {
                    return RevertOutcome::stale(format!(
                        "the message from {sender} is no longer on record"
                    ));
                }
                if let Some(account) = ctx.directory.account_mut(receiver) {
                    account.delete_received(message);
                }
                RevertOutcome::done(format!(
                    "withdrew the message from {sender} to {receiver}"
                ))
            }
            Reverter::ItemRequest { username, item } => {
                if ctx.directory.withdraw_item_request(username, item.id) {
                    RevertOutcome::done(format!(
                        "withdrew the pending item request of {username}"
                    ))
                } else {
                    RevertOutcome::stale(format!(
                        "the item request of {username} has already been processed"
                    ))
                }
            }
            Reverter::AddToWishlist { username, item } => {
                let removed = ctx
                    .directory
                    .account_mut(username)
                    .and_then(|a| a.remove_from_wishlist(*item));
                if removed.is_some() {
                    RevertOutcome::done(format!(
                        "removed item {item} from the wishlist of {username}"
                    ))
                } else {
                    RevertOutcome::stale(format!(
                        "item {item} is no longer wished for by {username}"
                    ))
                }
            }
            Reverter::RemoveFromWishlist { username, item } => {
                let Some(account) = ctx.directory.account_mut(username) else {
                    return RevertOutcome::stale(format!("no account named {username}"));
                };
                if account.has_wished(item.id) {
                    return RevertOutcome::stale(format!(
                        "{username} has already re-wished item {}",
                        item.id
                    ));
                }
                account.add_to_wishlist(item.clone());
                RevertOutcome::done(format!(
                    "restored item {} to the wishlist of {username}",
                    item.id
                ))
            }
            Reverter::RequestTrade { trade, .. } => {
                let Some(live) = ctx.ledger.trade(*trade) else {
                    return RevertOutcome::stale(format!("trade {trade} no longer exists"));
                };
                if live.has_meetings() {
                    return RevertOutcome::stale(format!(
                        "trade {trade} already has a meeting attached"
                    ));
                }
                ctx.ledger.remove(*trade);
                RevertOutcome::done(format!("withdrew trade request {trade}"))
            }
            Reverter::DenyTrade { trade, .. } => {
                let Some(live) = ctx.ledger.trade_mut(*trade) else {
                    return RevertOutcome::stale(format!("trade {trade} no longer exists"));
                };
                live.force_status(TradeStatus::NotStarted);
                RevertOutcome::done(format!("trade {trade} is awaiting an answer again"))
            }
            Reverter::ConfirmArrangement { meeting, party, .. } => {
                let Some(live) = ctx.meetings.meeting_mut(*meeting) else {
                    return RevertOutcome::stale(format!("meeting {meeting} no longer exists"));
                };
                if live.occurrence_confirmed_by_either() {
                    return RevertOutcome::stale(format!(
                        "meeting {meeting} already has an occurrence confirmation"
                    ));
                }
                live.set_arranged(*party, false);
                RevertOutcome::done(format!(
                    "withdrew the arrangement confirmation on meeting {meeting}"
                ))
            }
            Reverter::ConfirmOccurrence { meeting, party, .. } => {
                let Some(live) = ctx.meetings.meeting_mut(*meeting) else {
                    return RevertOutcome::stale(format!("meeting {meeting} no longer exists"));
                };
                if live.occurred_by(party.other()) {
                    return RevertOutcome::stale(format!(
                        "both sides have confirmed meeting {meeting} occurred"
                    ));
                }
                live.set_occurred(*party, false);
                RevertOutcome::done(format!(
                    "withdrew the occurrence confirmation on meeting {meeting}"
                ))
            }
            Reverter::EditMeeting {
                meeting,
                party,
                old_location,
                old_time,
                counterpart_was_arranged,
                ..
            } => {
                let Some(live) = ctx.meetings.meeting_mut(*meeting) else {
                    return RevertOutcome::stale(format!("meeting {meeting} no longer exists"));
                };
                // a later edit or confirmation by either side invalidates
                // the captured pre-image
                if !live.arranged_by(*party)
                    || live.arranged_by(party.other())
                    || live.occurrence_confirmed_by_either()
                {
                    return RevertOutcome::stale(format!(
                        "meeting {meeting} has moved on since the edit"
                    ));
                }
                live.set_location(old_location.clone());
                live.set_time(*old_time);
                live.set_arranged(*party, false);
                live.set_arranged(party.other(), *counterpart_was_arranged);
                let edits = live.times_edited(*party);
                live.set_times_edited(*party, edits.saturating_sub(1));
                RevertOutcome::done(format!("rolled back the last edit of meeting {meeting}"))
            }
        }
    }
}

/// Append-only store of filed reverters, keyed by [`ReverterId`].
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ReverterLog {
    entries: BTreeMap<ReverterId, Reverter>,
    ids: IdCounter,
}

impl ReverterLog {
    pub fn new() -> Self {
        ReverterLog::default()
    }

    pub fn file(&mut self, reverter: Reverter) -> ReverterId {
        let id = ReverterId(self.ids.next());
        info!(reverter = %id, kind = reverter.kind(), "reverter filed");
        self.entries.insert(id, reverter);
        id
    }

    pub fn get(&self, id: ReverterId) -> Option<&Reverter> {
        self.entries.get(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Executes and removes the entry. The entry leaves the log even when
    /// the revert turns out stale; the outcome says which happened.
    pub fn execute(&mut self, id: ReverterId, ctx: &mut RevertCtx<'_>) -> Option<RevertOutcome> {
        let reverter = self.entries.remove(&id)?;
        let outcome = reverter.execute(ctx);
        info!(
            reverter = %id,
            kind = reverter.kind(),
            reverted = outcome.reverted,
            "reverter executed: {}",
            outcome.message
        );
        Some(outcome)
    }

    /// Drops the entry without executing it.
    pub fn discard(&mut self, id: ReverterId) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Entries with their display pair, in filing order.
    pub fn entries(&self) -> Vec<(ReverterId, &'static str, String)> {
        self.entries
            .iter()
            .map(|(id, r)| (*id, r.kind(), r.describe()))
            .collect()
    }

    /// Entries grouped by the acting user.
    pub fn by_actor(&self) -> BTreeMap<&str, Vec<ReverterId>> {
        let mut grouped: BTreeMap<&str, Vec<ReverterId>> = BTreeMap::new();
        for (id, r) in &self.entries {
            grouped.entry(r.actor()).or_default().push(*id);
        }
        grouped
    }

    /// Entries grouped by action label.
    pub fn by_kind(&self) -> BTreeMap<&'static str, Vec<ReverterId>> {
        let mut grouped: BTreeMap<&'static str, Vec<ReverterId>> = BTreeMap::new();
        for (id, r) in &self.entries {
            grouped.entry(r.kind()).or_default().push(*id);
        }
        grouped
    }
}
