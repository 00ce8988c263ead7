//! Account and item index.
//!
//! Owns every [`Account`], the item catalog, and the pending-request queues
//! (item additions, unfreeze requests, user reports). The trade and meeting
//! protocols call into this module for lendability checks, partner
//! eligibility, ownership bookkeeping, and credit adjustments; they never
//! hold account references of their own.

use crate::domain::{Account, IdCounter, Item, ItemId, GUEST_USERNAME};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// A user reporting another user for inappropriate behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub reporter: String,
    pub reported: String,
    pub reason: String,
}

/// A pending request to add an item to a user's lendable list, awaiting
/// administrator approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRequest {
    pub username: String,
    pub item: Item,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AccountDirectory {
    accounts: BTreeMap<String, Account>,
    /// Every item ever created, keyed by id. Accounts hold copies; this map
    /// stays intact so completed-trade digests can still describe items that
    /// left an available list.
    catalog: BTreeMap<ItemId, Item>,
    item_ids: IdCounter,
    item_requests: Vec<ItemRequest>,
    unfreeze_requests: Vec<String>,
    reports: Vec<Report>,
}

impl AccountDirectory {
    pub fn new() -> Self {
        let mut directory = AccountDirectory::default();
        directory.accounts.insert(
            GUEST_USERNAME.to_string(),
            Account::new(GUEST_USERNAME, GUEST_USERNAME),
        );
        directory
    }

    pub fn register(&mut self, username: impl Into<String>, password: impl Into<String>) -> bool {
        let username = username.into();
        if self.accounts.contains_key(&username) {
            return false;
        }
        self.accounts
            .insert(username.clone(), Account::new(username, password));
        true
    }

    pub fn contains(&self, username: &str) -> bool {
        self.accounts.contains_key(username)
    }

    pub fn account(&self, username: &str) -> Option<&Account> {
        self.accounts.get(username)
    }

    pub fn account_mut(&mut self, username: &str) -> Option<&mut Account> {
        self.accounts.get_mut(username)
    }

    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    // --- items ---

    /// Allocates an id and enters the item into the catalog.
    pub fn create_item(
        &mut self,
        kind: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Item {
        let item = Item::new(ItemId(self.item_ids.next()), kind, name, description);
        self.register_item(item.clone());
        item
    }

    /// Adds the item to the catalog. Called once per created item.
    pub fn register_item(&mut self, item: Item) {
        self.catalog.insert(item.id, item);
    }

    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.catalog.get(&id)
    }

    /// The account currently offering this item for lending, if any.
    pub fn owner_of(&self, item: ItemId) -> Option<&str> {
        self.accounts
            .values()
            .find(|a| a.has_available(item))
            .map(|a| a.username())
    }

    /// An item is lendable while it sits in its owner's available list.
    pub fn is_lendable(&self, owner: &str, item: ItemId) -> bool {
        self.accounts
            .get(owner)
            .is_some_and(|a| a.has_available(item))
    }

    /// Accounts `username` may trade with: excludes self, the guest login,
    /// either direction of a block, vacationing users, and (once the caller
    /// has set a city) users in a different city. A frozen or vacationing
    /// caller has no partners at all.
    pub fn eligible_partners(&self, username: &str) -> Vec<&Account> {
        let Some(caller) = self.accounts.get(username) else {
            return Vec::new();
        };
        if caller.is_frozen() || caller.on_vacation() {
            return Vec::new();
        }
        self.accounts
            .values()
            .filter(|other| {
                other.username() != caller.username()
                    && other.username() != GUEST_USERNAME
                    && !caller.has_blocked(other.username())
                    && !other.has_blocked(caller.username())
                    && !other.on_vacation()
                    && (caller.city().is_empty() || other.city() == caller.city())
            })
            .collect()
    }

    /// Whether `username` may borrow this item: its owner must be among the
    /// caller's eligible partners and still hold it.
    pub fn is_borrowable_by(&self, username: &str, item: ItemId) -> bool {
        self.eligible_partners(username)
            .iter()
            .any(|a| a.has_available(item))
    }

    /// Ownership bookkeeping for one lent item: the lender loses it from the
    /// available list, the borrower loses it from the wishlist, and both
    /// lifetime counters move.
    pub fn transfer_bookkeeping(&mut self, lender: &str, borrower: &str, item: ItemId) {
        if let Some(account) = self.accounts.get_mut(lender) {
            account.take_available(item);
            account.record_lent();
        }
        if let Some(account) = self.accounts.get_mut(borrower) {
            account.remove_from_wishlist(item);
            account.record_borrowed();
        }
    }

    pub fn adjust_credit(&mut self, username: &str, delta: i64) {
        if let Some(account) = self.accounts.get_mut(username) {
            account.adjust_credit(delta);
        }
    }

    // --- freezing ---

    pub fn freeze(&mut self, username: &str) -> bool {
        match self.accounts.get_mut(username) {
            Some(account) if !account.is_frozen() => {
                account.set_frozen(true);
                info!(user = username, "account frozen");
                true
            }
            _ => false,
        }
    }

    pub fn unfreeze(&mut self, username: &str) -> bool {
        match self.accounts.get_mut(username) {
            Some(account) if account.is_frozen() => {
                account.set_frozen(false);
                info!(user = username, "account unfrozen");
                true
            }
            _ => false,
        }
    }

    pub fn frozen_usernames(&self) -> Vec<&str> {
        self.accounts
            .values()
            .filter(|a| a.is_frozen())
            .map(|a| a.username())
            .collect()
    }

    // --- pending item requests ---

    pub fn file_item_request(&mut self, username: impl Into<String>, item: Item) {
        self.register_item(item.clone());
        self.item_requests.push(ItemRequest {
            username: username.into(),
            item,
        });
    }

    pub fn item_requests(&self) -> &[ItemRequest] {
        &self.item_requests
    }

    /// Removes the matching pending request; on accept, the item lands in the
    /// requester's available list.
    pub fn process_item_request(&mut self, username: &str, item: ItemId, accept: bool) -> bool {
        let Some(pos) = self
            .item_requests
            .iter()
            .position(|r| r.username == username && r.item.id == item)
        else {
            return false;
        };
        let request = self.item_requests.remove(pos);
        if accept {
            if let Some(account) = self.accounts.get_mut(&request.username) {
                account.add_available(request.item);
            }
        }
        true
    }

    /// Removes a pending request without granting it. Used by reverts.
    pub(crate) fn withdraw_item_request(&mut self, username: &str, item: ItemId) -> bool {
        let before = self.item_requests.len();
        self.item_requests
            .retain(|r| !(r.username == username && r.item.id == item));
        self.item_requests.len() != before
    }

    // --- unfreeze requests ---

    pub fn request_unfreeze(&mut self, username: &str) -> bool {
        let frozen = self
            .accounts
            .get(username)
            .is_some_and(|a| a.is_frozen());
        if frozen && !self.unfreeze_requests.iter().any(|u| u == username) {
            self.unfreeze_requests.push(username.to_string());
        }
        frozen
    }

    pub fn unfreeze_requests(&self) -> &[String] {
        &self.unfreeze_requests
    }

    pub fn process_unfreeze_request(&mut self, username: &str, accept: bool) -> bool {
        let before = self.unfreeze_requests.len();
        self.unfreeze_requests.retain(|u| u != username);
        if self.unfreeze_requests.len() == before {
            return false;
        }
        if accept {
            self.unfreeze(username);
        }
        true
    }

    // --- reports ---

    /// Files a report. Self-reports are rejected; duplicates are accepted,
    /// matching the exported behaviour of the system this replaces.
    pub fn file_report(&mut self, reporter: &str, reported: &str, reason: &str) -> bool {
        if reporter == reported || !self.contains(reporter) || !self.contains(reported) {
            return false;
        }
        self.reports.push(Report {
            reporter: reporter.to_string(),
            reported: reported.to_string(),
            reason: reason.to_string(),
        });
        true
    }

    pub fn reports(&self) -> &[Report] {
        &self.reports
    }

    /// Accepting a report freezes the reported user; either way the report
    /// leaves the queue.
    pub fn process_report(&mut self, report: &Report, accept: bool) -> bool {
        let Some(pos) = self.reports.iter().position(|r| r == report) else {
            return false;
        };
        let removed = self.reports.remove(pos);
        if accept {
            self.freeze(&removed.reported);
        }
        true
    }

    // --- messaging ---

    /// Delivers a one-to-one message. The formatted body always lands in the
    /// sender's sent list; it reaches the receiver only if the receiver has
    /// not blocked the sender. Returns the formatted body for undo purposes.
    pub fn send_message(&mut self, sender: &str, receiver: &str, body: &str) -> Option<String> {
        if !self.contains(sender) || !self.contains(receiver) {
            return None;
        }
        let formatted = format!("To [{receiver}]: {body} (from [{sender}])");
        let blocked = self
            .accounts
            .get(receiver)
            .is_some_and(|a| a.has_blocked(sender));
        if let Some(account) = self.accounts.get_mut(sender) {
            account.record_sent(formatted.clone());
        }
        if !blocked {
            if let Some(account) = self.accounts.get_mut(receiver) {
                account.record_received(formatted.clone());
            }
        }
        Some(formatted)
    }

    /// System-originated notification; lands only in the recipient's
    /// received list.
    pub fn notify(&mut self, recipient: &str, body: impl Into<String>) {
        if let Some(account) = self.accounts.get_mut(recipient) {
            account.record_received(body.into());
        }
    }
}
