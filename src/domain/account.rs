use super::ids::ItemId;
use super::item::Item;
use serde::{Deserialize, Serialize};

/// Reserved username for the read-only guest login. Exempt from lend/borrow
/// analytics and excluded from partner eligibility.
pub const GUEST_USERNAME: &str = "GUEST";

/// Credit every new account starts with.
pub const INITIAL_CREDIT: i64 = 60;

/// Credit awarded to the party whose occurrence confirmation completes a
/// trade for the first time.
pub const OCCURRENCE_CREDIT_BONUS: i64 = 1;

/// Credit taken from each party of an abandoned trade.
pub const ABANDONMENT_CREDIT_PENALTY: i64 = 5;

/// A registered user account: identity, standing, and the item lists the
/// trade protocol reads and writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    username: String,
    password: String,
    city: String,
    credit: i64,
    num_lent: u32,
    num_borrowed: u32,
    frozen: bool,
    on_vacation: bool,
    /// Items this account can currently lend.
    available: Vec<Item>,
    /// Items this account would like to borrow.
    wishlist: Vec<Item>,
    /// Usernames this account refuses to trade with.
    blocklist: Vec<String>,
    messages_sent: Vec<String>,
    messages_received: Vec<String>,
}

impl Account {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Account {
            username: username.into(),
            password: password.into(),
            city: String::new(),
            credit: INITIAL_CREDIT,
            num_lent: 0,
            num_borrowed: 0,
            frozen: false,
            on_vacation: false,
            available: Vec::new(),
            wishlist: Vec::new(),
            blocklist: Vec::new(),
            messages_sent: Vec::new(),
            messages_received: Vec::new(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn set_password(&mut self, password: impl Into<String>) {
        self.password = password.into();
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn set_city(&mut self, city: impl Into<String>) {
        self.city = city.into();
    }

    pub fn credit(&self) -> i64 {
        self.credit
    }

    pub fn adjust_credit(&mut self, delta: i64) {
        self.credit += delta;
    }

    pub fn num_lent(&self) -> u32 {
        self.num_lent
    }

    pub fn num_borrowed(&self) -> u32 {
        self.num_borrowed
    }

    pub fn record_lent(&mut self) {
        self.num_lent += 1;
    }

    pub fn record_borrowed(&mut self) {
        self.num_borrowed += 1;
    }

    /// Lifetime lent minus borrowed, the quantity the lend/borrow threshold
    /// scan compares against.
    pub fn lend_borrow_diff(&self) -> i64 {
        i64::from(self.num_lent) - i64::from(self.num_borrowed)
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn set_frozen(&mut self, frozen: bool) {
        self.frozen = frozen;
    }

    pub fn on_vacation(&self) -> bool {
        self.on_vacation
    }

    pub fn set_on_vacation(&mut self, on_vacation: bool) {
        self.on_vacation = on_vacation;
    }

    pub fn available(&self) -> &[Item] {
        &self.available
    }

    pub fn wishlist(&self) -> &[Item] {
        &self.wishlist
    }

    pub fn blocklist(&self) -> &[String] {
        &self.blocklist
    }

    pub fn has_available(&self, item: ItemId) -> bool {
        self.available.iter().any(|i| i.id == item)
    }

    pub fn available_item(&self, item: ItemId) -> Option<&Item> {
        self.available.iter().find(|i| i.id == item)
    }

    pub fn add_available(&mut self, item: Item) {
        self.available.push(item);
    }

    /// Removes and returns the item, if this account currently holds it.
    pub fn take_available(&mut self, item: ItemId) -> Option<Item> {
        let pos = self.available.iter().position(|i| i.id == item)?;
        Some(self.available.remove(pos))
    }

    pub fn has_wished(&self, item: ItemId) -> bool {
        self.wishlist.iter().any(|i| i.id == item)
    }

    pub fn add_to_wishlist(&mut self, item: Item) {
        self.wishlist.push(item);
    }

    pub fn remove_from_wishlist(&mut self, item: ItemId) -> Option<Item> {
        let pos = self.wishlist.iter().position(|i| i.id == item)?;
        Some(self.wishlist.remove(pos))
    }

    pub fn has_blocked(&self, username: &str) -> bool {
        self.blocklist.iter().any(|u| u == username)
    }

    pub fn add_to_blocklist(&mut self, username: impl Into<String>) {
        self.blocklist.push(username.into());
    }

    pub fn remove_from_blocklist(&mut self, username: &str) -> bool {
        let before = self.blocklist.len();
        self.blocklist.retain(|u| u != username);
        self.blocklist.len() != before
    }

    pub fn messages_sent(&self) -> &[String] {
        &self.messages_sent
    }

    pub fn messages_received(&self) -> &[String] {
        &self.messages_received
    }

    pub fn record_sent(&mut self, message: impl Into<String>) {
        self.messages_sent.push(message.into());
    }

    pub fn record_received(&mut self, message: impl Into<String>) {
        self.messages_received.push(message.into());
    }

    pub fn delete_sent(&mut self, message: &str) -> bool {
        let before = self.messages_sent.len();
        self.messages_sent.retain(|m| m != message);
        self.messages_sent.len() != before
    }

    pub fn delete_received(&mut self, message: &str) -> bool {
        let before = self.messages_received.len();
        self.messages_received.retain(|m| m != message);
        self.messages_received.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::ItemId;

    fn item(id: u64) -> Item {
        Item::new(ItemId(id), "book", format!("book-{id}"), "paperback")
    }

    #[test]
    fn test_new_account_defaults() {
        let acct = Account::new("alice", "pw");
        assert_eq!(acct.credit(), INITIAL_CREDIT);
        assert_eq!(acct.lend_borrow_diff(), 0);
        assert!(!acct.is_frozen());
        assert!(!acct.on_vacation());
    }

    #[test]
    fn test_available_list_roundtrip() {
        let mut acct = Account::new("alice", "pw");
        acct.add_available(item(10));
        assert!(acct.has_available(ItemId(10)));
        let taken = acct.take_available(ItemId(10)).unwrap();
        assert_eq!(taken.id, ItemId(10));
        assert!(!acct.has_available(ItemId(10)));
        assert!(acct.take_available(ItemId(10)).is_none());
    }

    #[test]
    fn test_lend_borrow_diff() {
        let mut acct = Account::new("alice", "pw");
        acct.record_lent();
        acct.record_lent();
        acct.record_borrowed();
        assert_eq!(acct.lend_borrow_diff(), 1);
    }
}
