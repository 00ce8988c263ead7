pub mod account;
pub mod ids;
pub mod item;
pub mod meeting;
pub mod party;
pub mod trade;

pub use account::{
    Account, ABANDONMENT_CREDIT_PENALTY, GUEST_USERNAME, INITIAL_CREDIT, OCCURRENCE_CREDIT_BONUS,
};
pub use ids::{IdCounter, ItemId, MeetingId, ReverterId, TradeId};
pub use item::Item;
pub use meeting::Meeting;
pub use party::{Party, PerParty};
pub use trade::{MeetingSlot, Trade, TradeStatus};
