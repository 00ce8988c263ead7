pub mod config;
pub mod directory;
pub mod domain;
pub mod enforcer;
pub mod error;
pub mod exchange;
pub mod ledger;
pub mod logging;
pub mod meetings;
pub mod reverter;
pub mod thresholds;

pub use config::{AppConfig, LoggingConfig};
pub use directory::{AccountDirectory, ItemRequest, Report};
pub use domain::{
    Account, Item, ItemId, Meeting, MeetingId, Party, PerParty, ReverterId, Trade, TradeId,
    TradeStatus, ABANDONMENT_CREDIT_PENALTY, GUEST_USERNAME, INITIAL_CREDIT,
    OCCURRENCE_CREDIT_BONUS,
};
pub use enforcer::ThresholdEnforcer;
pub use error::{MeetingError, Result, SwapError, TradeError};
pub use exchange::Exchange;
pub use ledger::TradeLedger;
pub use logging::{init_logging, init_logging_simple};
pub use meetings::MeetingCoordinator;
pub use reverter::{RevertCtx, RevertOutcome, Reverter, ReverterLog};
pub use thresholds::{ThresholdKind, Thresholds};
