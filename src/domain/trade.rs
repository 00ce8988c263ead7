use super::ids::{ItemId, MeetingId, TradeId};
use super::party::Party;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trade lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeStatus {
    /// Requested, waiting for the responder to accept or deny.
    NotStarted,
    /// Responder declined the request.
    Denied,
    /// Accepted; meetings are being arranged and held.
    Ongoing,
    /// Every required meeting occurred.
    Completed,
    /// Cancelled by the system after a meeting edit-limit breach.
    Cancelled,
    /// Abandoned by the system after a meeting went unconfirmed too long.
    Abandoned,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::NotStarted => "NOT_STARTED",
            TradeStatus::Denied => "DENIED",
            TradeStatus::Ongoing => "ONGOING",
            TradeStatus::Completed => "COMPLETED",
            TradeStatus::Cancelled => "CANCELLED",
            TradeStatus::Abandoned => "ABANDONED",
        }
    }

    /// Check if forward play may move this state to `target`. Backward moves
    /// happen only through reverter execution and bypass this check.
    pub fn can_transition_to(&self, target: TradeStatus) -> bool {
        use TradeStatus::*;

        matches!(
            (self, target),
            (NotStarted, Ongoing)
                | (NotStarted, Denied)
                | (Ongoing, Completed)
                | (Ongoing, Cancelled)
                | (Ongoing, Abandoned)
        )
    }

    /// Valid next states for forward play.
    pub fn valid_transitions(&self) -> Vec<TradeStatus> {
        use TradeStatus::*;

        match self {
            NotStarted => vec![Ongoing, Denied],
            Ongoing => vec![Completed, Cancelled, Abandoned],
            Denied | Completed | Cancelled | Abandoned => vec![],
        }
    }

    /// Terminal for forward play; reachable backward only via revert.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TradeStatus::Denied
                | TradeStatus::Completed
                | TradeStatus::Cancelled
                | TradeStatus::Abandoned
        )
    }

    /// States counted by the incomplete-trade threshold scan.
    pub fn is_incomplete(&self) -> bool {
        matches!(
            self,
            TradeStatus::Ongoing | TradeStatus::Abandoned | TradeStatus::Cancelled
        )
    }
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for TradeStatus {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_uppercase().as_str() {
            "NOT_STARTED" => Ok(TradeStatus::NotStarted),
            "DENIED" => Ok(TradeStatus::Denied),
            "ONGOING" => Ok(TradeStatus::Ongoing),
            "COMPLETED" => Ok(TradeStatus::Completed),
            "CANCELLED" => Ok(TradeStatus::Cancelled),
            "ABANDONED" => Ok(TradeStatus::Abandoned),
            _ => Err(format!("Unknown trade status: {}", s)),
        }
    }
}

/// One meeting attached to a trade, with whether both sides have confirmed
/// it occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingSlot {
    pub meeting: MeetingId,
    pub occurred: bool,
}

/// A proposed or active exchange of items between an initiator and a
/// responder, tracked through [`TradeStatus`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    id: TradeId,
    initiator: String,
    responder: String,
    /// Item lent initiator -> responder; `None` makes this a one-way trade.
    initiator_gives: Option<ItemId>,
    /// Item lent responder -> initiator. Always present.
    responder_gives: ItemId,
    permanent: bool,
    status: TradeStatus,
    /// At most one slot for permanent trades, two for temporary ones.
    meetings: Vec<MeetingSlot>,
    completed_at: Option<DateTime<Utc>>,
}

impl Trade {
    pub fn new(
        id: TradeId,
        initiator: impl Into<String>,
        responder: impl Into<String>,
        initiator_gives: Option<ItemId>,
        responder_gives: ItemId,
        permanent: bool,
    ) -> Self {
        Trade {
            id,
            initiator: initiator.into(),
            responder: responder.into(),
            initiator_gives,
            responder_gives,
            permanent,
            status: TradeStatus::NotStarted,
            meetings: Vec::new(),
            completed_at: None,
        }
    }

    pub fn id(&self) -> TradeId {
        self.id
    }

    pub fn username(&self, party: Party) -> &str {
        match party {
            Party::Initiator => &self.initiator,
            Party::Responder => &self.responder,
        }
    }

    /// Which side of this trade `username` is on, if either.
    pub fn party_of(&self, username: &str) -> Option<Party> {
        if username == self.initiator {
            Some(Party::Initiator)
        } else if username == self.responder {
            Some(Party::Responder)
        } else {
            None
        }
    }

    pub fn involves(&self, username: &str) -> bool {
        self.party_of(username).is_some()
    }

    /// Item lent by the given side, if any. One-way trades always have the
    /// initiator slot empty.
    pub fn item_given_by(&self, party: Party) -> Option<ItemId> {
        match party {
            Party::Initiator => self.initiator_gives,
            Party::Responder => Some(self.responder_gives),
        }
    }

    pub fn items(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.initiator_gives
            .into_iter()
            .chain(std::iter::once(self.responder_gives))
    }

    pub fn is_one_way(&self) -> bool {
        self.initiator_gives.is_none()
    }

    pub fn is_permanent(&self) -> bool {
        self.permanent
    }

    pub fn status(&self) -> TradeStatus {
        self.status
    }

    /// Forward transition, validated against the state machine.
    pub(crate) fn transition(&mut self, to: TradeStatus) -> bool {
        if self.status.can_transition_to(to) {
            self.status = to;
            true
        } else {
            false
        }
    }

    /// Unchecked status write for reverter execution.
    pub(crate) fn force_status(&mut self, status: TradeStatus) {
        self.status = status;
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub(crate) fn stamp_completed(&mut self, at: DateTime<Utc>) {
        self.completed_at = Some(at);
    }

    /// Meetings a permanent (one) or temporary (two) trade needs to complete.
    pub fn required_meetings(&self) -> usize {
        if self.permanent {
            1
        } else {
            2
        }
    }

    pub fn meeting_ids(&self) -> Vec<MeetingId> {
        self.meetings.iter().map(|s| s.meeting).collect()
    }

    pub fn meeting_slots(&self) -> &[MeetingSlot] {
        &self.meetings
    }

    /// The meeting currently being arranged or awaited, i.e. the first slot
    /// not yet marked occurred.
    pub fn current_meeting(&self) -> Option<MeetingId> {
        self.meetings
            .iter()
            .find(|s| !s.occurred)
            .map(|s| s.meeting)
    }

    pub fn has_meetings(&self) -> bool {
        !self.meetings.is_empty()
    }

    /// Whether another meeting slot may be attached: the trade must be
    /// ongoing and still below its slot capacity.
    pub fn can_attach_meeting(&self) -> bool {
        self.status == TradeStatus::Ongoing && self.meetings.len() < self.required_meetings()
    }

    pub(crate) fn attach_meeting(&mut self, meeting: MeetingId) -> bool {
        if !self.can_attach_meeting() {
            return false;
        }
        self.meetings.push(MeetingSlot {
            meeting,
            occurred: false,
        });
        true
    }

    pub(crate) fn mark_current_meeting_occurred(&mut self) {
        if let Some(slot) = self.meetings.iter_mut().find(|s| !s.occurred) {
            slot.occurred = true;
        }
    }

    /// True when every required meeting slot is filled and occurred.
    pub fn all_meetings_occurred(&self) -> bool {
        self.meetings.len() == self.required_meetings()
            && self.meetings.iter().all(|s| s.occurred)
    }

    /// Short display line for list views.
    pub fn summary(&self) -> String {
        format!(
            "Trade {}: {} -> {} [{}]",
            self.id, self.initiator, self.responder, self.status
        )
    }
}

impl fmt::Display for Trade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let way = if self.is_one_way() { "one-way" } else { "two-way" };
        let kind = if self.permanent {
            "permanent"
        } else {
            "temporary"
        };
        write!(
            f,
            "Trade {} ({}, {}): initiator {} / responder {}, status {}",
            self.id, way, kind, self.initiator, self.responder, self.status
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_way(id: u64, permanent: bool) -> Trade {
        Trade::new(
            TradeId(id),
            "alice",
            "bob",
            Some(ItemId(10)),
            ItemId(20),
            permanent,
        )
    }

    #[test]
    fn test_valid_transitions() {
        use TradeStatus::*;

        assert!(NotStarted.can_transition_to(Ongoing));
        assert!(NotStarted.can_transition_to(Denied));
        assert!(Ongoing.can_transition_to(Completed));
        assert!(Ongoing.can_transition_to(Cancelled));
        assert!(Ongoing.can_transition_to(Abandoned));

        assert!(!NotStarted.can_transition_to(Completed));
        assert!(!Denied.can_transition_to(Ongoing));
        assert!(!Completed.can_transition_to(Ongoing));
        assert!(!Abandoned.can_transition_to(Completed));
        assert!(!Ongoing.can_transition_to(NotStarted));
    }

    #[test]
    fn test_terminal_states_have_no_forward_moves() {
        for status in [
            TradeStatus::Denied,
            TradeStatus::Completed,
            TradeStatus::Cancelled,
            TradeStatus::Abandoned,
        ] {
            assert!(status.is_terminal());
            assert!(status.valid_transitions().is_empty());
        }
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!(
            TradeStatus::try_from("ongoing").unwrap(),
            TradeStatus::Ongoing
        );
        assert_eq!(
            TradeStatus::try_from("NOT_STARTED").unwrap(),
            TradeStatus::NotStarted
        );
        assert!(TradeStatus::try_from("PENDING").is_err());
    }

    #[test]
    fn test_one_way_has_empty_initiator_slot() {
        let trade = Trade::new(TradeId(1), "alice", "bob", None, ItemId(20), true);
        assert!(trade.is_one_way());
        assert_eq!(trade.item_given_by(Party::Initiator), None);
        assert_eq!(trade.item_given_by(Party::Responder), Some(ItemId(20)));
    }

    #[test]
    fn test_meeting_capacity_permanent_vs_temporary() {
        let mut perm = two_way(1, true);
        perm.transition(TradeStatus::Ongoing);
        assert!(perm.attach_meeting(MeetingId(1)));
        assert!(!perm.attach_meeting(MeetingId(2)));

        let mut temp = two_way(2, false);
        temp.transition(TradeStatus::Ongoing);
        assert!(temp.attach_meeting(MeetingId(1)));
        assert!(temp.attach_meeting(MeetingId(2)));
        assert!(!temp.attach_meeting(MeetingId(3)));
    }

    #[test]
    fn test_no_meeting_before_ongoing() {
        let mut trade = two_way(1, false);
        assert!(!trade.attach_meeting(MeetingId(1)));
    }

    #[test]
    fn test_current_meeting_tracks_first_unoccurred() {
        let mut trade = two_way(1, false);
        trade.transition(TradeStatus::Ongoing);
        trade.attach_meeting(MeetingId(7));
        assert_eq!(trade.current_meeting(), Some(MeetingId(7)));
        trade.mark_current_meeting_occurred();
        assert_eq!(trade.current_meeting(), None);
        trade.attach_meeting(MeetingId(8));
        assert_eq!(trade.current_meeting(), Some(MeetingId(8)));
        trade.mark_current_meeting_occurred();
        assert!(trade.all_meetings_occurred());
    }

    #[test]
    fn test_party_of() {
        let trade = two_way(1, false);
        assert_eq!(trade.party_of("alice"), Some(Party::Initiator));
        assert_eq!(trade.party_of("bob"), Some(Party::Responder));
        assert_eq!(trade.party_of("mallory"), None);
    }
}
