use super::ids::MeetingId;
use super::party::{Party, PerParty};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A location/time proposal attached to an ongoing trade. Carries the two
/// nested handshakes: arrangement confirmation, then occurrence confirmation,
/// each tracked per side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meeting {
    id: MeetingId,
    location: String,
    time: DateTime<Utc>,
    times_edited: PerParty<u32>,
    /// Arrangement-confirmed flags. An edit resets the counterpart's flag,
    /// opening a new confirmation round.
    arranged: PerParty<bool>,
    /// Occurrence-confirmed flags; only meaningful once fully arranged.
    occurred: PerParty<bool>,
}

impl Meeting {
    pub fn new(id: MeetingId, location: impl Into<String>, time: DateTime<Utc>) -> Self {
        Meeting {
            id,
            location: location.into(),
            time,
            times_edited: PerParty::splat(0),
            arranged: PerParty::splat(false),
            occurred: PerParty::splat(false),
        }
    }

    pub fn id(&self) -> MeetingId {
        self.id
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub(crate) fn set_location(&mut self, location: impl Into<String>) {
        self.location = location.into();
    }

    pub(crate) fn set_time(&mut self, time: DateTime<Utc>) {
        self.time = time;
    }

    pub fn times_edited(&self, party: Party) -> u32 {
        self.times_edited[party]
    }

    pub(crate) fn set_times_edited(&mut self, party: Party, value: u32) {
        self.times_edited[party] = value;
    }

    pub fn arranged_by(&self, party: Party) -> bool {
        self.arranged[party]
    }

    pub(crate) fn set_arranged(&mut self, party: Party, value: bool) {
        self.arranged[party] = value;
    }

    pub fn fully_arranged(&self) -> bool {
        self.arranged.both()
    }

    pub fn occurred_by(&self, party: Party) -> bool {
        self.occurred[party]
    }

    pub(crate) fn set_occurred(&mut self, party: Party, value: bool) {
        self.occurred[party] = value;
    }

    pub fn occurrence_confirmed_by_either(&self) -> bool {
        self.occurred.either()
    }

    pub fn fully_occurred(&self) -> bool {
        self.occurred.both()
    }
}

impl fmt::Display for Meeting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = if self.fully_occurred() {
            "occurred"
        } else if self.fully_arranged() {
            "arranged, awaiting occurrence"
        } else {
            "arranging"
        };
        write!(
            f,
            "Meeting {} at {} on {} ({})",
            self.id, self.location, self.time, phase
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn meeting() -> Meeting {
        let time = Utc.with_ymd_and_hms(2026, 9, 1, 15, 0, 0).unwrap();
        Meeting::new(MeetingId(1), "Library", time)
    }

    #[test]
    fn test_fresh_meeting_is_unconfirmed() {
        let m = meeting();
        assert!(!m.fully_arranged());
        assert!(!m.fully_occurred());
        assert_eq!(m.times_edited(Party::Initiator), 0);
        assert_eq!(m.times_edited(Party::Responder), 0);
    }

    #[test]
    fn test_handshake_flags_are_per_side() {
        let mut m = meeting();
        m.set_arranged(Party::Initiator, true);
        assert!(m.arranged_by(Party::Initiator));
        assert!(!m.arranged_by(Party::Responder));
        assert!(!m.fully_arranged());
        m.set_arranged(Party::Responder, true);
        assert!(m.fully_arranged());

        m.set_occurred(Party::Responder, true);
        assert!(m.occurrence_confirmed_by_either());
        assert!(!m.fully_occurred());
        m.set_occurred(Party::Initiator, true);
        assert!(m.fully_occurred());
    }
}
