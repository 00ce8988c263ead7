//! Meeting negotiation.
//!
//! Owns every [`Meeting`] and runs the two nested handshakes: both sides
//! confirm the arrangement (location and time), then both sides confirm the
//! meeting actually took place. Editing reopens the arrangement round for
//! the counterpart.

use crate::domain::{IdCounter, Meeting, MeetingId, Party};
use crate::error::MeetingError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Pre-image captured by a successful edit, enough to undo it later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditUndo {
    pub old_location: String,
    pub old_time: DateTime<Utc>,
    /// Whether the counterpart had confirmed the arrangement before the edit
    /// reset their flag.
    pub counterpart_was_arranged: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MeetingCoordinator {
    meetings: BTreeMap<MeetingId, Meeting>,
    ids: IdCounter,
}

impl MeetingCoordinator {
    pub fn new() -> Self {
        MeetingCoordinator::default()
    }

    pub fn meeting(&self, id: MeetingId) -> Option<&Meeting> {
        self.meetings.get(&id)
    }

    pub(crate) fn meeting_mut(&mut self, id: MeetingId) -> Option<&mut Meeting> {
        self.meetings.get_mut(&id)
    }

    pub fn fully_arranged(&self, id: MeetingId) -> bool {
        self.meetings.get(&id).is_some_and(Meeting::fully_arranged)
    }

    pub fn fully_occurred(&self, id: MeetingId) -> bool {
        self.meetings.get(&id).is_some_and(Meeting::fully_occurred)
    }

    fn checked(&mut self, id: MeetingId) -> Result<&mut Meeting, MeetingError> {
        self.meetings
            .get_mut(&id)
            .ok_or(MeetingError::NotFound { meeting: id })
    }

    /// Creates a meeting proposal. The proposal counts as the proposer's
    /// first edit and confirms their side of the arrangement.
    pub fn propose(
        &mut self,
        location: impl Into<String>,
        time: DateTime<Utc>,
        proposer: Party,
    ) -> MeetingId {
        let id = MeetingId(self.ids.next());
        let mut meeting = Meeting::new(id, location, time);
        meeting.set_arranged(proposer, true);
        meeting.set_times_edited(proposer, 1);
        info!(meeting = %id, proposer = %proposer, "meeting proposed");
        self.meetings.insert(id, meeting);
        id
    }

    /// Rewrites location and time, flipping the arrangement round: the
    /// editor's flag turns on, the counterpart's off. Refused once the editor
    /// has confirmed the current round, and once their edit count passes
    /// `max_edits` (the count includes the initial proposal, so up to
    /// `max_edits + 1` writes land before the limit bites).
    pub fn edit(
        &mut self,
        id: MeetingId,
        location: impl Into<String>,
        time: DateTime<Utc>,
        editor: Party,
        max_edits: u32,
    ) -> Result<EditUndo, MeetingError> {
        let meeting = self.checked(id)?;
        if meeting.arranged_by(editor) {
            return Err(MeetingError::AlreadyConfirmed);
        }
        let edits = meeting.times_edited(editor);
        if edits > max_edits {
            return Err(MeetingError::EditLimit {
                edits,
                limit: max_edits,
            });
        }
        let undo = EditUndo {
            old_location: meeting.location().to_string(),
            old_time: meeting.time(),
            counterpart_was_arranged: meeting.arranged_by(editor.other()),
        };
        meeting.set_location(location);
        meeting.set_time(time);
        meeting.set_times_edited(editor, edits + 1);
        meeting.set_arranged(editor, true);
        meeting.set_arranged(editor.other(), false);
        debug!(meeting = %id, editor = %editor, edits = edits + 1, "meeting edited");
        Ok(undo)
    }

    /// Confirms the arrangement for `actor`. Only valid while the actor has
    /// not confirmed this round and the counterpart has, so a side never
    /// confirms its own proposal.
    pub fn confirm_arrangement(&mut self, id: MeetingId, actor: Party) -> Result<(), MeetingError> {
        let meeting = self.checked(id)?;
        if meeting.arranged_by(actor) {
            return Err(MeetingError::AlreadyConfirmed);
        }
        if !meeting.arranged_by(actor.other()) {
            return Err(MeetingError::NothingToConfirm);
        }
        meeting.set_arranged(actor, true);
        info!(meeting = %id, actor = %actor, "arrangement confirmed");
        Ok(())
    }

    /// Confirms that the meeting took place, for `actor`. Requires a fully
    /// arranged meeting. Returns true once both sides have confirmed.
    pub fn confirm_occurrence(&mut self, id: MeetingId, actor: Party) -> Result<bool, MeetingError> {
        let meeting = self.checked(id)?;
        if !meeting.fully_arranged() {
            return Err(MeetingError::NotArranged { meeting: id });
        }
        if meeting.occurred_by(actor) {
            return Err(MeetingError::OccurrenceAlreadyConfirmed);
        }
        meeting.set_occurred(actor, true);
        info!(meeting = %id, actor = %actor, "occurrence confirmed");
        Ok(meeting.fully_occurred())
    }

    /// Meetings that were fully arranged, never fully confirmed to have
    /// occurred, and whose agreed time lies more than `late_days` in the
    /// past.
    pub fn late_meeting_ids(&self, now: DateTime<Utc>, late_days: i64) -> Vec<MeetingId> {
        self.meetings
            .values()
            .filter(|m| {
                m.fully_arranged()
                    && !m.fully_occurred()
                    && now > m.time() + Duration::days(late_days)
            })
            .map(|m| m.id())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_proposal_confirms_proposer_side() {
        let mut c = MeetingCoordinator::new();
        let id = c.propose("Library", at(1, 15), Party::Initiator);
        let m = c.meeting(id).unwrap();
        assert!(m.arranged_by(Party::Initiator));
        assert!(!m.arranged_by(Party::Responder));
        assert_eq!(m.times_edited(Party::Initiator), 1);
    }

    #[test]
    fn test_cannot_confirm_own_proposal() {
        let mut c = MeetingCoordinator::new();
        let id = c.propose("Library", at(1, 15), Party::Initiator);
        assert_eq!(
            c.confirm_arrangement(id, Party::Initiator),
            Err(MeetingError::AlreadyConfirmed)
        );
        assert!(c.confirm_arrangement(id, Party::Responder).is_ok());
        assert!(c.meeting(id).unwrap().fully_arranged());
    }

    #[test]
    fn test_edit_reopens_counterpart_round() {
        let mut c = MeetingCoordinator::new();
        let id = c.propose("Library", at(1, 15), Party::Initiator);
        let undo = c
            .edit(id, "Cafe", at(2, 10), Party::Responder, 3)
            .unwrap();
        assert_eq!(undo.old_location, "Library");
        assert_eq!(undo.old_time, at(1, 15));
        assert!(undo.counterpart_was_arranged);

        let m = c.meeting(id).unwrap();
        assert_eq!(m.location(), "Cafe");
        assert!(m.arranged_by(Party::Responder));
        assert!(!m.arranged_by(Party::Initiator));

        // having edited, the responder's round is confirmed
        assert_eq!(
            c.edit(id, "Park", at(3, 10), Party::Responder, 3),
            Err(MeetingError::AlreadyConfirmed)
        );
    }

    #[test]
    fn test_edit_limit_boundary_is_inclusive() {
        let mut c = MeetingCoordinator::new();
        let max = 3;
        let id = c.propose("Library", at(1, 15), Party::Initiator);

        // alternate edits; the initiator's counter starts at 1 from the
        // proposal, edits still land while the count sits at the limit, and
        // the attempt at count 4 breaks it
        for round in 0..=max {
            c.edit(id, "Cafe", at(2, 10), Party::Responder, max).unwrap();
            let outcome = c.edit(id, "Library", at(1, 15), Party::Initiator, max);
            if round < max {
                outcome.unwrap();
            } else {
                assert_eq!(
                    outcome,
                    Err(MeetingError::EditLimit {
                        edits: max + 1,
                        limit: max
                    })
                );
            }
        }
    }

    #[test]
    fn test_occurrence_requires_full_arrangement() {
        let mut c = MeetingCoordinator::new();
        let id = c.propose("Library", at(1, 15), Party::Initiator);
        assert_eq!(
            c.confirm_occurrence(id, Party::Initiator),
            Err(MeetingError::NotArranged { meeting: id })
        );
        c.confirm_arrangement(id, Party::Responder).unwrap();

        assert!(!c.confirm_occurrence(id, Party::Initiator).unwrap());
        assert_eq!(
            c.confirm_occurrence(id, Party::Initiator),
            Err(MeetingError::OccurrenceAlreadyConfirmed)
        );
        assert!(c.confirm_occurrence(id, Party::Responder).unwrap());
        assert!(c.meeting(id).unwrap().fully_occurred());
    }

    #[test]
    fn test_late_meetings() {
        let mut c = MeetingCoordinator::new();
        let arranged = c.propose("Library", at(1, 15), Party::Initiator);
        c.confirm_arrangement(arranged, Party::Responder).unwrap();
        let unarranged = c.propose("Cafe", at(1, 15), Party::Initiator);

        let now = at(9, 15);
        let late = c.late_meeting_ids(now, 7);
        assert_eq!(late, vec![arranged]);
        assert!(!late.contains(&unarranged));

        // exactly at the boundary is not yet late
        assert!(c.late_meeting_ids(at(8, 15), 7).is_empty());
    }
}
