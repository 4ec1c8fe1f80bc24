use crate::domain::lead::{LeadProfile, QualificationState};
use crate::qualification::next_action::NextAction;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StateTransition {
    pub from: QualificationState,
    pub to: QualificationState,
}

impl StateTransition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// Derives the qualification state after a processed message.
///
/// `Scheduling` once an appointment is being booked, `Qualified` when budget,
/// location and property type are all known, `Collecting` as soon as any
/// requirement or turn exists, otherwise `New`.
pub fn derive_state(
    profile: &LeadProfile,
    next_action: NextAction,
    turn_count: u64,
) -> QualificationState {
    if next_action == NextAction::ScheduleAppointment {
        QualificationState::Scheduling
    } else if profile.has_core_requirements() {
        QualificationState::Qualified
    } else if profile.has_any_requirement() || turn_count > 0 {
        QualificationState::Collecting
    } else {
        QualificationState::New
    }
}

pub fn transition(
    profile: &LeadProfile,
    next_action: NextAction,
    turn_count: u64,
) -> StateTransition {
    StateTransition {
        from: profile.qualification_state,
        to: derive_state(profile, next_action, turn_count),
    }
}
