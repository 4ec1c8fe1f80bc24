use serde::{Deserialize, Serialize};

use crate::domain::conversation::{ExtractedEntities, Intent};
use crate::domain::lead::{LeadProfile, Temperature, Timeline};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    ScheduleAppointment,
    EscalateToAgent,
    OfferAppointment,
    CollectInfo,
}

impl NextAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScheduleAppointment => "schedule_appointment",
            Self::EscalateToAgent => "escalate_to_agent",
            Self::OfferAppointment => "offer_appointment",
            Self::CollectInfo => "collect_info",
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ActionInput<'a> {
    pub score: u8,
    pub intent: Intent,
    pub entities: &'a ExtractedEntities,
    pub profile: &'a LeadProfile,
}

type ActionRule = (NextAction, fn(&ActionInput<'_>) -> bool);

/// Evaluated top to bottom; the first matching rule decides.
const RULES: &[ActionRule] = &[
    (NextAction::ScheduleAppointment, wants_appointment_while_hot),
    (NextAction::EscalateToAgent, is_urgent),
    (NextAction::OfferAppointment, has_core_requirements),
];

fn wants_appointment_while_hot(input: &ActionInput<'_>) -> bool {
    input.score >= Temperature::HOT_THRESHOLD && input.intent == Intent::Appointment
}

fn is_urgent(input: &ActionInput<'_>) -> bool {
    input.entities.timeline == Some(Timeline::Immediate) || input.intent == Intent::Urgency
}

fn has_core_requirements(input: &ActionInput<'_>) -> bool {
    input.profile.has_core_requirements()
}

#[derive(Clone, Debug, Default)]
pub struct NextActionPolicy;

impl NextActionPolicy {
    pub fn new() -> Self {
        Self
    }

    pub fn decide(&self, input: &ActionInput<'_>) -> NextAction {
        RULES
            .iter()
            .find(|(_, applies)| applies(input))
            .map(|(action, _)| *action)
            .unwrap_or(NextAction::CollectInfo)
    }
}
