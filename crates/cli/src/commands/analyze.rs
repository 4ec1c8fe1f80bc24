use chrono::Utc;
use propbot_agent::{EntityExtractor, IntentClassifier};
use propbot_core::domain::conversation::{ExtractedEntities, Intent};
use propbot_core::domain::lead::{BusinessId, LeadId, LeadProfile, QualificationState};
use propbot_core::qualification::{
    state, ActionInput, LeadProfileMerger, LeadScore, LeadScorer, NextAction, NextActionPolicy,
};
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Debug, Serialize)]
struct AnalyzeReport {
    command: &'static str,
    status: &'static str,
    intent: Intent,
    matched_intents: Vec<Intent>,
    entities: ExtractedEntities,
    updated_fields: Vec<&'static str>,
    lead_score: LeadScore,
    next_action: NextAction,
    qualification_state: QualificationState,
}

/// Runs the deterministic half of message processing against a blank lead.
/// Nothing is read from or written to the database and no LLM is called.
pub fn run(message: &str, turns: u64, with_phone: bool) -> CommandResult {
    if message.trim().is_empty() {
        return CommandResult::failure(
            "analyze",
            "invalid_input",
            "message must not be empty",
            2,
        );
    }

    let report = analyze(message, turns, with_phone);
    match serde_json::to_string_pretty(&report) {
        Ok(output) => CommandResult { exit_code: 0, output },
        Err(error) => CommandResult::failure("analyze", "serialization", error.to_string(), 1),
    }
}

fn analyze(message: &str, turns: u64, with_phone: bool) -> AnalyzeReport {
    let classifier = IntentClassifier::new();
    let intent = classifier.classify(message);
    let entities = EntityExtractor::new().extract(message);

    let mut profile =
        LeadProfile::new(LeadId("analyze".to_string()), BusinessId("local".to_string()), "");
    if !with_phone {
        profile.phone = None;
    }
    let update = LeadProfileMerger::new().merge(&entities, Utc::now());
    update.apply_to(&mut profile);

    let lead_score = LeadScorer::new().score(&profile, turns);
    let next_action = NextActionPolicy::new().decide(&ActionInput {
        score: lead_score.score,
        intent,
        entities: &entities,
        profile: &profile,
    });
    let transition = state::transition(&profile, next_action, turns);

    AnalyzeReport {
        command: "analyze",
        status: "ok",
        intent,
        matched_intents: classifier.matching(message),
        updated_fields: update.changed_fields(),
        entities,
        lead_score,
        next_action,
        qualification_state: transition.to,
    }
}
