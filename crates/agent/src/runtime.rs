use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use propbot_core::domain::conversation::{ExtractedEntities, Intent, NewTurn, Sender, TurnMetadata};
use propbot_core::domain::lead::{BusinessId, LeadId, QualificationState};
use propbot_core::errors::ApplicationError;
use propbot_core::qualification::{
    state, ActionInput, LeadProfileMerger, LeadScore, LeadScorer, NextAction, NextActionPolicy,
};
use propbot_db::repositories::{ConversationRepository, LeadRepository};

use crate::conversation::{ConversationHistoryWindow, EntityExtractor, IntentClassifier};
use crate::guardrails::{GenerationGuard, GenerationOutcome, GenerationPolicy};
use crate::llm::{CompletionRequest, LlmClient};
use crate::locks::LeadLocks;
use crate::prompt::PromptBuilder;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessMessageRequest {
    pub lead_id: LeadId,
    /// Defaults to the lead's own business when absent.
    pub business_id: Option<BusinessId>,
    pub channel: String,
    pub message: String,
    pub voice_transcript: Option<String>,
    pub voice_recording_url: Option<String>,
    pub correlation_id: String,
}

impl ProcessMessageRequest {
    pub fn text(
        lead_id: impl Into<String>,
        channel: impl Into<String>,
        message: impl Into<String>,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self {
            lead_id: LeadId(lead_id.into()),
            business_id: None,
            channel: channel.into(),
            message: message.into(),
            voice_transcript: None,
            voice_recording_url: None,
            correlation_id: correlation_id.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessMessageResponse {
    pub response: String,
    pub intent: Intent,
    pub entities: ExtractedEntities,
    pub next_action: NextAction,
    pub lead_score: LeadScore,
    pub qualification_state: QualificationState,
    /// The reply is the configured fallback rather than generated text.
    pub degraded: bool,
}

/// Runs one inbound message through understanding, generation and
/// qualification. All collaborators are injected.
pub struct QualificationRuntime {
    leads: Arc<dyn LeadRepository>,
    conversations: Arc<dyn ConversationRepository>,
    generator: GenerationGuard,
    prompts: PromptBuilder,
    classifier: IntentClassifier,
    extractor: EntityExtractor,
    window: ConversationHistoryWindow,
    merger: LeadProfileMerger,
    scorer: LeadScorer,
    actions: NextActionPolicy,
    locks: LeadLocks,
}

impl QualificationRuntime {
    pub fn new(
        leads: Arc<dyn LeadRepository>,
        conversations: Arc<dyn ConversationRepository>,
        llm: Arc<dyn LlmClient>,
        generation: GenerationPolicy,
    ) -> Result<Self, ApplicationError> {
        Ok(Self {
            leads,
            conversations,
            generator: GenerationGuard::new(llm, generation),
            prompts: PromptBuilder::new()?,
            classifier: IntentClassifier::new(),
            extractor: EntityExtractor::new(),
            window: ConversationHistoryWindow::default(),
            merger: LeadProfileMerger::new(),
            scorer: LeadScorer::new(),
            actions: NextActionPolicy::new(),
            locks: LeadLocks::new(),
        })
    }

    /// Nothing is written unless a reply exists: a missing lead or a
    /// permanent generation failure leaves the store untouched.
    pub async fn process_message(
        &self,
        request: ProcessMessageRequest,
    ) -> Result<ProcessMessageResponse, ApplicationError> {
        let correlation_id = request.correlation_id.as_str();
        let _guard = self.locks.acquire(&request.lead_id).await;

        let lead = self.leads.find_by_id(&request.lead_id).await?.ok_or_else(|| {
            ApplicationError::NotFound { entity: "lead", id: request.lead_id.0.clone() }
        })?;
        let recent = self
            .conversations
            .recent_for_lead(&lead.id, u32::try_from(self.window.size()).unwrap_or(u32::MAX))
            .await?;

        let text = request.message.as_str();
        let (intent, entities) = tokio::join!(async { self.classifier.classify(text) }, async {
            self.extractor.extract(text)
        });
        let update = self.merger.merge(&entities, Utc::now());

        let completion = CompletionRequest {
            system_prompt: self.prompts.build(&lead)?,
            history: self.window.build(&recent),
            message: request.message.clone(),
        };
        let outcome = match self.generator.generate(&completion, correlation_id).await {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(
                    event_name = "qualification.message.generation_failed",
                    correlation_id,
                    lead_id = %lead.id,
                    error = %error,
                    "reply generation failed, nothing persisted"
                );
                return Err(error.into());
            }
        };
        let degraded = outcome.is_degraded();
        let attempts = outcome.attempts();
        let reply = match outcome {
            GenerationOutcome::Generated { reply, .. } => reply,
            GenerationOutcome::Degraded { reply, reason_code, .. } => {
                info!(
                    event_name = "qualification.message.degraded",
                    correlation_id,
                    lead_id = %lead.id,
                    reason_code,
                    attempts,
                    "replying with fallback text"
                );
                reply
            }
        };

        let profile = if update.is_empty() {
            lead.clone()
        } else {
            let updated = self.leads.apply_update(&lead.id, &update).await?;
            info!(
                event_name = "qualification.profile.updated",
                correlation_id,
                lead_id = %lead.id,
                fields = ?update.changed_fields(),
                "lead profile updated from message"
            );
            updated
        };

        let business_id = request.business_id.clone().unwrap_or_else(|| lead.business_id.clone());
        let mut inbound = NewTurn::text(
            lead.id.clone(),
            business_id.clone(),
            request.channel.clone(),
            Sender::Lead,
            request.message.clone(),
        )
        .with_metadata(TurnMetadata { intent, entities: entities.clone() });
        inbound.voice_transcript = request.voice_transcript.clone();
        inbound.voice_recording_url = request.voice_recording_url.clone();
        let outbound = NewTurn::text(
            lead.id.clone(),
            business_id,
            request.channel.clone(),
            Sender::Ai,
            reply.clone(),
        );
        self.conversations.append(vec![inbound, outbound]).await?;

        let turn_count = self.conversations.count_for_lead(&lead.id).await?;
        let score = self.scorer.score(&profile, turn_count);
        let next_action = self.actions.decide(&ActionInput {
            score: score.score,
            intent,
            entities: &entities,
            profile: &profile,
        });
        let transition = state::transition(&profile, next_action, turn_count);
        self.leads.record_score(&lead.id, score, transition.to).await?;

        if transition.changed() {
            info!(
                event_name = "qualification.state.changed",
                correlation_id,
                lead_id = %lead.id,
                from = transition.from.as_str(),
                to = transition.to.as_str(),
                "qualification state changed"
            );
        }
        info!(
            event_name = "qualification.message.processed",
            correlation_id,
            lead_id = %lead.id,
            intent = intent.as_str(),
            next_action = next_action.as_str(),
            score = score.score,
            temperature = score.temperature.as_str(),
            turn_count,
            degraded,
            "message processed"
        );

        Ok(ProcessMessageResponse {
            response: reply,
            intent,
            entities,
            next_action,
            lead_score: score,
            qualification_state: transition.to,
            degraded,
        })
    }
}
