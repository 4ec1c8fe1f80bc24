use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use propbot_core::domain::conversation::{ConversationTurn, NewTurn, TurnId};
use propbot_core::domain::lead::{LeadId, LeadProfile, QualificationState};
use propbot_core::qualification::{LeadProfileUpdate, LeadScore};

use super::{ConversationRepository, LeadRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryLeadRepository {
    leads: RwLock<HashMap<String, LeadProfile>>,
}

#[async_trait::async_trait]
impl LeadRepository for InMemoryLeadRepository {
    async fn find_by_id(&self, id: &LeadId) -> Result<Option<LeadProfile>, RepositoryError> {
        let leads = self.leads.read().await;
        Ok(leads.get(&id.0).cloned())
    }

    async fn save(&self, lead: LeadProfile) -> Result<(), RepositoryError> {
        let mut leads = self.leads.write().await;
        leads.insert(lead.id.0.clone(), lead);
        Ok(())
    }

    async fn apply_update(
        &self,
        id: &LeadId,
        update: &LeadProfileUpdate,
    ) -> Result<LeadProfile, RepositoryError> {
        let mut leads = self.leads.write().await;
        let lead = leads.get_mut(&id.0).ok_or_else(|| RepositoryError::LeadNotFound(id.0.clone()))?;
        update.apply_to(lead);
        Ok(lead.clone())
    }

    async fn record_score(
        &self,
        id: &LeadId,
        score: LeadScore,
        state: QualificationState,
    ) -> Result<(), RepositoryError> {
        let mut leads = self.leads.write().await;
        let lead = leads.get_mut(&id.0).ok_or_else(|| RepositoryError::LeadNotFound(id.0.clone()))?;
        lead.score = score.score;
        lead.temperature = score.temperature;
        lead.qualification_state = state;
        lead.updated_at = Utc::now();
        Ok(())
    }
}

/// Turns per lead, kept in append order.
#[derive(Default)]
pub struct InMemoryConversationRepository {
    turns: RwLock<HashMap<String, Vec<ConversationTurn>>>,
}

#[async_trait::async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn append(&self, turns: Vec<NewTurn>) -> Result<Vec<ConversationTurn>, RepositoryError> {
        let mut store = self.turns.write().await;
        let mut stored = Vec::with_capacity(turns.len());

        for turn in turns {
            let history = store.entry(turn.lead_id.0.clone()).or_default();
            let sequence = history.last().map(|last| last.sequence).unwrap_or(0) + 1;
            let turn = turn.into_turn(TurnId(Uuid::new_v4().to_string()), sequence);
            history.push(turn.clone());
            stored.push(turn);
        }

        Ok(stored)
    }

    async fn recent_for_lead(
        &self,
        lead_id: &LeadId,
        limit: u32,
    ) -> Result<Vec<ConversationTurn>, RepositoryError> {
        let store = self.turns.read().await;
        Ok(store
            .get(&lead_id.0)
            .map(|history| history.iter().rev().take(limit as usize).cloned().collect())
            .unwrap_or_default())
    }

    async fn count_for_lead(&self, lead_id: &LeadId) -> Result<u64, RepositoryError> {
        let store = self.turns.read().await;
        Ok(store.get(&lead_id.0).map(|history| history.len() as u64).unwrap_or(0))
    }
}
