use async_trait::async_trait;
use thiserror::Error;

use propbot_core::domain::conversation::{ConversationTurn, NewTurn};
use propbot_core::domain::lead::{LeadId, LeadProfile, QualificationState};
use propbot_core::errors::ApplicationError;
use propbot_core::qualification::{LeadProfileUpdate, LeadScore};

pub mod conversation;
pub mod lead;
pub mod memory;

pub use conversation::SqlConversationRepository;
pub use lead::SqlLeadRepository;
pub use memory::{InMemoryConversationRepository, InMemoryLeadRepository};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("lead `{0}` not found")]
    LeadNotFound(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::LeadNotFound(id) => Self::NotFound { entity: "lead", id },
            other => Self::Persistence(other.to_string()),
        }
    }
}

#[async_trait]
pub trait LeadRepository: Send + Sync {
    async fn find_by_id(&self, id: &LeadId) -> Result<Option<LeadProfile>, RepositoryError>;

    async fn save(&self, lead: LeadProfile) -> Result<(), RepositoryError>;

    /// Writes only the fields present in `update` and returns the stored profile.
    async fn apply_update(
        &self,
        id: &LeadId,
        update: &LeadProfileUpdate,
    ) -> Result<LeadProfile, RepositoryError>;

    async fn record_score(
        &self,
        id: &LeadId,
        score: LeadScore,
        state: QualificationState,
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Appends turns in order, all or nothing. Each turn receives the next
    /// sequence number for its lead.
    async fn append(&self, turns: Vec<NewTurn>) -> Result<Vec<ConversationTurn>, RepositoryError>;

    /// Most recent turns for a lead, highest sequence first.
    async fn recent_for_lead(
        &self,
        lead_id: &LeadId,
        limit: u32,
    ) -> Result<Vec<ConversationTurn>, RepositoryError>;

    async fn count_for_lead(&self, lead_id: &LeadId) -> Result<u64, RepositoryError>;
}
