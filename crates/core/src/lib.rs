pub mod config;
pub mod domain;
pub mod errors;
pub mod qualification;

pub use domain::conversation::{
    ConversationTurn, Direction, ExtractedEntities, Intent, NewTurn, Sender, TurnId, TurnMetadata,
};
pub use domain::lead::{
    BudgetRange, BusinessId, InquiryType, LeadId, LeadProfile, QualificationState, Temperature,
    Timeline,
};
pub use errors::{ApplicationError, DomainError, InterfaceError, UpstreamFailure};
pub use qualification::{
    ActionInput, LeadProfileMerger, LeadProfileUpdate, LeadScore, LeadScorer, NextAction,
    NextActionPolicy,
};
