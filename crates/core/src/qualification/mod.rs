//! Deterministic qualification rules.
//!
//! Everything here is a pure function of its inputs: the conversational
//! layer may phrase replies however it likes, but profile merges, scores,
//! temperatures and next actions are decided only by this module.

pub mod merge;
pub mod next_action;
pub mod scoring;
pub mod state;

pub use merge::{LeadProfileMerger, LeadProfileUpdate};
pub use next_action::{ActionInput, NextAction, NextActionPolicy};
pub use scoring::{LeadScore, LeadScorer, ScoringWeights};
pub use state::{derive_state, transition, StateTransition};
