//! Conversational side of PropBot.
//!
//! Turns an inbound lead message into a reply and a qualification decision:
//! - `conversation` classifies intent, extracts entities and windows history
//! - `prompt` renders the system instruction from the lead snapshot
//! - `llm` talks to the reply generator (OpenAI-compatible or Ollama)
//! - `guardrails` bounds generation with deadlines, retries and a fallback
//! - `runtime` orchestrates one message under a per-lead lock
//!
//! The model only phrases replies. Profile merges, scores, states and next
//! actions come from `propbot_core::qualification`.

pub mod conversation;
pub mod guardrails;
pub mod llm;
pub mod locks;
pub mod prompt;
pub mod runtime;

pub use conversation::{ConversationHistoryWindow, EntityExtractor, IntentClassifier};
pub use guardrails::{GenerationGuard, GenerationOutcome, GenerationPolicy};
pub use llm::{build_client, ChatMessage, ChatRole, CompletionRequest, LlmClient, LlmError};
pub use locks::LeadLocks;
pub use prompt::PromptBuilder;
pub use runtime::{ProcessMessageRequest, ProcessMessageResponse, QualificationRuntime};
