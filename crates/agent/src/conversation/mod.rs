//! Text understanding for inbound lead messages.
//!
//! Classification and extraction are total functions: malformed or empty
//! text yields `general` and an empty entity set, never an error.

pub mod entities;
pub mod history;
pub mod intent;

pub use entities::EntityExtractor;
pub use history::ConversationHistoryWindow;
pub use intent::IntentClassifier;
