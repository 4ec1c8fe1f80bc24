use once_cell::sync::Lazy;
use regex::Regex;

use propbot_core::domain::conversation::Intent;

/// Ordered intent table. Messages routinely match several rows, so the
/// first row that matches decides and the order here is part of the contract.
static INTENT_PATTERNS: Lazy<Vec<(Intent, Regex)>> = Lazy::new(|| {
    [
        (
            Intent::Greeting,
            r"(?i)^\s*(hi|hello|hey|good morning|good afternoon|good evening|namaste)\b",
        ),
        (
            Intent::Inquiry,
            r"(?i)\b(interested|looking for|want to buy|want to rent|needs?|needed|search\w*)\b",
        ),
        (
            Intent::Budget,
            r"(?i)\b(budget\w*|afford\w*|pric\w*|cost\w*|spend\w*|rs)\b|(lakhs?|lacs?|crores?)\b|₹",
        ),
        (
            Intent::Location,
            concat!(
                r"(?i)\b(locations?|areas?|locality|near(by)?|apartments?|villas?|plots?|where)\b",
                r"|bhk\b",
            ),
        ),
        (
            Intent::Appointment,
            concat!(
                r"(?i)\b(visit\w*|see|schedul\w*|meetings?|appointments?|viewings?|show\w*",
                r"|when can)\b",
            ),
        ),
        (
            Intent::Urgency,
            r"(?i)\b(urgent(ly)?|immediate(ly)?|asap|soon|today|tomorrow|this week)\b",
        ),
        (
            Intent::Confirmation,
            r"(?i)\b(yes|yeah|sure|okay|ok|confirm\w*|book\w*|sounds good)\b",
        ),
        (Intent::Rejection, r"(?i)\b(no|not interested|maybe later|too expensive|not now)\b"),
        (Intent::Question, r"(?i)\b(what|when|where|how|why|which)\b"),
    ]
    .into_iter()
    .map(|(intent, pattern)| (intent, Regex::new(pattern).expect("intent pattern must compile")))
    .collect()
});

#[derive(Clone, Debug, Default)]
pub struct IntentClassifier;

impl IntentClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Total over any input; text matching no row is `general`.
    pub fn classify(&self, message: &str) -> Intent {
        INTENT_PATTERNS
            .iter()
            .find(|(_, pattern)| pattern.is_match(message))
            .map(|(intent, _)| *intent)
            .unwrap_or(Intent::General)
    }

    /// Every label whose pattern matches, in table order. Used by `analyze`.
    pub fn matching(&self, message: &str) -> Vec<Intent> {
        INTENT_PATTERNS
            .iter()
            .filter(|(_, pattern)| pattern.is_match(message))
            .map(|(intent, _)| *intent)
            .collect()
    }
}
