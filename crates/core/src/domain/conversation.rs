use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::lead::{BusinessId, InquiryType, LeadId, Timeline};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    Lead,
    Ai,
    Agent,
}

impl Sender {
    pub fn direction(&self) -> Direction {
        match self {
            Self::Lead => Direction::Inbound,
            Self::Ai | Self::Agent => Direction::Outbound,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lead => "lead",
            Self::Ai => "ai",
            Self::Agent => "agent",
        }
    }
}

impl FromStr for Sender {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "lead" => Ok(Self::Lead),
            "ai" => Ok(Self::Ai),
            "agent" => Ok(Self::Agent),
            other => Err(DomainError::unrecognized("sender", other)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }
}

/// Communicative purpose of a single inbound message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    Inquiry,
    Budget,
    Location,
    Appointment,
    Urgency,
    Confirmation,
    Rejection,
    Question,
    General,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::Inquiry => "inquiry",
            Self::Budget => "budget",
            Self::Location => "location",
            Self::Appointment => "appointment",
            Self::Urgency => "urgency",
            Self::Confirmation => "confirmation",
            Self::Rejection => "rejection",
            Self::Question => "question",
            Self::General => "general",
        }
    }
}

/// Facts parsed out of one message. Every field is independent and optional.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedEntities {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub budget: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<Timeline>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inquiry_type: Option<InquiryType>,
}

impl ExtractedEntities {
    pub fn is_empty(&self) -> bool {
        self.budget.is_none()
            && self.property_type.is_none()
            && self.timeline.is_none()
            && self.inquiry_type.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnMetadata {
    pub intent: Intent,
    pub entities: ExtractedEntities,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: TurnId,
    pub lead_id: LeadId,
    pub business_id: BusinessId,
    pub channel: String,
    pub sender: Sender,
    pub direction: Direction,
    pub message: Option<String>,
    pub voice_transcript: Option<String>,
    pub voice_recording_url: Option<String>,
    pub metadata: Option<TurnMetadata>,
    /// Strictly increasing per lead; assigned by the store on append.
    pub sequence: i64,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    /// Text usable as conversational context: message, else transcript, else empty.
    pub fn context_text(&self) -> &str {
        self.message
            .as_deref()
            .filter(|text| !text.is_empty())
            .or_else(|| self.voice_transcript.as_deref().filter(|text| !text.is_empty()))
            .unwrap_or("")
    }
}

/// A turn as submitted for persistence, before the store assigns id and sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewTurn {
    pub lead_id: LeadId,
    pub business_id: BusinessId,
    pub channel: String,
    pub sender: Sender,
    pub message: Option<String>,
    pub voice_transcript: Option<String>,
    pub voice_recording_url: Option<String>,
    pub metadata: Option<TurnMetadata>,
    pub timestamp: DateTime<Utc>,
}

impl NewTurn {
    pub fn text(
        lead_id: LeadId,
        business_id: BusinessId,
        channel: impl Into<String>,
        sender: Sender,
        message: impl Into<String>,
    ) -> Self {
        Self {
            lead_id,
            business_id,
            channel: channel.into(),
            sender,
            message: Some(message.into()),
            voice_transcript: None,
            voice_recording_url: None,
            metadata: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, metadata: TurnMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn direction(&self) -> Direction {
        self.sender.direction()
    }

    pub fn into_turn(self, id: TurnId, sequence: i64) -> ConversationTurn {
        let direction = self.direction();
        ConversationTurn {
            id,
            lead_id: self.lead_id,
            business_id: self.business_id,
            channel: self.channel,
            sender: self.sender,
            direction,
            message: self.message,
            voice_transcript: self.voice_transcript,
            voice_recording_url: self.voice_recording_url,
            metadata: self.metadata,
            sequence,
            timestamp: self.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::{Direction, ExtractedEntities, NewTurn, Sender, TurnId};
    use crate::domain::lead::{BusinessId, LeadId, Timeline};

    #[test]
    fn direction_follows_sender() {
        assert_eq!(Sender::Lead.direction(), Direction::Inbound);
        assert_eq!(Sender::Ai.direction(), Direction::Outbound);
        assert_eq!(Sender::Agent.direction(), Direction::Outbound);
    }

    #[test]
    fn entities_serialize_without_absent_fields() {
        let entities = ExtractedEntities {
            budget: Some(Decimal::new(5_000_000, 0)),
            timeline: Some(Timeline::OneToThreeMonths),
            ..ExtractedEntities::default()
        };

        let value = serde_json::to_value(&entities).expect("serialize entities");
        assert_eq!(value, json!({ "budget": 5_000_000.0, "timeline": "1-3months" }));
    }

    #[test]
    fn context_text_falls_back_to_transcript_then_empty() {
        let mut new_turn = NewTurn::text(
            LeadId("lead-1".to_string()),
            BusinessId("biz-1".to_string()),
            "voice",
            Sender::Lead,
            "",
        );
        new_turn.voice_transcript = Some("looking for a villa".to_string());
        let turn = new_turn.clone().into_turn(TurnId("t-1".to_string()), 1);
        assert_eq!(turn.context_text(), "looking for a villa");

        new_turn.voice_transcript = None;
        new_turn.voice_recording_url = Some("https://example.test/rec.wav".to_string());
        let turn = new_turn.into_turn(TurnId("t-2".to_string()), 2);
        assert_eq!(turn.context_text(), "");
    }
}
