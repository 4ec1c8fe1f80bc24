use propbot_core::domain::conversation::{ConversationTurn, Sender};

use crate::llm::{ChatMessage, ChatRole};

/// Bounded, chronologically ordered context handed to the generator.
#[derive(Clone, Copy, Debug)]
pub struct ConversationHistoryWindow {
    size: usize,
}

impl Default for ConversationHistoryWindow {
    fn default() -> Self {
        Self { size: Self::DEFAULT_SIZE }
    }
}

impl ConversationHistoryWindow {
    pub const DEFAULT_SIZE: usize = 10;

    pub fn new(size: usize) -> Self {
        Self { size }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// `turns` arrive newest first, as the repository returns them.
    pub fn build(&self, turns: &[ConversationTurn]) -> Vec<ChatMessage> {
        let mut window: Vec<ChatMessage> = turns
            .iter()
            .take(self.size)
            .map(|turn| ChatMessage {
                role: role_for(turn.sender),
                content: turn.context_text().to_string(),
            })
            .collect();
        window.reverse();
        window
    }
}

fn role_for(sender: Sender) -> ChatRole {
    match sender {
        Sender::Lead => ChatRole::User,
        Sender::Ai | Sender::Agent => ChatRole::Assistant,
    }
}

#[cfg(test)]
mod tests {
    use propbot_core::domain::conversation::{ConversationTurn, NewTurn, Sender, TurnId};
    use propbot_core::domain::lead::{BusinessId, LeadId};

    use super::ConversationHistoryWindow;
    use crate::llm::ChatRole;

    fn turn(sequence: i64, sender: Sender) -> ConversationTurn {
        NewTurn::text(
            LeadId("lead-1".to_string()),
            BusinessId("biz-1".to_string()),
            "whatsapp",
            sender,
            format!("message {sequence}"),
        )
        .into_turn(TurnId(format!("turn-{sequence}")), sequence)
    }

    fn newest_first(count: i64) -> Vec<ConversationTurn> {
        (1..=count)
            .rev()
            .map(|sequence| {
                turn(sequence, if sequence % 2 == 1 { Sender::Lead } else { Sender::Ai })
            })
            .collect()
    }

    #[test]
    fn keeps_the_ten_most_recent_in_chronological_order() {
        let window = ConversationHistoryWindow::default().build(&newest_first(15));

        let contents: Vec<&str> = window.iter().map(|message| message.content.as_str()).collect();
        let expected: Vec<String> = (6..=15).map(|n| format!("message {n}")).collect();
        assert_eq!(contents, expected);
    }

    #[test]
    fn short_history_is_returned_whole() {
        let window = ConversationHistoryWindow::default().build(&newest_first(3));

        assert_eq!(window.len(), 3);
        assert_eq!(window[0].content, "message 1");
        assert_eq!(window[2].content, "message 3");
    }

    #[test]
    fn lead_maps_to_user_and_everyone_else_to_assistant() {
        let turns = vec![turn(3, Sender::Agent), turn(2, Sender::Ai), turn(1, Sender::Lead)];

        let roles: Vec<ChatRole> =
            ConversationHistoryWindow::default().build(&turns).iter().map(|m| m.role).collect();

        assert_eq!(roles, vec![ChatRole::User, ChatRole::Assistant, ChatRole::Assistant]);
    }

    #[test]
    fn voice_turn_uses_transcript_or_empty_text() {
        let mut transcribed = turn(2, Sender::Lead);
        transcribed.message = None;
        transcribed.voice_transcript = Some("three bedroom villa".to_string());
        let mut recording_only = turn(1, Sender::Lead);
        recording_only.message = None;
        recording_only.voice_recording_url = Some("https://media.example/rec-1.ogg".to_string());

        let window = ConversationHistoryWindow::default().build(&[transcribed, recording_only]);

        assert_eq!(window[0].content, "");
        assert_eq!(window[1].content, "three bedroom villa");
    }

    #[test]
    fn custom_size_is_honoured() {
        let window = ConversationHistoryWindow::new(4).build(&newest_first(15));

        assert_eq!(window.len(), 4);
        assert_eq!(window[0].content, "message 12");
    }
}
