use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use propbot_core::domain::conversation::{
    ConversationTurn, Direction, NewTurn, Sender, TurnId, TurnMetadata,
};
use propbot_core::domain::lead::{BusinessId, LeadId};

use super::lead::parse_timestamp;
use super::{ConversationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlConversationRepository {
    pool: DbPool,
}

impl SqlConversationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ConversationRepository for SqlConversationRepository {
    async fn append(&self, turns: Vec<NewTurn>) -> Result<Vec<ConversationTurn>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut stored = Vec::with_capacity(turns.len());

        for turn in turns {
            let id = TurnId(Uuid::new_v4().to_string());
            let metadata_json = turn.metadata.as_ref().map(serde_json::to_string).transpose()?;

            // Sequence is derived inside the insert so concurrent writers cannot
            // observe the same maximum; UNIQUE(lead_id, sequence) backs this up.
            let sequence: i64 = sqlx::query_scalar(
                "INSERT INTO conversation_turn (
                    id, lead_id, business_id, channel, sender, direction, message,
                    voice_transcript, voice_recording_url, metadata_json, sequence, created_at
                )
                SELECT ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, COALESCE(MAX(sequence), 0) + 1, ?
                FROM conversation_turn WHERE lead_id = ?
                RETURNING sequence",
            )
            .bind(&id.0)
            .bind(&turn.lead_id.0)
            .bind(&turn.business_id.0)
            .bind(&turn.channel)
            .bind(turn.sender.as_str())
            .bind(turn.direction().as_str())
            .bind(turn.message.as_deref())
            .bind(turn.voice_transcript.as_deref())
            .bind(turn.voice_recording_url.as_deref())
            .bind(metadata_json.as_deref())
            .bind(turn.timestamp.to_rfc3339())
            .bind(&turn.lead_id.0)
            .fetch_one(&mut *tx)
            .await?;

            stored.push(turn.into_turn(id, sequence));
        }

        tx.commit().await?;
        Ok(stored)
    }

    async fn recent_for_lead(
        &self,
        lead_id: &LeadId,
        limit: u32,
    ) -> Result<Vec<ConversationTurn>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, lead_id, business_id, channel, sender, direction, message,
                    voice_transcript, voice_recording_url, metadata_json, sequence, created_at
             FROM conversation_turn
             WHERE lead_id = ?
             ORDER BY sequence DESC
             LIMIT ?",
        )
        .bind(&lead_id.0)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(turn_from_row).collect()
    }

    async fn count_for_lead(&self, lead_id: &LeadId) -> Result<u64, RepositoryError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM conversation_turn WHERE lead_id = ?")
                .bind(&lead_id.0)
                .fetch_one(&self.pool)
                .await?;

        u64::try_from(count)
            .map_err(|_| RepositoryError::Decode(format!("negative turn count: {count}")))
    }
}

fn turn_from_row(row: SqliteRow) -> Result<ConversationTurn, RepositoryError> {
    let sender_raw = row.try_get::<String, _>("sender")?;
    let sender = sender_raw
        .parse::<Sender>()
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;

    let direction = match row.try_get::<String, _>("direction")?.as_str() {
        "inbound" => Direction::Inbound,
        "outbound" => Direction::Outbound,
        other => return Err(RepositoryError::Decode(format!("unknown direction `{other}`"))),
    };

    let metadata = row
        .try_get::<Option<String>, _>("metadata_json")?
        .map(|raw| serde_json::from_str::<TurnMetadata>(&raw))
        .transpose()
        .map_err(|error| RepositoryError::Decode(format!("invalid turn metadata: {error}")))?;

    Ok(ConversationTurn {
        id: TurnId(row.try_get("id")?),
        lead_id: LeadId(row.try_get("lead_id")?),
        business_id: BusinessId(row.try_get("business_id")?),
        channel: row.try_get("channel")?,
        sender,
        direction,
        message: row.try_get("message")?,
        voice_transcript: row.try_get("voice_transcript")?,
        voice_recording_url: row.try_get("voice_recording_url")?,
        metadata,
        sequence: row.try_get("sequence")?,
        timestamp: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use propbot_core::domain::conversation::{
        Direction, ExtractedEntities, Intent, NewTurn, Sender, TurnMetadata,
    };
    use propbot_core::domain::lead::{BusinessId, LeadId, LeadProfile};

    use super::SqlConversationRepository;
    use crate::migrations;
    use crate::repositories::{ConversationRepository, LeadRepository, SqlLeadRepository};
    use crate::{connect_with_settings, DbPool};

    #[tokio::test]
    async fn append_assigns_increasing_sequence_per_lead() {
        let pool = setup_pool().await;
        let repo = SqlConversationRepository::new(pool.clone());
        insert_lead(&pool, "lead-a").await;
        insert_lead(&pool, "lead-b").await;

        let first = repo
            .append(vec![turn("lead-a", Sender::Lead, "hi"), turn("lead-a", Sender::Ai, "hello")])
            .await
            .expect("append lead-a");
        let other = repo.append(vec![turn("lead-b", Sender::Lead, "hey")]).await.expect("lead-b");
        let second = repo.append(vec![turn("lead-a", Sender::Lead, "budget?")]).await.expect("a");

        let sequences: Vec<i64> = first.iter().chain(&second).map(|turn| turn.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
        assert_eq!(other[0].sequence, 1);
        assert_eq!(first[1].direction, Direction::Outbound);
        pool.close().await;
    }

    #[tokio::test]
    async fn recent_turns_come_back_newest_first_with_metadata() {
        let pool = setup_pool().await;
        let repo = SqlConversationRepository::new(pool.clone());
        insert_lead(&pool, "lead-a").await;

        let metadata = TurnMetadata {
            intent: Intent::Budget,
            entities: ExtractedEntities {
                budget: Some(Decimal::new(5_000_000, 0)),
                ..ExtractedEntities::default()
            },
        };
        let inbound = turn("lead-a", Sender::Lead, "budget is 50 lakh").with_metadata(metadata.clone());
        repo.append(vec![inbound, turn("lead-a", Sender::Ai, "noted")]).await.expect("append");

        let recent = repo.recent_for_lead(&LeadId("lead-a".to_string()), 10).await.expect("read");

        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].message.as_deref(), Some("noted"));
        assert_eq!(recent[1].metadata, Some(metadata));
        assert_eq!(recent[1].direction, Direction::Inbound);
        pool.close().await;
    }

    #[tokio::test]
    async fn limit_and_count_cover_all_turns() {
        let pool = setup_pool().await;
        let repo = SqlConversationRepository::new(pool.clone());
        insert_lead(&pool, "lead-a").await;

        let turns = (1..=15).map(|n| turn("lead-a", Sender::Lead, &format!("m{n}"))).collect();
        repo.append(turns).await.expect("append");

        let lead_id = LeadId("lead-a".to_string());
        let recent = repo.recent_for_lead(&lead_id, 10).await.expect("read");
        let count = repo.count_for_lead(&lead_id).await.expect("count");

        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0].sequence, 15);
        assert_eq!(recent[9].sequence, 6);
        assert_eq!(count, 15);
        pool.close().await;
    }

    #[tokio::test]
    async fn failed_batch_writes_nothing() {
        let pool = setup_pool().await;
        let repo = SqlConversationRepository::new(pool.clone());
        insert_lead(&pool, "lead-a").await;

        let result = repo
            .append(vec![turn("lead-a", Sender::Lead, "hi"), turn("missing", Sender::Ai, "x")])
            .await;

        assert!(result.is_err(), "foreign key violation should abort the batch");
        let count = repo.count_for_lead(&LeadId("lead-a".to_string())).await.expect("count");
        assert_eq!(count, 0);
        pool.close().await;
    }

    fn turn(lead_id: &str, sender: Sender, message: &str) -> NewTurn {
        NewTurn::text(
            LeadId(lead_id.to_string()),
            BusinessId("biz-001".to_string()),
            "whatsapp",
            sender,
            message,
        )
    }

    async fn insert_lead(pool: &DbPool, id: &str) {
        SqlLeadRepository::new(pool.clone())
            .save(LeadProfile::new(
                LeadId(id.to_string()),
                BusinessId("biz-001".to_string()),
                "+919800000000",
            ))
            .await
            .expect("insert lead");
    }

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }
}
