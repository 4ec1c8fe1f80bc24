use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use propbot_core::domain::lead::{
    BudgetRange, BusinessId, InquiryType, LeadId, LeadProfile, QualificationState, Temperature,
    Timeline,
};
use propbot_core::qualification::{LeadProfileUpdate, LeadScore};

use super::{LeadRepository, RepositoryError};
use crate::DbPool;

const LEAD_COLUMNS: &str = "id, business_id, name, email, phone, source, inquiry_type,
    budget_min, budget_max, location_preference, property_type, timeline, score, temperature,
    qualification_state, last_contact_at, created_at, updated_at";

pub struct SqlLeadRepository {
    pool: DbPool,
}

impl SqlLeadRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, id: &LeadId) -> Result<Option<LeadProfile>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {LEAD_COLUMNS} FROM lead WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(lead_from_row).transpose()
    }
}

#[async_trait::async_trait]
impl LeadRepository for SqlLeadRepository {
    async fn find_by_id(&self, id: &LeadId) -> Result<Option<LeadProfile>, RepositoryError> {
        self.fetch(id).await
    }

    async fn save(&self, lead: LeadProfile) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO lead (
                id, business_id, name, email, phone, source, inquiry_type, budget_min,
                budget_max, location_preference, property_type, timeline, score, temperature,
                qualification_state, last_contact_at, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                business_id = excluded.business_id,
                name = excluded.name,
                email = excluded.email,
                phone = excluded.phone,
                source = excluded.source,
                inquiry_type = excluded.inquiry_type,
                budget_min = excluded.budget_min,
                budget_max = excluded.budget_max,
                location_preference = excluded.location_preference,
                property_type = excluded.property_type,
                timeline = excluded.timeline,
                score = excluded.score,
                temperature = excluded.temperature,
                qualification_state = excluded.qualification_state,
                last_contact_at = excluded.last_contact_at,
                updated_at = excluded.updated_at",
        )
        .bind(&lead.id.0)
        .bind(&lead.business_id.0)
        .bind(lead.name.as_deref())
        .bind(lead.email.as_deref())
        .bind(lead.phone.as_deref())
        .bind(lead.source.as_deref())
        .bind(lead.inquiry_type.map(|value| value.as_str()))
        .bind(lead.budget.map(|range| range.min.to_string()))
        .bind(lead.budget.map(|range| range.max.to_string()))
        .bind(lead.location_preference.as_deref())
        .bind(lead.property_type.as_deref())
        .bind(lead.timeline.map(|value| value.as_str()))
        .bind(i64::from(lead.score))
        .bind(lead.temperature.as_str())
        .bind(lead.qualification_state.as_str())
        .bind(lead.last_contact_at.map(|value| value.to_rfc3339()))
        .bind(lead.created_at.to_rfc3339())
        .bind(lead.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn apply_update(
        &self,
        id: &LeadId,
        update: &LeadProfileUpdate,
    ) -> Result<LeadProfile, RepositoryError> {
        // COALESCE keeps the stored value for every field the update leaves out.
        let result = sqlx::query(
            "UPDATE lead SET
                inquiry_type = COALESCE(?, inquiry_type),
                budget_min = COALESCE(?, budget_min),
                budget_max = COALESCE(?, budget_max),
                property_type = COALESCE(?, property_type),
                timeline = COALESCE(?, timeline),
                last_contact_at = COALESCE(?, last_contact_at),
                updated_at = COALESCE(?, updated_at)
             WHERE id = ?",
        )
        .bind(update.inquiry_type.map(|value| value.as_str()))
        .bind(update.budget.map(|range| range.min.to_string()))
        .bind(update.budget.map(|range| range.max.to_string()))
        .bind(update.property_type.as_deref())
        .bind(update.timeline.map(|value| value.as_str()))
        .bind(update.last_contact_at.map(|value| value.to_rfc3339()))
        .bind(update.last_contact_at.map(|value| value.to_rfc3339()))
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::LeadNotFound(id.0.clone()));
        }

        self.fetch(id).await?.ok_or_else(|| RepositoryError::LeadNotFound(id.0.clone()))
    }

    async fn record_score(
        &self,
        id: &LeadId,
        score: LeadScore,
        state: QualificationState,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE lead SET score = ?, temperature = ?, qualification_state = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(i64::from(score.score))
        .bind(score.temperature.as_str())
        .bind(state.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::LeadNotFound(id.0.clone()));
        }

        Ok(())
    }
}

fn lead_from_row(row: SqliteRow) -> Result<LeadProfile, RepositoryError> {
    let budget = match (
        row.try_get::<Option<String>, _>("budget_min")?,
        row.try_get::<Option<String>, _>("budget_max")?,
    ) {
        (Some(min), Some(max)) => {
            let min = parse_decimal("budget_min", &min)?;
            let max = parse_decimal("budget_max", &max)?;
            Some(
                BudgetRange::new(min, max)
                    .map_err(|error| RepositoryError::Decode(error.to_string()))?,
            )
        }
        (None, None) => None,
        _ => {
            return Err(RepositoryError::Decode(
                "budget_min and budget_max must be both set or both null".to_string(),
            ))
        }
    };

    let score = row.try_get::<i64, _>("score")?;
    let score = u8::try_from(score)
        .ok()
        .filter(|value| *value <= 100)
        .ok_or_else(|| RepositoryError::Decode(format!("score out of range: {score}")))?;

    Ok(LeadProfile {
        id: LeadId(row.try_get("id")?),
        business_id: BusinessId(row.try_get("business_id")?),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        source: row.try_get("source")?,
        inquiry_type: parse_optional_enum::<InquiryType>(row.try_get("inquiry_type")?)?,
        budget,
        location_preference: row.try_get("location_preference")?,
        property_type: row.try_get("property_type")?,
        timeline: parse_optional_enum::<Timeline>(row.try_get("timeline")?)?,
        score,
        temperature: parse_enum::<Temperature>(&row.try_get::<String, _>("temperature")?)?,
        qualification_state: parse_enum::<QualificationState>(
            &row.try_get::<String, _>("qualification_state")?,
        )?,
        last_contact_at: parse_optional_timestamp(
            "last_contact_at",
            row.try_get("last_contact_at")?,
        )?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

fn parse_decimal(column: &str, value: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(value).map_err(|error| {
        RepositoryError::Decode(format!("invalid decimal in `{column}`: `{value}` ({error})"))
    })
}

fn parse_enum<T>(value: &str) -> Result<T, RepositoryError>
where
    T: FromStr<Err = propbot_core::errors::DomainError>,
{
    value.parse::<T>().map_err(|error| RepositoryError::Decode(error.to_string()))
}

fn parse_optional_enum<T>(value: Option<String>) -> Result<Option<T>, RepositoryError>
where
    T: FromStr<Err = propbot_core::errors::DomainError>,
{
    value.as_deref().map(parse_enum::<T>).transpose()
}

pub(crate) fn parse_timestamp(
    column: &str,
    value: String,
) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

fn parse_optional_timestamp(
    column: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value.map(|timestamp| parse_timestamp(column, timestamp)).transpose()
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use rust_decimal::Decimal;

    use propbot_core::domain::lead::{
        BudgetRange, BusinessId, InquiryType, LeadId, LeadProfile, QualificationState,
        Temperature, Timeline,
    };
    use propbot_core::qualification::{LeadProfileUpdate, LeadScore};

    use super::SqlLeadRepository;
    use crate::migrations;
    use crate::repositories::{LeadRepository, RepositoryError};
    use crate::{connect_with_settings, DbPool};

    #[tokio::test]
    async fn sql_lead_repo_round_trip() {
        let pool = setup_pool().await;
        let repo = SqlLeadRepository::new(pool.clone());
        let lead = sample_lead();

        repo.save(lead.clone()).await.expect("save lead");
        let found = repo.find_by_id(&lead.id).await.expect("find lead");

        assert_eq!(found, Some(lead));
        pool.close().await;
    }

    #[tokio::test]
    async fn missing_lead_is_none() {
        let pool = setup_pool().await;
        let repo = SqlLeadRepository::new(pool.clone());

        let found = repo.find_by_id(&LeadId("nobody".to_string())).await.expect("query");

        assert!(found.is_none());
        pool.close().await;
    }

    #[tokio::test]
    async fn partial_update_keeps_omitted_fields() {
        let pool = setup_pool().await;
        let repo = SqlLeadRepository::new(pool.clone());
        let lead = sample_lead();
        repo.save(lead.clone()).await.expect("save lead");

        let contacted = parse_ts("2026-03-02T09:30:00Z");
        let update = LeadProfileUpdate {
            inquiry_type: Some(InquiryType::Rent),
            budget: BudgetRange::around(Decimal::new(75_000, 0)),
            last_contact_at: Some(contacted),
            ..LeadProfileUpdate::default()
        };

        let stored = repo.apply_update(&lead.id, &update).await.expect("apply update");

        assert_eq!(stored.inquiry_type, Some(InquiryType::Rent));
        assert_eq!(
            stored.budget,
            Some(BudgetRange { min: Decimal::new(60_000, 0), max: Decimal::new(90_000, 0) })
        );
        assert_eq!(stored.location_preference.as_deref(), Some("Powai"));
        assert_eq!(stored.property_type.as_deref(), Some("2 BHK apartment"));
        assert_eq!(stored.timeline, Some(Timeline::OneToThreeMonths));
        assert_eq!(stored.name.as_deref(), Some("Meera Iyer"));
        assert_eq!(stored.last_contact_at, Some(contacted));
        pool.close().await;
    }

    #[tokio::test]
    async fn update_for_unknown_lead_is_not_found() {
        let pool = setup_pool().await;
        let repo = SqlLeadRepository::new(pool.clone());

        let error = repo
            .apply_update(&LeadId("ghost".to_string()), &LeadProfileUpdate::default())
            .await
            .expect_err("unknown lead must fail");

        assert!(matches!(error, RepositoryError::LeadNotFound(ref id) if id == "ghost"));
        pool.close().await;
    }

    #[tokio::test]
    async fn record_score_persists_score_temperature_and_state() {
        let pool = setup_pool().await;
        let repo = SqlLeadRepository::new(pool.clone());
        let lead = sample_lead();
        repo.save(lead.clone()).await.expect("save lead");

        repo.record_score(
            &lead.id,
            LeadScore { score: 75, temperature: Temperature::Hot },
            QualificationState::Qualified,
        )
        .await
        .expect("record score");

        let stored = repo.find_by_id(&lead.id).await.expect("find").expect("lead exists");
        assert_eq!(stored.score, 75);
        assert_eq!(stored.temperature, Temperature::Hot);
        assert_eq!(stored.qualification_state, QualificationState::Qualified);
        pool.close().await;
    }

    #[tokio::test]
    async fn unknown_stored_enum_is_a_decode_error() {
        let pool = setup_pool().await;
        let repo = SqlLeadRepository::new(pool.clone());
        let lead = sample_lead();
        repo.save(lead.clone()).await.expect("save lead");

        sqlx::query("PRAGMA ignore_check_constraints = ON")
            .execute(&pool)
            .await
            .expect("disable checks");
        sqlx::query("UPDATE lead SET temperature = 'lukewarm' WHERE id = ?")
            .bind(&lead.id.0)
            .execute(&pool)
            .await
            .expect("corrupt row");

        let error = repo.find_by_id(&lead.id).await.expect_err("decode should fail");
        assert!(matches!(error, RepositoryError::Decode(ref message) if message.contains("lukewarm")));
        pool.close().await;
    }

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    fn sample_lead() -> LeadProfile {
        let created = parse_ts("2026-03-01T10:00:00Z");
        LeadProfile {
            id: LeadId("lead-sql-001".to_string()),
            business_id: BusinessId("biz-001".to_string()),
            name: Some("Meera Iyer".to_string()),
            email: None,
            phone: Some("+919820000001".to_string()),
            source: Some("whatsapp".to_string()),
            inquiry_type: Some(InquiryType::Buy),
            budget: None,
            location_preference: Some("Powai".to_string()),
            property_type: Some("2 BHK apartment".to_string()),
            timeline: Some(Timeline::OneToThreeMonths),
            score: 45,
            temperature: Temperature::Warm,
            qualification_state: QualificationState::Collecting,
            last_contact_at: None,
            created_at: created,
            updated_at: created,
        }
    }

    fn parse_ts(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value).expect("valid rfc3339").with_timezone(&Utc)
    }
}
