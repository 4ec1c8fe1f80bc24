use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Demo leads covering the new, collecting and qualified stages.
const SEED_LEADS: &[SeedLeadContract] = &[
    SeedLeadContract {
        lead_id: "lead-demo-new",
        qualification_state: "new",
        temperature: "cold",
        score: 10,
        turn_count: 0,
        description: "Fresh WhatsApp lead, phone only",
    },
    SeedLeadContract {
        lead_id: "lead-demo-collecting",
        qualification_state: "collecting",
        temperature: "warm",
        score: 55,
        turn_count: 4,
        description: "Buyer with budget and property type, location unknown",
    },
    SeedLeadContract {
        lead_id: "lead-demo-qualified",
        qualification_state: "qualified",
        temperature: "hot",
        score: 85,
        turn_count: 0,
        description: "Referral with complete requirements",
    },
];

pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed_data.sql");

    /// Loads the demo leads. Re-running replaces them with the canonical rows.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;

        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let leads_seeded = SEED_LEADS
            .iter()
            .map(|lead| LeadSeedInfo { lead_id: lead.lead_id, description: lead.description })
            .collect();

        Ok(SeedResult { leads_seeded })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for lead in SEED_LEADS {
            let lead_ok: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM lead
                 WHERE id = ?1 AND qualification_state = ?2 AND temperature = ?3 AND score = ?4)",
            )
            .bind(lead.lead_id)
            .bind(lead.qualification_state)
            .bind(lead.temperature)
            .bind(lead.score)
            .fetch_one(pool)
            .await?;
            checks.push((lead.lead_id, lead_ok == 1));

            let turn_count: i64 =
                sqlx::query_scalar("SELECT COUNT(1) FROM conversation_turn WHERE lead_id = ?1")
                    .bind(lead.lead_id)
                    .fetch_one(pool)
                    .await?;
            checks.push((lead.turn_count_label(), turn_count == lead.turn_count));
        }

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;
        for lead in SEED_LEADS {
            sqlx::query("DELETE FROM conversation_turn WHERE lead_id = ?1")
                .bind(lead.lead_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM lead WHERE id = ?1")
                .bind(lead.lead_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedLeadContract {
    lead_id: &'static str,
    qualification_state: &'static str,
    temperature: &'static str,
    score: i64,
    turn_count: i64,
    description: &'static str,
}

impl SeedLeadContract {
    fn turn_count_label(&self) -> &'static str {
        match self.lead_id {
            "lead-demo-new" => "lead-demo-new-turns",
            "lead-demo-collecting" => "lead-demo-collecting-turns",
            _ => "lead-demo-qualified-turns",
        }
    }
}

#[derive(Debug)]
pub struct SeedResult {
    pub leads_seeded: Vec<LeadSeedInfo>,
}

#[derive(Debug)]
pub struct LeadSeedInfo {
    pub lead_id: &'static str,
    pub description: &'static str,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
