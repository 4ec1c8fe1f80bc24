use crate::commands::{block_on, load_config, migrated_pool, CommandResult, StepFailure};
use propbot_db::{DemoSeedDataset, LeadSeedInfo};

pub fn run() -> CommandResult {
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let result = block_on("seed", async {
        let pool = migrated_pool(&config).await?;

        let seeded = DemoSeedDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;
        let verification = DemoSeedDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        let outcome: Result<Vec<LeadSeedInfo>, StepFailure> = if verification.all_present {
            Ok(seeded.leads_seeded)
        } else {
            Err(("seed_verification", verification_message(&verification.checks), 6u8))
        };

        pool.close().await;
        outcome
    });

    match result {
        Ok(leads) => {
            let lines: Vec<String> = leads
                .iter()
                .map(|lead| format!("  - {}: {}", lead.lead_id, lead.description))
                .collect();
            CommandResult::success(
                "seed",
                format!("demo leads loaded ({}):\n{}", leads.len(), lines.join("\n")),
            )
        }
        Err(failure) => failure,
    }
}

fn verification_message(checks: &[(&'static str, bool)]) -> String {
    let failed: Vec<&str> =
        checks.iter().filter_map(|(check, passed)| (!passed).then_some(*check)).collect();

    if failed.is_empty() {
        "some demo leads failed to load".to_string()
    } else {
        format!("seed verification failed for checks: {}", failed.join(", "))
    }
}
