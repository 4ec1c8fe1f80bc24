use serde::Deserialize;
use std::collections::HashSet;

type SeedContractTestResult<T = ()> = Result<T, String>;

macro_rules! require {
    ($cond:expr) => {
        if !$cond {
            return Err(format!("assertion failed: `{}`", stringify!($cond)));
        }
    };
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(format!($($arg)*));
        }
    };
}

macro_rules! require_eq {
    ($left:expr, $right:expr) => {
        if $left != $right {
            return Err(format!(
                "assertion failed: `left == right` (`{:?}` != `{:?}`)",
                $left,
                $right
            ));
        }
    };
}

#[derive(Debug, Deserialize)]
struct SeedLeadContract {
    lead_id: String,
    qualification_state: String,
    temperature: String,
    score: u8,
    turn_count: u32,
}

#[derive(Debug, Deserialize)]
struct SeedContract {
    dataset_version: String,
    seed_dataset: String,
    leads: Vec<SeedLeadContract>,
}

#[test]
fn seed_contract_matches_demo_seed_sql_fixture() -> SeedContractTestResult {
    let fixture_sql = include_str!("../../../config/fixtures/demo_seed_data.sql");
    let contract: SeedContract =
        serde_json::from_str(include_str!("../../../config/fixtures/demo_seed_contract.json"))
            .map_err(|_| "seed contract JSON must parse".to_string())?;
    let mut lead_ids_seen = HashSet::new();

    require_eq!(contract.dataset_version, "demo-leads-v1");
    require_eq!(contract.seed_dataset, "deterministic_demo_leads");
    require_eq!(contract.leads.len(), 3);

    for lead in &contract.leads {
        require!(lead_ids_seen.insert(lead.lead_id.clone()), "duplicate lead id: {}", lead.lead_id);
        require!(lead.score <= 100, "score out of range for {}", lead.lead_id);

        let expected_temperature = match lead.score {
            70..=100 => "hot",
            40..=69 => "warm",
            _ => "cold",
        };
        require_eq!(lead.temperature.as_str(), expected_temperature);

        require!(
            fixture_sql.contains(&format!("('{}', 'biz-demo'", lead.lead_id)),
            "seed SQL fixture should insert lead {}",
            lead.lead_id
        );
        require!(
            fixture_sql.contains(&format!(
                "{}, '{}', '{}'",
                lead.score, lead.temperature, lead.qualification_state
            )),
            "seed SQL fixture should carry score, temperature and state for {}",
            lead.lead_id
        );

        let turn_rows = fixture_sql
            .lines()
            .filter(|line| line.contains("'turn-demo-"))
            .filter(|line| line.contains(&format!("'{}'", lead.lead_id)))
            .count();
        require_eq!(turn_rows as u32, lead.turn_count);
    }

    Ok(())
}
