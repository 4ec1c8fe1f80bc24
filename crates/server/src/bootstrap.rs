use std::sync::Arc;

use propbot_agent::{build_client, GenerationPolicy, QualificationRuntime};
use propbot_core::config::{AppConfig, ConfigError};
use propbot_core::errors::ApplicationError;
use propbot_db::{
    connect_with_settings, migrations, DbPool, SqlConversationRepository, SqlLeadRepository,
};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub llm_provider: &'static str,
    pub runtime: Arc<QualificationRuntime>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("runtime initialization failed: {0}")]
    Runtime(#[from] ApplicationError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        lead_id = "unknown",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        lead_id = "unknown",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        lead_id = "unknown",
        "database migrations applied"
    );

    let llm = build_client(&config.llm)?;
    let llm_provider = llm.provider();
    let runtime = QualificationRuntime::new(
        Arc::new(SqlLeadRepository::new(db_pool.clone())),
        Arc::new(SqlConversationRepository::new(db_pool.clone())),
        llm,
        GenerationPolicy::from(&config.llm),
    )?;
    info!(
        event_name = "system.bootstrap.runtime_ready",
        correlation_id = "bootstrap",
        lead_id = "unknown",
        llm_provider,
        llm_model = %config.llm.model,
        "qualification runtime initialized"
    );

    Ok(Application { config, db_pool, llm_provider, runtime: Arc::new(runtime) })
}
