use crate::commands::{block_on, load_config, migrated_pool, CommandResult};
use propbot_agent::{build_client, PromptBuilder};

/// Preflight for `propbot-server`: everything it needs at boot must resolve
/// here, without binding a port.
pub fn run() -> CommandResult {
    let config = match load_config("start") {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let result = block_on("start", async {
        let pool = migrated_pool(&config).await?;
        pool.close().await;

        let client = build_client(&config.llm)
            .map_err(|error| ("llm_client", error.to_string(), 7u8))?;
        PromptBuilder::new().map_err(|error| ("prompt_template", error.to_string(), 8u8))?;
        Ok(client.provider())
    });

    match result {
        Ok(provider) => CommandResult::success(
            "start",
            format!(
                "startup preflight passed (llm {provider}/{}, listening on {}:{} once started)",
                config.llm.model, config.server.bind_address, config.server.port
            ),
        ),
        Err(failure) => failure,
    }
}
