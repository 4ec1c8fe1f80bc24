use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use propbot_core::config::{env_var_for, AppConfig, LoadOptions};
use toml::Value;

/// One rendered setting: dotted key and display value.
struct Entry {
    key: &'static str,
    value: String,
}

fn entry(key: &'static str, value: impl ToString) -> Entry {
    Entry { key, value: value.to_string() }
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(entries(&config).into_iter().map(|entry| {
        let source =
            field_source(entry.key, config_file_doc.as_ref(), config_file_path.as_deref());
        format!("- {} = {} (source: {source})", entry.key, entry.value)
    }));

    lines.join("\n")
}

fn entries(config: &AppConfig) -> Vec<Entry> {
    let (database, llm, server) = (&config.database, &config.llm, &config.server);
    vec![
        entry("database.url", &database.url),
        entry("database.max_connections", database.max_connections),
        entry("database.timeout_secs", database.timeout_secs),
        entry("llm.provider", llm.provider.as_str()),
        entry("llm.model", &llm.model),
        entry("llm.base_url", llm.base_url.as_deref().unwrap_or("<unset>")),
        entry("llm.api_key", if llm.api_key.is_some() { "<redacted>" } else { "<unset>" }),
        entry("llm.temperature", llm.temperature),
        entry("llm.max_tokens", llm.max_tokens),
        entry("llm.timeout_secs", llm.timeout_secs),
        entry("llm.max_retries", llm.max_retries),
        entry("llm.initial_backoff_ms", llm.initial_backoff_ms),
        entry("llm.fallback_on_exhaustion", llm.fallback_on_exhaustion),
        entry("server.bind_address", &server.bind_address),
        entry("server.port", server.port),
        entry("server.graceful_shutdown_secs", server.graceful_shutdown_secs),
        entry("logging.level", &config.logging.level),
        entry("logging.format", config.logging.format.as_str()),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("propbot.toml"), PathBuf::from("config/propbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_var_for(key_path).filter(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

#[cfg(test)]
mod tests {
    use propbot_core::config::AppConfig;
    use toml::Value;

    use super::{contains_path, entries};

    #[test]
    fn api_key_is_never_rendered() {
        let mut config = AppConfig::default();
        config.llm.api_key = Some("sk-live-secret".to_string().into());

        let rendered: Vec<String> = entries(&config).into_iter().map(|entry| entry.value).collect();

        assert!(rendered.iter().all(|value| !value.contains("sk-live")));
        assert!(rendered.contains(&"<redacted>".to_string()));
    }

    #[test]
    fn nested_keys_are_found_in_file_document() {
        let doc: Value = "[llm]\nmodel = \"gpt-4o-mini\"\n".parse().expect("toml");

        assert!(contains_path(&doc, "llm.model"));
        assert!(!contains_path(&doc, "llm.api_key"));
        assert!(!contains_path(&doc, "server.port"));
    }
}
