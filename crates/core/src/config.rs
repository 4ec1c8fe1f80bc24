use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use toml::{Table, Value};

pub const DEFAULT_FALLBACK_REPLY: &str = "Thanks for your message! I'm having trouble \
responding right now. A member of our team will get back to you shortly.";

/// Runtime settings. Sections missing from every layer keep their defaults.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    #[serde(deserialize_with = "deserialize_secret")]
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub fallback_on_exhaustion: bool,
    pub fallback_reply: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    #[serde(alias = "openai")]
    OpenAi,
    #[default]
    Ollama,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

/// Programmatic overrides, applied after the environment.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_base_url: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("invalid configuration value: {0}")]
    InvalidValue(#[source] toml::de::Error),
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

#[derive(Clone, Copy, Debug)]
enum ValueKind {
    Text,
    Keyword,
    Integer,
    Float,
    Boolean,
}

/// Environment variables and the setting each one overrides. Rows apply in
/// order, so the short `PROPBOT_LOG_*` aliases sit before the full names.
const ENV_OVERRIDES: &[(&str, &str, ValueKind)] = &[
    ("PROPBOT_DATABASE_URL", "database.url", ValueKind::Text),
    ("PROPBOT_DATABASE_MAX_CONNECTIONS", "database.max_connections", ValueKind::Integer),
    ("PROPBOT_DATABASE_TIMEOUT_SECS", "database.timeout_secs", ValueKind::Integer),
    ("PROPBOT_LLM_PROVIDER", "llm.provider", ValueKind::Keyword),
    ("PROPBOT_LLM_API_KEY", "llm.api_key", ValueKind::Text),
    ("PROPBOT_LLM_BASE_URL", "llm.base_url", ValueKind::Text),
    ("PROPBOT_LLM_MODEL", "llm.model", ValueKind::Text),
    ("PROPBOT_LLM_TEMPERATURE", "llm.temperature", ValueKind::Float),
    ("PROPBOT_LLM_MAX_TOKENS", "llm.max_tokens", ValueKind::Integer),
    ("PROPBOT_LLM_TIMEOUT_SECS", "llm.timeout_secs", ValueKind::Integer),
    ("PROPBOT_LLM_MAX_RETRIES", "llm.max_retries", ValueKind::Integer),
    ("PROPBOT_LLM_INITIAL_BACKOFF_MS", "llm.initial_backoff_ms", ValueKind::Integer),
    ("PROPBOT_LLM_FALLBACK_ON_EXHAUSTION", "llm.fallback_on_exhaustion", ValueKind::Boolean),
    ("PROPBOT_LLM_FALLBACK_REPLY", "llm.fallback_reply", ValueKind::Text),
    ("PROPBOT_SERVER_BIND_ADDRESS", "server.bind_address", ValueKind::Text),
    ("PROPBOT_SERVER_PORT", "server.port", ValueKind::Integer),
    ("PROPBOT_SERVER_GRACEFUL_SHUTDOWN_SECS", "server.graceful_shutdown_secs", ValueKind::Integer),
    ("PROPBOT_LOG_LEVEL", "logging.level", ValueKind::Text),
    ("PROPBOT_LOG_FORMAT", "logging.format", ValueKind::Keyword),
    ("PROPBOT_LOGGING_LEVEL", "logging.level", ValueKind::Text),
    ("PROPBOT_LOGGING_FORMAT", "logging.format", ValueKind::Keyword),
];

/// The primary environment variable for a dotted setting such as `llm.model`.
pub fn env_var_for(path: &str) -> Option<&'static str> {
    ENV_OVERRIDES.iter().rev().find(|(_, key, _)| *key == path).map(|(env_key, _, _)| *env_key)
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: "sqlite://propbot.db".to_string(), max_connections: 5, timeout_secs: 30 }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Ollama,
            api_key: None,
            base_url: None,
            model: "llama3.1".to_string(),
            temperature: 0.7,
            max_tokens: 200,
            timeout_secs: 30,
            max_retries: 2,
            initial_backoff_ms: 200,
            fallback_on_exhaustion: true,
            fallback_reply: DEFAULT_FALLBACK_REPLY.to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_address: "127.0.0.1".to_string(), port: 8080, graceful_shutdown_secs: 15 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Compact }
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

impl AppConfig {
    /// Layers: defaults, then the config file, then `PROPBOT_*` variables,
    /// then `options.overrides`. The merged result is validated once.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut layers = match resolve_config_path(options.config_path.as_deref()) {
            Some(path) => read_file(&path)?,
            None => Table::new(),
        };

        apply_env_overrides(&mut layers)?;
        options.overrides.apply(&mut layers);

        let config: Self = Value::Table(layers).try_into().map_err(ConfigError::InvalidValue)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_llm(&self.llm)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

impl ConfigOverrides {
    fn apply(self, layers: &mut Table) {
        let entries = [
            ("database.url", self.database_url),
            ("logging.level", self.log_level),
            ("llm.provider", self.llm_provider.map(|provider| provider.as_str().to_string())),
            ("llm.base_url", self.llm_base_url),
        ];
        for (path, value) in entries {
            if let Some(value) = value {
                set_path(layers, path, Value::String(value));
            }
        }
    }
}

impl ValueKind {
    fn parse(self, env_key: &str, raw: &str) -> Result<Value, ConfigError> {
        let invalid =
            || ConfigError::InvalidEnvOverride { key: env_key.to_string(), value: raw.to_string() };
        let trimmed = raw.trim();
        Ok(match self {
            Self::Text => Value::String(raw.to_string()),
            Self::Keyword => Value::String(trimmed.to_ascii_lowercase()),
            Self::Integer => Value::Integer(trimmed.parse().map_err(|_| invalid())?),
            Self::Float => Value::Float(trimmed.parse().map_err(|_| invalid())?),
            Self::Boolean => Value::Boolean(trimmed.parse().map_err(|_| invalid())?),
        })
    }
}

fn apply_env_overrides(layers: &mut Table) -> Result<(), ConfigError> {
    for (env_key, path, kind) in ENV_OVERRIDES {
        if let Some(raw) = read_env(env_key) {
            set_path(layers, path, kind.parse(env_key, &raw)?);
        }
    }
    Ok(())
}

fn set_path(layers: &mut Table, path: &str, value: Value) {
    let Some((section, key)) = path.split_once('.') else {
        return;
    };
    let section = layers.entry(section).or_insert(Value::Table(Table::new()));
    if !section.is_table() {
        *section = Value::Table(Table::new());
    }
    if let Value::Table(table) = section {
        table.insert(key.to_string(), value);
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("propbot.toml"), PathBuf::from("config/propbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_file(path: &Path) -> Result<Table, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<Table>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if !(0.0..=2.0).contains(&llm.temperature) {
        return Err(ConfigError::Validation(
            "llm.temperature must be in range 0.0..=2.0".to_string(),
        ));
    }

    if llm.max_tokens == 0 {
        return Err(ConfigError::Validation(
            "llm.max_tokens must be greater than zero".to_string(),
        ));
    }

    if llm.max_retries > 10 {
        return Err(ConfigError::Validation("llm.max_retries must be at most 10".to_string()));
    }

    if llm.fallback_reply.trim().is_empty() {
        return Err(ConfigError::Validation(
            "llm.fallback_reply must not be empty; it is sent when generation is exhausted"
                .to_string(),
        ));
    }

    match llm.provider {
        LlmProvider::OpenAi => {
            let missing = llm
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for the openai provider".to_string(),
                ));
            }
        }
        LlmProvider::Ollama => {}
    }

    if let Some(base_url) = &llm.base_url {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "llm.base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}
