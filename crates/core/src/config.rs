use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{FixedOffset, Offset, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub campaign: CampaignConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    /// Candidate models, quality first.
    pub models: Vec<String>,
    pub max_retries: u32,
    pub retry_base_ms: u64,
    pub retry_jitter_ms: u64,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CampaignConfig {
    pub candidate_name: String,
    pub bot_name: String,
    pub link_url: String,
    pub bio_snippet: String,
    pub history_limit: u32,
    pub utc_offset_hours: i32,
    pub profile_enrichment: bool,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
    pub static_dir: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub llm_models: Option<Vec<String>>,
    pub campaign_link_url: Option<String>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://outreach.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                api_key: None,
                base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
                models: vec!["gemini-1.5-flash".to_string(), "gemini-2.0-flash-exp".to_string()],
                max_retries: 2,
                retry_base_ms: 1_000,
                retry_jitter_ms: 500,
                timeout_secs: 30,
            },
            campaign: CampaignConfig::default(),
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 5000,
                graceful_shutdown_secs: 15,
                static_dir: None,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            candidate_name: "Óscar Hernández".to_string(),
            bot_name: "Cami".to_string(),
            link_url: "https://oscarhernandez-respaldame.com/formulario/participa-y-gana-un-viaje-a-san-andres-islas".to_string(),
            bio_snippet: "Óscar Hernández es un líder comprometido con la comunidad, promotor del turismo y el desarrollo social. Esta campaña busca premiar el apoyo ciudadano con un viaje a San Andrés.".to_string(),
            history_limit: 10,
            utc_offset_hours: -5,
            profile_enrichment: true,
        }
    }
}

impl CampaignConfig {
    /// The link without its protocol prefix; presence checks match on this.
    pub fn link_marker(&self) -> &str {
        strip_protocol(self.link_url.trim())
    }

    /// Host part of the link, used to recognise previously sent links in stored history.
    pub fn link_domain(&self) -> &str {
        let marker = self.link_marker();
        marker.split('/').next().unwrap_or(marker)
    }

    pub fn reference_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_hours.saturating_mul(3600)).unwrap_or(Utc.fix())
    }
}

fn strip_protocol(url: &str) -> &str {
    url.strip_prefix("https://").or_else(|| url.strip_prefix("http://")).unwrap_or(url)
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("outreach.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(models) = llm.models {
                self.llm.models = models;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
            if let Some(retry_base_ms) = llm.retry_base_ms {
                self.llm.retry_base_ms = retry_base_ms;
            }
            if let Some(retry_jitter_ms) = llm.retry_jitter_ms {
                self.llm.retry_jitter_ms = retry_jitter_ms;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(campaign) = patch.campaign {
            if let Some(candidate_name) = campaign.candidate_name {
                self.campaign.candidate_name = candidate_name;
            }
            if let Some(bot_name) = campaign.bot_name {
                self.campaign.bot_name = bot_name;
            }
            if let Some(link_url) = campaign.link_url {
                self.campaign.link_url = link_url;
            }
            if let Some(bio_snippet) = campaign.bio_snippet {
                self.campaign.bio_snippet = bio_snippet;
            }
            if let Some(history_limit) = campaign.history_limit {
                self.campaign.history_limit = history_limit;
            }
            if let Some(utc_offset_hours) = campaign.utc_offset_hours {
                self.campaign.utc_offset_hours = utc_offset_hours;
            }
            if let Some(profile_enrichment) = campaign.profile_enrichment {
                self.campaign.profile_enrichment = profile_enrichment;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
            if let Some(static_dir) = server.static_dir {
                self.server.static_dir = Some(static_dir);
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("OUTREACH_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("OUTREACH_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_value("OUTREACH_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("OUTREACH_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_value("OUTREACH_DATABASE_TIMEOUT_SECS", &value)?;
        }

        // GOOGLE_API_KEY is accepted for deployments that already export it.
        let api_key = read_env("OUTREACH_LLM_API_KEY").or_else(|| read_env("GOOGLE_API_KEY"));
        if let Some(value) = api_key {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("OUTREACH_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("OUTREACH_LLM_MODELS") {
            self.llm.models = split_list(&value);
        }
        if let Some(value) = read_env("OUTREACH_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_value("OUTREACH_LLM_MAX_RETRIES", &value)?;
        }
        if let Some(value) = read_env("OUTREACH_LLM_RETRY_BASE_MS") {
            self.llm.retry_base_ms = parse_value("OUTREACH_LLM_RETRY_BASE_MS", &value)?;
        }
        if let Some(value) = read_env("OUTREACH_LLM_RETRY_JITTER_MS") {
            self.llm.retry_jitter_ms = parse_value("OUTREACH_LLM_RETRY_JITTER_MS", &value)?;
        }
        if let Some(value) = read_env("OUTREACH_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_value("OUTREACH_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("OUTREACH_CAMPAIGN_CANDIDATE_NAME") {
            self.campaign.candidate_name = value;
        }
        if let Some(value) = read_env("OUTREACH_CAMPAIGN_BOT_NAME") {
            self.campaign.bot_name = value;
        }
        if let Some(value) = read_env("OUTREACH_CAMPAIGN_LINK_URL") {
            self.campaign.link_url = value;
        }
        if let Some(value) = read_env("OUTREACH_CAMPAIGN_BIO_SNIPPET") {
            self.campaign.bio_snippet = value;
        }
        if let Some(value) = read_env("OUTREACH_CAMPAIGN_HISTORY_LIMIT") {
            self.campaign.history_limit = parse_value("OUTREACH_CAMPAIGN_HISTORY_LIMIT", &value)?;
        }
        if let Some(value) = read_env("OUTREACH_CAMPAIGN_UTC_OFFSET_HOURS") {
            self.campaign.utc_offset_hours =
                parse_value("OUTREACH_CAMPAIGN_UTC_OFFSET_HOURS", &value)?;
        }
        if let Some(value) = read_env("OUTREACH_CAMPAIGN_PROFILE_ENRICHMENT") {
            self.campaign.profile_enrichment =
                parse_value("OUTREACH_CAMPAIGN_PROFILE_ENRICHMENT", &value)?;
        }

        if let Some(value) = read_env("OUTREACH_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        // PORT is honoured for platform-assigned ports.
        let port = read_env("OUTREACH_SERVER_PORT").map(|value| ("OUTREACH_SERVER_PORT", value));
        if let Some((key, value)) = port.or_else(|| read_env("PORT").map(|value| ("PORT", value))) {
            self.server.port = parse_value(key, &value)?;
        }
        if let Some(value) = read_env("OUTREACH_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_value("OUTREACH_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }
        if let Some(value) = read_env("OUTREACH_SERVER_STATIC_DIR") {
            self.server.static_dir = Some(PathBuf::from(value));
        }

        let log_level =
            read_env("OUTREACH_LOGGING_LEVEL").or_else(|| read_env("OUTREACH_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("OUTREACH_LOGGING_FORMAT").or_else(|| read_env("OUTREACH_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(llm_base_url) = overrides.llm_base_url {
            self.llm.base_url = llm_base_url;
        }
        if let Some(llm_models) = overrides.llm_models {
            self.llm.models = llm_models;
        }
        if let Some(link_url) = overrides.campaign_link_url {
            self.campaign.link_url = link_url;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_llm(&self.llm)?;
        validate_campaign(&self.campaign)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("outreach.toml"), PathBuf::from("config/outreach.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
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
    let missing_key =
        llm.api_key.as_ref().map(|value| value.expose_secret().trim().is_empty()).unwrap_or(true);
    if missing_key {
        return Err(ConfigError::Validation(
            "llm.api_key is required. Create one at https://aistudio.google.com/apikey and set OUTREACH_LLM_API_KEY".to_string(),
        ));
    }

    let base_url = llm.base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "llm.base_url must start with http:// or https://".to_string(),
        ));
    }

    if llm.models.is_empty() || llm.models.iter().any(|model| model.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "llm.models must list at least one non-empty model id".to_string(),
        ));
    }

    if llm.max_retries > 10 {
        return Err(ConfigError::Validation("llm.max_retries must be in range 0..=10".to_string()));
    }

    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_campaign(campaign: &CampaignConfig) -> Result<(), ConfigError> {
    let link_url = campaign.link_url.trim();
    if !link_url.starts_with("http://") && !link_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "campaign.link_url must start with http:// or https://".to_string(),
        ));
    }
    if campaign.link_domain().is_empty() {
        return Err(ConfigError::Validation("campaign.link_url must include a host".to_string()));
    }

    if campaign.bot_name.trim().is_empty() || campaign.candidate_name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "campaign.bot_name and campaign.candidate_name must not be empty".to_string(),
        ));
    }

    if campaign.history_limit == 0 || campaign.history_limit > 100 {
        return Err(ConfigError::Validation(
            "campaign.history_limit must be in range 1..=100".to_string(),
        ));
    }

    if !(-12..=14).contains(&campaign.utc_offset_hours) {
        return Err(ConfigError::Validation(
            "campaign.utc_offset_hours must be in range -12..=14".to_string(),
        ));
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

fn split_list(value: &str) -> Vec<String> {
    value.split(',').map(str::trim).filter(|item| !item.is_empty()).map(str::to_string).collect()
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    llm: Option<LlmPatch>,
    campaign: Option<CampaignPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    models: Option<Vec<String>>,
    max_retries: Option<u32>,
    retry_base_ms: Option<u64>,
    retry_jitter_ms: Option<u64>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CampaignPatch {
    candidate_name: Option<String>,
    bot_name: Option<String>,
    link_url: Option<String>,
    bio_snippet: Option<String>,
    history_limit: Option<u32>,
    utc_offset_hours: Option<i32>,
    profile_enrichment: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
    static_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
