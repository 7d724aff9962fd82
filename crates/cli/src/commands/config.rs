use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use outreach_core::config::{resolve_config_path, AppConfig, LoadOptions};
use toml::Value;

type Entry = (&'static str, String, &'static [&'static str]);

struct ConfigFile {
    path: PathBuf,
    doc: Option<Value>,
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let file = resolve_config_path(None).map(|path| {
        let doc = load_config_file_doc(&path);
        ConfigFile { path, doc }
    });
    render(&config, file.as_ref())
}

fn render(config: &AppConfig, file: Option<&ConfigFile>) -> String {
    let static_dir = config
        .server
        .static_dir
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<unset>".to_string());
    let api_key = if config.llm.api_key.is_some() { "<redacted>" } else { "<unset>" };

    let entries = [
        entry("database.url", config.database.url.clone(), &["OUTREACH_DATABASE_URL"]),
        entry(
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["OUTREACH_DATABASE_MAX_CONNECTIONS"],
        ),
        entry(
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["OUTREACH_DATABASE_TIMEOUT_SECS"],
        ),
        entry("llm.api_key", api_key.to_string(), &["OUTREACH_LLM_API_KEY", "GOOGLE_API_KEY"]),
        entry("llm.base_url", config.llm.base_url.clone(), &["OUTREACH_LLM_BASE_URL"]),
        entry("llm.models", config.llm.models.join(","), &["OUTREACH_LLM_MODELS"]),
        entry("llm.max_retries", config.llm.max_retries.to_string(), &["OUTREACH_LLM_MAX_RETRIES"]),
        entry(
            "llm.retry_base_ms",
            config.llm.retry_base_ms.to_string(),
            &["OUTREACH_LLM_RETRY_BASE_MS"],
        ),
        entry(
            "llm.retry_jitter_ms",
            config.llm.retry_jitter_ms.to_string(),
            &["OUTREACH_LLM_RETRY_JITTER_MS"],
        ),
        entry(
            "llm.timeout_secs",
            config.llm.timeout_secs.to_string(),
            &["OUTREACH_LLM_TIMEOUT_SECS"],
        ),
        entry(
            "campaign.candidate_name",
            config.campaign.candidate_name.clone(),
            &["OUTREACH_CAMPAIGN_CANDIDATE_NAME"],
        ),
        entry(
            "campaign.bot_name",
            config.campaign.bot_name.clone(),
            &["OUTREACH_CAMPAIGN_BOT_NAME"],
        ),
        entry(
            "campaign.link_url",
            config.campaign.link_url.clone(),
            &["OUTREACH_CAMPAIGN_LINK_URL"],
        ),
        entry(
            "campaign.history_limit",
            config.campaign.history_limit.to_string(),
            &["OUTREACH_CAMPAIGN_HISTORY_LIMIT"],
        ),
        entry(
            "campaign.utc_offset_hours",
            config.campaign.utc_offset_hours.to_string(),
            &["OUTREACH_CAMPAIGN_UTC_OFFSET_HOURS"],
        ),
        entry(
            "campaign.profile_enrichment",
            config.campaign.profile_enrichment.to_string(),
            &["OUTREACH_CAMPAIGN_PROFILE_ENRICHMENT"],
        ),
        entry(
            "server.bind_address",
            config.server.bind_address.clone(),
            &["OUTREACH_SERVER_BIND_ADDRESS"],
        ),
        entry("server.port", config.server.port.to_string(), &["OUTREACH_SERVER_PORT", "PORT"]),
        entry(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["OUTREACH_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        entry("server.static_dir", static_dir, &["OUTREACH_SERVER_STATIC_DIR"]),
        entry(
            "logging.level",
            config.logging.level.clone(),
            &["OUTREACH_LOGGING_LEVEL",
            "OUTREACH_LOG_LEVEL"],
        ),
        entry(
            "logging.format",
            format!("{:?}",
            config.logging.format),
            &["OUTREACH_LOGGING_FORMAT",
            "OUTREACH_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_keys) in entries {
        let source = field_source(key, env_keys, file);
        lines.push(render_line(key, &value, source));
    }
    lines.join("\n")
}

fn entry(key: &'static str, value: String, env_keys: &'static [&'static str]) -> Entry {
    (key, value, env_keys)
}

fn load_config_file_doc(path: &Path) -> Option<Value> {
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(key_path: &str, env_keys: &[&str], file: Option<&ConfigFile>) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(file) = file {
        if file.doc.as_ref().is_some_and(|doc| contains_path(doc, key_path)) {
            return format!("file ({})", file.path.display());
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

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
