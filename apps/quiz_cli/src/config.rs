use std::{collections::HashMap, fs, io::ErrorKind, path::Path, time::Duration};

use anyhow::{anyhow, Context};
use client_core::EngineConfig;
use shared::domain::{ChatId, SessionKey, UserId};

const DEFAULT_CONFIG_FILE: &str = "quiz.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub server_url: String,
    pub chat_id: Option<i64>,
    pub user_id: Option<i64>,
    pub display_name: Option<String>,
    pub engine: EngineConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8000".into(),
            chat_id: None,
            user_id: None,
            display_name: None,
            engine: EngineConfig::default(),
        }
    }
}

impl Settings {
    pub fn session_key(&self) -> anyhow::Result<SessionKey> {
        let chat_id = self
            .chat_id
            .ok_or_else(|| anyhow!("chat_id is not set (--chat-id, APP__CHAT_ID or quiz.toml)"))?;
        let user_id = self
            .user_id
            .ok_or_else(|| anyhow!("user_id is not set (--user-id, APP__USER_ID or quiz.toml)"))?;
        Ok(SessionKey::new(ChatId(chat_id), UserId(user_id)))
    }

    /// Applies one setting by its file key (`APP__` environment keys map to
    /// the lowercase name).
    fn apply(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let engine = &mut self.engine;
        match key {
            "server_url" => self.server_url = value.trim().to_string(),
            "chat_id" => self.chat_id = Some(parse(key, value)?),
            "user_id" => self.user_id = Some(parse(key, value)?),
            "display_name" => self.display_name = Some(value.to_string()),
            "poll_interval_ms" => engine.poll_interval = millis(key, value)?,
            "probe_interval_ms" => engine.probe_interval = millis(key, value)?,
            "deadline_slop_ms" => engine.deadline_slop = millis(key, value)?,
            "progress_interval_ms" => engine.progress_interval = millis(key, value)?,
            "countdown_skip_ms" => engine.countdown_skip_threshold = millis(key, value)?,
            "preload_cap_ms" => engine.preload_wait_cap = millis(key, value)?,
            "fallback_buffer_ms" => engine.fallback_buffer = millis(key, value)?,
            "default_countdown_sec" => engine.default_countdown_sec = parse(key, value)?,
            "rematch_poll_ms" => engine.rematch_poll_interval = millis(key, value)?,
            "badge_ttl_ms" => engine.connectivity_badge_ttl = millis(key, value)?,
            "write_retries" => engine.write_retry.max_retries = parse(key, value)?,
            "write_retry_base_ms" => engine.write_retry.base_delay = millis(key, value)?,
            "timer_seconds" => engine.default_timer_seconds = parse(key, value)?,
            "rounds_total" => engine.default_rounds_total = parse(key, value)?,
            _ => tracing::warn!(key, "config: unknown setting ignored"),
        }
        Ok(())
    }
}

fn parse<T>(key: &str, value: &str) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("invalid value {value:?} for {key}"))
}

fn millis(key: &str, value: &str) -> anyhow::Result<Duration> {
    parse::<u64>(key, value).map(Duration::from_millis)
}

/// Defaults, then the TOML file, then environment variables.
pub fn load_settings(config_path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let path = config_path.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));
    match fs::read_to_string(path) {
        Ok(raw) => apply_file(&mut settings, &raw)
            .with_context(|| format!("failed to load {}", path.display()))?,
        Err(err) if err.kind() == ErrorKind::NotFound && config_path.is_none() => {}
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", path.display()));
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok())?;
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let table = toml::from_str::<HashMap<String, toml::Value>>(raw)?;
    for (key, value) in &table {
        let value = match value {
            toml::Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        settings.apply(key, &value)?;
    }
    Ok(())
}

fn apply_env(
    settings: &mut Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    if let Some(v) = lookup("QUIZ_SERVER_URL") {
        settings.server_url = v;
    }
    for key in ENV_KEYS {
        if let Some(v) = lookup(&format!("APP__{}", key.to_uppercase())) {
            settings.apply(key, &v)?;
        }
    }
    Ok(())
}

const ENV_KEYS: &[&str] = &[
    "server_url",
    "chat_id",
    "user_id",
    "display_name",
    "poll_interval_ms",
    "probe_interval_ms",
    "deadline_slop_ms",
    "progress_interval_ms",
    "countdown_skip_ms",
    "preload_cap_ms",
    "fallback_buffer_ms",
    "default_countdown_sec",
    "rematch_poll_ms",
    "badge_ttl_ms",
    "write_retries",
    "write_retry_base_ms",
    "timer_seconds",
    "rounds_total",
];

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
