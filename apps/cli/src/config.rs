use std::{collections::HashMap, fs, time::Duration};

use serde::Deserialize;

pub const CONFIG_FILE: &str = "client.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    pub api_base_url: String,
    pub database_url: String,
    pub request_timeout_secs: u64,
    pub dashboard_limit: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api".into(),
            database_url: "sqlite://./data/client.db".into(),
            request_timeout_secs: 30,
            dashboard_limit: client_core::DEFAULT_DASHBOARD_LIMIT,
        }
    }
}

impl Settings {
    /// `None` disables the client-side timeout.
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

pub fn load_settings() -> Settings {
    let file = fs::read_to_string(CONFIG_FILE).ok();
    resolve_settings(file.as_deref(), |key| std::env::var(key).ok())
}

/// Defaults, then `client.toml`, then environment. Unparseable numbers keep
/// the previous layer's value.
pub fn resolve_settings(file: Option<&str>, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Some(raw) = file {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, toml::Value>>(raw) {
            if let Some(v) = string_value(&file_cfg, "api_base_url") {
                settings.api_base_url = v;
            }
            if let Some(v) = string_value(&file_cfg, "database_url") {
                settings.database_url = v;
            }
            if let Some(v) = string_value(&file_cfg, "request_timeout_secs") {
                apply_parsed(&mut settings.request_timeout_secs, &v);
            }
            if let Some(v) = string_value(&file_cfg, "dashboard_limit") {
                apply_parsed(&mut settings.dashboard_limit, &v);
            }
        }
    }

    if let Some(v) = env("API_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = env("APP__API_URL") {
        settings.api_base_url = v;
    }

    if let Some(v) = env("DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = env("APP__DATABASE_URL") {
        settings.database_url = v;
    }

    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECS") {
        apply_parsed(&mut settings.request_timeout_secs, &v);
    }
    if let Some(v) = env("APP__DASHBOARD_LIMIT") {
        apply_parsed(&mut settings.dashboard_limit, &v);
    }

    settings.database_url = normalize_database_url(&settings.database_url);
    settings
}

fn string_value(table: &HashMap<String, toml::Value>, key: &str) -> Option<String> {
    match table.get(key)? {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        _ => None,
    }
}

fn apply_parsed<T: std::str::FromStr>(target: &mut T, raw: &str) {
    if let Ok(parsed) = raw.trim().parse::<T>() {
        *target = parsed;
    }
}

pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite:") || raw_database_url.contains("://") {
        return raw_database_url.to_string();
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
