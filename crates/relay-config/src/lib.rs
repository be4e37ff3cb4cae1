use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound for `RESULT_TTL_SECS`: one week.
pub const MAX_RESULT_TTL_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config failed: {0}")]
    Read(String),
    #[error("parse config failed: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: Server,
    pub platform: Platform,
    pub automation: Automation,
    pub cache: Cache,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Server {
    pub listen_addr: String,
}

/// Conversation platform: REST API access and Canvas signing secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Platform {
    pub access_token: Option<String>,
    pub api_base_url: String,
    pub client_secret: Option<String>,
    pub fetch_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Automation {
    pub webhook_url: Option<String>,
    pub job_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Cache {
    pub ttl_secs: u64,
    pub max_entries: usize,
    pub sweep_interval_secs: u64,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self {
            access_token: None,
            api_base_url: "https://api.intercom.io".to_string(),
            client_secret: None,
            fetch_timeout_secs: 10,
        }
    }
}

impl Default for Automation {
    fn default() -> Self {
        Self {
            webhook_url: None,
            job_timeout_secs: 30,
        }
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self {
            ttl_secs: 5 * 60,
            max_entries: 10_000,
            sweep_interval_secs: 60,
        }
    }
}

impl Config {
    /// Names of the environment variables whose absence stops `initialize`
    /// from dispatching a job.
    pub fn missing_external(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if is_blank(self.platform.access_token.as_deref()) {
            missing.push("INTERCOM_ACCESS_TOKEN");
        }
        if is_blank(self.automation.webhook_url.as_deref()) {
            missing.push("AUTOMATION_WEBHOOK_URL");
        }
        missing
    }

    pub fn listen_socket(&self) -> Result<SocketAddr, ConfigError> {
        self.server
            .listen_addr
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("listen_addr: {e}")))
    }
}

pub fn load_from_env() -> Result<Config, ConfigError> {
    load_from_lookup(Config::default(), |key| std::env::var(key).ok())
}

/// Reads a YAML file and lets environment variables override it.
pub fn load_with_file(path: &str) -> Result<Config, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read(e.to_string()))?;
    let base: Config = serde_yaml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
    load_from_lookup(base, |key| std::env::var(key).ok())
}

pub fn load_from_lookup<F>(mut cfg: Config, lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |keys: &[&str]| {
        keys.iter()
            .filter_map(|key| lookup(key))
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty())
    };

    if let Some(addr) = get(&["LISTEN_ADDR"]) {
        cfg.server.listen_addr = addr;
    } else if let Some(port) = get(&["PORT"]) {
        let port: u16 = port
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("PORT={port}: {e}")))?;
        cfg.server.listen_addr = format!("0.0.0.0:{port}");
    }

    if let Some(v) = get(&["INTERCOM_ACCESS_TOKEN", "API_TOKEN"]) {
        cfg.platform.access_token = Some(v);
    }
    if let Some(v) = get(&["INTERCOM_API_BASE_URL", "API_BASE_URL"]) {
        cfg.platform.api_base_url = v;
    }
    if let Some(v) = get(&["INTERCOM_CLIENT_SECRET"]) {
        cfg.platform.client_secret = Some(v);
    }
    if let Some(v) = get(&["FETCH_TIMEOUT_SECS"]) {
        cfg.platform.fetch_timeout_secs = parse_number("FETCH_TIMEOUT_SECS", &v)?;
    }

    if let Some(v) = get(&["AUTOMATION_WEBHOOK_URL", "N8N_WEBHOOK_URL"]) {
        cfg.automation.webhook_url = Some(v);
    }
    if let Some(v) = get(&["JOB_TIMEOUT_SECS"]) {
        cfg.automation.job_timeout_secs = parse_number("JOB_TIMEOUT_SECS", &v)?;
    }

    if let Some(v) = get(&["RESULT_TTL_SECS"]) {
        cfg.cache.ttl_secs = parse_number("RESULT_TTL_SECS", &v)?;
    }
    if let Some(v) = get(&["CACHE_MAX_ENTRIES"]) {
        cfg.cache.max_entries = parse_number("CACHE_MAX_ENTRIES", &v)?;
    }
    if let Some(v) = get(&["CACHE_SWEEP_SECS"]) {
        cfg.cache.sweep_interval_secs = parse_number("CACHE_SWEEP_SECS", &v)?;
    }

    validate(&cfg)?;
    Ok(cfg)
}

fn parse_number<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| ConfigError::Invalid(format!("{key}={value}: {e}")))
}

fn validate(cfg: &Config) -> Result<(), ConfigError> {
    cfg.listen_socket()?;
    if cfg.platform.api_base_url.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "platform.api_base_url must not be empty".to_string(),
        ));
    }
    if cfg.platform.fetch_timeout_secs == 0 {
        return Err(ConfigError::Invalid(
            "FETCH_TIMEOUT_SECS must be >= 1".to_string(),
        ));
    }
    if cfg.automation.job_timeout_secs == 0 {
        return Err(ConfigError::Invalid(
            "JOB_TIMEOUT_SECS must be >= 1".to_string(),
        ));
    }
    if cfg.cache.ttl_secs == 0 || cfg.cache.ttl_secs > MAX_RESULT_TTL_SECS {
        return Err(ConfigError::Invalid(format!(
            "RESULT_TTL_SECS must be between 1 and {MAX_RESULT_TTL_SECS}"
        )));
    }
    if cfg.cache.max_entries == 0 {
        return Err(ConfigError::Invalid(
            "CACHE_MAX_ENTRIES must be >= 1".to_string(),
        ));
    }
    Ok(())
}

fn is_blank(value: Option<&str>) -> bool {
    value.map(|v| v.trim().is_empty()).unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn write_temp_config(contents: &str) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!("relay-config-test-{nanos}.yaml"));
        std::fs::write(&path, contents).expect("write temp config");
        path.to_string_lossy().to_string()
    }

    #[test]
    fn defaults_leave_external_values_missing() {
        let cfg = load_from_lookup(Config::default(), lookup(&[])).unwrap();
        assert_eq!(cfg.server.listen_addr, "0.0.0.0:3000");
        assert_eq!(cfg.cache.ttl_secs, 300);
        assert_eq!(
            cfg.missing_external(),
            vec!["INTERCOM_ACCESS_TOKEN", "AUTOMATION_WEBHOOK_URL"]
        );
    }

    #[test]
    fn reads_primary_variables() {
        let cfg = load_from_lookup(
            Config::default(),
            lookup(&[
                ("PORT", "8080"),
                ("INTERCOM_ACCESS_TOKEN", "tok"),
                ("INTERCOM_CLIENT_SECRET", "sekret"),
                ("AUTOMATION_WEBHOOK_URL", "https://hooks.example.com/x"),
                ("RESULT_TTL_SECS", "60"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.server.listen_addr, "0.0.0.0:8080");
        assert_eq!(cfg.platform.access_token.as_deref(), Some("tok"));
        assert_eq!(cfg.platform.client_secret.as_deref(), Some("sekret"));
        assert_eq!(cfg.cache.ttl_secs, 60);
        assert!(cfg.missing_external().is_empty());
    }

    #[test]
    fn legacy_names_are_fallbacks() {
        let cfg = load_from_lookup(
            Config::default(),
            lookup(&[
                ("API_TOKEN", "legacy"),
                ("API_BASE_URL", "http://localhost:9999"),
                ("N8N_WEBHOOK_URL", "http://localhost:5678/webhook/a"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.platform.access_token.as_deref(), Some("legacy"));
        assert_eq!(cfg.platform.api_base_url, "http://localhost:9999");
        assert_eq!(
            cfg.automation.webhook_url.as_deref(),
            Some("http://localhost:5678/webhook/a")
        );
    }

    #[test]
    fn blank_values_count_as_missing() {
        let cfg = load_from_lookup(
            Config::default(),
            lookup(&[("INTERCOM_ACCESS_TOKEN", "  "), ("AUTOMATION_WEBHOOK_URL", "x")]),
        )
        .unwrap();
        assert_eq!(cfg.missing_external(), vec!["INTERCOM_ACCESS_TOKEN"]);
    }

    #[test]
    fn rejects_bad_numbers() {
        let err = load_from_lookup(Config::default(), lookup(&[("PORT", "eighty")]))
            .expect_err("expected invalid port");
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = load_from_lookup(Config::default(), lookup(&[("RESULT_TTL_SECS", "0")]))
            .expect_err("expected invalid ttl");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn ttl_has_an_upper_bound() {
        let err = load_from_lookup(
            Config::default(),
            lookup(&[("RESULT_TTL_SECS", "10000000000000")]),
        )
        .expect_err("expected oversized ttl to be rejected");
        assert!(matches!(err, ConfigError::Invalid(_)));

        let max = MAX_RESULT_TTL_SECS.to_string();
        let cfg = load_from_lookup(Config::default(), lookup(&[("RESULT_TTL_SECS", max.as_str())]))
            .unwrap();
        assert_eq!(cfg.cache.ttl_secs, MAX_RESULT_TTL_SECS);
    }

    #[test]
    fn yaml_file_supplies_base_values() {
        let path = write_temp_config(
            r#"
server:
  listen_addr: "127.0.0.1:4000"
automation:
  webhook_url: "https://hooks.example.com/from-file"
cache:
  ttl_secs: 120
"#,
        );
        let text = std::fs::read_to_string(&path).unwrap();
        let base: Config = serde_yaml::from_str(&text).unwrap();
        let cfg = load_from_lookup(base, lookup(&[("RESULT_TTL_SECS", "30")])).unwrap();
        assert_eq!(cfg.server.listen_addr, "127.0.0.1:4000");
        assert_eq!(
            cfg.automation.webhook_url.as_deref(),
            Some("https://hooks.example.com/from-file")
        );
        assert_eq!(cfg.cache.ttl_secs, 30);
        assert_eq!(cfg.cache.max_entries, 10_000);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = load_with_file("/nonexistent/relay.yaml").expect_err("expected read error");
        assert!(matches!(err, ConfigError::Read(_)));
    }
}
