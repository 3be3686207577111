/// Room API configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Debounce interval for code room propagation, in milliseconds.
    pub sync_debounce_ms: u64,
    /// Maximum number of messages returned by a history fetch.
    pub history_limit: usize,
    /// Snowflake worker id for this instance.
    pub worker_id: u16,
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults suitable for a single local instance.
    pub fn from_env() -> Self {
        Self {
            port: env_or("PORT", 4004),
            sync_debounce_ms: env_or("SYNC_DEBOUNCE_MS", 300),
            history_limit: env_or("HISTORY_LIMIT", 100),
            worker_id: env_or("WORKER_ID", 0),
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
