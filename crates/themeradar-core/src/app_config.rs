use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Which backend the search-trends collector talks to.
///
/// `Fixture` is a real, deterministic implementation for tests and
/// credential-less deployments. It is selected here, explicitly, never by a
/// hidden branch inside the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendsBackendKind {
    Http,
    Fixture,
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub sources_path: PathBuf,

    /// One credential per external source. `None` disables that collector
    /// for the run instead of failing the whole run.
    pub trends_api_key: Option<String>,
    pub forum_api_key: Option<String>,
    pub social_api_key: Option<String>,
    pub launchboard_api_key: Option<String>,
    pub codehost_api_key: Option<String>,
    pub trends_backend: TrendsBackendKind,

    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,

    pub collect_request_timeout_secs: u64,
    pub collect_user_agent: String,
    pub collect_max_concurrent_sources: usize,
    pub collect_max_attempts: u32,
    pub collect_backoff_base_ms: u64,
    pub collect_backoff_cap_ms: u64,
    pub collect_backoff_jitter_ms: u64,

    pub batch_size: usize,
    pub batch_max_concurrency: usize,
    pub score_change_threshold: i32,
    pub market_size_change_threshold: i64,
    pub market_size_change_threshold_light: i64,
    pub observation_retention_days: i64,

    pub realtime_window_secs: i64,
    pub retract_stale_insights: bool,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("sources_path", &self.sources_path)
            .field("database_url", &"[redacted]")
            .field(
                "trends_api_key",
                &self.trends_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field(
                "forum_api_key",
                &self.forum_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field(
                "social_api_key",
                &self.social_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field(
                "launchboard_api_key",
                &self.launchboard_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field(
                "codehost_api_key",
                &self.codehost_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("trends_backend", &self.trends_backend)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field(
                "collect_request_timeout_secs",
                &self.collect_request_timeout_secs,
            )
            .field("collect_user_agent", &self.collect_user_agent)
            .field(
                "collect_max_concurrent_sources",
                &self.collect_max_concurrent_sources,
            )
            .field("collect_max_attempts", &self.collect_max_attempts)
            .field("collect_backoff_base_ms", &self.collect_backoff_base_ms)
            .field("collect_backoff_cap_ms", &self.collect_backoff_cap_ms)
            .field(
                "collect_backoff_jitter_ms",
                &self.collect_backoff_jitter_ms,
            )
            .field("batch_size", &self.batch_size)
            .field("batch_max_concurrency", &self.batch_max_concurrency)
            .field("score_change_threshold", &self.score_change_threshold)
            .field(
                "market_size_change_threshold",
                &self.market_size_change_threshold,
            )
            .field(
                "market_size_change_threshold_light",
                &self.market_size_change_threshold_light,
            )
            .field(
                "observation_retention_days",
                &self.observation_retention_days,
            )
            .field("realtime_window_secs", &self.realtime_window_secs)
            .field("retract_stale_insights", &self.retract_stale_insights)
            .finish()
    }
}

impl AppConfig {
    /// Credential for one source, if configured.
    #[must_use]
    pub fn credential_for(&self, source: crate::SourceId) -> Option<&str> {
        match source {
            crate::SourceId::Trends => self.trends_api_key.as_deref(),
            crate::SourceId::Forum => self.forum_api_key.as_deref(),
            crate::SourceId::Social => self.social_api_key.as_deref(),
            crate::SourceId::Launchboard => self.launchboard_api_key.as_deref(),
            crate::SourceId::Codehost => self.codehost_api_key.as_deref(),
        }
    }
}
