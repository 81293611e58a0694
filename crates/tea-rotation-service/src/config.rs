//! Service configuration.

use tea_rotation_core::{
    RankingPolicy, UserId, DEFAULT_CANDIDATE_COUNT, DEFAULT_COMPLETED_GRACE_SECONDS,
};

/// Default commit-claim lease in seconds.
pub const DEFAULT_COMMIT_LEASE_SECONDS: i64 = 60;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// PostgreSQL connection string. The in-memory store is used when unset.
    pub database_url: Option<String>,

    /// Maximum pooled database connections.
    pub database_max_connections: u32,

    /// HS256 secret used to verify caller identity tokens (optional).
    pub jwt_secret: Option<String>,

    /// Key required in `X-Admin-Key` for admin endpoints (optional).
    pub admin_api_key: Option<String>,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// How long a completed session stays "current", in seconds.
    pub completed_grace_seconds: i64,

    /// How long a commit claim stays exclusive, in seconds.
    pub commit_lease_seconds: i64,

    /// Number of candidates proposed in the first summarize phase.
    pub candidate_count: usize,

    /// Users ranked behind everyone else.
    pub deprioritized_user_ids: Vec<UserId>,
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            database_url: non_empty_var("DATABASE_URL"),
            database_max_connections: parsed_var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or(defaults.database_max_connections),
            jwt_secret: non_empty_var("JWT_SECRET"),
            admin_api_key: non_empty_var("ADMIN_API_KEY"),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            max_body_bytes: parsed_var("MAX_BODY_BYTES").unwrap_or(defaults.max_body_bytes),
            request_timeout_seconds: parsed_var("REQUEST_TIMEOUT_SECONDS")
                .unwrap_or(defaults.request_timeout_seconds),
            completed_grace_seconds: parsed_var("COMPLETED_GRACE_SECONDS")
                .unwrap_or(defaults.completed_grace_seconds),
            commit_lease_seconds: parsed_var("COMMIT_LEASE_SECONDS")
                .unwrap_or(defaults.commit_lease_seconds),
            candidate_count: parsed_var("CANDIDATE_COUNT").unwrap_or(defaults.candidate_count),
            deprioritized_user_ids: std::env::var("DEPRIORITIZED_USER_IDS")
                .map(|raw| parse_user_ids(&raw))
                .unwrap_or_default(),
        }
    }

    /// Ranking policy derived from the configuration.
    #[must_use]
    pub fn ranking_policy(&self) -> RankingPolicy {
        RankingPolicy::deprioritizing(self.deprioritized_user_ids.iter().copied())
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            database_url: None,
            database_max_connections: 5,
            jwt_secret: None,
            admin_api_key: None,
            cors_origins: vec!["*".into()],
            max_body_bytes: 64 * 1024,
            request_timeout_seconds: 30,
            completed_grace_seconds: DEFAULT_COMPLETED_GRACE_SECONDS,
            commit_lease_seconds: DEFAULT_COMMIT_LEASE_SECONDS,
            candidate_count: DEFAULT_CANDIDATE_COUNT,
            deprioritized_user_ids: Vec::new(),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

/// Parse a comma-separated id list, skipping and logging invalid entries.
fn parse_user_ids(raw: &str) -> Vec<UserId> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse() {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(value = %s, error = %e, "Ignoring invalid deprioritized user id");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_user_ids_skips_garbage() {
        let id = UserId::generate();
        let parsed = parse_user_ids(&format!(" {id} ,, not-an-id"));
        assert_eq!(parsed, vec![id]);
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = ServiceConfig::default();
        assert_eq!(config.candidate_count, 2);
        assert_eq!(config.completed_grace_seconds, 300);
        assert!(config.ranking_policy().deprioritized.is_empty());
    }
}
