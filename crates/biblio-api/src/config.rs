use biblio_lifecycle::DEFAULT_DUE_DAYS;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Server settings read from `BIBLIO_*` environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    /// SQLite file; in-memory store when unset.
    pub db_path: Option<PathBuf>,
    pub default_due_days: u32,
    /// Seed dev users and sample books on startup.
    pub seed: bool,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let listen = get("BIBLIO_LISTEN")
            .unwrap_or_else(|| "0.0.0.0:8002".to_string())
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                var: "BIBLIO_LISTEN",
                reason: e.to_string(),
            })?;
        let default_due_days = match get("BIBLIO_DEFAULT_DUE_DAYS") {
            None => DEFAULT_DUE_DAYS,
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(days) if days > 0 => days,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "BIBLIO_DEFAULT_DUE_DAYS",
                        reason: format!("expected a positive integer, got {raw:?}"),
                    })
                }
            },
        };
        Ok(Self {
            listen,
            db_path: get("BIBLIO_DB_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            default_due_days,
            seed: get("BIBLIO_SEED").is_some_and(|v| matches!(v.trim(), "1" | "true" | "yes")),
        })
    }
}
