//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the relay can start with zero
//! configuration for local development.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use banter_shared::constants::DEFAULT_PORT;

/// Placeholder password the administrator account is seeded with when
/// `ADMIN_PASSWORD` is unset.
pub const DEFAULT_ADMIN_PASSWORD: &str = "change-me";

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// TCP socket address the relay listens on.
    /// Env: `LISTEN_ADDR`
    /// Default: `0.0.0.0:8888`
    pub listen_addr: SocketAddr,

    /// Explicit database file path; the platform data directory is used
    /// when unset.
    /// Env: `DB_PATH`
    pub db_path: Option<PathBuf>,

    /// The single account allowed to issue moderation commands.
    /// Env: `ADMIN_USERNAME`
    /// Default: `admin`
    pub admin_username: String,

    /// Password the administrator account is seeded with on first start.
    /// Env: `ADMIN_PASSWORD`
    /// Default: [`DEFAULT_ADMIN_PASSWORD`] (development only).
    pub admin_password: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: ([0, 0, 0, 0], DEFAULT_PORT).into(),
            db_path: None,
            admin_username: "admin".to_string(),
            admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("LISTEN_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.listen_addr = parsed;
            } else {
                tracing::warn!(
                    value = %addr,
                    "Invalid LISTEN_ADDR, using default"
                );
            }
        }

        if let Ok(path) = std::env::var("DB_PATH") {
            if !path.is_empty() {
                config.db_path = Some(PathBuf::from(path));
            }
        }

        if let Ok(name) = std::env::var("ADMIN_USERNAME") {
            if !name.is_empty() {
                config.admin_username = name;
            }
        }

        if let Ok(password) = std::env::var("ADMIN_PASSWORD") {
            if !password.is_empty() {
                config.admin_password = password;
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

// The admin password must never end up in logs.
impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("listen_addr", &self.listen_addr)
            .field("db_path", &self.db_path)
            .field("admin_username", &self.admin_username)
            .field("admin_password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.listen_addr, ([0, 0, 0, 0], 8888).into());
        assert_eq!(config.admin_username, "admin");
        assert!(config.db_path.is_none());
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = ServerConfig {
            admin_password: "sekrit".to_string(),
            ..ServerConfig::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sekrit"));
        assert!(rendered.contains("<redacted>"));
    }
}
