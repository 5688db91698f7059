//! Shared relay state injected into every connection handler.

use tokio::sync::Mutex;

use banter_store::Database;

use crate::config::ServerConfig;
use crate::registry::SessionRegistry;

/// Everything a connection handler needs: the session directory, the
/// user store, and the static configuration.
///
/// Wrapped in an `Arc` by `main` and passed by reference everywhere —
/// never ambient global state.
pub struct RelayState {
    /// Who is online right now.
    pub registry: SessionRegistry,
    /// The authoritative account and friend-graph store. Calls are
    /// quick, synchronous local-disk access behind an async mutex.
    pub store: Mutex<Database>,
    /// Static configuration loaded at startup.
    pub config: ServerConfig,
}

impl RelayState {
    pub fn new(config: ServerConfig, database: Database) -> Self {
        Self {
            registry: SessionRegistry::new(),
            store: Mutex::new(database),
            config,
        }
    }

    /// Whether the given bound username is the configured administrator.
    pub fn is_admin(&self, username: Option<&str>) -> bool {
        username == Some(self.config.admin_username.as_str())
    }
}
