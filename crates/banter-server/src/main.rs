//! # banter-server
//!
//! Real-time message relay for the banter chat service.
//!
//! This binary provides:
//! - **TCP relay** speaking length-prefixed bincode frames
//! - **Session registry** tracking who is online and fanning out
//!   presence updates
//! - **Friend graph** with a request/accept handshake gating private
//!   messages
//! - **Moderation** (list, ban, unban, delete) for a single configured
//!   administrator account, enforced against live sessions

mod config;
mod connection;
mod error;
mod moderation;
mod registry;
mod router;
mod social;
mod state;

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use banter_shared::auth::hash_password;
use banter_store::Database;

use crate::config::{ServerConfig, DEFAULT_ADMIN_PASSWORD};
use crate::state::RelayState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,banter_server=debug")),
        )
        .init();

    info!("Starting banter relay server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");
    if config.admin_password == DEFAULT_ADMIN_PASSWORD {
        warn!(
            user = %config.admin_username,
            "ADMIN_PASSWORD is unset; the administrator account uses the development default"
        );
    }

    // -----------------------------------------------------------------------
    // 3. Open the store and seed the administrator account
    // -----------------------------------------------------------------------
    let database = match &config.db_path {
        Some(path) => Database::open_at(path)?,
        None => Database::new()?,
    };

    let admin_digest = hash_password(&config.admin_password);
    if database.create_user(&config.admin_username, &admin_digest)? {
        info!(user = %config.admin_username, "administrator account created");
    } else {
        debug!(user = %config.admin_username, "administrator account already present");
    }

    // -----------------------------------------------------------------------
    // 4. Bind the listener and serve
    // -----------------------------------------------------------------------
    let listener = TcpListener::bind(config.listen_addr).await?;
    info!(addr = %config.listen_addr, "banter relay listening");

    let state = Arc::new(RelayState::new(config, database));

    // tokio::select! ensures that if either the accept loop or a shutdown
    // signal arrives, we exit cleanly.
    tokio::select! {
        result = connection::accept_loop(listener, state) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "accept loop failed");
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
