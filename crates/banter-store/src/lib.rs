//! # banter-store
//!
//! Durable account and friend-graph storage for the banter relay, backed
//! by SQLite.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for account
//! records and friend edges. The store is the authoritative source for
//! credentials, ban flags, avatars, and friendship state; the relay's
//! in-memory session registry is rebuilt against it on every login.

pub mod accounts;
pub mod database;
pub mod friends;
pub mod migrations;
pub mod models;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
