//! Domain model structs persisted in the relay database.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRecord {
    /// Unique account name; the key everywhere in the relay.
    pub username: String,
    /// Hex-encoded BLAKE3 digest of the password.
    pub password_hash: String,
    /// Hex color assigned at registration, shown next to the name.
    pub avatar_color: String,
    /// Optional custom avatar image bytes.
    pub avatar_image: Option<Vec<u8>>,
    /// Whether the administrator has banned this account.
    pub is_banned: bool,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Friend edges
// ---------------------------------------------------------------------------

/// Lifecycle state of a directed friend edge.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FriendStatus {
    /// Request sent, not yet answered.
    Pending,
    /// Friendship confirmed; stored in both directions.
    Accepted,
}

impl FriendStatus {
    /// The TEXT value persisted in the `friends.status` column.
    pub fn as_str(self) -> &'static str {
        match self {
            FriendStatus::Pending => "PENDING",
            FriendStatus::Accepted => "ACCEPTED",
        }
    }

    /// Parse the persisted TEXT value.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(FriendStatus::Pending),
            "ACCEPTED" => Some(FriendStatus::Accepted),
            _ => None,
        }
    }
}

/// A directed friendship record between two accounts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FriendEdge {
    pub user_a: String,
    pub user_b: String,
    pub status: FriendStatus,
}
