//! CRUD operations for friend edges.
//!
//! Edges are directional rows `(user_a, user_b, status)`. A pending
//! request is a single row from requester to target; accepting promotes
//! that row to `ACCEPTED` and inserts the mirror row, so that the
//! friendship resolves in both directions.

use chrono::Utc;
use rusqlite::params;

use crate::database::Database;
use crate::error::Result;
use crate::models::{FriendEdge, FriendStatus};

impl Database {
    /// Insert a directed edge if it does not already exist.
    ///
    /// Duplicate requests are idempotent.
    pub fn add_friend_edge(&self, from: &str, to: &str, status: FriendStatus) -> Result<()> {
        self.conn().execute(
            "INSERT OR IGNORE INTO friends (user_a, user_b, status, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![from, to, status.as_str(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Promote the pending edge `(requester, accepter)` to accepted and
    /// insert the mirror edge so both directions resolve.
    pub fn promote_friend_edge(&self, requester: &str, accepter: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE friends SET status = 'ACCEPTED' WHERE user_a = ?1 AND user_b = ?2",
            params![requester, accepter],
        )?;
        self.conn().execute(
            "INSERT OR IGNORE INTO friends (user_a, user_b, status, created_at)
             VALUES (?1, ?2, 'ACCEPTED', ?3)",
            params![accepter, requester, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Delete both directional edges between two users. No-op when none
    /// exist.
    pub fn delete_friend_edges(&self, user_a: &str, user_b: &str) -> Result<()> {
        self.conn().execute(
            "DELETE FROM friends
             WHERE (user_a = ?1 AND user_b = ?2) OR (user_a = ?2 AND user_b = ?1)",
            params![user_a, user_b],
        )?;
        Ok(())
    }

    /// Whether the directed edge `from -> to` is accepted.
    pub fn is_friend_accepted(&self, from: &str, to: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn()
            .query_row(
                "SELECT 1 FROM friends
                 WHERE user_a = ?1 AND user_b = ?2 AND status = 'ACCEPTED'",
                params![from, to],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(crate::StoreError::Sqlite(other)),
            })?;

        Ok(found.is_some())
    }

    /// Fetch the directed edge `from -> to`, if one exists.
    pub fn get_friend_edge(&self, from: &str, to: &str) -> Result<Option<FriendEdge>> {
        let row: Option<(String, String, String)> = self
            .conn()
            .query_row(
                "SELECT user_a, user_b, status FROM friends
                 WHERE user_a = ?1 AND user_b = ?2",
                params![from, to],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(crate::StoreError::Sqlite(other)),
            })?;

        Ok(row.and_then(|(user_a, user_b, status)| {
            FriendStatus::parse(&status).map(|status| FriendEdge {
                user_a,
                user_b,
                status,
            })
        }))
    }

    /// List the accepted friends of `username`, alphabetically.
    pub fn list_accepted_friends(&self, username: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn().prepare(
            "SELECT user_b FROM friends
             WHERE user_a = ?1 AND status = 'ACCEPTED'
             ORDER BY user_b ASC",
        )?;

        let rows = stmt.query_map(params![username], |row| row.get(0))?;

        let mut friends = Vec::new();
        for row in rows {
            friends.push(row?);
        }
        Ok(friends)
    }
}
