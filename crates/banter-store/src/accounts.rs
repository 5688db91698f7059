//! CRUD operations for [`UserRecord`] accounts.

use chrono::{DateTime, Utc};
use rand::Rng;
use rusqlite::params;

use banter_shared::constants::{DEFAULT_AVATAR_COLOR, RESERVED_NAMES};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::UserRecord;

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Create a new account with a random avatar color.
    ///
    /// Returns `false` when the username is already taken or is one of
    /// the reserved protocol names (the public-room sentinel and the
    /// system sender must never collide with a real account).
    pub fn create_user(&self, username: &str, password_hash: &str) -> Result<bool> {
        if username.is_empty() || RESERVED_NAMES.contains(&username) {
            return Ok(false);
        }

        let color = format!("#{:06x}", rand::thread_rng().gen_range(0..0x100_0000));

        let result = self.conn().execute(
            "INSERT INTO users (username, password_hash, avatar_color, is_banned, created_at)
             VALUES (?1, ?2, ?3, 0, ?4)",
            params![username, password_hash, color, Utc::now().to_rfc3339()],
        );

        match result {
            Ok(_) => Ok(true),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a full account record.
    pub fn get_user(&self, username: &str) -> Result<UserRecord> {
        self.conn()
            .query_row(
                "SELECT username, password_hash, avatar_color, avatar_image, is_banned, created_at
                 FROM users
                 WHERE username = ?1",
                params![username],
                row_to_user,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Check a username/digest pair against the stored credentials.
    ///
    /// Unknown usernames verify as `false`, not as an error.
    pub fn verify_credentials(&self, username: &str, password_hash: &str) -> Result<bool> {
        let stored: Option<String> = self
            .conn()
            .query_row(
                "SELECT password_hash FROM users WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(ignore_no_rows)?;

        Ok(stored.as_deref() == Some(password_hash))
    }

    /// Whether the account exists.
    pub fn user_exists(&self, username: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn()
            .query_row(
                "SELECT 1 FROM users WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(ignore_no_rows)?;

        Ok(found.is_some())
    }

    /// Whether the account is banned. Unknown accounts are not banned.
    pub fn is_banned(&self, username: &str) -> Result<bool> {
        let flag: Option<i64> = self
            .conn()
            .query_row(
                "SELECT is_banned FROM users WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(ignore_no_rows)?;

        Ok(flag == Some(1))
    }

    /// List every account as `(username, banned)`, in insertion order.
    pub fn list_all_users(&self) -> Result<Vec<(String, bool)>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT username, is_banned FROM users")?;

        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? == 1))
        })?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }

    /// The account's avatar color, or the default when the account (or
    /// its color) is missing.
    pub fn get_avatar_color(&self, username: &str) -> Result<String> {
        let color: Option<String> = self
            .conn()
            .query_row(
                "SELECT avatar_color FROM users WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(ignore_no_rows)?;

        Ok(color.unwrap_or_else(|| DEFAULT_AVATAR_COLOR.to_string()))
    }

    /// The account's stored avatar image, if any.
    pub fn get_avatar(&self, username: &str) -> Result<Option<Vec<u8>>> {
        let image: Option<Option<Vec<u8>>> = self
            .conn()
            .query_row(
                "SELECT avatar_image FROM users WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(ignore_no_rows)?;

        Ok(image.flatten())
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Set or clear the ban flag.
    pub fn set_banned(&self, username: &str, banned: bool) -> Result<()> {
        self.conn().execute(
            "UPDATE users SET is_banned = ?1 WHERE username = ?2",
            params![banned as i64, username],
        )?;
        Ok(())
    }

    /// Replace the stored avatar image.
    pub fn set_avatar(&self, username: &str, image: &[u8]) -> Result<()> {
        self.conn().execute(
            "UPDATE users SET avatar_image = ?1 WHERE username = ?2",
            params![image, username],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete an account and every friend edge referencing it.
    pub fn delete_user(&self, username: &str) -> Result<()> {
        self.conn()
            .execute("DELETE FROM users WHERE username = ?1", params![username])?;
        self.conn().execute(
            "DELETE FROM friends WHERE user_a = ?1 OR user_b = ?1",
            params![username],
        )?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Treat `QueryReturnedNoRows` as `None` instead of an error.
fn ignore_no_rows<T>(e: rusqlite::Error) -> std::result::Result<Option<T>, StoreError> {
    match e {
        rusqlite::Error::QueryReturnedNoRows => Ok(None),
        other => Err(StoreError::Sqlite(other)),
    }
}

/// Map a `rusqlite::Row` to a [`UserRecord`].
fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRecord> {
    let created_str: String = row.get(5)?;
    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(UserRecord {
        username: row.get(0)?,
        password_hash: row.get(1)?,
        avatar_color: row.get(2)?,
        avatar_image: row.get(3)?,
        is_banned: row.get::<_, i64>(4)? == 1,
        created_at,
    })
}
