//! v001 -- Initial schema creation.
//!
//! Creates the two core tables: `users` and `friends`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r##"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    username      TEXT PRIMARY KEY NOT NULL,
    password_hash TEXT NOT NULL,              -- hex-encoded BLAKE3 digest
    avatar_color  TEXT NOT NULL,              -- "#rrggbb"
    avatar_image  BLOB,                       -- optional raw image bytes
    is_banned     INTEGER NOT NULL DEFAULT 0, -- boolean 0/1
    created_at    TEXT NOT NULL               -- ISO-8601 / RFC-3339
);

-- ----------------------------------------------------------------
-- Friend edges (directional; accepted friendships are mirrored)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS friends (
    user_a     TEXT NOT NULL,                 -- edge origin
    user_b     TEXT NOT NULL,                 -- edge target
    status     TEXT NOT NULL,                 -- 'PENDING' | 'ACCEPTED'
    created_at TEXT NOT NULL,

    PRIMARY KEY (user_a, user_b)
);

CREATE INDEX IF NOT EXISTS idx_friends_user_b ON friends(user_b);
"##;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
