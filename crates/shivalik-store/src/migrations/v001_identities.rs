//! v001 -- Identities and the relationship graph.
//!
//! Friendship is stored as one row per direction so "are A and B friends" is
//! a single-key lookup from either side. Pending requests live on the
//! receiver. Composite primary keys give set semantics; CHECK constraints keep
//! an identity out of its own sets.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id            TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    name          TEXT NOT NULL UNIQUE,
    class_section TEXT NOT NULL,
    profile_pic   TEXT NOT NULL,
    password      TEXT NOT NULL,               -- opaque credential
    joined_at     TEXT NOT NULL                -- RFC-3339, fixed width
);

-- ----------------------------------------------------------------
-- Friendships (mirrored, one row per direction)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS friendships (
    user_id    TEXT NOT NULL,
    friend_id  TEXT NOT NULL,
    created_at TEXT NOT NULL,

    PRIMARY KEY (user_id, friend_id),
    CHECK (user_id <> friend_id),
    FOREIGN KEY (user_id)   REFERENCES users(id),
    FOREIGN KEY (friend_id) REFERENCES users(id)
);

-- ----------------------------------------------------------------
-- Pending friend requests, stored on the receiver
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS friend_requests (
    receiver_id TEXT NOT NULL,
    sender_id   TEXT NOT NULL,
    created_at  TEXT NOT NULL,

    PRIMARY KEY (receiver_id, sender_id),
    CHECK (receiver_id <> sender_id),
    FOREIGN KEY (receiver_id) REFERENCES users(id),
    FOREIGN KEY (sender_id)   REFERENCES users(id)
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
