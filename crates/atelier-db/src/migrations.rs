use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id                  TEXT PRIMARY KEY,
            username            TEXT NOT NULL UNIQUE,
            email               TEXT NOT NULL UNIQUE,
            password            TEXT NOT NULL,
            display_name        TEXT,
            bio                 TEXT,
            avatar_url          TEXT,
            website             TEXT,
            message_permission  TEXT NOT NULL DEFAULT 'everyone'
                CHECK (message_permission IN ('everyone', 'followers', 'existing', 'none')),
            allow_messages      INTEGER NOT NULL DEFAULT 1,
            created_at          TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS follows (
            follower_id TEXT NOT NULL REFERENCES users(id),
            followee_id TEXT NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (follower_id, followee_id),
            CHECK (follower_id <> followee_id)
        );

        CREATE INDEX IF NOT EXISTS idx_follows_followee
            ON follows(followee_id);

        CREATE TABLE IF NOT EXISTS blocks (
            blocker_id TEXT NOT NULL REFERENCES users(id),
            blocked_id TEXT NOT NULL REFERENCES users(id),
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (blocker_id, blocked_id),
            CHECK (blocker_id <> blocked_id)
        );

        CREATE TABLE IF NOT EXISTS projects (
            id          TEXT PRIMARY KEY,
            owner_id    TEXT NOT NULL REFERENCES users(id),
            title       TEXT NOT NULL,
            description TEXT,
            category    TEXT,
            image_url   TEXT,
            view_count  INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_projects_owner
            ON projects(owner_id, created_at);

        CREATE TABLE IF NOT EXISTS project_likes (
            project_id TEXT NOT NULL REFERENCES projects(id),
            user_id    TEXT NOT NULL REFERENCES users(id),
            PRIMARY KEY (project_id, user_id)
        );

        -- View-dedup set for authenticated viewers. Anonymous views bump
        -- projects.view_count directly and never touch this table.
        CREATE TABLE IF NOT EXISTS project_views (
            project_id TEXT NOT NULL REFERENCES projects(id),
            user_id    TEXT NOT NULL REFERENCES users(id),
            PRIMARY KEY (project_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS reviews (
            id         TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id),
            user_id    TEXT NOT NULL REFERENCES users(id),
            rating     TEXT NOT NULL CHECK (rating IN ('like', 'dislike')),
            comment    TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE (project_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_reviews_project
            ON reviews(project_id, created_at);

        -- A conversation's identity is the unordered participant pair,
        -- stored canonically with user_lo < user_hi. The UNIQUE index is
        -- the only guard against concurrent first-contact races.
        CREATE TABLE IF NOT EXISTS conversations (
            id              TEXT PRIMARY KEY,
            user_lo         TEXT NOT NULL REFERENCES users(id),
            user_hi         TEXT NOT NULL REFERENCES users(id),
            last_message_id TEXT,
            last_message_at TEXT,
            unread_lo       INTEGER NOT NULL DEFAULT 0,
            unread_hi       INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE (user_lo, user_hi),
            CHECK (user_lo < user_hi)
        );

        CREATE INDEX IF NOT EXISTS idx_conversations_lo
            ON conversations(user_lo);
        CREATE INDEX IF NOT EXISTS idx_conversations_hi
            ON conversations(user_hi);

        CREATE TABLE IF NOT EXISTS messages (
            id              TEXT PRIMARY KEY,
            conversation_id TEXT NOT NULL REFERENCES conversations(id),
            sender_id       TEXT NOT NULL REFERENCES users(id),
            content         TEXT NOT NULL,
            deleted         INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages(conversation_id, created_at);

        CREATE TABLE IF NOT EXISTS message_reads (
            message_id TEXT NOT NULL REFERENCES messages(id),
            user_id    TEXT NOT NULL REFERENCES users(id),
            read_at    TEXT NOT NULL,
            PRIMARY KEY (message_id, user_id)
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
