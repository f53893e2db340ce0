use anyhow::Result;
use rusqlite::Connection;

use super::OptionalExt;
use crate::Database;
use crate::models::{UserRow, now_timestamp};

impl Database {
    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, email, password, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (id, username, email, password_hash, now_timestamp()),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username = ?1", username))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email = ?1", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", id))
    }

    /// Full overwrite of the profile columns; callers merge partial input
    /// against the current row first.
    pub fn update_profile(
        &self,
        id: &str,
        display_name: Option<&str>,
        bio: Option<&str>,
        avatar_url: Option<&str>,
        website: Option<&str>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE users SET display_name = ?2, bio = ?3, avatar_url = ?4, website = ?5
                 WHERE id = ?1",
                (id, display_name, bio, avatar_url, website),
            )?;
            Ok(())
        })
    }

    pub fn update_message_settings(
        &self,
        id: &str,
        message_permission: &str,
        allow_messages: bool,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE users SET message_permission = ?2, allow_messages = ?3 WHERE id = ?1",
                (id, message_permission, allow_messages),
            )?;
            Ok(())
        })
    }

    /// (followers, following) edge counts for a profile.
    pub fn follow_counts(&self, id: &str) -> Result<(u64, u64)> {
        self.with_conn(|conn| {
            let followers: i64 = conn.query_row(
                "SELECT COUNT(*) FROM follows WHERE followee_id = ?1",
                [id],
                |row| row.get(0),
            )?;
            let following: i64 = conn.query_row(
                "SELECT COUNT(*) FROM follows WHERE follower_id = ?1",
                [id],
                |row| row.get(0),
            )?;
            Ok((followers.max(0) as u64, following.max(0) as u64))
        })
    }
}

fn query_user(conn: &Connection, filter: &str, param: &str) -> Result<Option<UserRow>> {
    let sql = format!(
        "SELECT id, username, email, password, display_name, bio, avatar_url, website,
                message_permission, allow_messages, created_at
         FROM users WHERE {filter}"
    );
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([param], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                email: row.get(2)?,
                password: row.get(3)?,
                display_name: row.get(4)?,
                bio: row.get(5)?,
                avatar_url: row.get(6)?,
                website: row.get(7)?,
                message_permission: row.get(8)?,
                allow_messages: row.get(9)?,
                created_at: row.get(10)?,
            })
        })
        .optional()?;

    Ok(row)
}
