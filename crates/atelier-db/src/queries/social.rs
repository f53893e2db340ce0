use anyhow::Result;
use rusqlite::Connection;

use crate::Database;
use crate::models::{UserSummaryRow, now_timestamp};

impl Database {
    // -- Follow edges --

    /// Idempotent: re-following is a no-op.
    pub fn follow(&self, follower_id: &str, followee_id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO follows (follower_id, followee_id, created_at)
                 VALUES (?1, ?2, ?3)",
                (follower_id, followee_id, now_timestamp()),
            )?;
            Ok(())
        })
    }

    pub fn unfollow(&self, follower_id: &str, followee_id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "DELETE FROM follows WHERE follower_id = ?1 AND followee_id = ?2",
                (follower_id, followee_id),
            )?;
            Ok(())
        })
    }

    pub fn is_following(&self, follower_id: &str, followee_id: &str) -> Result<bool> {
        self.with_conn(|conn| exists_edge(conn, "follows", "follower_id", "followee_id", follower_id, followee_id))
    }

    /// True when a follow edge exists in either direction. This is the
    /// relation the `followers` messaging permission admits.
    pub fn follows_either(&self, a: &str, b: &str) -> Result<bool> {
        Ok(self.is_following(a, b)? || self.is_following(b, a)?)
    }

    // -- Block edges --

    /// Inserting the block edge and severing follow edges in both
    /// directions happen in one transaction.
    pub fn block(&self, blocker_id: &str, blocked_id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT OR IGNORE INTO blocks (blocker_id, blocked_id, created_at)
                 VALUES (?1, ?2, ?3)",
                (blocker_id, blocked_id, now_timestamp()),
            )?;
            tx.execute(
                "DELETE FROM follows
                 WHERE (follower_id = ?1 AND followee_id = ?2)
                    OR (follower_id = ?2 AND followee_id = ?1)",
                (blocker_id, blocked_id),
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn unblock(&self, blocker_id: &str, blocked_id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "DELETE FROM blocks WHERE blocker_id = ?1 AND blocked_id = ?2",
                (blocker_id, blocked_id),
            )?;
            Ok(())
        })
    }

    pub fn is_blocked(&self, blocker_id: &str, blocked_id: &str) -> Result<bool> {
        self.with_conn(|conn| exists_edge(conn, "blocks", "blocker_id", "blocked_id", blocker_id, blocked_id))
    }

    /// (a blocks b, b blocks a) — the write paths check both directions.
    pub fn blocked_between(&self, a: &str, b: &str) -> Result<(bool, bool)> {
        Ok((self.is_blocked(a, b)?, self.is_blocked(b, a)?))
    }

    // -- Listings --

    pub fn list_followers(&self, user_id: &str) -> Result<Vec<UserSummaryRow>> {
        self.with_conn(|conn| {
            query_edge_profiles(
                conn,
                "SELECT u.id, u.username, u.display_name, u.avatar_url
                 FROM follows f JOIN users u ON f.follower_id = u.id
                 WHERE f.followee_id = ?1
                 ORDER BY f.created_at DESC",
                user_id,
            )
        })
    }

    pub fn list_following(&self, user_id: &str) -> Result<Vec<UserSummaryRow>> {
        self.with_conn(|conn| {
            query_edge_profiles(
                conn,
                "SELECT u.id, u.username, u.display_name, u.avatar_url
                 FROM follows f JOIN users u ON f.followee_id = u.id
                 WHERE f.follower_id = ?1
                 ORDER BY f.created_at DESC",
                user_id,
            )
        })
    }
}

fn exists_edge(
    conn: &Connection,
    table: &str,
    from_col: &str,
    to_col: &str,
    from: &str,
    to: &str,
) -> Result<bool> {
    let sql =
        format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE {from_col} = ?1 AND {to_col} = ?2)");
    let exists: bool = conn.query_row(&sql, (from, to), |row| row.get(0))?;
    Ok(exists)
}

fn query_edge_profiles(conn: &Connection, sql: &str, param: &str) -> Result<Vec<UserSummaryRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([param], |row| {
            Ok(UserSummaryRow {
                id: row.get(0)?,
                username: row.get(1)?,
                display_name: row.get(2)?,
                avatar_url: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
