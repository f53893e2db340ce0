use anyhow::{Result, anyhow};

use crate::Database;
use crate::models::{ReviewRow, UserSummaryRow, now_timestamp};

impl Database {
    /// One review per (project, user): a second submission overwrites the
    /// rating and comment in place. Returns the row after the upsert.
    pub fn upsert_review(
        &self,
        id: &str,
        project_id: &str,
        user_id: &str,
        rating: &str,
        comment: Option<&str>,
    ) -> Result<ReviewRow> {
        self.with_conn_mut(|conn| {
            let now = now_timestamp();
            conn.execute(
                "INSERT INTO reviews (id, project_id, user_id, rating, comment, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                 ON CONFLICT (project_id, user_id) DO UPDATE SET
                     rating = excluded.rating,
                     comment = excluded.comment,
                     updated_at = excluded.updated_at",
                (id, project_id, user_id, rating, comment, &now),
            )?;

            conn.query_row(
                "SELECT id, project_id, user_id, rating, comment, created_at, updated_at
                 FROM reviews WHERE project_id = ?1 AND user_id = ?2",
                (project_id, user_id),
                |row| {
                    Ok(ReviewRow {
                        id: row.get(0)?,
                        project_id: row.get(1)?,
                        user_id: row.get(2)?,
                        rating: row.get(3)?,
                        comment: row.get(4)?,
                        created_at: row.get(5)?,
                        updated_at: row.get(6)?,
                    })
                },
            )
            .map_err(|e| anyhow!("review upsert readback failed: {}", e))
        })
    }

    /// Reviews joined with author profile fields, newest first.
    pub fn list_reviews(&self, project_id: &str) -> Result<Vec<(ReviewRow, UserSummaryRow)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT r.id, r.project_id, r.user_id, r.rating, r.comment, r.created_at, r.updated_at,
                        u.id, u.username, u.display_name, u.avatar_url
                 FROM reviews r
                 JOIN users u ON r.user_id = u.id
                 WHERE r.project_id = ?1
                 ORDER BY r.created_at DESC, r.rowid DESC",
            )?;

            let rows = stmt
                .query_map([project_id], |row| {
                    Ok((
                        ReviewRow {
                            id: row.get(0)?,
                            project_id: row.get(1)?,
                            user_id: row.get(2)?,
                            rating: row.get(3)?,
                            comment: row.get(4)?,
                            created_at: row.get(5)?,
                            updated_at: row.get(6)?,
                        },
                        UserSummaryRow {
                            id: row.get(7)?,
                            username: row.get(8)?,
                            display_name: row.get(9)?,
                            avatar_url: row.get(10)?,
                        },
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Returns true when a review existed and was removed.
    pub fn delete_review(&self, project_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute(
                "DELETE FROM reviews WHERE project_id = ?1 AND user_id = ?2",
                (project_id, user_id),
            )?;
            Ok(deleted > 0)
        })
    }
}
