use anyhow::Result;
use rusqlite::Connection;

use super::OptionalExt;
use crate::Database;
use crate::models::{ProjectRow, now_timestamp};

impl Database {
    pub fn insert_project(
        &self,
        id: &str,
        owner_id: &str,
        title: &str,
        description: Option<&str>,
        category: Option<&str>,
        image_url: Option<&str>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO projects (id, owner_id, title, description, category, image_url, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                (id, owner_id, title, description, category, image_url, now_timestamp()),
            )?;
            Ok(())
        })
    }

    pub fn get_project(&self, id: &str) -> Result<Option<ProjectRow>> {
        self.with_conn(|conn| query_project(conn, id))
    }

    pub fn update_project(
        &self,
        id: &str,
        title: &str,
        description: Option<&str>,
        category: Option<&str>,
        image_url: Option<&str>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE projects SET title = ?2, description = ?3, category = ?4, image_url = ?5
                 WHERE id = ?1",
                (id, title, description, category, image_url),
            )?;
            Ok(())
        })
    }

    /// Likes, views and reviews go with the project.
    pub fn delete_project(&self, id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM project_likes WHERE project_id = ?1", [id])?;
            tx.execute("DELETE FROM project_views WHERE project_id = ?1", [id])?;
            tx.execute("DELETE FROM reviews WHERE project_id = ?1", [id])?;
            tx.execute("DELETE FROM projects WHERE id = ?1", [id])?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn list_projects(
        &self,
        owner_id: Option<&str>,
        category: Option<&str>,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<ProjectRow>> {
        self.with_conn(|conn| {
            let (filter, params) = project_filter(owner_id, category);
            let sql = format!(
                "SELECT id, owner_id, title, description, category, image_url, view_count, created_at
                 FROM projects {filter}
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT {limit} OFFSET {offset}"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params.iter()), map_project)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_projects(&self, owner_id: Option<&str>, category: Option<&str>) -> Result<u64> {
        self.with_conn(|conn| {
            let (filter, params) = project_filter(owner_id, category);
            let sql = format!("SELECT COUNT(*) FROM projects {filter}");
            let count: i64 =
                conn.query_row(&sql, rusqlite::params_from_iter(params.iter()), |row| {
                    row.get(0)
                })?;
            Ok(count.max(0) as u64)
        })
    }

    // -- Likes --

    /// Toggle a like: removes if present, inserts if not.
    /// Returns (liked, like count after the toggle).
    pub fn toggle_project_like(&self, project_id: &str, user_id: &str) -> Result<(bool, u64)> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let existing: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM project_likes WHERE project_id = ?1 AND user_id = ?2)",
                (project_id, user_id),
                |row| row.get(0),
            )?;

            let liked = if existing {
                tx.execute(
                    "DELETE FROM project_likes WHERE project_id = ?1 AND user_id = ?2",
                    (project_id, user_id),
                )?;
                false
            } else {
                tx.execute(
                    "INSERT INTO project_likes (project_id, user_id) VALUES (?1, ?2)",
                    (project_id, user_id),
                )?;
                true
            };

            let count: i64 = tx.query_row(
                "SELECT COUNT(*) FROM project_likes WHERE project_id = ?1",
                [project_id],
                |row| row.get(0),
            )?;

            tx.commit()?;
            Ok((liked, count.max(0) as u64))
        })
    }

    pub fn like_count(&self, project_id: &str) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM project_likes WHERE project_id = ?1",
                [project_id],
                |row| row.get(0),
            )?;
            Ok(count.max(0) as u64)
        })
    }

    pub fn user_likes_project(&self, project_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM project_likes WHERE project_id = ?1 AND user_id = ?2)",
                (project_id, user_id),
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    // -- Views --

    /// Record a view and return the counter afterwards. Anonymous views
    /// always increment; authenticated views increment only on the first
    /// sighting (dedup set).
    pub fn record_project_view(&self, project_id: &str, viewer_id: Option<&str>) -> Result<u64> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let counted = match viewer_id {
                Some(uid) => {
                    tx.execute(
                        "INSERT OR IGNORE INTO project_views (project_id, user_id) VALUES (?1, ?2)",
                        (project_id, uid),
                    )? > 0
                }
                None => true,
            };

            if counted {
                tx.execute(
                    "UPDATE projects SET view_count = view_count + 1 WHERE id = ?1",
                    [project_id],
                )?;
            }

            let views: i64 = tx.query_row(
                "SELECT view_count FROM projects WHERE id = ?1",
                [project_id],
                |row| row.get(0),
            )?;

            tx.commit()?;
            Ok(views.max(0) as u64)
        })
    }
}

fn project_filter(owner_id: Option<&str>, category: Option<&str>) -> (String, Vec<String>) {
    let mut clauses = Vec::new();
    let mut params = Vec::new();
    if let Some(owner) = owner_id {
        params.push(owner.to_string());
        clauses.push(format!("owner_id = ?{}", params.len()));
    }
    if let Some(cat) = category {
        params.push(cat.to_string());
        clauses.push(format!("category = ?{}", params.len()));
    }
    if clauses.is_empty() {
        (String::new(), params)
    } else {
        (format!("WHERE {}", clauses.join(" AND ")), params)
    }
}

fn map_project(row: &rusqlite::Row<'_>) -> std::result::Result<ProjectRow, rusqlite::Error> {
    Ok(ProjectRow {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        category: row.get(4)?,
        image_url: row.get(5)?,
        view_count: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn query_project(conn: &Connection, id: &str) -> Result<Option<ProjectRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, owner_id, title, description, category, image_url, view_count, created_at
         FROM projects WHERE id = ?1",
    )?;
    let row = stmt.query_row([id], map_project).optional()?;
    Ok(row)
}
