use anyhow::{Result, anyhow};
use rusqlite::Connection;

use super::OptionalExt;
use crate::Database;
use crate::models::{ConversationRow, MessageReadRow, MessageRow, ParticipantPair, now_timestamp};

impl Database {
    // -- Conversations --

    pub fn find_conversation_for_pair(
        &self,
        pair: &ParticipantPair,
    ) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| query_conversation_by_pair(conn, pair))
    }

    pub fn get_conversation(&self, id: &str) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{CONVERSATION_SELECT} WHERE id = ?1"))?;
            let row = stmt.query_row([id], map_conversation).optional()?;
            Ok(row)
        })
    }

    /// Conditional insert-or-fetch over the pair's unique index: a loser
    /// of a concurrent first-contact race gets the winner's row back
    /// instead of a constraint error.
    pub fn create_or_fetch_conversation(
        &self,
        id: &str,
        pair: &ParticipantPair,
    ) -> Result<ConversationRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO conversations (id, user_lo, user_hi, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (user_lo, user_hi) DO NOTHING",
                (id, &pair.lo, &pair.hi, now_timestamp()),
            )?;

            query_conversation_by_pair(conn, pair)?.ok_or_else(|| {
                anyhow!(
                    "conversation vanished after insert for pair {}/{}",
                    pair.lo,
                    pair.hi
                )
            })
        })
    }

    /// Every conversation containing the user, most recent activity first.
    pub fn list_conversations_for_user(&self, user_id: &str) -> Result<Vec<ConversationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{CONVERSATION_SELECT}
                 WHERE user_lo = ?1 OR user_hi = ?1
                 ORDER BY COALESCE(last_message_at, created_at) DESC"
            ))?;

            let rows = stmt
                .query_map([user_id], map_conversation)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Cascade: receipts, then messages, then the conversation record.
    pub fn delete_conversation(&self, id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM message_reads WHERE message_id IN
                     (SELECT id FROM messages WHERE conversation_id = ?1)",
                [id],
            )?;
            tx.execute("DELETE FROM messages WHERE conversation_id = ?1", [id])?;
            tx.execute("DELETE FROM conversations WHERE id = ?1", [id])?;
            tx.commit()?;
            Ok(())
        })
    }

    // -- Messages --

    /// Persist a message and its bookkeeping in one transaction: the
    /// sender's own read receipt, the conversation's last-message pointer,
    /// and the other participant's unread counter.
    pub fn insert_message(
        &self,
        id: &str,
        conversation_id: &str,
        sender_id: &str,
        content: &str,
    ) -> Result<MessageRow> {
        self.with_conn_mut(|conn| {
            let now = now_timestamp();
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO messages (id, conversation_id, sender_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (id, conversation_id, sender_id, content, &now),
            )?;

            // A sender has implicitly read their own message.
            tx.execute(
                "INSERT INTO message_reads (message_id, user_id, read_at) VALUES (?1, ?2, ?3)",
                (id, sender_id, &now),
            )?;

            tx.execute(
                "UPDATE conversations SET
                     last_message_id = ?2,
                     last_message_at = ?3,
                     unread_lo = unread_lo + (CASE WHEN user_lo = ?4 THEN 0 ELSE 1 END),
                     unread_hi = unread_hi + (CASE WHEN user_hi = ?4 THEN 0 ELSE 1 END)
                 WHERE id = ?1",
                (conversation_id, id, &now, sender_id),
            )?;

            tx.commit()?;

            Ok(MessageRow {
                id: id.to_string(),
                conversation_id: conversation_id.to_string(),
                sender_id: sender_id.to_string(),
                content: content.to_string(),
                deleted: false,
                created_at: now,
            })
        })
    }

    /// Receipt every message the user has not sent and not yet read, and
    /// zero their unread counter — one transaction. Returns how many
    /// messages were newly receipted.
    pub fn mark_conversation_read(&self, conversation_id: &str, user_id: &str) -> Result<u64> {
        self.with_conn_mut(|conn| {
            let now = now_timestamp();
            let tx = conn.transaction()?;

            let receipted = tx.execute(
                "INSERT OR IGNORE INTO message_reads (message_id, user_id, read_at)
                 SELECT id, ?2, ?3 FROM messages
                 WHERE conversation_id = ?1 AND sender_id <> ?2",
                (conversation_id, user_id, &now),
            )?;

            tx.execute(
                "UPDATE conversations SET
                     unread_lo = (CASE WHEN user_lo = ?2 THEN 0 ELSE unread_lo END),
                     unread_hi = (CASE WHEN user_hi = ?2 THEN 0 ELSE unread_hi END)
                 WHERE id = ?1",
                (conversation_id, user_id),
            )?;

            tx.commit()?;
            Ok(receipted as u64)
        })
    }

    /// Non-deleted messages, newest first. Callers reverse for
    /// chronological display.
    pub fn list_messages(
        &self,
        conversation_id: &str,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, sender_id, content, deleted, created_at
                 FROM messages
                 WHERE conversation_id = ?1 AND deleted = 0
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?2 OFFSET ?3",
            )?;

            let rows = stmt
                .query_map(
                    rusqlite::params![conversation_id, limit, offset as i64],
                    map_message,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_messages(&self, conversation_id: &str) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE conversation_id = ?1 AND deleted = 0",
                [conversation_id],
                |row| row.get(0),
            )?;
            Ok(count.max(0) as u64)
        })
    }

    pub fn get_message(&self, id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, sender_id, content, deleted, created_at
                 FROM messages WHERE id = ?1",
            )?;
            let row = stmt.query_row([id], map_message).optional()?;
            Ok(row)
        })
    }

    /// Batch-fetch read receipts for a set of message IDs.
    pub fn get_reads_for_messages(&self, message_ids: &[String]) -> Result<Vec<MessageReadRow>> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=message_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT message_id, user_id, read_at FROM message_reads WHERE message_id IN ({})",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> = message_ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    Ok(MessageReadRow {
                        message_id: row.get(0)?,
                        user_id: row.get(1)?,
                        read_at: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn map_conversation(
    row: &rusqlite::Row<'_>,
) -> std::result::Result<ConversationRow, rusqlite::Error> {
    Ok(ConversationRow {
        id: row.get(0)?,
        user_lo: row.get(1)?,
        user_hi: row.get(2)?,
        last_message_id: row.get(3)?,
        last_message_at: row.get(4)?,
        unread_lo: row.get(5)?,
        unread_hi: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn map_message(row: &rusqlite::Row<'_>) -> std::result::Result<MessageRow, rusqlite::Error> {
    Ok(MessageRow {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_id: row.get(2)?,
        content: row.get(3)?,
        deleted: row.get(4)?,
        created_at: row.get(5)?,
    })
}

const CONVERSATION_SELECT: &str =
    "SELECT id, user_lo, user_hi, last_message_id, last_message_at,
            unread_lo, unread_hi, created_at
     FROM conversations";

fn query_conversation_by_pair(
    conn: &Connection,
    pair: &ParticipantPair,
) -> Result<Option<ConversationRow>> {
    let mut stmt = conn.prepare(&format!(
        "{CONVERSATION_SELECT} WHERE user_lo = ?1 AND user_hi = ?2"
    ))?;
    let row = stmt
        .query_row((&pair.lo, &pair.hi), map_conversation)
        .optional()?;
    Ok(row)
}
