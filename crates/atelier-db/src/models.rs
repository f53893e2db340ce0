//! Database row types — these map directly to SQLite rows.
//! Distinct from the atelier-types API models to keep the DB layer
//! independent.

use atelier_types::models::UnreadCounts;
use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

/// Timestamps are written from Rust in RFC 3339 with microsecond
/// precision so text ordering matches time ordering.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(s: &str) -> DateTime<Utc> {
    s.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // Rows defaulted by SQLite carry "YYYY-MM-DD HH:MM:SS" without
            // a timezone. Parse as naive UTC and convert.
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::warn!("Corrupt timestamp '{}': {}", s, e);
            DateTime::default()
        })
}

/// Canonical form of a conversation's unordered participant pair:
/// `lo < hi` by id text, matching the CHECK constraint on the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantPair {
    pub lo: String,
    pub hi: String,
}

impl ParticipantPair {
    pub fn new(a: &str, b: &str) -> Self {
        if a <= b {
            Self {
                lo: a.to_string(),
                hi: b.to_string(),
            }
        } else {
            Self {
                lo: b.to_string(),
                hi: a.to_string(),
            }
        }
    }
}

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub website: Option<String>,
    pub message_permission: String,
    pub allow_messages: bool,
    pub created_at: String,
}

/// Annotation subset joined into follower and conversation listings.
pub struct UserSummaryRow {
    pub id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

pub struct ProjectRow {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub view_count: i64,
    pub created_at: String,
}

pub struct ReviewRow {
    pub id: String,
    pub project_id: String,
    pub user_id: String,
    pub rating: String,
    pub comment: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct ConversationRow {
    pub id: String,
    pub user_lo: String,
    pub user_hi: String,
    pub last_message_id: Option<String>,
    pub last_message_at: Option<String>,
    pub unread_lo: i64,
    pub unread_hi: i64,
    pub created_at: String,
}

impl ConversationRow {
    pub fn is_participant(&self, user_id: &str) -> bool {
        self.user_lo == user_id || self.user_hi == user_id
    }

    /// The participant that is not `user_id`. Callers check
    /// `is_participant` first.
    pub fn other_participant(&self, user_id: &str) -> &str {
        if self.user_lo == user_id {
            &self.user_hi
        } else {
            &self.user_lo
        }
    }

    pub fn unread_counts(&self) -> UnreadCounts {
        let mut counts = UnreadCounts::new();
        if let Ok(lo) = self.user_lo.parse::<Uuid>() {
            counts.set(lo, self.unread_lo.max(0) as u32);
        }
        if let Ok(hi) = self.user_hi.parse::<Uuid>() {
            counts.set(hi, self.unread_hi.max(0) as u32);
        }
        counts
    }

    pub fn unread_for(&self, user_id: &str) -> u32 {
        if self.user_lo == user_id {
            self.unread_lo.max(0) as u32
        } else if self.user_hi == user_id {
            self.unread_hi.max(0) as u32
        } else {
            0
        }
    }
}

pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    pub deleted: bool,
    pub created_at: String,
}

pub struct MessageReadRow {
    pub message_id: String,
    pub user_id: String,
    pub read_at: String,
}
