use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who may open a new conversation with a user. Existing conversations are
/// reachable regardless of level, except `None`, which is also enforced on
/// every send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessagePermission {
    #[default]
    Everyone,
    Followers,
    Existing,
    None,
}

impl MessagePermission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Everyone => "everyone",
            Self::Followers => "followers",
            Self::Existing => "existing",
            Self::None => "none",
        }
    }

    /// Unknown or missing values fall back to the default, open policy.
    pub fn parse(s: &str) -> Self {
        match s {
            "followers" => Self::Followers,
            "existing" => Self::Existing,
            "none" => Self::None,
            _ => Self::Everyone,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Like,
    Dislike,
}

impl Rating {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Dislike => "dislike",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "like" => Some(Self::Like),
            "dislike" => Some(Self::Dislike),
            _ => None,
        }
    }
}

/// Per-participant unread message counts for a conversation.
///
/// A user without an entry has zero unread messages; `get` makes that
/// zero-default explicit instead of leaving it to map-lookup conventions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCounts(HashMap<Uuid, u32>);

impl UnreadCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user_id: Uuid) -> u32 {
        self.0.get(&user_id).copied().unwrap_or(0)
    }

    pub fn set(&mut self, user_id: Uuid, count: u32) {
        if count == 0 {
            self.0.remove(&user_id);
        } else {
            self.0.insert(user_id, count);
        }
    }

    pub fn increment(&mut self, user_id: Uuid) {
        let next = self.get(user_id).saturating_add(1);
        self.0.insert(user_id, next);
    }
}
