use chrono::{DateTime, Utc};

use serde::Serialize;

use uuid::Uuid;

#[derive(Debug)]
pub struct NewComment {
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub text: String,
}

/// Stored comment with its moderation state
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
    /// Hidden comments are only shown to administrators
    pub visible: bool,
    pub flagged: bool,
    pub post_id: Uuid,
    pub author_id: Uuid,
}

/// A visible comment as readers see it
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct PublicComment {
    pub id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub author_name: String,
}

/// Administrator decision on a comment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Moderation {
    /// Mark as inappropriate and hide it
    Flag,
    /// Clear the flag and show it again
    Approve,
    /// Hide without flagging
    Hide,
}
