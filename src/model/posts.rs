use chrono::{DateTime, Utc};

use serde::Serialize;

use uuid::Uuid;

/// New blog post. `publish_at` is stored as `created_at`; a post dated in the
/// future stays unpublished (and un-notified) until then.
#[derive(Debug)]
pub struct NewPost {
    pub title: String,
    pub subtitle: String,
    pub body: String,
    pub img_url: String,
    pub category_id: Option<Uuid>,
    pub author_id: Uuid,
    pub publish_at: DateTime<Utc>,
}

/// Stored blog post record
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub subtitle: String,
    pub body: String,
    pub img_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub views: i32,
    /// Flips to `true` once subscribers have been notified; never back
    pub email_sent: bool,
    pub category_id: Option<Uuid>,
    pub author_id: Option<Uuid>,
}

/// The parts of a post a notification email needs
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct DuePost {
    pub id: Uuid,
    pub title: String,
    pub subtitle: String,
}

/// Replacement content for an existing post
#[derive(Debug)]
pub struct PostUpdate {
    pub title: String,
    pub subtitle: String,
    pub body: String,
    pub img_url: String,
    pub category_id: Option<Uuid>,
    /// `None` keeps the current publish time
    pub publish_at: Option<DateTime<Utc>>,
}
