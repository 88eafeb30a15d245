use chrono::{DateTime, Utc};

use sqlx::{PgPool, Postgres, Transaction};

use uuid::Uuid;

use crate::model::{DuePost, Subscriber};
use crate::repo::{PostsRepo, UsersRepo};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence seen by the dispatcher.
///
/// Each post is handled in its own unit of work, opened by [`claim`]. Until
/// the claim is committed nothing it did is visible; dropping it without
/// committing puts the post back into the due set.
///
/// [`claim`]: NotificationStore::claim
#[async_trait::async_trait]
pub trait NotificationStore: Send + Sync {
    type Claim: PostClaim;

    /// Ids of up to `limit` posts that are due at `now`
    async fn due_posts(&self, now: DateTime<Utc>, limit: u32) -> StoreResult<Vec<Uuid>>;

    /// Atomically take a due post out of the due set. `None` means the post
    /// is no longer due, typically because a concurrent run claimed it.
    async fn claim(&self, post_id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<Self::Claim>>;
}

#[async_trait::async_trait]
pub trait PostClaim: Send {
    fn post(&self) -> &DuePost;

    /// The audience as of now, looked up inside the unit of work
    async fn subscribers(&mut self) -> StoreResult<Vec<Subscriber>>;

    /// Make the post's transition to notified durable
    async fn commit(self) -> StoreResult<()>;
}

/// Postgres store: one transaction per claimed post
#[derive(Debug, Clone)]
pub struct PgNotificationStore {
    pool: PgPool,
}

impl PgNotificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl NotificationStore for PgNotificationStore {
    type Claim = PgPostClaim;

    async fn due_posts(&self, now: DateTime<Utc>, limit: u32) -> StoreResult<Vec<Uuid>> {
        Ok(PostsRepo::fetch_due_ids(&self.pool, now, i64::from(limit)).await?)
    }

    async fn claim(&self, post_id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<PgPostClaim>> {
        let mut tx = self.pool.begin().await?;
        match PostsRepo::claim_due(&mut *tx, post_id, now).await? {
            Some(post) => Ok(Some(PgPostClaim { tx, post })),
            None => {
                tx.rollback().await?;
                Ok(None)
            }
        }
    }
}

/// Holds the open transaction (and the post's row lock) while subscribers
/// are emailed
pub struct PgPostClaim {
    tx: Transaction<'static, Postgres>,
    post: DuePost,
}

#[async_trait::async_trait]
impl PostClaim for PgPostClaim {
    fn post(&self) -> &DuePost {
        &self.post
    }

    async fn subscribers(&mut self) -> StoreResult<Vec<Subscriber>> {
        Ok(UsersRepo::fetch_subscribers(&mut *self.tx).await?)
    }

    async fn commit(self) -> StoreResult<()> {
        Ok(self.tx.commit().await?)
    }
}
