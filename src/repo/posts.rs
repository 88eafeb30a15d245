use chrono::{DateTime, Utc};

use sqlx::PgExecutor;

use uuid::Uuid;

use crate::model::{DuePost, NewPost, Post, PostUpdate};

/// Repository for the `blog_posts` table
pub struct PostsRepo;

impl PostsRepo {
    #[tracing::instrument(name = "Insert blog post", skip(executor, new_post), fields(title = %new_post.title))]
    pub async fn insert<'con>(
        executor: impl PgExecutor<'con>,
        new_post: &NewPost,
    ) -> sqlx::Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            insert into blog_posts(id, title, subtitle, body, img_url, created_at, category_id, author_id)
            values ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(id)
        .bind(&new_post.title)
        .bind(&new_post.subtitle)
        .bind(&new_post.body)
        .bind(&new_post.img_url)
        .bind(new_post.publish_at)
        .bind(new_post.category_id)
        .bind(new_post.author_id)
        .execute(executor)
        .await?;
        Ok(id)
    }

    #[tracing::instrument(name = "Fetch blog post", skip(executor))]
    pub async fn fetch_by_id<'con>(
        executor: impl PgExecutor<'con>,
        id: Uuid,
    ) -> sqlx::Result<Option<Post>> {
        sqlx::query_as("select * from blog_posts where id=$1")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Ids of posts whose publish time has passed and whose subscribers have
    /// not been notified yet, oldest first, at most `limit` of them
    #[tracing::instrument(name = "Fetch due blog posts", skip(executor))]
    pub async fn fetch_due_ids<'con>(
        executor: impl PgExecutor<'con>,
        now: DateTime<Utc>,
        limit: i64,
    ) -> sqlx::Result<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            select id from blog_posts
            where created_at <= $1 and not email_sent
            order by created_at, id
            limit $2
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(executor)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Flip `email_sent` for a still-due post and return it, or `None` when
    /// another run already got there. The conditional update row-locks the
    /// post until the surrounding transaction ends, so concurrent claims of
    /// the same post serialize and only one of them sees the row.
    #[tracing::instrument(name = "Claim due blog post", skip(executor))]
    pub async fn claim_due<'con>(
        executor: impl PgExecutor<'con>,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> sqlx::Result<Option<DuePost>> {
        sqlx::query_as(
            r#"
            update blog_posts set email_sent = true
            where id = $1 and created_at <= $2 and not email_sent
            returning id, title, subtitle
            "#,
        )
        .bind(id)
        .bind(now)
        .fetch_optional(executor)
        .await
    }

    /// Replace a post's content. `updated_at` only moves when something
    /// actually changed; `email_sent` is left alone, so a notified post is
    /// never announced again. Returns `false` when there is no such post.
    #[tracing::instrument(name = "Update blog post", skip(executor, update), fields(title = %update.title))]
    pub async fn update<'con>(
        executor: impl PgExecutor<'con>,
        id: Uuid,
        update: &PostUpdate,
    ) -> sqlx::Result<bool> {
        let result = sqlx::query(
            r#"
            update blog_posts
            set title = $2,
                subtitle = $3,
                body = $4,
                img_url = $5,
                category_id = $6,
                created_at = coalesce($7, created_at),
                updated_at = case
                    when (title, subtitle, body, img_url, category_id, created_at)
                         is distinct from ($2, $3, $4, $5, $6, coalesce($7, created_at))
                    then now()
                    else updated_at
                end
            where id = $1
            "#,
        )
        .bind(id)
        .bind(&update.title)
        .bind(&update.subtitle)
        .bind(&update.body)
        .bind(&update.img_url)
        .bind(update.category_id)
        .bind(update.publish_at)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Delete a post along with its comments
    #[tracing::instrument(name = "Delete blog post", skip(executor))]
    pub async fn delete<'con>(executor: impl PgExecutor<'con>, id: Uuid) -> sqlx::Result<bool> {
        let result = sqlx::query("delete from blog_posts where id=$1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Delete every listed post that exists; returns how many were removed
    #[tracing::instrument(name = "Delete blog posts", skip(executor))]
    pub async fn delete_many<'con>(
        executor: impl PgExecutor<'con>,
        ids: &[Uuid],
    ) -> sqlx::Result<u64> {
        let result = sqlx::query("delete from blog_posts where id = any($1)")
            .bind(ids)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
