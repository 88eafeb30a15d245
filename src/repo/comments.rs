use sqlx::PgExecutor;

use uuid::Uuid;

use crate::model::{Comment, Moderation, NewComment, PublicComment};

const COMMENT_COLUMNS: &str = "id, text, created_at, visible, flagged, post_id, author_id";

/// Repository for the `comments` table
pub struct CommentsRepo;

impl CommentsRepo {
    #[tracing::instrument(name = "Insert comment", skip(executor, new_comment), fields(post.id = %new_comment.post_id))]
    pub async fn insert<'con>(
        executor: impl PgExecutor<'con>,
        new_comment: &NewComment,
    ) -> sqlx::Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query("insert into comments(id, text, post_id, author_id) values ($1, $2, $3, $4)")
            .bind(id)
            .bind(&new_comment.text)
            .bind(new_comment.post_id)
            .bind(new_comment.author_id)
            .execute(executor)
            .await?;
        Ok(id)
    }

    /// Visible comments on a post, oldest first
    #[tracing::instrument(name = "Fetch visible comments", skip(executor))]
    pub async fn fetch_visible_for_post<'con>(
        executor: impl PgExecutor<'con>,
        post_id: Uuid,
    ) -> sqlx::Result<Vec<PublicComment>> {
        sqlx::query_as(
            r#"
            select c.id, c.text, c.created_at, u.name as author_name
            from comments c
            join users u on u.id = c.author_id
            where c.post_id = $1 and c.visible
            order by c.created_at, c.id
            "#,
        )
        .bind(post_id)
        .fetch_all(executor)
        .await
    }

    /// Every comment, newest first; only flagged ones when `flagged_only`
    #[tracing::instrument(name = "Fetch comments for moderation", skip(executor))]
    pub async fn fetch_all<'con>(
        executor: impl PgExecutor<'con>,
        flagged_only: bool,
    ) -> sqlx::Result<Vec<Comment>> {
        let query = format!(
            "select {} from comments where flagged or not $1 order by created_at desc, id",
            COMMENT_COLUMNS
        );
        sqlx::query_as(&query)
            .bind(flagged_only)
            .fetch_all(executor)
            .await
    }

    #[tracing::instrument(name = "Fetch comments by author", skip(executor))]
    pub async fn fetch_by_author<'con>(
        executor: impl PgExecutor<'con>,
        author_id: Uuid,
    ) -> sqlx::Result<Vec<Comment>> {
        let query = format!(
            "select {} from comments where author_id = $1 order by created_at desc, id",
            COMMENT_COLUMNS
        );
        sqlx::query_as(&query)
            .bind(author_id)
            .fetch_all(executor)
            .await
    }

    /// Apply a moderation decision; `false` when there is no such comment
    #[tracing::instrument(name = "Moderate comment", skip(executor))]
    pub async fn moderate<'con>(
        executor: impl PgExecutor<'con>,
        id: Uuid,
        moderation: Moderation,
    ) -> sqlx::Result<bool> {
        let statement = match moderation {
            Moderation::Flag => "update comments set flagged = true, visible = false where id = $1",
            Moderation::Approve => "update comments set flagged = false, visible = true where id = $1",
            Moderation::Hide => "update comments set visible = false where id = $1",
        };
        let result = sqlx::query(statement).bind(id).execute(executor).await?;
        Ok(result.rows_affected() == 1)
    }

    #[tracing::instrument(name = "Delete comment", skip(executor))]
    pub async fn delete<'con>(executor: impl PgExecutor<'con>, id: Uuid) -> sqlx::Result<bool> {
        let result = sqlx::query("delete from comments where id=$1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    #[tracing::instrument(name = "Delete comments", skip(executor))]
    pub async fn delete_many<'con>(
        executor: impl PgExecutor<'con>,
        ids: &[Uuid],
    ) -> sqlx::Result<u64> {
        let result = sqlx::query("delete from comments where id = any($1)")
            .bind(ids)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
