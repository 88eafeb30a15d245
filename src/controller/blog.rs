use actix_web::dev::HttpServiceFactory;
use actix_web::{get, post, web, HttpResponse, Responder};

use chrono::Utc;

use serde::Deserialize;
use serde_json::json;

use sqlx::{PgExecutor, PgPool};

use uuid::Uuid;

use crate::auth::Member;
use crate::error::{RestError, RestResult};
use crate::model::{NewComment, Post};
use crate::repo::{CommentsRepo, PostsRepo};

const MAX_COMMENT_LENGTH: usize = 2000;

/// A post readers can see: it exists and its publish time has passed
async fn published_post<'con>(executor: impl PgExecutor<'con>, id: Uuid) -> RestResult<Post> {
    PostsRepo::fetch_by_id(executor, id)
        .await?
        .filter(|post| post.created_at <= Utc::now())
        .ok_or_else(|| RestError::NotFound("Post".into()))
}

#[tracing::instrument(name = "List post comments", skip(pool))]
#[get("/posts/{id}/comments")]
async fn list_comments(
    path: web::Path<(Uuid,)>,
    pool: web::Data<PgPool>,
) -> RestResult<impl Responder> {
    let (post_id,) = path.into_inner();

    published_post(pool.get_ref(), post_id).await?;
    let comments = CommentsRepo::fetch_visible_for_post(pool.get_ref(), post_id).await?;

    Ok(HttpResponse::Ok().json(comments))
}

#[derive(Debug, Deserialize)]
pub struct CommentBody {
    text: String,
}

#[tracing::instrument(name = "Comment on a post", skip(member, body, pool), fields(user.id = %member.principal().id))]
#[post("/posts/{id}/comments")]
async fn create_comment(
    member: Member,
    path: web::Path<(Uuid,)>,
    body: web::Json<CommentBody>,
    pool: web::Data<PgPool>,
) -> RestResult<impl Responder> {
    let (post_id,) = path.into_inner();
    let text = body.into_inner().text.trim().to_owned();
    if text.is_empty() {
        return Err(RestError::ParseError("comment cannot be empty".into()));
    }
    if text.chars().count() > MAX_COMMENT_LENGTH {
        return Err(RestError::ParseError(format!(
            "comment cannot be longer than {} characters",
            MAX_COMMENT_LENGTH
        )));
    }

    published_post(pool.get_ref(), post_id).await?;
    let new_comment = NewComment {
        post_id,
        author_id: member.principal().id,
        text,
    };
    let id = CommentsRepo::insert(pool.get_ref(), &new_comment).await?;

    Ok(HttpResponse::Created().json(json!({ "id": id })))
}

/// Public blog endpoints
pub fn scope() -> impl HttpServiceFactory {
    web::scope("/blog")
        .service(list_comments)
        .service(create_comment)
}
