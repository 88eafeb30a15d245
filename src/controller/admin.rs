use actix_web::dev::HttpServiceFactory;
use actix_web::{delete, get, post, put, web, HttpRequest, HttpResponse, Responder};

use chrono::{DateTime, Utc};

use serde::Deserialize;
use serde_json::json;

use sqlx::PgPool;

use uuid::Uuid;

use crate::auth::Administrator;
use crate::client::EmailClient;
use crate::crypto::{password, SigningKey};
use crate::domain::{EmailAddress, PersonName, Role};
use crate::error::{RestError, RestResult};
use crate::model::{Moderation, NewCategory, NewPost, NewUser, PostUpdate};
use crate::notify::BlogDispatcher;
use crate::repo::{CategoriesRepo, CategoryDeletion, CommentsRepo, PostsRepo, UsersRepo};

use super::password_reset::{send_password_link, PasswordLink};
use super::{conflict_on_duplicate, hash_password};

/// Run the notification dispatcher right away. Reports a single outcome,
/// `sent` or `error`, along with the run's counters.
#[tracing::instrument(name = "Send pending notifications now", skip(admin, dispatcher), fields(user.id = %admin.principal().id))]
#[post("/notifications/send")]
async fn send_notifications(
    admin: Administrator,
    dispatcher: web::Data<BlogDispatcher>,
) -> RestResult<impl Responder> {
    let report = dispatcher.run_pending_notifications().await;

    let mut response = if report.is_completed() {
        HttpResponse::Ok()
    } else {
        HttpResponse::InternalServerError()
    };
    Ok(response.json(report))
}

#[derive(Debug, Deserialize)]
pub struct NewUserBody {
    name: String,
    email: String,
    #[serde(default)]
    roles: Vec<Role>,
}

/// Create an account with a password nobody knows and mail its owner a
/// link to choose one
#[tracing::instrument(
    name = "Create a user as administrator",
    skip(req, admin, body, pool, signing_key, email_client),
    fields(email = %body.email)
)]
#[post("/users")]
async fn create_user(
    req: HttpRequest,
    admin: Administrator,
    body: web::Json<NewUserBody>,
    pool: web::Data<PgPool>,
    signing_key: web::Data<SigningKey>,
    email_client: web::Data<EmailClient>,
) -> RestResult<impl Responder> {
    let body = body.into_inner();
    let name: PersonName = body.name.parse().map_err(RestError::ParseError)?;
    let email: EmailAddress = body.email.parse().map_err(RestError::ParseError)?;
    let roles = if body.roles.is_empty() {
        vec![Role::User]
    } else {
        body.roles
    };

    let password_hash = hash_password(password::unusable()).await?;
    let new_user = NewUser {
        name,
        email,
        password_hash,
        password_set: false,
    };

    // The account only exists if its owner could be told about it
    let mut tx = pool.begin().await?;
    let id = UsersRepo::insert(&mut *tx, &new_user)
        .await
        .map_err(conflict_on_duplicate("Email is already registered"))?;
    for role in &roles {
        UsersRepo::add_role(&mut *tx, id, *role).await?;
    }
    send_password_link(
        &req,
        signing_key.get_ref(),
        email_client.get_ref(),
        &new_user.email,
        new_user.name.as_ref(),
        PasswordLink::Welcome,
    )
    .await?;
    tx.commit().await?;

    Ok(HttpResponse::Created().json(json!({ "id": id })))
}

#[tracing::instrument(name = "Grant a role", skip(admin, pool), fields(admin.id = %admin.principal().id))]
#[post("/users/{id}/roles/{role}")]
async fn add_role(
    admin: Administrator,
    path: web::Path<(Uuid, String)>,
    pool: web::Data<PgPool>,
) -> RestResult<impl Responder> {
    let (user_id, role) = path.into_inner();
    let role: Role = role.parse().map_err(RestError::ParseError)?;

    UsersRepo::fetch_principal(pool.get_ref(), user_id)
        .await?
        .ok_or_else(|| RestError::NotFound("User".into()))?;
    UsersRepo::add_role(pool.get_ref(), user_id, role).await?;

    Ok(HttpResponse::Ok())
}

#[tracing::instrument(name = "Revoke a role", skip(admin, pool), fields(admin.id = %admin.principal().id))]
#[delete("/users/{id}/roles/{role}")]
async fn remove_role(
    admin: Administrator,
    path: web::Path<(Uuid, String)>,
    pool: web::Data<PgPool>,
) -> RestResult<impl Responder> {
    let (user_id, role) = path.into_inner();
    let role: Role = role.parse().map_err(RestError::ParseError)?;

    if user_id == admin.principal().id && role == Role::Admin {
        return Err(RestError::Conflict(
            "Administrators cannot revoke their own admin role".into(),
        ));
    }

    UsersRepo::fetch_principal(pool.get_ref(), user_id)
        .await?
        .ok_or_else(|| RestError::NotFound("User".into()))?;
    UsersRepo::remove_role(pool.get_ref(), user_id, role).await?;

    Ok(HttpResponse::Ok())
}

#[tracing::instrument(name = "Toggle user activation", skip(admin, pool), fields(admin.id = %admin.principal().id))]
#[post("/users/{id}/toggle-active")]
async fn toggle_active(
    admin: Administrator,
    path: web::Path<(Uuid,)>,
    pool: web::Data<PgPool>,
) -> RestResult<impl Responder> {
    let (user_id,) = path.into_inner();

    if user_id == admin.principal().id {
        return Err(RestError::Conflict(
            "Administrators cannot deactivate their own account".into(),
        ));
    }

    let user = UsersRepo::fetch_principal(pool.get_ref(), user_id)
        .await?
        .ok_or_else(|| RestError::NotFound("User".into()))?;
    if user.is_deleted {
        return Err(RestError::Conflict("Deleted users cannot be reactivated".into()));
    }

    let active = !user.active;
    if !UsersRepo::set_active(pool.get_ref(), user_id, active).await? {
        return Err(RestError::Conflict("User was deleted meanwhile".into()));
    }

    Ok(HttpResponse::Ok().json(json!({ "active": active })))
}

#[tracing::instrument(name = "Delete a user permanently", skip(admin, pool), fields(admin.id = %admin.principal().id))]
#[delete("/users/{id}")]
async fn delete_user(
    admin: Administrator,
    path: web::Path<(Uuid,)>,
    pool: web::Data<PgPool>,
) -> RestResult<impl Responder> {
    let (user_id,) = path.into_inner();

    if user_id == admin.principal().id {
        return Err(RestError::Conflict(
            "Administrators cannot delete their own account".into(),
        ));
    }
    if !UsersRepo::delete_permanently(pool.get_ref(), user_id).await? {
        return Err(RestError::NotFound("User".into()));
    }

    Ok(HttpResponse::Ok())
}

const MAX_TITLE_LENGTH: usize = 100;
const MAX_SUBTITLE_LENGTH: usize = 200;

fn check_post_text(title: &str, subtitle: &str) -> RestResult<()> {
    if title.trim().is_empty() {
        return Err(RestError::ParseError("title cannot be empty".into()));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(RestError::ParseError(format!(
            "title cannot be longer than {} characters",
            MAX_TITLE_LENGTH
        )));
    }
    if subtitle.chars().count() > MAX_SUBTITLE_LENGTH {
        return Err(RestError::ParseError(format!(
            "subtitle cannot be longer than {} characters",
            MAX_SUBTITLE_LENGTH
        )));
    }
    Ok(())
}

async fn check_category(pool: &PgPool, category_id: Option<Uuid>) -> RestResult<()> {
    if let Some(category_id) = category_id {
        CategoriesRepo::fetch_by_id(pool, category_id)
            .await?
            .ok_or_else(|| RestError::NotFound("Category".into()))?;
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct NewPostBody {
    title: String,
    subtitle: String,
    body: String,
    img_url: String,
    category_id: Option<Uuid>,
    /// Defaults to now; a future time schedules the post
    publish_at: Option<DateTime<Utc>>,
}

#[tracing::instrument(name = "Create a blog post", skip(admin, body, pool), fields(title = %body.title))]
#[post("/posts")]
async fn create_post(
    admin: Administrator,
    body: web::Json<NewPostBody>,
    pool: web::Data<PgPool>,
) -> RestResult<impl Responder> {
    let body = body.into_inner();
    check_post_text(&body.title, &body.subtitle)?;
    check_category(pool.get_ref(), body.category_id).await?;

    let new_post = NewPost {
        title: body.title,
        subtitle: body.subtitle,
        body: body.body,
        img_url: body.img_url,
        category_id: body.category_id,
        author_id: admin.principal().id,
        publish_at: body.publish_at.unwrap_or_else(Utc::now),
    };
    let id = PostsRepo::insert(pool.get_ref(), &new_post).await?;

    Ok(HttpResponse::Created().json(json!({ "id": id })))
}

/// Full replacement of a post's content. Posts already announced to
/// subscribers are not announced again, even when rescheduled.
#[tracing::instrument(name = "Edit a blog post", skip(admin, body, pool), fields(title = %body.title))]
#[put("/posts/{id}")]
async fn update_post(
    admin: Administrator,
    path: web::Path<(Uuid,)>,
    body: web::Json<NewPostBody>,
    pool: web::Data<PgPool>,
) -> RestResult<impl Responder> {
    let (post_id,) = path.into_inner();
    let body = body.into_inner();
    check_post_text(&body.title, &body.subtitle)?;
    check_category(pool.get_ref(), body.category_id).await?;

    let update = PostUpdate {
        title: body.title,
        subtitle: body.subtitle,
        body: body.body,
        img_url: body.img_url,
        category_id: body.category_id,
        publish_at: body.publish_at,
    };
    if !PostsRepo::update(pool.get_ref(), post_id, &update).await? {
        return Err(RestError::NotFound("Post".into()));
    }

    Ok(HttpResponse::Ok())
}

#[tracing::instrument(name = "Delete a blog post", skip(admin, pool))]
#[delete("/posts/{id}")]
async fn delete_post(
    admin: Administrator,
    path: web::Path<(Uuid,)>,
    pool: web::Data<PgPool>,
) -> RestResult<impl Responder> {
    let (post_id,) = path.into_inner();

    if !PostsRepo::delete(pool.get_ref(), post_id).await? {
        return Err(RestError::NotFound("Post".into()));
    }
    Ok(HttpResponse::Ok())
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteBody {
    ids: Vec<Uuid>,
}

impl BulkDeleteBody {
    fn ids(&self) -> RestResult<&[Uuid]> {
        if self.ids.is_empty() {
            return Err(RestError::ParseError("nothing selected".into()));
        }
        Ok(&self.ids)
    }
}

/// Unknown ids are skipped; the response counts what was actually deleted
#[tracing::instrument(name = "Delete blog posts in bulk", skip(admin, body, pool))]
#[post("/posts/bulk-delete")]
async fn bulk_delete_posts(
    admin: Administrator,
    body: web::Json<BulkDeleteBody>,
    pool: web::Data<PgPool>,
) -> RestResult<impl Responder> {
    let deleted = PostsRepo::delete_many(pool.get_ref(), body.ids()?).await?;
    Ok(HttpResponse::Ok().json(json!({ "deleted": deleted })))
}

#[derive(Debug, Deserialize)]
pub struct CommentFilter {
    #[serde(default)]
    flagged: bool,
}

#[tracing::instrument(name = "List comments for moderation", skip(admin, pool))]
#[get("/comments")]
async fn list_comments(
    admin: Administrator,
    filter: web::Query<CommentFilter>,
    pool: web::Data<PgPool>,
) -> RestResult<impl Responder> {
    let comments = CommentsRepo::fetch_all(pool.get_ref(), filter.flagged).await?;
    Ok(HttpResponse::Ok().json(comments))
}

/// `flag` hides and flags, `unflag` clears the flag and shows the comment
/// again, `hide` only hides it
#[tracing::instrument(name = "Moderate a comment", skip(admin, pool))]
#[post("/comments/{id}/{action}")]
async fn moderate_comment(
    admin: Administrator,
    path: web::Path<(Uuid, String)>,
    pool: web::Data<PgPool>,
) -> RestResult<impl Responder> {
    let (comment_id, action) = path.into_inner();
    let moderation = match action.as_str() {
        "flag" => Moderation::Flag,
        "unflag" => Moderation::Approve,
        "hide" => Moderation::Hide,
        other => return Err(RestError::NotFound(format!("Moderation action {}", other))),
    };

    if !CommentsRepo::moderate(pool.get_ref(), comment_id, moderation).await? {
        return Err(RestError::NotFound("Comment".into()));
    }
    Ok(HttpResponse::Ok())
}

#[tracing::instrument(name = "Delete a comment", skip(admin, pool))]
#[delete("/comments/{id}")]
async fn delete_comment(
    admin: Administrator,
    path: web::Path<(Uuid,)>,
    pool: web::Data<PgPool>,
) -> RestResult<impl Responder> {
    let (comment_id,) = path.into_inner();

    if !CommentsRepo::delete(pool.get_ref(), comment_id).await? {
        return Err(RestError::NotFound("Comment".into()));
    }
    Ok(HttpResponse::Ok())
}

#[tracing::instrument(name = "Delete comments in bulk", skip(admin, body, pool))]
#[post("/comments/bulk-delete")]
async fn bulk_delete_comments(
    admin: Administrator,
    body: web::Json<BulkDeleteBody>,
    pool: web::Data<PgPool>,
) -> RestResult<impl Responder> {
    let deleted = CommentsRepo::delete_many(pool.get_ref(), body.ids()?).await?;
    Ok(HttpResponse::Ok().json(json!({ "deleted": deleted })))
}

#[tracing::instrument(name = "Create a blog category", skip(admin, body, pool))]
#[post("/categories")]
async fn create_category(
    admin: Administrator,
    body: web::Json<NewCategory>,
    pool: web::Data<PgPool>,
) -> RestResult<impl Responder> {
    let id = CategoriesRepo::insert(pool.get_ref(), &body)
        .await
        .map_err(conflict_on_duplicate("Category name is taken"))?;

    Ok(HttpResponse::Created().json(json!({ "id": id })))
}

#[tracing::instrument(name = "Delete a blog category", skip(admin, pool))]
#[delete("/categories/{id}")]
async fn delete_category(
    admin: Administrator,
    path: web::Path<(Uuid,)>,
    pool: web::Data<PgPool>,
) -> RestResult<impl Responder> {
    let (category_id,) = path.into_inner();

    match CategoriesRepo::delete_if_empty(pool.get_ref(), category_id).await? {
        CategoryDeletion::Deleted => Ok(HttpResponse::Ok()),
        CategoryDeletion::NotFound => Err(RestError::NotFound("Category".into())),
        CategoryDeletion::NotEmpty => Err(RestError::Conflict(
            "Category still has posts".into(),
        )),
    }
}

/// Administrator endpoints, every one behind the [`Administrator`] guard
pub fn scope() -> impl HttpServiceFactory {
    web::scope("/admin")
        .service(send_notifications)
        .service(create_user)
        .service(add_role)
        .service(remove_role)
        .service(toggle_active)
        .service(delete_user)
        .service(create_post)
        .service(bulk_delete_posts)
        .service(update_post)
        .service(delete_post)
        .service(list_comments)
        .service(bulk_delete_comments)
        .service(moderate_comment)
        .service(delete_comment)
        .service(create_category)
        .service(delete_category)
}
