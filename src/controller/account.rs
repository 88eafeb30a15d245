use actix_web::dev::HttpServiceFactory;
use actix_web::{delete, get, post, web, HttpRequest, HttpResponse, Responder};

use sqlx::PgPool;

use crate::auth::{
    authorize, verify_credentials, Credentials, Forbidden, Member, Members, RoleRequirement,
};
use crate::domain::Role;
use crate::error::{RestError, RestResult};
use crate::model::Principal;
use crate::repo::{CommentsRepo, UsersRepo};

#[tracing::instrument(name = "Subscribe to new posts", skip(pool, member), fields(user.id = %member.principal().id))]
#[post("/subscription")]
async fn subscribe(member: Member, pool: web::Data<PgPool>) -> RestResult<impl Responder> {
    UsersRepo::add_role(pool.get_ref(), member.principal().id, Role::Subscriber).await?;
    Ok(HttpResponse::Ok())
}

#[tracing::instrument(name = "Unsubscribe from new posts", skip(pool, member), fields(user.id = %member.principal().id))]
#[delete("/subscription")]
async fn unsubscribe(member: Member, pool: web::Data<PgPool>) -> RestResult<impl Responder> {
    UsersRepo::remove_role(pool.get_ref(), member.principal().id, Role::Subscriber).await?;
    Ok(HttpResponse::Ok())
}

#[tracing::instrument(name = "Deactivate own account", skip(pool, member), fields(user.id = %member.principal().id))]
#[post("/deactivate")]
async fn deactivate(member: Member, pool: web::Data<PgPool>) -> RestResult<impl Responder> {
    if !UsersRepo::set_active(pool.get_ref(), member.principal().id, false).await? {
        return Err(RestError::Conflict("Account is deleted".into()));
    }
    Ok(HttpResponse::Ok())
}

/// Scrub personal data but keep the row, so authored content stays intact
#[tracing::instrument(name = "Anonymize own account", skip(pool, member), fields(user.id = %member.principal().id))]
#[post("/anonymize")]
async fn anonymize(member: Member, pool: web::Data<PgPool>) -> RestResult<impl Responder> {
    if !UsersRepo::anonymize(pool.get_ref(), member.principal().id).await? {
        return Err(RestError::NotFound("Account".into()));
    }
    Ok(HttpResponse::Ok())
}

/// Undo [`deactivate`]. The member guard refuses inactive accounts, so the
/// credentials are checked here directly. Deleted accounts stay deleted.
#[tracing::instrument(name = "Reactivate own account", skip(req, pool), fields(user.id = tracing::field::Empty))]
#[post("/reactivate")]
async fn reactivate(req: HttpRequest, pool: web::Data<PgPool>) -> RestResult<impl Responder> {
    let credentials = Credentials::from_headers(req.headers())
        .map_err(RestError::FailedToAuthenticate)?
        .ok_or(Forbidden {
            required: Members::ROLES,
        })?;
    let principal = verify_credentials(pool.get_ref(), &credentials).await?;
    tracing::Span::current().record("user.id", &tracing::field::display(&principal.id));

    if principal.is_deleted {
        return Err(RestError::Conflict("Deleted accounts cannot be reactivated".into()));
    }
    // Same role requirement as every other account endpoint, minus the
    // activity check
    let reactivated = Principal {
        active: true,
        ..principal
    };
    authorize(Some(&reactivated), Members::ROLES)?;

    if !UsersRepo::set_active(pool.get_ref(), reactivated.id, true).await? {
        return Err(RestError::Conflict("Account was deleted meanwhile".into()));
    }
    Ok(HttpResponse::Ok())
}

/// Permanently delete the account along with its posts and comments
#[tracing::instrument(name = "Delete own account", skip(pool, member), fields(user.id = %member.principal().id))]
#[delete("")]
async fn delete_account(member: Member, pool: web::Data<PgPool>) -> RestResult<impl Responder> {
    if member.principal().has_role(Role::Admin) {
        return Err(RestError::Conflict(
            "Administrators need their admin role revoked before deleting their account".into(),
        ));
    }
    if !UsersRepo::delete_permanently(pool.get_ref(), member.principal().id).await? {
        return Err(RestError::NotFound("Account".into()));
    }
    Ok(HttpResponse::Ok())
}

/// The member's own comments, hidden ones included, newest first
#[tracing::instrument(name = "List own comments", skip(pool, member), fields(user.id = %member.principal().id))]
#[get("/comments")]
async fn comments(member: Member, pool: web::Data<PgPool>) -> RestResult<impl Responder> {
    let comments = CommentsRepo::fetch_by_author(pool.get_ref(), member.principal().id).await?;
    Ok(HttpResponse::Ok().json(comments))
}

/// Endpoints for the signed-in user's own account
pub fn scope() -> impl HttpServiceFactory {
    web::scope("/account")
        .service(subscribe)
        .service(unsubscribe)
        .service(deactivate)
        .service(reactivate)
        .service(anonymize)
        .service(delete_account)
        .service(comments)
}
