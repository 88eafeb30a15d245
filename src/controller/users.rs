use actix_web::dev::HttpServiceFactory;
use actix_web::{post, web, HttpResponse, Responder};

use secrecy::Secret;

use serde::Deserialize;
use serde_json::json;

use sqlx::PgPool;

use crate::domain::{EmailAddress, PersonName, Role};
use crate::error::{RestError, RestResult};
use crate::model::NewUser;
use crate::repo::UsersRepo;

use super::{check_password_strength, conflict_on_duplicate, hash_password};

/// Form deserialization wrapper for self-registration
#[derive(Debug, Deserialize)]
pub struct RegistrationForm {
    name: String,
    email: String,
    password: Secret<String>,
    /// Opt in to new post notifications
    #[serde(default)]
    subscribe: bool,
}

#[tracing::instrument(name = "Register a new user", skip(pool, form), fields(email = %form.email))]
#[post("")]
async fn register(
    pool: web::Data<PgPool>,
    form: web::Form<RegistrationForm>,
) -> RestResult<impl Responder> {
    let form = form.into_inner();
    let name: PersonName = form.name.parse().map_err(RestError::ParseError)?;
    let email: EmailAddress = form.email.parse().map_err(RestError::ParseError)?;
    check_password_strength(&form.password)?;

    let password_hash = hash_password(form.password).await?;
    let new_user = NewUser {
        name,
        email,
        password_hash,
        password_set: true,
    };

    let mut tx = pool.begin().await?;
    let id = UsersRepo::insert(&mut *tx, &new_user)
        .await
        .map_err(conflict_on_duplicate("Email is already registered"))?;
    UsersRepo::add_role(&mut *tx, id, Role::User).await?;
    if form.subscribe {
        UsersRepo::add_role(&mut *tx, id, Role::Subscriber).await?;
    }
    tx.commit().await?;

    Ok(HttpResponse::Created().json(json!({ "id": id })))
}

/// Registration endpoints
pub fn scope() -> impl HttpServiceFactory {
    web::scope("/users").service(register)
}
