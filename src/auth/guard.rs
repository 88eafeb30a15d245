use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

use actix_web::{dev, web, FromRequest, HttpRequest};

use anyhow::Context;

use sqlx::PgPool;

use crate::auth::Credentials;
use crate::crypto::password;
use crate::domain::{EmailAddress, Role};
use crate::error::{RestError, RestResult};
use crate::model::Principal;
use crate::repo::UsersRepo;
use crate::telemetry::spawn_blocking_with_tracing;

/// Denial of a guarded operation. An expected outcome, rendered as 403.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("Forbidden: requires one of {required:?}")]
pub struct Forbidden {
    pub required: &'static [Role],
}

/// The access predicate: an active principal holding at least one of the
/// `required` roles. Anonymous callers and empty role lists never pass.
pub fn authorize(principal: Option<&Principal>, required: &'static [Role]) -> Result<(), Forbidden> {
    let allowed = principal
        .filter(|principal| principal.is_active())
        .map(|principal| required.iter().any(|role| principal.has_role(*role)))
        .unwrap_or(false);

    if allowed {
        Ok(())
    } else {
        Err(Forbidden { required })
    }
}

/// Roles a guarded handler requires, declared as a type
pub trait RoleRequirement {
    const ROLES: &'static [Role];
}

#[derive(Debug)]
pub struct AdminOnly;

impl RoleRequirement for AdminOnly {
    const ROLES: &'static [Role] = &[Role::Admin];
}

/// Any registered role
#[derive(Debug)]
pub struct Members;

impl RoleRequirement for Members {
    const ROLES: &'static [Role] = &Role::ALL;
}

/// Extractor that authenticates the request and applies [`authorize`] before
/// the handler body runs
#[derive(Debug)]
pub struct Authorized<R> {
    principal: Principal,
    requirement: PhantomData<R>,
}

pub type Administrator = Authorized<AdminOnly>;
pub type Member = Authorized<Members>;

impl<R> Authorized<R> {
    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}

impl<R: RoleRequirement + 'static> FromRequest for Authorized<R> {
    type Error = RestError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move {
            let pool: &PgPool = req
                .app_data::<web::Data<PgPool>>()
                .context("PgPool not registered for application")?;

            let credentials = Credentials::from_headers(req.headers())
                .map_err(RestError::FailedToAuthenticate)?;
            let principal = match credentials {
                Some(credentials) => Some(authenticate(pool, &credentials).await?),
                None => None,
            };

            if let Err(denied) = authorize(principal.as_ref(), R::ROLES) {
                tracing::debug!(path = %req.path(), "{}", denied);
                return Err(denied.into());
            }

            // `authorize` only passes with a principal
            let principal = principal.context("Authorized without a principal")?;
            Ok(Self {
                principal,
                requirement: PhantomData,
            })
        })
    }
}

/// Resolve Basic credentials to an active principal
#[tracing::instrument("Authenticate", skip(credentials, pool))]
pub async fn authenticate(pool: &PgPool, credentials: &Credentials) -> RestResult<Principal> {
    let principal = verify_credentials(pool, credentials).await?;

    if !principal.is_active() {
        return Err(RestError::FailedToAuthenticate(anyhow::anyhow!(
            "User is deactivated or deleted"
        )));
    }

    Ok(principal)
}

/// Check the password only, whatever the account's state. Deactivated users
/// need this to reactivate themselves.
#[tracing::instrument("Verify credentials", skip(credentials, pool))]
pub async fn verify_credentials(pool: &PgPool, credentials: &Credentials) -> RestResult<Principal> {
    let email: EmailAddress = credentials
        .email
        .parse()
        .map_err(|e: String| RestError::FailedToAuthenticate(anyhow::anyhow!(e)))?;
    let password = credentials.password.clone();

    let user = UsersRepo::fetch_credentials_by_email(pool, &email)
        .await?
        .context("No user stored for email")
        .map_err(RestError::FailedToAuthenticate)?;

    spawn_blocking_with_tracing(move || password::verify(password, user.password_hash))
        .await
        .context("Failed to spawn blocking task")?
        .map_err(RestError::FailedToAuthenticate)?;

    UsersRepo::fetch_principal(pool, user.id)
        .await?
        .context("User vanished during authentication")
        .map_err(RestError::FailedToAuthenticate)
}
