use actix_web::dev::HttpServiceFactory;
use actix_web::{post, web, HttpRequest, HttpResponse, Responder};

use secrecy::Secret;

use serde::Deserialize;

use sqlx::PgPool;

use url::Url;

use crate::client::{Email, EmailClient, Mailer};
use crate::crypto::{PasswordReset, SigningKey};
use crate::domain::EmailAddress;
use crate::error::{RestError, RestResult};
use crate::repo::UsersRepo;

use super::{check_password_strength, hash_password};

#[derive(Debug, Deserialize)]
pub struct ResetRequestForm {
    email: String,
}

#[derive(Debug, Deserialize)]
pub struct NewPasswordForm {
    password: Secret<String>,
}

/// Which email carries the link
#[derive(Debug, Clone, Copy)]
pub(crate) enum PasswordLink {
    Reset,
    /// First password of an account an administrator created
    Welcome,
}

/// Request a reset link. Always answers 200 so the endpoint cannot be used
/// to find out which addresses have accounts.
#[tracing::instrument(name = "Request a password reset", skip(req, pool, signing_key, email_client))]
#[post("")]
async fn request_reset(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    signing_key: web::Data<SigningKey>,
    email_client: web::Data<EmailClient>,
    form: web::Form<ResetRequestForm>,
) -> RestResult<impl Responder> {
    let email: EmailAddress = form.0.email.parse().map_err(RestError::ParseError)?;

    let principal = UsersRepo::fetch_principal_by_email(pool.get_ref(), &email).await?;
    match principal {
        Some(principal) if principal.is_active() => {
            if let Err(e) = send_password_link(
                &req,
                signing_key.get_ref(),
                email_client.get_ref(),
                &email,
                &principal.name,
                PasswordLink::Reset,
            )
            .await
            {
                tracing::error!(error.cause_chain = ?e, "Failed to send password reset link");
            }
        }
        _ => tracing::info!("No active account for password reset request"),
    }

    Ok(HttpResponse::Ok())
}

#[tracing::instrument(name = "Reset a password by token", skip(pool, signing_key, path, form))]
#[post("/{token}", name = "reset_password")]
async fn reset(
    pool: web::Data<PgPool>,
    signing_key: web::Data<SigningKey>,
    path: web::Path<(String,)>,
    form: web::Form<NewPasswordForm>,
) -> RestResult<impl Responder> {
    let (token,) = path.into_inner();
    let claim = PasswordReset::verify(signing_key.get_ref(), &token)?;
    let email: EmailAddress = claim.email.parse().map_err(RestError::ParseError)?;

    let password = form.into_inner().password;
    check_password_strength(&password)?;
    let password_hash = hash_password(password).await?;

    if !UsersRepo::update_password(pool.get_ref(), &email, password_hash).await? {
        return Err(RestError::Unauthorized("Account no longer exists".into()));
    }

    Ok(HttpResponse::Ok())
}

/// Sign a reset token for `recipient` and email the link to it
pub(crate) async fn send_password_link(
    req: &HttpRequest,
    signing_key: &SigningKey,
    mailer: &impl Mailer,
    recipient: &EmailAddress,
    name: &str,
    link: PasswordLink,
) -> RestResult<()> {
    let token = PasswordReset {
        email: recipient.to_string(),
    }
    .sign(signing_key)
    .map_err(|e| RestError::InternalError(format!("Failed to sign token: {}", e)))?;
    let url = req.url_for("reset_password", [token.as_ref()])?;

    mailer
        .send(recipient, &password_email(name, &url, link))
        .await
        .map_err(RestError::FailedToSendEmail)
}

fn password_email(name: &str, url: &Url, link: PasswordLink) -> Email {
    let minutes = PasswordReset::lifetime().num_minutes();
    let (subject, intro) = match link {
        PasswordLink::Reset => (
            "Reset your password",
            "Follow the link to choose a new password",
        ),
        PasswordLink::Welcome => (
            "Your new account",
            "An account was created for you. Follow the link to choose your password",
        ),
    };

    Email {
        subject: subject.into(),
        html_body: format!(
            "<p>Hi {},</p><p>{}: <a href=\"{}\">{}</a></p><p>The link expires in {} minutes.</p>",
            name, intro, url, url, minutes
        ),
        text_body: format!(
            "Hi {},\n\n{}:\n{}\n\nThe link expires in {} minutes.",
            name, intro, url, minutes
        ),
    }
}

/// Password reset API endpoints
pub fn scope() -> impl HttpServiceFactory {
    web::scope("/auth/password-reset")
        .service(request_reset)
        .service(reset)
}
