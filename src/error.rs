use actix_web::error::UrlGenerationError;
use actix_web::http::header::{self, HeaderValue};
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};

use thiserror::Error;

use crate::auth::Forbidden;
use crate::crypto::TokenError;

pub type RestResult<T> = Result<T, RestError>;

#[derive(Debug, Error)]
pub enum RestError {
    #[error("Parse Error: {0}")]
    ParseError(String),

    #[error("Authentication failed")]
    FailedToAuthenticate(#[source] anyhow::Error),

    #[error("Unauthorized Access: {0}")]
    Unauthorized(String),

    #[error(transparent)]
    Forbidden(#[from] Forbidden),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Failed to send email")]
    FailedToSendEmail(#[source] anyhow::Error),

    #[error("Internal Server Error: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<UrlGenerationError> for RestError {
    fn from(e: UrlGenerationError) -> Self {
        tracing::error!("Failed to generate URL for controller: {}", e);
        Self::InternalError("URL generation".into())
    }
}

impl From<sqlx::Error> for RestError {
    fn from(e: sqlx::Error) -> Self {
        tracing::error!(error.cause_chain = ?e, "Database error");
        Self::InternalError("Database error".into())
    }
}

impl From<TokenError> for RestError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Expired => Self::Unauthorized("Token expired".into()),
            TokenError::SignatureMismatch
            | TokenError::WrongPurpose(_)
            | TokenError::DecodeEncodeError => Self::Unauthorized("Failed to verify token".into()),
        }
    }
}

impl ResponseError for RestError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::ParseError(_) => StatusCode::BAD_REQUEST,
            Self::FailedToAuthenticate(_) | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::FailedToSendEmail(_) | Self::InternalError(_) | Self::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut response = HttpResponse::build(self.status_code());
        if let Self::FailedToAuthenticate(_) = self {
            response.insert_header((
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(r#"Basic realm="folio""#),
            ));
        }
        match self {
            // Server-side detail stays in the logs
            Self::FailedToSendEmail(_) | Self::InternalError(_) | Self::Other(_) => {
                response.body("Internal Server Error")
            }
            _ => response.body(self.to_string()),
        }
    }
}
