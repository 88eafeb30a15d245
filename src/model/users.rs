use std::collections::HashSet;

use chrono::{DateTime, Utc};

use secrecy::Secret;

use uuid::Uuid;

use crate::domain::{EmailAddress, PersonName, Role};

/// New user registration, password already hashed
#[derive(Debug)]
pub struct NewUser {
    pub name: PersonName,
    pub email: EmailAddress,
    pub password_hash: Secret<String>,
    /// `false` when the account was created with a placeholder password
    pub password_set: bool,
}

#[derive(Debug)]
pub struct UserCredentials {
    pub id: Uuid,
    pub password_hash: Secret<String>,
}

/// A stored user together with the roles it holds
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub roles: HashSet<Role>,
    /// Raw activation flag; see [`Principal::is_active`]
    pub active: bool,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Principal {
    /// A deleted principal is never active, whatever its activation flag says
    pub fn is_active(&self) -> bool {
        !self.is_deleted && self.active
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

/// A notification recipient
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Subscriber {
    pub id: Uuid,
    pub name: String,
    /// Stored as entered at registration; parsed again before sending
    pub email: String,
}
