use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Capability tags a user can hold. This is the complete registry: the
/// `roles` table is seeded with exactly these names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Subscriber,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::User, Role::Subscriber, Role::Admin];
}

impl FromStr for Role {
    type Err = String;

    /// Role names are matched exactly, including case.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "subscriber" => Ok(Self::Subscriber),
            "admin" => Ok(Self::Admin),
            other => Err(format!("Unknown role \"{}\"", other)),
        }
    }
}

impl AsRef<str> for Role {
    fn as_ref(&self) -> &str {
        match self {
            Self::User => "user",
            Self::Subscriber => "subscriber",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}
