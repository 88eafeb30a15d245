//! Authentication with HTTP Basic credentials and the role-based access
//! guard in front of protected handlers.

mod credentials;
mod guard;

pub use credentials::Credentials;
pub use guard::{
    authenticate, authorize, verify_credentials, AdminOnly, Administrator, Authorized, Forbidden,
    Member, Members, RoleRequirement,
};
