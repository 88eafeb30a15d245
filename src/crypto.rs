mod password_reset;
mod signing_key;
mod token;

pub mod password;

pub use password_reset::PasswordReset;
pub use signing_key::SigningKey;
pub use token::{Token, TokenBuilder, TokenError, TokenResult};
