mod email_address;
mod person_name;
mod role;

pub use email_address::EmailAddress;
pub use person_name::PersonName;
pub use role::Role;
