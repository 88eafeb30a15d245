mod categories;
mod comments;
mod posts;
mod users;

pub use categories::{Category, NewCategory};
pub use comments::{Comment, Moderation, NewComment, PublicComment};
pub use posts::{DuePost, NewPost, Post, PostUpdate};
pub use users::{NewUser, Principal, Subscriber, UserCredentials};
