mod categories;
mod comments;
mod posts;
mod users;

pub use categories::{CategoriesRepo, CategoryDeletion};
pub use comments::CommentsRepo;
pub use posts::PostsRepo;
pub use users::UsersRepo;
