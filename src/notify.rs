//! Subscriber notifications for newly published blog posts.
//!
//! A post is *due* once its `created_at` has passed while `email_sent` is
//! still false. [`Dispatcher::run_pending_notifications`] emails every current
//! subscriber about each due post (a bounded batch per run) and marks the post
//! as sent. [`NotificationScheduler`] calls it periodically; the admin
//! "send now" endpoint and the `send-blog-mails` binary call it on demand.

mod dispatcher;
mod message;
mod scheduler;
mod store;
#[cfg(test)]
mod testing;

pub use dispatcher::{DispatchOutcome, DispatchReport, DispatchSettings, Dispatcher, NotifyError};
pub use message::post_notification;
pub use scheduler::{NotificationScheduler, Schedule};
pub use store::{NotificationStore, PgNotificationStore, PostClaim, StoreError, StoreResult};

/// The dispatcher as wired up by the application
pub type BlogDispatcher = Dispatcher<PgNotificationStore, crate::client::EmailClient>;
