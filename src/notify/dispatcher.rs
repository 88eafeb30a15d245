use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use serde::Serialize;

use tokio::sync::Mutex;

use url::Url;

use uuid::Uuid;

use crate::client::Mailer;
use crate::domain::EmailAddress;
use crate::model::{DuePost, Subscriber};

use super::message::post_notification;
use super::store::{NotificationStore, PostClaim, StoreError};

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Most due posts handled by one run
    pub batch_size: u32,
    /// Upper bound on a single send, on top of the transport's own timeout
    pub send_timeout: Duration,
    /// Public site URL the post permalinks are built from
    pub site_url: Url,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Failed to send notification to {recipient}")]
    TransientSendFailure {
        recipient: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("Stored subscriber address {recipient} is invalid: {reason}")]
    InvalidRecipient { recipient: String, reason: String },
    #[error("Failed to persist notification state of post {post_id}")]
    PersistenceFailure {
        post_id: Uuid,
        #[source]
        source: StoreError,
    },
    #[error("Failed to look up due posts")]
    ConfigurationFailure(#[source] StoreError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum DispatchOutcome {
    /// The run went through its batch, whatever happened to single emails
    #[default]
    #[serde(rename = "sent")]
    Completed,
    /// The run could not start; the next trigger retries
    #[serde(rename = "error")]
    Aborted,
}

/// Summary of one dispatch run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub outcome: DispatchOutcome,
    /// Due posts selected for this run
    pub selected: usize,
    /// Posts that transitioned to notified
    pub notified: usize,
    /// Posts a concurrent run had already taken
    pub skipped: usize,
    /// Posts whose unit of work was rolled back; they stay due
    pub failed: usize,
    pub emails_sent: usize,
    pub emails_failed: usize,
}

impl DispatchReport {
    fn aborted() -> Self {
        Self {
            outcome: DispatchOutcome::Aborted,
            ..Self::default()
        }
    }

    pub fn is_completed(&self) -> bool {
        self.outcome == DispatchOutcome::Completed
    }
}

/// Emails subscribers about due blog posts.
///
/// Runs are single-flight per dispatcher, and each post is claimed in storage
/// before anything is sent, so overlapping runs (even from separate processes)
/// never notify the same post twice. Should the claim fail to commit the post
/// stays due and is sent again by a later run: delivery is at-least-once.
pub struct Dispatcher<S, M> {
    store: S,
    mailer: Arc<M>,
    settings: DispatchSettings,
    in_flight: Mutex<()>,
}

impl<S, M> Dispatcher<S, M>
where
    S: NotificationStore,
    M: Mailer,
{
    pub fn new(store: S, mailer: Arc<M>, settings: DispatchSettings) -> Self {
        Self {
            store,
            mailer,
            settings,
            in_flight: Mutex::new(()),
        }
    }

    /// Notify subscribers about up to `batch_size` due posts. Never fails:
    /// problems are logged and summarized in the returned report.
    #[tracing::instrument(name = "Run pending notifications", skip(self))]
    pub async fn run_pending_notifications(&self) -> DispatchReport {
        // Overlapping triggers wait for the running pass instead of racing it
        let _single_flight = self.in_flight.lock().await;

        let now = Utc::now();
        let due = match self.store.due_posts(now, self.settings.batch_size).await {
            Ok(due) => due,
            Err(source) => {
                let error = NotifyError::ConfigurationFailure(source);
                tracing::error!(error.cause_chain = ?error, "Notification run aborted");
                return DispatchReport::aborted();
            }
        };

        tracing::info!("Found {} due posts", due.len());

        let mut report = DispatchReport {
            selected: due.len(),
            ..DispatchReport::default()
        };

        for post_id in due {
            match self.notify_post(post_id, now, &mut report).await {
                Ok(true) => report.notified += 1,
                Ok(false) => {
                    tracing::debug!(%post_id, "Post already claimed by another run");
                    report.skipped += 1;
                }
                Err(error) => {
                    tracing::error!(error.cause_chain = ?error, %post_id, "Post left due for the next run");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            notified = report.notified,
            skipped = report.skipped,
            failed = report.failed,
            emails_sent = report.emails_sent,
            emails_failed = report.emails_failed,
            "Notification run finished"
        );
        report
    }

    /// One post's unit of work. `Ok(false)` when the post was no longer due.
    #[tracing::instrument(name = "Notify subscribers of post", skip(self, now, report))]
    async fn notify_post(
        &self,
        post_id: Uuid,
        now: DateTime<Utc>,
        report: &mut DispatchReport,
    ) -> Result<bool, NotifyError> {
        let persistence = |source| NotifyError::PersistenceFailure { post_id, source };

        let Some(mut claim) = self.store.claim(post_id, now).await.map_err(persistence)? else {
            return Ok(false);
        };
        let subscribers = claim.subscribers().await.map_err(persistence)?;
        let post = claim.post().clone();

        for subscriber in &subscribers {
            match self.send(&post, subscriber).await {
                Ok(()) => report.emails_sent += 1,
                Err(error) => {
                    tracing::warn!(error.cause_chain = ?error, "Skipping subscriber");
                    report.emails_failed += 1;
                }
            }
        }

        claim.commit().await.map_err(persistence)?;
        Ok(true)
    }

    async fn send(&self, post: &DuePost, subscriber: &Subscriber) -> Result<(), NotifyError> {
        let recipient: EmailAddress =
            subscriber
                .email
                .parse()
                .map_err(|reason| NotifyError::InvalidRecipient {
                    recipient: subscriber.email.clone(),
                    reason,
                })?;
        let email = post_notification(&self.settings.site_url, post, subscriber);

        let send_failure = |source| NotifyError::TransientSendFailure {
            recipient: subscriber.email.clone(),
            source,
        };

        match tokio::time::timeout(
            self.settings.send_timeout,
            self.mailer.send(&recipient, &email),
        )
        .await
        {
            Ok(result) => result.map_err(send_failure),
            Err(_) => Err(send_failure(anyhow::anyhow!(
                "Timed out after {:?}",
                self.settings.send_timeout
            ))),
        }
    }
}
