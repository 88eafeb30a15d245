//! In-memory store and mailer doubles for dispatcher and scheduler tests

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use url::Url;

use uuid::Uuid;

use crate::client::{Email, Mailer};
use crate::domain::EmailAddress;
use crate::model::{DuePost, Subscriber};

use super::dispatcher::DispatchSettings;
use super::store::{NotificationStore, PostClaim, StoreError, StoreResult};

struct StoredPost {
    post: DuePost,
    created_at: DateTime<Utc>,
    email_sent: bool,
}

#[derive(Default)]
struct State {
    posts: Mutex<Vec<StoredPost>>,
    subscribers: Mutex<Vec<Subscriber>>,
    claimed: Mutex<HashSet<Uuid>>,
    unreachable: Mutex<bool>,
    failing_commits: Mutex<HashSet<Uuid>>,
}

/// Stand-in for the posts and users tables
#[derive(Clone, Default)]
pub(crate) struct MemoryStore(Arc<State>);

impl MemoryStore {
    pub(crate) fn add_post(&self, title: &str, created_at: DateTime<Utc>) -> Uuid {
        let id = Uuid::new_v4();
        self.0.posts.lock().unwrap().push(StoredPost {
            post: DuePost {
                id,
                title: title.into(),
                subtitle: format!("About {}", title),
            },
            created_at,
            email_sent: false,
        });
        id
    }

    pub(crate) fn add_due_posts(&self, count: usize) -> Vec<Uuid> {
        (0..count)
            .map(|i| {
                let created_at = Utc::now() - ChronoDuration::minutes(60 - i as i64);
                self.add_post(&format!("Post {}", i), created_at)
            })
            .collect()
    }

    pub(crate) fn add_subscriber(&self, email: &str) {
        self.0.subscribers.lock().unwrap().push(Subscriber {
            id: Uuid::new_v4(),
            name: "Reader".into(),
            email: email.into(),
        });
    }

    pub(crate) fn email_sent(&self, id: Uuid) -> bool {
        self.0
            .posts
            .lock()
            .unwrap()
            .iter()
            .find(|stored| stored.post.id == id)
            .map(|stored| stored.email_sent)
            .unwrap()
    }

    pub(crate) fn set_unreachable(&self, unreachable: bool) {
        *self.0.unreachable.lock().unwrap() = unreachable;
    }

    pub(crate) fn fail_commits_of(&self, id: Uuid) {
        self.0.failing_commits.lock().unwrap().insert(id);
    }

    pub(crate) fn heal_commits(&self) {
        self.0.failing_commits.lock().unwrap().clear();
    }
}

#[async_trait::async_trait]
impl NotificationStore for MemoryStore {
    type Claim = MemoryClaim;

    async fn due_posts(&self, now: DateTime<Utc>, limit: u32) -> StoreResult<Vec<Uuid>> {
        if *self.0.unreachable.lock().unwrap() {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        let mut due: Vec<_> = self
            .0
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|stored| stored.created_at <= now && !stored.email_sent)
            .map(|stored| (stored.created_at, stored.post.id))
            .collect();
        due.sort();
        Ok(due
            .into_iter()
            .take(limit as usize)
            .map(|(_, id)| id)
            .collect())
    }

    async fn claim(&self, post_id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<MemoryClaim>> {
        let posts = self.0.posts.lock().unwrap();
        let mut claimed = self.0.claimed.lock().unwrap();

        let post = posts.iter().find(|stored| {
            stored.post.id == post_id && stored.created_at <= now && !stored.email_sent
        });
        match post {
            Some(stored) if claimed.insert(post_id) => Ok(Some(MemoryClaim {
                store: self.clone(),
                post: stored.post.clone(),
            })),
            _ => Ok(None),
        }
    }
}

/// Releases the claim on drop, like a rolled back transaction
pub(crate) struct MemoryClaim {
    store: MemoryStore,
    post: DuePost,
}

#[async_trait::async_trait]
impl PostClaim for MemoryClaim {
    fn post(&self) -> &DuePost {
        &self.post
    }

    async fn subscribers(&mut self) -> StoreResult<Vec<Subscriber>> {
        Ok(self.store.0.subscribers.lock().unwrap().clone())
    }

    async fn commit(self) -> StoreResult<()> {
        let state = &self.store.0;
        if state.failing_commits.lock().unwrap().contains(&self.post.id) {
            return Err(StoreError::Unavailable("commit failed".into()));
        }
        for stored in state.posts.lock().unwrap().iter_mut() {
            if stored.post.id == self.post.id {
                stored.email_sent = true;
            }
        }
        Ok(())
    }
}

impl Drop for MemoryClaim {
    fn drop(&mut self) {
        self.store.0.claimed.lock().unwrap().remove(&self.post.id);
    }
}

/// Records every accepted message
#[derive(Default)]
pub(crate) struct RecordingMailer {
    sent: Mutex<Vec<(String, String)>>,
    failing: HashSet<String>,
    delay: Option<Duration>,
}

impl RecordingMailer {
    pub(crate) fn failing_for(recipient: &str) -> Self {
        Self {
            failing: HashSet::from([recipient.to_string()]),
            ..Self::default()
        }
    }

    pub(crate) fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub(crate) fn recipients(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(recipient, _)| recipient.clone())
            .collect()
    }

    pub(crate) fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, recipient: &EmailAddress, email: &Email) -> anyhow::Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains(recipient.as_ref()) {
            anyhow::bail!("mailbox unavailable");
        }
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), email.subject.clone()));
        Ok(())
    }
}

pub(crate) fn settings(batch_size: u32) -> DispatchSettings {
    DispatchSettings {
        batch_size,
        send_timeout: Duration::from_secs(2),
        site_url: Url::parse("https://example.com").unwrap(),
    }
}
