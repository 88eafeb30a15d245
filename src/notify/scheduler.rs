use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};

use serde::Deserialize;
use serde_aux::prelude::*;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::client::Mailer;

use super::dispatcher::Dispatcher;
use super::store::NotificationStore;

/// When the scheduler triggers a dispatch run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Schedule {
    /// Every `every_seconds`, starting one period after start-up
    Interval {
        #[serde(deserialize_with = "deserialize_number_from_string")]
        every_seconds: u64,
    },
    /// Once a day at `hour:minute`, UTC
    Daily {
        #[serde(deserialize_with = "deserialize_number_from_string")]
        hour: u32,
        #[serde(deserialize_with = "deserialize_number_from_string")]
        minute: u32,
    },
}

impl Schedule {
    pub fn validate(&self) -> anyhow::Result<()> {
        match *self {
            Schedule::Interval { every_seconds: 0 } => {
                anyhow::bail!("Notification interval must be at least one second")
            }
            Schedule::Daily { hour, minute } if hour > 23 || minute > 59 => {
                anyhow::bail!("{:02}:{:02} is not a valid time of day", hour, minute)
            }
            _ => Ok(()),
        }
    }

    /// How long to sleep from `now` until the next run is due
    pub fn delay_until_next(&self, now: DateTime<Utc>) -> Duration {
        match *self {
            Schedule::Interval { every_seconds } => Duration::from_secs(every_seconds),
            Schedule::Daily { hour, minute } => {
                let Some(today) = now.date_naive().and_hms_opt(hour, minute, 0) else {
                    return Duration::from_secs(24 * 60 * 60);
                };
                let mut next = Utc.from_utc_datetime(&today);
                if next <= now {
                    next += ChronoDuration::days(1);
                }
                (next - now).to_std().unwrap_or_default()
            }
        }
    }
}

/// Background task running the dispatcher on a [`Schedule`].
///
/// Owned by whoever starts it; [`stop`](Self::stop) lets a run in progress
/// finish and then ends the task.
pub struct NotificationScheduler {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl NotificationScheduler {
    pub fn start<S, M>(dispatcher: Arc<Dispatcher<S, M>>, schedule: Schedule) -> Self
    where
        S: NotificationStore + 'static,
        M: Mailer + 'static,
    {
        let (shutdown, mut stopped) = oneshot::channel();

        let handle = tokio::spawn(async move {
            tracing::info!(?schedule, "Notification scheduler started");
            loop {
                let delay = schedule.delay_until_next(Utc::now());
                tracing::debug!("Next notification run in {:?}", delay);

                tokio::select! {
                    _ = &mut stopped => break,
                    _ = tokio::time::sleep(delay) => {
                        dispatcher.run_pending_notifications().await;
                    }
                }
            }
            tracing::info!("Notification scheduler stopped");
        });

        Self { shutdown, handle }
    }

    pub async fn stop(self) {
        // The task may already be gone, in which case there is nobody to tell
        let _ = self.shutdown.send(());
        if let Err(e) = self.handle.await {
            tracing::error!(error.cause_chain = ?e, "Notification scheduler task failed");
        }
    }
}
