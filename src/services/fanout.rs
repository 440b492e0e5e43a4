use std::collections::VecDeque;

use anyhow::{Context, Result};

use crate::models::{Notification, NotificationAction, User};
use crate::store::{Collection, DocumentStore};

/// One pending delivery: a notification for a single recipient.
#[derive(Debug, Clone)]
pub struct DeliveryJob {
    pub recipient_id: i64,
    pub action: NotificationAction,
    pub link: String,
}

/// Explicit per-recipient delivery queue. Jobs are drained sequentially and
/// each one is isolated: a failed delivery is logged and skipped, never
/// rolling back earlier jobs or the write that triggered the fan-out.
pub struct NotificationFanout<'a> {
    store: &'a DocumentStore,
    jobs: VecDeque<DeliveryJob>,
}

impl<'a> NotificationFanout<'a> {
    pub fn new(store: &'a DocumentStore) -> Self {
        NotificationFanout {
            store,
            jobs: VecDeque::new(),
        }
    }

    pub fn enqueue(&mut self, recipient_id: i64, action: NotificationAction, link: String) {
        self.jobs.push_back(DeliveryJob {
            recipient_id,
            action,
            link,
        });
    }

    /// Drain the queue, returning how many deliveries succeeded.
    pub async fn drain(mut self) -> usize {
        let mut delivered = 0;
        while let Some(job) = self.jobs.pop_front() {
            match deliver(self.store, &job).await {
                Ok(()) => delivered += 1,
                Err(err) => {
                    tracing::warn!(
                        recipient = job.recipient_id,
                        "notification delivery failed: {:#}",
                        err
                    );
                }
            }
        }
        delivered
    }
}

async fn deliver(store: &DocumentStore, job: &DeliveryJob) -> Result<()> {
    let mut recipient = store
        .get::<User>(Collection::Users, job.recipient_id)
        .await?
        .with_context(|| format!("recipient {} no longer exists", job.recipient_id))?;

    let notification = Notification::new(&recipient.value.username, job.action, job.link.clone());
    let created = store
        .create(Collection::Notifications, notification)
        .await?;

    recipient.value.notifications.push(created.id);
    recipient.value.new_notification_count += 1;
    store.save(&recipient).await?;
    Ok(())
}
