use pitchside_core::repository::NotificationRepository;
use pitchside_core::{NewNotification, Notification};
use pitchside_shared::models::events::NotificationEvent;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Single way notifications are created: the row is stored, then pushed to live subscribers.
#[derive(Clone)]
pub struct Notifier {
    repo: Arc<dyn NotificationRepository>,
    tx: broadcast::Sender<NotificationEvent>,
}

impl Notifier {
    pub fn new(repo: Arc<dyn NotificationRepository>, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { repo, tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.tx.subscribe()
    }

    /// A failed notification never fails the action that caused it.
    pub async fn send(&self, new: NewNotification) -> Option<Notification> {
        let notification = new.into_notification();
        if let Err(e) = self.repo.create_notification(&notification).await {
            tracing::warn!(user_id = %notification.user_id, error = %e, "Failed to store notification");
            return None;
        }
        // no receivers is fine
        let _ = self.tx.send(notification.event());
        Some(notification)
    }

    pub async fn send_all(&self, notifications: impl IntoIterator<Item = NewNotification>) {
        for new in notifications {
            self.send(new).await;
        }
    }
}
