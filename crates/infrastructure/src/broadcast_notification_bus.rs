use portcullis_application::NotificationBus;
use portcullis_domain::{Notification, Topic};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::warn;

/// Default channel capacity used when none is configured.
pub const DEFAULT_NOTIFICATION_BUS_CAPACITY: usize = 1024;

/// Notification bus backed by a tokio broadcast channel.
///
/// Publishing never blocks. Subscribers that fall more than the channel
/// capacity behind skip the oldest notifications.
#[derive(Debug, Clone)]
pub struct BroadcastNotificationBus {
    sender: broadcast::Sender<Notification>,
}

impl BroadcastNotificationBus {
    /// Creates a bus holding at most `capacity` undelivered notifications.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribes to notifications addressed to one topic.
    #[must_use]
    pub fn subscribe(&self, topic: Topic) -> Subscription {
        Subscription {
            topic,
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for BroadcastNotificationBus {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFICATION_BUS_CAPACITY)
    }
}

impl NotificationBus for BroadcastNotificationBus {
    fn publish(&self, notification: Notification) {
        if let Err(error) = self.sender.send(notification) {
            warn!(
                account_id = %error.0.account_id(),
                actor_id = %error.0.actor_id(),
                "no active subscribers to receive notification"
            );
        }
    }
}

/// Topic-filtered receiving end of a [`BroadcastNotificationBus`].
#[derive(Debug)]
pub struct Subscription {
    topic: Topic,
    receiver: broadcast::Receiver<Notification>,
}

impl Subscription {
    /// Returns the subscribed topic.
    #[must_use]
    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Waits for the next notification addressed to the topic.
    ///
    /// Returns `None` once every bus handle is dropped.
    pub async fn recv(&mut self) -> Option<Notification> {
        loop {
            match self.receiver.recv().await {
                Ok(notification) if notification.is_addressed_to(&self.topic) => {
                    return Some(notification);
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, topic = ?self.topic, "notification subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Returns every notification for the topic that is already queued.
    pub fn drain(&mut self) -> Vec<Notification> {
        let mut drained = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(notification) => {
                    if notification.is_addressed_to(&self.topic) {
                        drained.push(notification);
                    }
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, topic = ?self.topic, "notification subscriber lagged");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return drained,
            }
        }
    }
}
