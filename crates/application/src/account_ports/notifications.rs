use portcullis_domain::Notification;

/// Publish/subscribe fan-out for committed changes.
///
/// Publishing is best-effort: implementations must not block the caller and
/// must not report delivery failures back into the owning unit of work.
pub trait NotificationBus: Send + Sync {
    /// Publishes one notification to every matching subscriber.
    fn publish(&self, notification: Notification);
}
