//! Notification sink contract.

/// Receives user-facing notifications. Fire-and-forget.
pub trait NotificationSink: Send {
    fn notify(&self, title: &str, body: &str);
}

/// Discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl NotificationSink for NoopNotifier {
    fn notify(&self, _title: &str, _body: &str) {}
}
