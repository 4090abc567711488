//! Terminal notification sink.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tb_core::notify::NotificationSink;

/// Prints notifications to stderr when enabled, otherwise only traces them.
///
/// Clones share one switch, so a settings listener can turn printing on or
/// off for a controller that already owns the notifier.
#[derive(Debug, Clone)]
pub struct ConsoleNotifier {
    enabled: Arc<AtomicBool>,
}

impl ConsoleNotifier {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(enabled)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }
}

impl NotificationSink for ConsoleNotifier {
    fn notify(&self, title: &str, body: &str) {
        let enabled = self.is_enabled();
        tracing::debug!(title, body, enabled, "notification");
        if enabled {
            if body.is_empty() {
                eprintln!("{title}");
            } else {
                eprintln!("{title}: {body}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_switch() {
        let notifier = ConsoleNotifier::new(false);
        let other = notifier.clone();
        other.set_enabled(true);
        assert!(notifier.is_enabled());
    }
}
