//! User-facing notifications raised by the settings controller

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Instant;

const MAX_RETAINED_NOTIFICATIONS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Error,
}

impl NotificationLevel {
    pub fn icon(&self) -> &'static str {
        match self {
            NotificationLevel::Info => "󰋼",
            NotificationLevel::Error => "󰅚",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub id: u64,
    pub level: NotificationLevel,
    pub message: String,
    pub created_at: Instant,
}

/// Fire-and-forget notification channel
pub trait NotificationSink: Send + Sync {
    fn show(&self, message: &str, level: NotificationLevel);
}

#[derive(Debug, Default)]
struct LogState {
    notifications: VecDeque<Notification>,
    next_id: u64,
}

/// Records notifications for the host to display; clones share one log
#[derive(Debug, Clone, Default)]
pub struct NotificationLog {
    state: Arc<Mutex<LogState>>,
}

impl NotificationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, level: NotificationLevel, message: impl Into<String>) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        state.next_id += 1;
        let notification = Notification {
            id: state.next_id,
            level,
            message: message.into(),
            created_at: Instant::now(),
        };
        state.notifications.push_back(notification);

        while state.notifications.len() > MAX_RETAINED_NOTIFICATIONS {
            state.notifications.pop_front();
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(NotificationLevel::Info, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(NotificationLevel::Error, message);
    }

    /// Take every pending notification, oldest first
    pub fn drain(&self) -> Vec<Notification> {
        self.state
            .lock()
            .map(|mut state| state.notifications.drain(..).collect())
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> Vec<Notification> {
        self.state
            .lock()
            .map(|state| state.notifications.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.state
            .lock()
            .map(|state| state.notifications.len())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NotificationSink for NotificationLog {
    fn show(&self, message: &str, level: NotificationLevel) {
        tracing::debug!(?level, "notification: {}", message);
        self.push(level, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_show_records_in_order() {
        let log = NotificationLog::new();
        log.show("first", NotificationLevel::Info);
        log.show("second", NotificationLevel::Error);

        let notifications = log.snapshot();
        assert_eq!(notifications.len(), 2);
        assert_eq!(notifications[0].message, "first");
        assert_eq!(notifications[1].level, NotificationLevel::Error);
        assert!(notifications[0].id < notifications[1].id);
    }

    #[test]
    fn test_drain_empties_log() {
        let log = NotificationLog::new();
        log.error("boom");
        assert_eq!(log.drain().len(), 1);
        assert!(log.is_empty());
    }

    #[test]
    fn test_clones_share_log() {
        let log = NotificationLog::new();
        let handle = log.clone();
        handle.info("from clone");
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_retention_cap() {
        let log = NotificationLog::new();
        for i in 0..(MAX_RETAINED_NOTIFICATIONS + 10) {
            log.info(format!("n{}", i));
        }
        let notifications = log.snapshot();
        assert_eq!(notifications.len(), MAX_RETAINED_NOTIFICATIONS);
        assert_eq!(notifications[0].message, "n10");
    }
}
