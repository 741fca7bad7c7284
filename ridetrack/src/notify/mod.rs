//! Non-blocking user notifications.
//!
//! Every failure the tracking core catches (a denied permission, a failed
//! write, a dropped feed) ends up here as a [`Notice`] rather than as an
//! error returned to the view. Hosts plug in their own toast mechanism by
//! implementing [`Notifier`].

use std::fmt;

use parking_lot::Mutex;
use tracing::{error, info, warn};

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NoticeLevel {
    /// Informational (tracking started, feed reconnected).
    Info,
    /// Something was skipped but the session continues.
    Warning,
    /// The user has to act (grant permission, restart tracking).
    Error,
}

/// A message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: String,
}

impl Notice {
    /// Informational notice.
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::with_level(NoticeLevel::Info, title, description)
    }

    /// Warning notice.
    pub fn warning(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::with_level(NoticeLevel::Warning, title, description)
    }

    /// Error notice.
    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::with_level(NoticeLevel::Error, title, description)
    }

    fn with_level(
        level: NoticeLevel,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            level,
            title: title.into(),
            description: description.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.description)
    }
}

/// Sink for user notices. Must not block.
pub trait Notifier: Send + Sync {
    /// Show a notice to the user.
    fn notify(&self, notice: Notice);
}

/// Notifier that writes notices to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => info!(title = %notice.title, "{}", notice.description),
            NoticeLevel::Warning => warn!(title = %notice.title, "{}", notice.description),
            NoticeLevel::Error => error!(title = %notice.title, "{}", notice.description),
        }
    }
}

/// Notifier that keeps every notice, for tests and headless hosts.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All notices received so far.
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    /// Number of notices at the given level.
    pub fn count(&self, level: NoticeLevel) -> usize {
        self.notices
            .lock()
            .iter()
            .filter(|notice| notice.level == level)
            .count()
    }

    /// Remove and return every notice received so far.
    pub fn drain(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.notices.lock())
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().push(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_notifier_counts_by_level() {
        let notifier = RecordingNotifier::new();
        notifier.notify(Notice::warning("Location", "skipped"));
        notifier.notify(Notice::error("Location", "denied"));
        notifier.notify(Notice::warning("Location", "skipped again"));

        assert_eq!(notifier.count(NoticeLevel::Warning), 2);
        assert_eq!(notifier.count(NoticeLevel::Error), 1);
        assert_eq!(notifier.drain().len(), 3);
        assert!(notifier.notices().is_empty());
    }

    #[test]
    fn test_notice_display() {
        let notice = Notice::error("Location unavailable", "Your browser does not support it");
        assert_eq!(
            notice.to_string(),
            "Location unavailable: Your browser does not support it"
        );
    }
}
