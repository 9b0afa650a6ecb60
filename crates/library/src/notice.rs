//! Transient user notices.
//!
//! Services never print. They return errors, and the front end turns them
//! into [`Notice`]s that expire after a while. The queue is bounded: when it
//! is full the oldest notice makes room.

use crate::error::Error;
use std::collections::VecDeque;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::time::{Duration, Instant};

pub const DEFAULT_CAPACITY: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Success,
    Info,
    Warning,
    Error,
}
impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Success => "success",
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Error => "error",
        }
    }

    /// Problems stay on screen longer than confirmations.
    pub fn default_ttl(&self) -> Duration {
        match self {
            Level::Success | Level::Info => Duration::from_secs(3),
            Level::Warning => Duration::from_secs(5),
            Level::Error => Duration::from_secs(7),
        }
    }
}
impl Display for Level {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: Level,
    pub message: String,
    pub created: Instant,
    pub ttl: Duration,
}

impl Notice {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            created: Instant::now(),
            ttl: level.default_ttl(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(Level::Success, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Level::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Level::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Level::Error, message)
    }

    /// Log a failed action and describe it for the user, e.g.
    /// `"Could not delete folder: Folder must be empty..."`.
    pub fn failure(action: &str, err: &Error) -> Self {
        tracing::error!(action, error = ?err, "Action failed");
        Self::error(format!("{action}: {err}"))
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn at(mut self, created: Instant) -> Self {
        self.created = created;
        self
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created) >= self.ttl
    }
}

impl Display for Notice {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "[{}] {}", self.level, self.message)
    }
}

/// Bounded queue of notices, oldest first.
#[derive(Debug, Clone)]
pub struct Notices {
    queue: VecDeque<Notice>,
    capacity: usize,
}

impl Default for Notices {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl Notices {
    /// A capacity of zero is raised to one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            queue: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Returns the notice evicted to make room, if any.
    pub fn push(&mut self, notice: Notice) -> Option<Notice> {
        let evicted = if self.queue.len() >= self.capacity {
            self.queue.pop_front()
        } else {
            None
        };
        self.queue.push_back(notice);
        evicted
    }

    /// Drop expired notices, returning how many went.
    pub fn prune(&mut self, now: Instant) -> usize {
        let before = self.queue.len();
        self.queue.retain(|notice| !notice.is_expired_at(now));
        before - self.queue.len()
    }

    pub fn active(&self, now: Instant) -> impl Iterator<Item = &Notice> {
        self.queue.iter().filter(move |notice| !notice.is_expired_at(now))
    }

    pub fn drain(&mut self) -> impl Iterator<Item = Notice> + '_ {
        self.queue.drain(..)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_expiry() {
        let start = Instant::now();
        let notice = Notice::success("Saved").at(start);
        assert!(!notice.is_expired_at(start + Duration::from_secs(2)));
        assert!(notice.is_expired_at(start + Duration::from_secs(3)));
        let sticky = Notice::error("Failed").at(start).with_ttl(Duration::from_secs(60));
        assert!(!sticky.is_expired_at(start + Duration::from_secs(59)));
    }

    #[test]
    fn test_bounded_queue_evicts_oldest() {
        let mut notices = Notices::with_capacity(2);
        assert!(notices.push(Notice::info("one")).is_none());
        assert!(notices.push(Notice::info("two")).is_none());
        let evicted = notices.push(Notice::info("three")).unwrap();
        assert_eq!(evicted.message, "one");
        let messages: Vec<String> = notices.drain().map(|notice| notice.message).collect();
        assert_eq!(messages, ["two", "three"]);
        assert!(notices.is_empty());
    }

    #[test]
    fn test_prune() {
        let start = Instant::now();
        let mut notices = Notices::default();
        notices.push(Notice::success("Uploaded").at(start));
        notices.push(Notice::warning("No text found").at(start));
        let later = start + Duration::from_secs(4);
        assert_eq!(notices.active(later).count(), 1);
        assert_eq!(notices.prune(later), 1);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices.prune(start + Duration::from_secs(10)), 1);
    }

    #[test]
    fn test_failure_message() {
        let err = Error::from(ErrorKind::NotSignedIn);
        let notice = Notice::failure("Could not load folders", &err);
        assert_eq!(notice.level, Level::Error);
        assert_eq!(notice.to_string(), "[error] Could not load folders: Please sign in first.");
    }
}
