//! Bounded, newest-first history of human-readable notifications.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::NoticeLevel;

/// Default number of retained entries.
pub const DEFAULT_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Info,
    Warn,
    Error,
    Success,
}

impl EventLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Success => "success",
        }
    }
}

impl std::fmt::Display for EventLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<NoticeLevel> for EventLevel {
    fn from(level: NoticeLevel) -> Self {
        match level {
            NoticeLevel::Info => Self::Info,
            NoticeLevel::Warn => Self::Warn,
            NoticeLevel::Error => Self::Error,
        }
    }
}

/// Category shown next to an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventTag {
    System,
    Shock,
    Event,
    Trade,
    Analysis,
    Risk,
    Test,
    Audio,
}

impl EventTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "SYSTEM",
            Self::Shock => "SHOCK",
            Self::Event => "EVENT",
            Self::Trade => "TRADE",
            Self::Analysis => "ANALYSIS",
            Self::Risk => "RISK",
            Self::Test => "TEST",
            Self::Audio => "AUDIO",
        }
    }
}

impl std::fmt::Display for EventTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub level: EventLevel,
    pub tag: Option<EventTag>,
}

impl std::fmt::Display for EventRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]", self.timestamp.format("%H:%M:%S"), self.level)?;
        if let Some(tag) = self.tag {
            write!(f, " {}", tag)?;
        }
        write!(f, " {}", self.message)
    }
}

/// Append/evict log. Entries are never mutated after insertion.
#[derive(Debug, Clone)]
pub struct EventLog {
    entries: VecDeque<EventRecord>,
    capacity: usize,
    next_id: u64,
}

impl EventLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
            next_id: 1,
        }
    }

    /// Prepend a new entry, evicting from the tail past capacity.
    /// Returns the assigned id.
    pub fn record(
        &mut self,
        message: impl Into<String>,
        level: EventLevel,
        tag: Option<EventTag>,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        self.entries.push_front(EventRecord {
            id,
            timestamp: Utc::now(),
            message: message.into(),
            level,
            tag,
        });
        self.entries.truncate(self.capacity);

        id
    }

    /// Empty the log. Ids keep increasing afterwards.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Snapshot of the current entries, newest first.
    pub fn entries(&self) -> Vec<EventRecord> {
        self.entries.iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<&EventRecord> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_prepends() {
        let mut log = EventLog::new();
        log.record("first", EventLevel::Info, None);
        log.record("second", EventLevel::Warn, Some(EventTag::System));

        let entries = log.entries();
        assert_eq!(entries[0].message, "second");
        assert_eq!(entries[1].message, "first");
        assert!(entries[0].id > entries[1].id);
    }

    #[test]
    fn test_bounded_to_most_recent() {
        let mut log = EventLog::new();
        for i in 0..120 {
            log.record(format!("entry {}", i), EventLevel::Info, None);
        }

        let entries = log.entries();
        assert_eq!(entries.len(), 50);
        // newest first, contiguous, oldest survivors are 70..=119
        for (offset, entry) in entries.iter().enumerate() {
            assert_eq!(entry.message, format!("entry {}", 119 - offset));
        }
        assert!(entries.windows(2).all(|w| w[0].id == w[1].id + 1));
    }

    #[test]
    fn test_eviction_keeps_survivor_order() {
        let mut log = EventLog::with_capacity(3);
        let ids: Vec<u64> = (0..3)
            .map(|i| log.record(format!("{}", i), EventLevel::Info, None))
            .collect();
        log.record("3", EventLevel::Info, None);

        let kept: Vec<u64> = log.entries().iter().map(|e| e.id).collect();
        assert_eq!(kept[1..], [ids[2], ids[1]]);
    }

    #[test]
    fn test_clear_keeps_ids_unique() {
        let mut log = EventLog::new();
        let before = log.record("a", EventLevel::Info, None);
        log.clear();
        assert!(log.is_empty());

        let after = log.record("b", EventLevel::Error, None);
        assert!(after > before);
        assert_eq!(log.latest().map(|e| e.level), Some(EventLevel::Error));
    }

    #[test]
    fn test_display_includes_tag() {
        let mut log = EventLog::new();
        log.record("Connected to market stream", EventLevel::Success, Some(EventTag::System));
        let line = log.latest().unwrap().to_string();
        assert!(line.contains("[success] SYSTEM Connected to market stream"));
    }
}
