//! User-visible session event log.
//!
//! Entries read `"{counter}: [{HH:MM:SS}] {message}"`, newest first. The
//! counter is monotonic for the life of a session and survives a restore by
//! re-parsing the newest entry.

use chrono::{Local, NaiveTime};

/// Most recent entries kept.
pub const MAX_LOG_ENTRIES: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLog {
    entries: Vec<String>,
    next_counter: u64,
}

impl Default for EventLog {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_counter: 1,
        }
    }
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a log from persisted entries (newest first).
    ///
    /// Resuming the counter is best effort: when the newest entry has no
    /// leading `N:` prefix the counter restarts at 1.
    pub fn restore(mut entries: Vec<String>) -> Self {
        entries.truncate(MAX_LOG_ENTRIES);
        let next_counter = entries
            .first()
            .and_then(|newest| parse_counter(newest))
            .map(|n| n + 1)
            .unwrap_or(1);
        Self {
            entries,
            next_counter,
        }
    }

    /// Record `message` stamped with the local wall clock.
    pub fn push(&mut self, message: impl AsRef<str>) -> &str {
        self.push_at(Local::now().time(), message)
    }

    /// Record `message` stamped with `time`.
    pub fn push_at(&mut self, time: NaiveTime, message: impl AsRef<str>) -> &str {
        let line = format!(
            "{}: [{}] {}",
            self.next_counter,
            time.format("%H:%M:%S"),
            message.as_ref()
        );
        self.next_counter += 1;
        self.entries.insert(0, line);
        self.entries.truncate(MAX_LOG_ENTRIES);
        &self.entries[0]
    }

    /// Entries, newest first.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn latest(&self) -> Option<&str> {
        self.entries.first().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn next_counter(&self) -> u64 {
        self.next_counter
    }

    /// Drop every entry and restart the counter.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

fn parse_counter(line: &str) -> Option<u64> {
    let (prefix, _) = line.split_once(':')?;
    if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    prefix.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noon() -> NaiveTime {
        NaiveTime::from_hms_opt(12, 0, 5).unwrap()
    }

    #[test]
    fn entries_are_numbered_newest_first() {
        let mut log = EventLog::new();
        log.push_at(noon(), "first");
        log.push_at(noon(), "second");
        assert_eq!(log.entries()[0], "2: [12:00:05] second");
        assert_eq!(log.entries()[1], "1: [12:00:05] first");
    }

    #[test]
    fn keeps_only_most_recent_entries() {
        let mut log = EventLog::new();
        for i in 0..(MAX_LOG_ENTRIES + 5) {
            log.push_at(noon(), format!("m{i}"));
        }
        assert_eq!(log.len(), MAX_LOG_ENTRIES);
        assert!(log.latest().unwrap().ends_with("m104"));
        assert!(log.entries().last().unwrap().ends_with("m5"));
    }

    #[test]
    fn restore_resumes_counter_from_newest_entry() {
        let log = EventLog::restore(vec![
            "41: [09:00:00] newest".into(),
            "40: [08:59:00] older".into(),
        ]);
        assert_eq!(log.next_counter(), 42);
    }

    #[test]
    fn restore_without_prefix_restarts_counter() {
        let log = EventLog::restore(vec!["no counter here".into()]);
        assert_eq!(log.next_counter(), 1);
        assert_eq!(EventLog::restore(Vec::new()).next_counter(), 1);
    }

    #[test]
    fn clear_resets_counter() {
        let mut log = EventLog::new();
        log.push_at(noon(), "x");
        log.clear();
        assert!(log.is_empty());
        assert!(log.push_at(noon(), "y").starts_with("1: "));
    }
}
