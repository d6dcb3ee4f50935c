/// log_window.rs — Trailing window over the backend log feed
///
/// Each poll returns the latest `limit` lines, so consecutive responses
/// overlap heavily. The window appends only lines it does not already hold
/// and keeps the most recent `capacity` of them, oldest first.
use std::collections::VecDeque;

use ahash::AHashSet;

use crate::models::LogEntry;

#[derive(Debug, Clone)]
pub struct LogWindow {
    capacity: usize,
    entries:  VecDeque<LogEntry>,
    seen:     AHashSet<LogEntry>,
}

impl LogWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
            seen:    AHashSet::with_capacity(capacity),
        }
    }

    /// Append unseen entries in feed order; returns how many were new.
    pub fn extend(&mut self, batch: &[LogEntry]) -> usize {
        let mut added = 0;
        for entry in batch {
            if self.seen.contains(entry) {
                continue;
            }
            self.seen.insert(entry.clone());
            self.entries.push_back(entry.clone());
            added += 1;
            if self.entries.len() > self.capacity {
                if let Some(old) = self.entries.pop_front() {
                    self.seen.remove(&old);
                }
            }
        }
        added
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(ts: &str, msg: &str) -> LogEntry {
        LogEntry { timestamp: ts.into(), level: "INFO".into(), message: msg.into(), module: None }
    }

    #[test]
    fn overlapping_batches_are_deduplicated() {
        let mut w = LogWindow::new(10);
        assert_eq!(w.extend(&[line("10:00:00", "a"), line("10:00:01", "b")]), 2);
        assert_eq!(w.extend(&[line("10:00:01", "b"), line("10:00:02", "c")]), 1);
        let msgs: Vec<&str> = w.iter().map(|l| l.message.as_str()).collect();
        assert_eq!(msgs, vec!["a", "b", "c"]);
    }

    #[test]
    fn keeps_only_the_most_recent() {
        let mut w = LogWindow::new(2);
        w.extend(&[line("1", "a"), line("2", "b"), line("3", "c")]);
        assert_eq!(w.len(), 2);
        assert_eq!(w.to_vec()[0].message, "b");

        // "a" fell out of the window, so it counts as new again
        assert_eq!(w.extend(&[line("1", "a")]), 1);
        assert_eq!(w.to_vec().last().unwrap().message, "a");
    }

    #[test]
    fn zero_capacity_still_holds_one() {
        let mut w = LogWindow::new(0);
        w.extend(&[line("1", "a"), line("2", "b")]);
        assert_eq!(w.len(), 1);
        assert!(!w.is_empty());
    }
}
