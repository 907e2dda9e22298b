//! Bounded, insertion-ordered conversation log.
//!
//! Keeps the most recent entries only. Pushing onto a full log evicts the
//! oldest entry; that is the normal sliding-window behavior, not an error.

use std::collections::VecDeque;

use tracing::trace;

use crate::types::ConversationEntry;

/// Default maximum number of entries kept in the log.
pub const DEFAULT_LOG_CAPACITY: usize = 500;

#[derive(Debug, Clone)]
pub struct ConversationLog {
    entries: VecDeque<ConversationEntry>,
    capacity: usize,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an entry, evicting the oldest one when the log is full.
    ///
    /// Pushing an open assistant entry seals any assistant entry that is
    /// still open, so at most one open assistant entry ever exists.
    pub fn push(&mut self, entry: ConversationEntry) {
        if entry.is_open_ai() {
            for stale in self.entries.iter_mut().filter(|e| e.is_open_ai()) {
                trace!(id = %stale.id, "sealing superseded assistant entry");
                stale.seal();
            }
        }

        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn last(&self) -> Option<&ConversationEntry> {
        self.entries.back()
    }

    pub fn last_mut(&mut self) -> Option<&mut ConversationEntry> {
        self.entries.back_mut()
    }

    /// The open assistant entry, if it is the last entry of the log.
    pub fn streaming_tail_mut(&mut self) -> Option<&mut ConversationEntry> {
        self.entries.back_mut().filter(|e| e.is_open_ai())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConversationEntry> {
        self.entries.iter()
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

    /// Owned copy of the entries, oldest first.
    pub fn snapshot(&self) -> Vec<ConversationEntry> {
        self.entries.iter().cloned().collect()
    }
}

impl Default for ConversationLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntryKind;

    #[test]
    fn test_push_keeps_insertion_order() {
        let mut log = ConversationLog::new();
        log.push(ConversationEntry::human("me", "one"));
        log.push(ConversationEntry::human("me", "two"));

        let texts: Vec<_> = log.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two"]);
    }

    #[test]
    fn test_evicts_oldest_at_capacity() {
        let mut log = ConversationLog::new();
        for i in 0..DEFAULT_LOG_CAPACITY {
            log.push(ConversationEntry::human("me", i.to_string()));
        }
        assert_eq!(log.len(), DEFAULT_LOG_CAPACITY);

        log.push(ConversationEntry::human("me", "overflow"));
        assert_eq!(log.len(), DEFAULT_LOG_CAPACITY);
        assert_eq!(log.iter().next().unwrap().text, "1");
        assert_eq!(log.last().unwrap().text, "overflow");
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut log = ConversationLog::with_capacity(0);
        log.push(ConversationEntry::human("me", "a"));
        log.push(ConversationEntry::human("me", "b"));
        assert_eq!(log.len(), 1);
        assert_eq!(log.last().unwrap().text, "b");
    }

    #[test]
    fn test_pushing_open_ai_seals_previous_open_ai() {
        let mut log = ConversationLog::new();
        log.push(ConversationEntry::ai_streaming("first"));
        log.push(ConversationEntry::error("system", "boom"));
        log.push(ConversationEntry::ai_streaming("second"));

        let open: Vec<_> = log.iter().filter(|e| e.is_open_ai()).collect();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].text, "second");
        assert_eq!(log.iter().next().unwrap().done, Some(true));
    }

    #[test]
    fn test_streaming_tail_requires_open_ai_last() {
        let mut log = ConversationLog::new();
        assert!(log.streaming_tail_mut().is_none());

        log.push(ConversationEntry::ai_streaming("x"));
        assert!(log.streaming_tail_mut().is_some());

        log.push(ConversationEntry::tool("t", serde_json::Value::Null));
        assert!(log.streaming_tail_mut().is_none());
        assert_eq!(log.last().unwrap().kind, EntryKind::Tool);
    }
}
