//! Append-only, newest-first access event history.
//!
//! The history is a persistent singly linked list: every append allocates a
//! node pointing at the previous head, so a [`History`] snapshot is just a
//! cloned head pointer and never observes later appends. The single
//! [`EventLog`] writer publishes each new head through a `watch` channel;
//! any number of [`LogReader`]s pick it up from there.

use std::sync::Arc;

use serde::ser::{Serialize, SerializeSeq, Serializer};
use tokio::sync::watch;

use crate::access::types::{AccessEvent, CurrentStatus};

struct Node {
    event: AccessEvent,
    next: Option<Arc<Node>>,
}

impl Drop for Node {
    // Unlink iteratively so dropping a long history cannot overflow the stack
    fn drop(&mut self) {
        let mut next = self.next.take();
        while let Some(node) = next {
            match Arc::try_unwrap(node) {
                Ok(mut node) => next = node.next.take(),
                Err(_) => break,
            }
        }
    }
}

/// Immutable snapshot of the event log, newest event first
#[derive(Clone, Default)]
pub struct History {
    head: Option<Arc<Node>>,
    len: usize,
}

impl History {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn latest(&self) -> Option<&AccessEvent> {
        self.head.as_deref().map(|node| &node.event)
    }

    pub fn current_status(&self) -> CurrentStatus {
        self.latest().map(CurrentStatus::from).unwrap_or(CurrentStatus::NoData)
    }

    pub fn iter(&self) -> HistoryIter<'_> {
        HistoryIter {
            next: self.head.as_deref(),
            remaining: self.len,
        }
    }

    /// Events appended after `older` was taken, newest first
    pub fn since(&self, older: &History) -> impl Iterator<Item = &AccessEvent> + '_ {
        self.iter().take(self.len.saturating_sub(older.len))
    }

    fn prepend(&self, event: AccessEvent) -> History {
        History {
            head: Some(Arc::new(Node {
                event,
                next: self.head.clone(),
            })),
            len: self.len + 1,
        }
    }
}

impl std::fmt::Debug for History {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a AccessEvent;
    type IntoIter = HistoryIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Serialize for History {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len))?;
        for event in self.iter() {
            seq.serialize_element(event)?;
        }
        seq.end()
    }
}

pub struct HistoryIter<'a> {
    next: Option<&'a Node>,
    remaining: usize,
}

impl<'a> Iterator for HistoryIter<'a> {
    type Item = &'a AccessEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next?;
        self.next = node.next.as_deref();
        self.remaining -= 1;
        Some(&node.event)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for HistoryIter<'_> {}

/// Writer side of the session's event history
pub struct EventLog {
    history: History,
    publisher: watch::Sender<History>,
}

impl EventLog {
    pub fn new() -> Self {
        let (publisher, _) = watch::channel(History::default());
        Self {
            history: History::default(),
            publisher,
        }
    }

    /// Record a decoded event as the newest entry. Repeats are kept.
    pub fn append(&mut self, event: AccessEvent) {
        self.history = self.history.prepend(event);
        self.publisher.send_replace(self.history.clone());
    }

    pub fn current_status(&self) -> CurrentStatus {
        self.history.current_status()
    }

    pub fn history(&self) -> History {
        self.history.clone()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn reader(&self) -> LogReader {
        LogReader {
            rx: self.publisher.subscribe(),
        }
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view for presentation code; cheap to clone
#[derive(Clone)]
pub struct LogReader {
    rx: watch::Receiver<History>,
}

impl LogReader {
    pub fn current_status(&self) -> CurrentStatus {
        self.rx.borrow().current_status()
    }

    pub fn history(&self) -> History {
        self.rx.borrow().clone()
    }

    /// Wait until the writer appends another event or goes away.
    ///
    /// Returns `false` once the writer is dropped; the last published
    /// history stays readable.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::types::StatusKind;
    use chrono::Local;

    fn event(kind: StatusKind) -> AccessEvent {
        AccessEvent::new(kind, Local::now())
    }

    #[test]
    fn test_empty_log_has_no_data() {
        let log = EventLog::new();
        assert_eq!(log.current_status(), CurrentStatus::NoData);
        assert!(log.history().is_empty());
        assert_eq!(log.reader().current_status(), CurrentStatus::NoData);
    }

    #[test]
    fn test_newest_first() {
        let mut log = EventLog::new();
        log.append(event(StatusKind::Open));
        log.append(event(StatusKind::Wrong));
        log.append(event(StatusKind::Lock));
        let kinds: Vec<_> = log.history().iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec![StatusKind::Lock, StatusKind::Wrong, StatusKind::Open]);
        assert_eq!(log.current_status().kind(), Some(StatusKind::Lock));
    }

    #[test]
    fn test_snapshot_ignores_later_appends() {
        let mut log = EventLog::new();
        log.append(event(StatusKind::Wrong));
        let snapshot = log.history();
        log.append(event(StatusKind::Open));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.iter().count(), 1);
        assert_eq!(log.history().len(), 2);
        let added: Vec<_> = log.history().since(&snapshot).map(|e| e.kind()).collect();
        assert_eq!(added, vec![StatusKind::Open]);
    }

    #[test]
    fn test_iteration_is_restartable() {
        let mut log = EventLog::new();
        log.append(event(StatusKind::Open));
        log.append(event(StatusKind::Open));
        let history = log.history();
        assert_eq!(history.iter().len(), 2);
        assert_eq!(history.iter().len(), 2);
    }

    #[test]
    fn test_long_history_drops_without_recursion() {
        let mut log = EventLog::new();
        for _ in 0..200_000 {
            log.append(event(StatusKind::Wrong));
        }
        assert_eq!(log.len(), 200_000);
        drop(log);
    }

    #[test]
    fn test_reader_sees_appends() {
        let mut log = EventLog::new();
        let reader = log.reader();
        log.append(event(StatusKind::Lock));
        assert_eq!(reader.history().len(), 1);
        assert_eq!(reader.current_status().kind(), Some(StatusKind::Lock));
    }
}
