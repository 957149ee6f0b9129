//! Volatile per-session cache of recent conversation turns.
//!
//! Cache-aside: the agent reads here first and falls back to the
//! [`HistoryStore`](crate::HistoryStore) on a miss, then fills the entry.
//! Nothing is shared across processes and a restart starts cold.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use serde::Serialize;
use uuid::Uuid;

use crate::history::Turn;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub sessions: usize,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Default)]
struct Inner {
    sessions: HashMap<Uuid, VecDeque<Turn>>,
    // Least recently used at the front.
    recency: VecDeque<Uuid>,
    hits: u64,
    misses: u64,
}

impl Inner {
    fn touch(&mut self, session_id: Uuid) {
        if let Some(pos) = self.recency.iter().position(|id| *id == session_id) {
            self.recency.remove(pos);
        }
        self.recency.push_back(session_id);
    }

    fn forget(&mut self, session_id: Uuid) {
        self.sessions.remove(&session_id);
        if let Some(pos) = self.recency.iter().position(|id| *id == session_id) {
            self.recency.remove(pos);
        }
    }
}

/// Bounded LRU of bounded turn windows.
#[derive(Debug)]
pub struct ConversationCache {
    inner: Mutex<Inner>,
    max_turns: usize,
    max_sessions: usize,
}

impl ConversationCache {
    pub fn new(max_turns: usize, max_sessions: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_turns: max_turns.max(1),
            max_sessions: max_sessions.max(1),
        }
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Cached turns for `session_id`, oldest first, or `None` on a miss.
    pub fn get(&self, session_id: Uuid) -> Option<Vec<Turn>> {
        let Ok(mut inner) = self.inner.lock() else {
            return None;
        };
        match inner.sessions.get(&session_id).map(|turns| turns.iter().cloned().collect()) {
            Some(turns) => {
                inner.hits += 1;
                inner.touch(session_id);
                Some(turns)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Replace the entry for `session_id`, keeping only the newest turns.
    pub fn put_all(&self, session_id: Uuid, turns: Vec<Turn>) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        let skip = turns.len().saturating_sub(self.max_turns);
        let window: VecDeque<Turn> = turns.into_iter().skip(skip).collect();
        inner.sessions.insert(session_id, window);
        inner.touch(session_id);
        while inner.sessions.len() > self.max_sessions {
            let Some(oldest) = inner.recency.pop_front() else {
                break;
            };
            inner.sessions.remove(&oldest);
        }
    }

    /// Append a turn to an existing entry.
    ///
    /// Absent sessions are left absent: a partial window would later be served
    /// as if it were the complete recent history.
    pub fn push(&self, session_id: Uuid, turn: Turn) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        let max_turns = self.max_turns;
        let Some(turns) = inner.sessions.get_mut(&session_id) else {
            return;
        };
        turns.push_back(turn);
        while turns.len() > max_turns {
            turns.pop_front();
        }
        inner.touch(session_id);
    }

    pub fn invalidate(&self, session_id: Uuid) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.forget(session_id);
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.inner
            .lock()
            .map(|inner| CacheStats { sessions: inner.sessions.len(), hits: inner.hits, misses: inner.misses })
            .unwrap_or_default()
    }
}
