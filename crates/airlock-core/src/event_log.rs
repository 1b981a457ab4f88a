use std::collections::VecDeque;

use crate::room::RoomState;

/// Default number of event lines kept in the replicated feed.
pub const DEFAULT_MAX_EVENTS: usize = 40;

/// Append-only, capped feed of human-readable event lines.
///
/// Only the host appends; the lines are replicated through the room
/// `events` key and rendered by every peer.
#[derive(Debug, Clone, PartialEq)]
pub struct EventLog {
    lines: VecDeque<String>,
    max_lines: usize,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_EVENTS)
    }

    pub fn with_capacity(max_lines: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            max_lines: max_lines.max(1),
        }
    }

    /// Rebuild from replicated lines, trimming to capacity.
    pub fn from_lines(lines: &[String], max_lines: usize) -> Self {
        let mut log = Self::with_capacity(max_lines);
        for line in lines {
            log.push(line.clone());
        }
        log
    }

    /// Append a line. Evicts the oldest line when at capacity.
    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push_back(line.into());
        while self.lines.len() > self.max_lines {
            self.lines.pop_front();
        }
    }

    pub fn latest(&self) -> Option<&str> {
        self.lines.back().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }
}

/// Append one line to the room feed, keeping it capped.
pub fn append_event(room: &mut RoomState, line: impl Into<String>) {
    let mut log = EventLog::from_lines(&room.events, DEFAULT_MAX_EVENTS);
    log.push(line);
    room.events = log.to_vec();
}
