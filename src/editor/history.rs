use std::collections::VecDeque;

/// Result of moving the recall cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recall<'a> {
    /// The cursor moved onto this entry.
    Entry(&'a str),
    /// The cursor moved past the newest entry, back to the line being typed.
    Draft,
    /// The cursor was already at the end it tried to move past.
    Unchanged,
}

/// Fixed-capacity list of submitted lines plus a recall cursor.
///
/// The oldest line is evicted when a push would exceed the capacity. The
/// cursor ranges over `0..=len`; `len` is the slot after the newest entry.
#[derive(Debug, Clone)]
pub struct HistoryRing {
    entries: VecDeque<String>,
    capacity: usize,
    cursor: usize,
}

impl HistoryRing {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            cursor: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Whether the cursor is on the slot after the newest entry.
    pub fn at_draft(&self) -> bool {
        self.cursor == self.entries.len()
    }

    /// Append a submitted line. Blank lines are ignored and return `false`.
    /// The recall cursor is reset either way.
    pub fn push(&mut self, line: &str) -> bool {
        let added = !line.trim().is_empty();
        if added {
            if self.entries.len() == self.capacity {
                self.entries.pop_front();
            }
            self.entries.push_back(line.to_string());
        }
        self.reset_cursor();
        added
    }

    pub fn reset_cursor(&mut self) {
        self.cursor = self.entries.len();
    }

    /// Step towards older entries (Up).
    pub fn older(&mut self) -> Recall<'_> {
        if self.cursor == 0 {
            return Recall::Unchanged;
        }
        self.cursor -= 1;
        Recall::Entry(&self.entries[self.cursor])
    }

    /// Step towards newer entries (Down).
    pub fn newer(&mut self) -> Recall<'_> {
        if self.cursor >= self.entries.len() {
            return Recall::Unchanged;
        }
        self.cursor += 1;
        match self.entries.get(self.cursor) {
            Some(entry) => Recall::Entry(entry),
            None => Recall::Draft,
        }
    }
}
