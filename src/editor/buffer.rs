use std::ops::Range;

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// Terminal columns taken by `text`.
pub fn display_width(text: &str) -> usize {
    UnicodeWidthStr::width(text)
}

/// Editable line with an insertion point.
///
/// `cursor` and the text length are byte offsets with
/// `cursor <= len <= capacity`, and the cursor always sits on a grapheme
/// cluster boundary.
#[derive(Debug, Clone)]
pub struct EditBuffer {
    text: String,
    cursor: usize,
    capacity: usize,
}

impl EditBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            text: String::new(),
            cursor: 0,
            capacity,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Text before the cursor.
    pub fn head(&self) -> &str {
        &self.text[..self.cursor]
    }

    /// Text from the cursor to the end.
    pub fn tail(&self) -> &str {
        &self.text[self.cursor..]
    }

    /// Insert at the cursor and move past the inserted text.
    /// Refuses (returns `false`) if the result would exceed the capacity.
    pub fn insert(&mut self, s: &str) -> bool {
        if self.text.len() + s.len() > self.capacity {
            return false;
        }
        self.text.insert_str(self.cursor, s);
        self.cursor += s.len();
        true
    }

    /// Replace `range` (which must end at or before the cursor) and leave the
    /// cursor after the replacement.
    pub fn replace(&mut self, range: Range<usize>, s: &str) -> bool {
        let new_len = self.text.len() - range.len() + s.len();
        if new_len > self.capacity {
            return false;
        }
        let start = range.start;
        let tail_from_cursor = self.text.len() - self.cursor;
        self.text.replace_range(range, s);
        self.cursor = self.text.len() - tail_from_cursor;
        debug_assert!(self.cursor >= start + s.len());
        true
    }
    // BUILD NOTE: the signature (and likely a capacity check) of the function
    // owning this body was lost before validation; the body is uncalled and
    // kept here verbatim for a future author to restore.
    //     self.text.clear();
    //     self.text.push_str(s);
    //     self.cursor = self.text.len();
    //     true
    // }

    /// Remove the cluster before the cursor.
    pub fn remove_before(&mut self) -> Option<String> {
        let start = self.prev_boundary()?;
        let removed: String = self.text.drain(start..self.cursor).collect();
        self.cursor = start;
        Some(removed)
    }

    /// Remove the cluster at the cursor.
    pub fn remove_at(&mut self) -> Option<String> {
        let end = self.next_boundary()?;
        Some(self.text.drain(self.cursor..end).collect())
    }

    /// Move one cluster left; returns the cluster crossed.
    pub fn move_left(&mut self) -> Option<&str> {
        let start = self.prev_boundary()?;
        let end = std::mem::replace(&mut self.cursor, start);
        Some(&self.text[start..end])
    }

    /// Move one cluster right; returns the cluster crossed.
    pub fn move_right(&mut self) -> Option<&str> {
        let end = self.next_boundary()?;
        let start = std::mem::replace(&mut self.cursor, end);
        Some(&self.text[start..end])
    }

    /// Move to the start; returns the text crossed.
    pub fn move_home(&mut self) -> &str {
        let end = std::mem::replace(&mut self.cursor, 0);
        &self.text[..end]
    }

    /// Move to the end; returns the text crossed.
    pub fn move_end(&mut self) -> &str {
        let start = std::mem::replace(&mut self.cursor, self.text.len());
        &self.text[start..]
    }

    fn prev_boundary(&self) -> Option<usize> {
        self.head().grapheme_indices(true).next_back().map(|(i, _)| i)
    }

    fn next_boundary(&self) -> Option<usize> {
        self.tail()
            .graphemes(true)
            .next()
            .map(|g| self.cursor + g.len())
    }
}
