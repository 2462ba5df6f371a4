//! Showing captured output: printed directly when it fits, paged when it does not.
//!
//! The pager is a small state machine ([`Pager`]) driven by decoded keys, so
//! its behaviour can be exercised without a terminal. [`present`] owns the
//! terminal side: alternate screen, raw mode and the search prompt.

use std::io::{self, Read, Write};
use std::ops::Range;
use std::os::fd::AsFd;

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::style::{Attribute, Print, SetAttribute};
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, queue};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use unicode_width::UnicodeWidthChar;

use crate::capture::Capture;
use crate::editor::keys::Key;
use crate::editor::terminal::{KeyReader, RawModeGuard};

const TAB_WIDTH: usize = 8;

/// Whether `lines` lines can be printed without scrolling a `rows`-row screen.
pub fn fits_on_screen(lines: usize, rows: u16) -> bool {
    lines <= usize::from(rows)
}

/// Write every captured line as it was produced.
pub fn print_lines(capture: &Capture, out: &mut dyn Write) -> io::Result<()> {
    for i in 0..capture.line_count() {
        out.write_all(capture.line_bytes(i))?;
        out.write_all(b"\n")?;
    }
    out.flush()
}

/// Show a finished capture. Paging only happens when there is a terminal to
/// read `keys` from and it is too short for the output; everything else is
/// printed to `out`.
pub fn present<R: Read + AsFd>(
    capture: &Capture,
    out: &mut dyn Write,
    keys: Option<&mut KeyReader<R>>,
) -> anyhow::Result<()> {
    if let Some(keys) = keys {
        match terminal::size() {
            Ok((cols, rows)) if !fits_on_screen(capture.line_count(), rows) => {
                out.flush()?;
                return page(capture, keys, cols, rows);
            }
            Ok(_) => {}
            Err(e) => log::debug!("terminal size unavailable, printing directly: {e}"),
        }
    }
    print_lines(capture, out)?;
    Ok(())
}

/// What the driver should do after a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagerAction {
    Continue,
    Quit,
    /// Read a search query and pass it to [`Pager::search`].
    Prompt,
}

/// Matches of one search, shown as a list with one active entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResults {
    pub query: String,
    /// Indices of matching lines, ascending.
    pub hits: Vec<usize>,
    pub active: usize,
    /// First hit shown in the list.
    pub scroll: usize,
}

impl SearchResults {
    fn select(&mut self, index: usize, page: usize) {
        self.active = index.min(self.hits.len().saturating_sub(1));
        if self.active < self.scroll {
            self.scroll = self.active;
        } else if self.active >= self.scroll + page {
            self.scroll = self.active + 1 - page;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum View {
    Browse,
    Results(SearchResults),
}

/// Full-screen viewer over captured lines.
#[derive(Debug)]
pub struct Pager {
    lines: Vec<String>,
    /// Content rows; the last screen row holds the status line.
    page: usize,
    width: usize,
    top: usize,
    view: View,
    message: Option<String>,
}

impl Pager {
    pub fn new(lines: Vec<String>, cols: u16, rows: u16) -> Self {
        Self {
            lines: lines.iter().map(|l| printable(l)).collect(),
            page: usize::from(rows).saturating_sub(1).max(1),
            width: usize::from(cols).max(1),
            top: 0,
            view: View::Browse,
            message: None,
        }
    }

    pub fn top(&self) -> usize {
        self.top
    }

    pub fn page_size(&self) -> usize {
        self.page
    }

    /// Line indices on screen in browse view.
    pub fn visible(&self) -> Range<usize> {
        self.top..(self.top + self.page).min(self.lines.len())
    }

    pub fn results(&self) -> Option<&SearchResults> {
        match &self.view {
            View::Results(results) => Some(results),
            View::Browse => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    fn last_top(&self) -> usize {
        self.lines.len().saturating_sub(self.page)
    }

    pub fn handle_key(&mut self, key: Key) -> PagerAction {
        self.message = None;
        if matches!(self.view, View::Browse) {
            self.browse_key(key)
        } else {
            self.results_key(key);
            PagerAction::Continue
        }
    }

    fn browse_key(&mut self, key: Key) -> PagerAction {
        match key {
            Key::Up | Key::PageUp | Key::Char('b') => {
                self.top = self.top.saturating_sub(self.page);
            }
            Key::Down | Key::PageDown | Key::Char(' ') => {
                self.top = (self.top + self.page).min(self.last_top());
            }
            Key::Home | Key::Char('g') => self.top = 0,
            Key::End | Key::Char('G') => self.top = self.last_top(),
            Key::Char('q') | Key::Escape | Key::Ctrl('c') => return PagerAction::Quit,
            Key::Char('/') => return PagerAction::Prompt,
            _ => {}
        }
        PagerAction::Continue
    }

    fn results_key(&mut self, key: Key) {
        let last_top = self.last_top();
        let page = self.page;
        let View::Results(results) = &mut self.view else {
            return;
        };
        match key {
            Key::Up => results.select(results.active.saturating_sub(1), page),
            Key::Down => results.select(results.active + 1, page),
            Key::Enter => {
                let line = results.hits[results.active];
                self.top = line.min(last_top);
                self.view = View::Browse;
            }
            // Cancel leaves the viewport where it was.
            Key::Escape | Key::Char('q') | Key::Ctrl('c') => self.view = View::Browse,
            _ => {}
        }
    }

    /// Case-sensitive substring search. With no hits the view stays put and
    /// a message says so.
    pub fn search(&mut self, query: &str) {
        if query.is_empty() {
            return;
        }
        let hits: Vec<usize> = self
            .lines
            .iter()
            .enumerate()
            .filter(|(_, line)| line.contains(query))
            .map(|(i, _)| i)
            .collect();
        if hits.is_empty() {
            self.message = Some(format!("Pattern not found: {query}"));
            return;
        }
        let first = hits.iter().position(|&h| h >= self.top).unwrap_or(0);
        let mut results = SearchResults {
            query: query.to_string(),
            hits,
            active: 0,
            scroll: 0,
        };
        results.select(first, self.page);
        self.view = View::Results(results);
    }

    pub fn render(&self, out: &mut impl Write) -> io::Result<()> {
        queue!(out, MoveTo(0, 0), Clear(ClearType::All))?;
        let status = match &self.view {
            View::Browse => {
                for (row, i) in self.visible().enumerate() {
                    queue!(out, MoveTo(0, row as u16), Print(clip(&self.lines[i], self.width)))?;
                }
                let range = self.visible();
                format!(
                    "lines {}-{} of {}  (/ search, q quit)",
                    range.start + 1,
                    range.end,
                    self.lines.len()
                )
            }
            View::Results(results) => {
                let shown = results
                    .hits
                    .iter()
                    .enumerate()
                    .skip(results.scroll)
                    .take(self.page);
                for (row, (n, &line)) in shown.enumerate() {
                    let entry = format!("{:>6}: {}", line + 1, self.lines[line]);
                    queue!(out, MoveTo(0, row as u16))?;
                    if n == results.active {
                        queue!(
                            out,
                            SetAttribute(Attribute::Reverse),
                            Print(clip(&entry, self.width)),
                            SetAttribute(Attribute::Reset)
                        )?;
                    } else {
                        queue!(out, Print(clip(&entry, self.width)))?;
                    }
                }
                format!(
                    "/{}  match {} of {}  (Enter jump, Esc cancel)",
                    results.query,
                    results.active + 1,
                    results.hits.len()
                )
            }
        };
        let status = self.message.clone().unwrap_or(status);
        queue!(
            out,
            MoveTo(0, self.page as u16),
            SetAttribute(Attribute::Reverse),
            Print(clip(&status, self.width)),
            SetAttribute(Attribute::Reset)
        )?;
        out.flush()
    }
}

/// Alternate screen with a hidden cursor, left again on drop.
struct AlternateScreen;

impl AlternateScreen {
    fn enter(out: &mut impl Write) -> io::Result<Self> {
        execute!(out, EnterAlternateScreen, Hide)?;
        Ok(Self)
    }
}

impl Drop for AlternateScreen {
    fn drop(&mut self) {
        if let Err(e) = execute!(io::stdout(), Show, LeaveAlternateScreen) {
            log::error!("failed to leave alternate screen: {e}");
        }
    }
}

/// Run the pager until it quits. Raw mode is held throughout, except while
/// the search prompt reads a cooked line.
fn page<R: Read + AsFd>(
    capture: &Capture,
    keys: &mut KeyReader<R>,
    cols: u16,
    rows: u16,
) -> anyhow::Result<()> {
    let mut pager = Pager::new(capture.text_lines(), cols, rows);
    let mut out = io::stdout();
    let _screen = AlternateScreen::enter(&mut out)?;
    let mut raw = Some(RawModeGuard::enter(false)?);
    loop {
        pager.render(&mut out)?;
        let action = match keys.read_key()? {
            Some(key) => pager.handle_key(key),
            None => PagerAction::Quit,
        };
        match action {
            PagerAction::Continue => {}
            PagerAction::Quit => break,
            PagerAction::Prompt => {
                drop(raw.take());
                let query = prompt_query(&mut out, pager.page_size() as u16)?;
                raw = Some(RawModeGuard::enter(false)?);
                if let Some(query) = query {
                    pager.search(&query);
                }
            }
        }
    }
    Ok(())
}

/// Read a search query on the status row, with the terminal in cooked mode.
fn prompt_query(out: &mut impl Write, row: u16) -> anyhow::Result<Option<String>> {
    execute!(out, MoveTo(0, row), Clear(ClearType::CurrentLine), Show)?;
    let mut editor = DefaultEditor::new()?;
    let line = editor.readline("/");
    execute!(out, Hide)?;
    match line {
        Ok(query) => Ok(Some(query)),
        Err(ReadlineError::Interrupted | ReadlineError::Eof) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Tabs expanded, other control characters dropped.
fn printable(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut column = 0;
    for c in line.chars() {
        if c == '\t' {
            let pad = TAB_WIDTH - column % TAB_WIDTH;
            out.extend(std::iter::repeat_n(' ', pad));
            column += pad;
        } else if !c.is_control() {
            out.push(c);
            column += c.width().unwrap_or(0);
        }
    }
    out
}

/// Longest prefix of `text` that fits in `width` columns.
fn clip(text: &str, width: usize) -> &str {
    let mut used = 0;
    for (i, c) in text.char_indices() {
        used += c.width().unwrap_or(0);
        if used > width {
            return &text[..i];
        }
    }
    text
}
