//! Raw-mode line editor.
//!
//! The terminal cursor is only ever moved relative to where it is: right by
//! reprinting text, left by emitting backspaces. Absolute positioning breaks
//! once the terminal has wrapped a long line.

pub mod buffer;
pub mod completion;
pub mod history;
pub mod keys;
pub mod terminal;

use std::io::{self, Read, Write};
use std::ops::Range;
use std::os::fd::AsFd;
use std::path::{Path, PathBuf};

use buffer::{EditBuffer, display_width};
use completion::{CompletionState, MatchSource};
use history::{HistoryRing, Recall};
use keys::Key;
use terminal::{KeyReader, RawModeGuard, bell, read_clipboard, sanitize_paste};

use crate::error::TerminalError;
use crate::lexer;

/// What a call to [`LineEditor::read_line`] produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Line(String),
    /// Input closed, or Ctrl-D on an empty line.
    Eof,
}

/// Settings that outlive a single line.
#[derive(Debug, Clone, Default)]
pub struct EditorOptions {
    pub max_line_len: usize,
    pub clipboard_commands: Vec<Vec<String>>,
    /// Names offered when completing the first word.
    pub command_names: Vec<String>,
}

#[derive(Debug)]
pub struct LineEditor {
    options: EditorOptions,
}

impl LineEditor {
    pub fn new(options: EditorOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EditorOptions {
        &self.options
    }

    /// Read one line from the controlling terminal through `keys`.
    ///
    /// Raw mode and bracketed paste are enabled for the duration of the call
    /// and restored on every exit path. Bytes read past the end of the line
    /// stay in `keys` for the next call.
    pub fn read_line<R: Read + AsFd>(
        &mut self,
        prompt: &str,
        history: &mut HistoryRing,
        cwd: &Path,
        keys: &mut KeyReader<R>,
    ) -> Result<ReadOutcome, TerminalError> {
        let _raw = RawModeGuard::enter(true)?;
        let mut out = io::stdout().lock();
        self.read_line_from(prompt, history, cwd, keys, &mut out)
    }

    /// Read one line from `keys`, echoing to `out`. The terminal mode is the caller's business.
    pub fn read_line_from<R: Read + AsFd, W: Write>(
        &mut self,
        prompt: &str,
        history: &mut HistoryRing,
        cwd: &Path,
        keys: &mut KeyReader<R>,
        out: &mut W,
    ) -> Result<ReadOutcome, TerminalError> {
        history.reset_cursor();
        out.write_all(prompt.as_bytes())?;
        out.flush()?;

        let mut session = EditSession::new(&self.options, history, cwd.to_path_buf(), out);
        loop {
            let Some(key) = keys.read_key()? else {
                session.out.write_all(b"\r\n")?;
                session.out.flush()?;
                return Ok(ReadOutcome::Eof);
            };
            let step = session.handle(key)?;
            session.out.flush()?;
            match step {
                Step::Continue => {}
                Step::Submit(line) => return Ok(ReadOutcome::Line(line)),
                Step::Eof => return Ok(ReadOutcome::Eof),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Continue,
    Submit(String),
    Eof,
}

/// State of one line being edited.
struct EditSession<'a, W: Write> {
    options: &'a EditorOptions,
    history: &'a mut HistoryRing,
    cwd: PathBuf,
    out: &'a mut W,
    buffer: EditBuffer,
    /// Line being typed before history recall replaced it.
    draft: Option<String>,
    completion: Option<CompletionState>,
    /// Text collected inside a bracketed paste.
    paste: Option<String>,
}

impl<'a, W: Write> EditSession<'a, W> {
    fn new(
        options: &'a EditorOptions,
        history: &'a mut HistoryRing,
        cwd: PathBuf,
        out: &'a mut W,
    ) -> Self {
        Self {
            options,
            history,
            cwd,
            out,
            buffer: EditBuffer::new(options.max_line_len),
            draft: None,
            completion: None,
            paste: None,
        }
    }

    fn handle(&mut self, key: Key) -> io::Result<Step> {
        if let Some(paste) = self.paste.as_mut() {
            match key {
                Key::PasteEnd => {
                    let text = sanitize_paste(&std::mem::take(paste));
                    self.paste = None;
                    self.insert(&text)?;
                }
                Key::Char(c) => paste.push(c),
                Key::Enter | Key::Tab => paste.push(' '),
                _ => {}
            }
            return Ok(Step::Continue);
        }

        if key != Key::Tab {
            self.completion = None;
        }

        match key {
            Key::Char(c) => self.insert(c.encode_utf8(&mut [0; 4]))?,
            Key::Enter => return self.submit(),
            Key::Tab => self.complete()?,
            Key::Backspace => self.backspace()?,
            Key::Delete => self.delete()?,
            Key::Left => {
                if let Some(cluster) = self.buffer.move_left() {
                    let w = display_width(cluster);
                    back(self.out, w)?;
                }
            }
            Key::Right => {
                if let Some(cluster) = self.buffer.move_right() {
                    self.out.write_all(cluster.as_bytes())?;
                }
            }
            Key::Home | Key::Ctrl('a') => {
                let w = display_width(self.buffer.move_home());
                back(self.out, w)?;
            }
            Key::End | Key::Ctrl('e') => {
                let crossed = self.buffer.move_end();
                self.out.write_all(crossed.as_bytes())?;
            }
            Key::Up => self.recall_older()?,
            Key::Down => self.recall_newer()?,
            Key::PasteStart => self.paste = Some(String::new()),
            Key::Ctrl('v') => self.paste_clipboard()?,
            Key::Ctrl('c') => {
                self.out.write_all(b"^C\r\n")?;
                return Ok(Step::Submit(String::new()));
            }
            Key::Ctrl('d') if self.buffer.is_empty() => {
                self.out.write_all(b"\r\n")?;
                return Ok(Step::Eof);
            }
            Key::Ctrl('d') => self.delete()?,
            _ => {}
        }
        Ok(Step::Continue)
    }

    fn submit(&mut self) -> io::Result<Step> {
        self.out.write_all(b"\r\n")?;
        let line = self.buffer.as_str().to_string();
        self.history.push(&line);
        Ok(Step::Submit(line))
    }

    /// Insert at the cursor with a single repaint of the tail.
    fn insert(&mut self, text: &str) -> io::Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        let from = self.buffer.cursor();
        if !self.buffer.insert(text) {
            return bell(self.out);
        }
        self.repaint_from(from, 0)
    }

    fn backspace(&mut self) -> io::Result<()> {
        match self.buffer.remove_before() {
            Some(removed) => {
                let w = display_width(&removed);
                back(self.out, w)?;
                self.repaint_from(self.buffer.cursor(), w)
            }
            None => Ok(()),
        }
    }

    fn delete(&mut self) -> io::Result<()> {
        match self.buffer.remove_at() {
            Some(removed) => self.repaint_from(self.buffer.cursor(), display_width(&removed)),
            None => Ok(()),
        }
    }

    /// Reprint the buffer from byte `from` (where the terminal cursor is),
    /// blank out `stale` leftover columns, and walk back to the cursor.
    fn repaint_from(&mut self, from: usize, stale: usize) -> io::Result<()> {
        let text = self.buffer.as_str();
        self.out.write_all(text[from..].as_bytes())?;
        self.out.write_all(" ".repeat(stale).as_bytes())?;
        let behind = display_width(&text[self.buffer.cursor()..]) + stale;
        back(self.out, behind)
    }

    /// Replace `range` (ending at the cursor) with `text` and redraw.
    fn replace(&mut self, range: Range<usize>, text: &str) -> io::Result<bool> {
        let old_width = display_width(&self.buffer.as_str()[range.start..]);
        let moved = display_width(&self.buffer.as_str()[range.start..self.buffer.cursor()]);
        if !self.buffer.replace(range.clone(), text) {
            bell(self.out)?;
            return Ok(false);
        }
        back(self.out, moved)?;
        let new_width = display_width(&self.buffer.as_str()[range.start..]);
        self.repaint_from(range.start, old_width.saturating_sub(new_width))?;
        Ok(true)
    }

    /// Swap the whole line for `text`, cursor at the end.
    fn replace_line(&mut self, text: &str) -> io::Result<()> {
        let crossed = self.buffer.move_end();
        self.out.write_all(crossed.as_bytes())?;
        let end = self.buffer.len();
        self.replace(0..end, text).map(|_| ())
    }

    fn recall_older(&mut self) -> io::Result<()> {
        if self.history.at_draft() {
            self.draft = Some(self.buffer.as_str().to_string());
        }
        let entry = match self.history.older() {
            Recall::Entry(entry) => entry.to_string(),
            Recall::Draft | Recall::Unchanged => return Ok(()),
        };
        self.replace_line(&entry)
    }

    fn recall_newer(&mut self) -> io::Result<()> {
        let text = match self.history.newer() {
            Recall::Entry(entry) => entry.to_string(),
            Recall::Draft => self.draft.take().unwrap_or_default(),
            Recall::Unchanged => return Ok(()),
        };
        self.replace_line(&text)
    }

    fn complete(&mut self) -> io::Result<()> {
        if let Some(mut state) = self.completion.take() {
            let text = state.advance();
            if self.replace(state.range.clone(), &text)? {
                state.range.end = state.range.start + text.len();
                self.completion = Some(state);
            }
            return Ok(());
        }

        let word = lexer::trailing_word(self.buffer.head());
        let (matches, source) =
            completion::candidates(&word, &self.options.command_names, &self.cwd);
        let quote = match source {
            MatchSource::Files => word.open_quote,
            MatchSource::Commands => None,
        };
        match matches.len() {
            0 => bell(self.out),
            1 => {
                let text = completion::render(&matches[0], source, quote, true);
                self.replace(word.span, &text).map(|_| ())
            }
            _ => {
                let text = completion::render(&matches[0], source, quote, false);
                let start = word.span.start;
                if self.replace(word.span, &text)? {
                    self.completion = Some(CompletionState {
                        range: start..start + text.len(),
                        matches,
                        index: 0,
                        source,
                        quote,
                    });
                }
                Ok(())
            }
        }
    }

    fn paste_clipboard(&mut self) -> io::Result<()> {
        match read_clipboard(&self.options.clipboard_commands) {
            Some(text) => self.insert(&sanitize_paste(&text)),
            None => bell(self.out),
        }
    }
}

/// Move the terminal cursor left by `columns`.
fn back(out: &mut impl Write, columns: usize) -> io::Result<()> {
    out.write_all("\x08".repeat(columns).as_bytes())
}
