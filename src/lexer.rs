//! Lexical analysis of an input line into words.
//!
//! Words are separated by unescaped whitespace. Both `'` and `"` quote, a
//! backslash escapes the next character everywhere (inside quotes too) and is
//! removed. An unterminated quote runs to the end of the line.

use std::ops::Range;

/// Characters that open and close a quoted section.
pub const QUOTES: [char; 2] = ['"', '\''];

/// A word produced by lexical analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Text of the word with quotes and escaping backslashes removed.
    pub text: String,
    /// Whether any part of the word was quoted. Quoted words are never wildcard-expanded.
    pub quoted: bool,
}

impl Token {
    pub fn new(text: impl Into<String>, quoted: bool) -> Self {
        Self {
            text: text.into(),
            quoted,
        }
    }
}

/// The word a cursor sits at the end of, as needed by completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrailingWord {
    /// Byte range of the word in the scanned line, quotes and backslashes included.
    pub span: Range<usize>,
    /// Zero-based position of the word in the line; `0` is the command name.
    pub index: usize,
    /// The word's text after quote and escape removal.
    pub text: String,
    /// Quote character still open at the end of the line, if any.
    pub open_quote: Option<char>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Start,
    ReadingWord,
    ReadingQuote(char),
}

struct LexingFSM<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    state: LexingState,
    buffer: String,
    quoted: bool,
    word_start: usize,
    tokens: Vec<Token>,
    spans: Vec<Range<usize>>,
}

impl<'a> LexingFSM<'a> {
    fn new(input: &'a str) -> Self {
        LexingFSM {
            input,
            chars: input.char_indices().peekable(),
            state: LexingState::Start,
            buffer: String::new(),
            quoted: false,
            word_start: 0,
            tokens: Vec::new(),
            spans: Vec::new(),
        }
    }

    fn run(&mut self) {
        while let Some((pos, ch)) = self.chars.next() {
            match self.state {
                LexingState::Start => self.handle_start(pos, ch),
                LexingState::ReadingWord => self.handle_word(pos, ch),
                LexingState::ReadingQuote(quote) => self.handle_quote(quote, ch),
            }
        }
    }

    fn handle_start(&mut self, pos: usize, ch: char) {
        if ch.is_whitespace() {
            return;
        }
        self.word_start = pos;
        self.state = LexingState::ReadingWord;
        self.handle_word(pos, ch);
    }

    fn handle_word(&mut self, pos: usize, ch: char) {
        match ch {
            c if c.is_whitespace() => self.finish_word(pos),
            '\\' => self.take_escaped(),
            c if QUOTES.contains(&c) => {
                self.quoted = true;
                self.state = LexingState::ReadingQuote(c);
            }
            c => self.buffer.push(c),
        }
    }

    fn handle_quote(&mut self, quote: char, ch: char) {
        match ch {
            '\\' => self.take_escaped(),
            c if c == quote => self.state = LexingState::ReadingWord,
            c => self.buffer.push(c),
        }
    }

    /// A trailing lone backslash escapes nothing and is dropped.
    fn take_escaped(&mut self) {
        if let Some((_, next)) = self.chars.next() {
            self.buffer.push(next);
        }
    }

    fn finish_word(&mut self, end: usize) {
        self.tokens.push(Token {
            text: std::mem::take(&mut self.buffer),
            quoted: std::mem::take(&mut self.quoted),
        });
        self.spans.push(self.word_start..end);
        self.state = LexingState::Start;
    }

    /// Closes a word left open at the end of input, including an unterminated quote.
    fn finish(mut self) -> (Vec<Token>, Vec<Range<usize>>, LexingState) {
        let state = self.state;
        if state != LexingState::Start {
            self.finish_word(self.input.len());
        }
        (self.tokens, self.spans, state)
    }
}

/// Split a line into words.
///
/// Never fails: malformed quoting is closed at the end of the line.
pub fn split_into_tokens(line: &str) -> Vec<Token> {
    let mut lexer = LexingFSM::new(line);
    lexer.run();
    lexer.finish().0
}

/// Describe the word that ends at the end of `line`.
///
/// When the line is empty or ends in unescaped whitespace, the result is an
/// empty word starting at the end of the line.
pub fn trailing_word(line: &str) -> TrailingWord {
    let mut lexer = LexingFSM::new(line);
    lexer.run();
    let (mut tokens, mut spans, state) = lexer.finish();
    match state {
        LexingState::Start => TrailingWord {
            span: line.len()..line.len(),
            index: tokens.len(),
            text: String::new(),
            open_quote: None,
        },
        LexingState::ReadingWord | LexingState::ReadingQuote(_) => {
            let token = tokens.pop().unwrap_or_else(|| Token::new("", false));
            let span = spans.pop().unwrap_or(0..line.len());
            TrailingWord {
                span,
                index: tokens.len(),
                text: token.text,
                open_quote: match state {
                    LexingState::ReadingQuote(q) => Some(q),
                    _ => None,
                },
            }
        }
    }
}
