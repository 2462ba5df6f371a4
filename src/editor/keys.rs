//! Decoding of raw terminal bytes into keys.
//!
//! An explicit state machine: ground -> escape -> CSI -> parameters, with
//! SS3 (`ESC O`) for keypad-mode cursor keys and a small UTF-8 assembler.
//! Recognised sequences live in the terminator tables below.

/// A decoded key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Tab,
    Backspace,
    Delete,
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
    PageUp,
    PageDown,
    Escape,
    /// Control chord, lowercase letter (`Ctrl('a')` for 0x01).
    Ctrl(char),
    /// Start of a bracketed paste (`ESC [200~`).
    PasteStart,
    /// End of a bracketed paste (`ESC [201~`).
    PasteEnd,
}

/// CSI and SS3 sequences identified by their final byte alone.
const FINAL_BYTE_KEYS: &[(u8, Key)] = &[
    (b'A', Key::Up),
    (b'B', Key::Down),
    (b'C', Key::Right),
    (b'D', Key::Left),
    (b'H', Key::Home),
    (b'F', Key::End),
];

/// `ESC [ <n> ~` sequences, by their first numeric parameter.
const TILDE_KEYS: &[(u16, Key)] = &[
    (1, Key::Home),
    (3, Key::Delete),
    (4, Key::End),
    (5, Key::PageUp),
    (6, Key::PageDown),
    (7, Key::Home),
    (8, Key::End),
    (200, Key::PasteStart),
    (201, Key::PasteEnd),
];

/// Longest parameter string accepted before a sequence is abandoned.
const MAX_PARAMS: usize = 16;

const ESC: u8 = 0x1b;

#[derive(Debug, Clone, PartialEq, Eq)]
enum DecodeState {
    Ground,
    Escape,
    Csi,
    Ss3,
    Utf8 { buf: [u8; 4], len: usize, need: usize },
}

#[derive(Debug, Clone)]
pub struct KeyDecoder {
    state: DecodeState,
    params: Vec<u8>,
}

impl Default for KeyDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyDecoder {
    pub fn new() -> Self {
        Self {
            state: DecodeState::Ground,
            params: Vec::new(),
        }
    }

    /// Whether a bare `ESC` is waiting for the rest of a sequence.
    pub fn awaiting_sequence(&self) -> bool {
        self.state == DecodeState::Escape
    }

    /// Resolve a pending `ESC` once no continuation arrived in time.
    pub fn flush(&mut self) -> Option<Key> {
        let was_escape = self.awaiting_sequence();
        self.reset();
        was_escape.then_some(Key::Escape)
    }

    /// Feed one byte; returns a key when a sequence completes.
    pub fn feed(&mut self, byte: u8) -> Option<Key> {
        match self.state.clone() {
            DecodeState::Ground => self.ground(byte),
            DecodeState::Escape => self.escape(byte),
            DecodeState::Csi => self.csi(byte),
            DecodeState::Ss3 => {
                self.reset();
                lookup_final(byte)
            }
            DecodeState::Utf8 { buf, len, need } => self.utf8(buf, len, need, byte),
        }
    }

    fn reset(&mut self) {
        self.state = DecodeState::Ground;
        self.params.clear();
    }

    fn ground(&mut self, byte: u8) -> Option<Key> {
        match byte {
            ESC => {
                self.state = DecodeState::Escape;
                None
            }
            b'\r' | b'\n' => Some(Key::Enter),
            b'\t' => Some(Key::Tab),
            0x7f | 0x08 => Some(Key::Backspace),
            0x01..=0x1a => Some(Key::Ctrl((b'a' + byte - 1) as char)),
            0x00..=0x1f => None,
            0x20..=0x7e => Some(Key::Char(byte as char)),
            _ => {
                let need = utf8_len(byte)?;
                let mut buf = [0; 4];
                buf[0] = byte;
                self.state = DecodeState::Utf8 { buf, len: 1, need };
                None
            }
        }
    }

    fn escape(&mut self, byte: u8) -> Option<Key> {
        match byte {
            b'[' => {
                self.state = DecodeState::Csi;
                self.params.clear();
                None
            }
            b'O' => {
                self.state = DecodeState::Ss3;
                None
            }
            // ESC ESC: report the first, keep waiting on the second.
            ESC => Some(Key::Escape),
            _ => {
                // Alt chords are not bound to anything.
                self.reset();
                None
            }
        }
    }

    fn csi(&mut self, byte: u8) -> Option<Key> {
        match byte {
            0x30..=0x3f => {
                self.params.push(byte);
                if self.params.len() > MAX_PARAMS {
                    self.reset();
                }
                None
            }
            0x20..=0x2f => None,
            0x40..=0x7e => {
                let key = if byte == b'~' {
                    first_param(&self.params).and_then(lookup_tilde)
                } else {
                    lookup_final(byte)
                };
                self.reset();
                key
            }
            _ => {
                self.reset();
                None
            }
        }
    }

    fn utf8(&mut self, mut buf: [u8; 4], len: usize, need: usize, byte: u8) -> Option<Key> {
        if byte & 0xc0 != 0x80 {
            // Broken sequence: drop it and start over with this byte.
            self.reset();
            return self.feed(byte);
        }
        buf[len] = byte;
        if len + 1 < need {
            self.state = DecodeState::Utf8 {
                buf,
                len: len + 1,
                need,
            };
            return None;
        }
        self.reset();
        std::str::from_utf8(&buf[..need])
            .ok()
            .and_then(|s| s.chars().next())
            .map(Key::Char)
    }
}

fn utf8_len(lead: u8) -> Option<usize> {
    match lead {
        0xc2..=0xdf => Some(2),
        0xe0..=0xef => Some(3),
        0xf0..=0xf4 => Some(4),
        _ => None,
    }
}

fn first_param(params: &[u8]) -> Option<u16> {
    let text = std::str::from_utf8(params).ok()?;
    text.split(';').next()?.parse().ok()
}

fn lookup_final(byte: u8) -> Option<Key> {
    FINAL_BYTE_KEYS
        .iter()
        .find(|(b, _)| *b == byte)
        .map(|(_, key)| *key)
}

fn lookup_tilde(code: u16) -> Option<Key> {
    TILDE_KEYS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, key)| *key)
}
