//! Tab completion of command names and file names.

use std::fs;
use std::ops::Range;
use std::path::Path;

use crate::lexer::TrailingWord;

/// Where a set of matches came from. File names need quoting or escaping
/// when inserted; command names are inserted as they are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSource {
    Commands,
    Files,
}

/// State kept while repeated Tab presses cycle through one word's matches.
#[derive(Debug, Clone)]
pub struct CompletionState {
    /// Byte range in the edit buffer holding the currently inserted match.
    pub range: Range<usize>,
    pub matches: Vec<String>,
    pub index: usize,
    pub source: MatchSource,
    pub quote: Option<char>,
}

impl CompletionState {
    /// Advance to the next match; returns the text to put in `range`.
    pub fn advance(&mut self) -> String {
        self.index = (self.index + 1) % self.matches.len();
        render(&self.matches[self.index], self.source, self.quote, false)
    }
}

/// Collect matches for `word`.
///
/// The first word tries `commands` first and falls back to file names when
/// no command matches; every other word completes file names.
pub fn candidates(word: &TrailingWord, commands: &[String], cwd: &Path) -> (Vec<String>, MatchSource) {
    if word.index == 0 {
        let names: Vec<String> = commands
            .iter()
            .filter(|c| c.starts_with(&word.text))
            .cloned()
            .collect();
        if !names.is_empty() {
            return (names, MatchSource::Commands);
        }
    }
    (file_matches(&word.text, cwd), MatchSource::Files)
}

/// File names in the directory part of `prefix` that start with its last
/// component, spelled with the directory part. Directories get a trailing `/`.
pub fn file_matches(prefix: &str, cwd: &Path) -> Vec<String> {
    let (dir_part, stem) = match prefix.rfind('/') {
        Some(i) => (&prefix[..=i], &prefix[i + 1..]),
        None => ("", prefix),
    };
    let dir = if dir_part.is_empty() {
        cwd.to_path_buf()
    } else if dir_part.starts_with('/') {
        Path::new(dir_part).to_path_buf()
    } else {
        cwd.join(dir_part)
    };

    let Ok(entries) = fs::read_dir(&dir) else {
        return Vec::new();
    };
    let mut matches: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter_map(|entry| {
            let name = entry.file_name().into_string().ok()?;
            if !name.starts_with(stem) || (name.starts_with('.') && !stem.starts_with('.')) {
                return None;
            }
            let is_dir = entry.path().is_dir();
            Some(format!("{dir_part}{name}{}", if is_dir { "/" } else { "" }))
        })
        .collect();
    matches.sort();
    matches
}

/// Text that replaces the word being completed.
///
/// `complete` marks the only match: the quote is closed and a separating
/// space added, unless the match is a directory the user will descend into.
pub fn render(candidate: &str, source: MatchSource, quote: Option<char>, complete: bool) -> String {
    let is_dir = candidate.ends_with('/');
    let mut out = String::with_capacity(candidate.len() + 3);
    match (source, quote) {
        (MatchSource::Commands, _) => out.push_str(candidate),
        (MatchSource::Files, Some(q)) => {
            out.push(q);
            for c in candidate.chars() {
                if c == q || c == '\\' {
                    out.push('\\');
                }
                out.push(c);
            }
        }
        (MatchSource::Files, None) => {
            for c in candidate.chars() {
                if needs_escape(c) {
                    out.push('\\');
                }
                out.push(c);
            }
        }
    }
    if complete && !(source == MatchSource::Files && is_dir) {
        if let (MatchSource::Files, Some(q)) = (source, quote) {
            out.push(q);
        }
        out.push(' ');
    }
    out
}

fn needs_escape(c: char) -> bool {
    c.is_whitespace() || matches!(c, '"' | '\'' | '\\' | '*' | '?' | '[')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::trailing_word;
    use std::fs::File;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        for name in ["my file.txt", "main.rs", "makefile", ".secret"] {
            File::create(dir.path().join(name)).unwrap();
        }
        fs::create_dir(dir.path().join("media")).unwrap();
        File::create(dir.path().join("media/song.ogg")).unwrap();
        dir
    }

    fn commands() -> Vec<String> {
        vec!["calc".into(), "cd".into(), "chess".into(), "history".into()]
    }

    #[test]
    fn first_word_prefers_commands() {
        let dir = fixture();
        let (m, source) = candidates(&trailing_word("c"), &commands(), dir.path());
        assert_eq!(source, MatchSource::Commands);
        assert_eq!(m, vec!["calc", "cd", "chess"]);
    }

    #[test]
    fn first_word_falls_back_to_files() {
        let dir = fixture();
        let (m, source) = candidates(&trailing_word("ma"), &commands(), dir.path());
        assert_eq!(source, MatchSource::Files);
        assert_eq!(m, vec!["main.rs", "makefile"]);
    }

    #[test]
    fn later_words_complete_files_only() {
        let dir = fixture();
        let (m, source) = candidates(&trailing_word("cat c"), &commands(), dir.path());
        assert_eq!(source, MatchSource::Files);
        assert!(m.is_empty());
    }

    #[test]
    fn directories_get_slash_and_nested_paths_work() {
        let dir = fixture();
        assert_eq!(file_matches("me", dir.path()), vec!["media/"]);
        assert_eq!(file_matches("media/s", dir.path()), vec!["media/song.ogg"]);
    }

    #[test]
    fn hidden_files_need_a_dot() {
        let dir = fixture();
        assert!(!file_matches("", dir.path()).contains(&".secret".to_string()));
        assert_eq!(file_matches(".s", dir.path()), vec![".secret"]);
    }

    #[test]
    fn unquoted_file_names_are_escaped() {
        assert_eq!(
            render("my file.txt", MatchSource::Files, None, true),
            "my\\ file.txt "
        );
    }

    #[test]
    fn quoted_file_names_close_the_quote() {
        assert_eq!(
            render("my file.txt", MatchSource::Files, Some('"'), true),
            "\"my file.txt\" "
        );
        assert_eq!(
            render("it's", MatchSource::Files, Some('\''), false),
            "'it\\'s"
        );
    }

    #[test]
    fn directories_stay_open() {
        assert_eq!(render("media/", MatchSource::Files, None, true), "media/");
        assert_eq!(render("calc", MatchSource::Commands, None, true), "calc ");
    }

    #[test]
    fn cycling_wraps_around() {
        let mut state = CompletionState {
            range: 0..2,
            matches: vec!["cd".into(), "chess".into()],
            index: 0,
            source: MatchSource::Commands,
            quote: None,
        };
        assert_eq!(state.advance(), "chess");
        assert_eq!(state.advance(), "cd");
    }
}
