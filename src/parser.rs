//! Classification of words into a command name, flags and parameters.
//!
//! A word that starts with `-` and is longer than one character opens a flag,
//! and the word right after it is taken as that flag's value no matter what
//! it looks like. There is no way to declare a valueless flag; commands
//! launched by the shell rely on this pairing, so it is kept as is.

use std::path::Path;

use crate::lexer::Token;
use crate::wildcard;

/// Marker that opens a flag word.
pub const FLAG_MARKER: char = '-';

/// A flag word and the word that followed it, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flag {
    pub name: String,
    pub value: Option<String>,
}

impl Flag {
    pub fn new(name: impl Into<String>, value: Option<&str>) -> Self {
        Self {
            name: name.into(),
            value: value.map(str::to_string),
        }
    }
}

/// A classified input line, built fresh for every submitted line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub name: String,
    /// Flags in input order.
    pub flags: Vec<Flag>,
    /// Positional parameters after wildcard expansion.
    pub parameters: Vec<String>,
    /// The realtime override word was present on the line.
    pub realtime: bool,
}

impl ParsedCommand {
    /// Arguments for the child process (without `argv[0]`): all flags with
    /// their values first, then all parameters.
    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.flags.len() * 2 + self.parameters.len());
        for flag in &self.flags {
            args.push(flag.name.clone());
            if let Some(value) = &flag.value {
                args.push(value.clone());
            }
        }
        args.extend(self.parameters.iter().cloned());
        args
    }
}

/// Rules that depend on the session rather than on the line itself.
#[derive(Debug, Clone, Copy)]
pub struct ClassifyRules<'a> {
    /// Commands whose parameters are never wildcard-expanded.
    pub glob_bypass: &'a [String],
    /// Word that requests realtime mode; removed wherever it appears.
    pub realtime_flag: &'a str,
    /// Directory relative wildcards are expanded from.
    pub cwd: &'a Path,
}

/// Build a [`ParsedCommand`] from lexed words. Returns `None` for a blank line.
pub fn classify(tokens: Vec<Token>, rules: &ClassifyRules<'_>) -> Option<ParsedCommand> {
    let mut words = tokens.into_iter();
    let name = words.next()?.text;

    let mut realtime = false;
    let rest: Vec<Token> = words
        .filter(|t| {
            let is_override =
                !t.quoted && !rules.realtime_flag.is_empty() && t.text == rules.realtime_flag;
            realtime |= is_override;
            !is_override
        })
        .collect();

    let expand = !rules.glob_bypass.iter().any(|c| *c == name);
    let mut flags = Vec::new();
    let mut parameters = Vec::new();

    let mut rest = rest.into_iter();
    while let Some(token) = rest.next() {
        if is_flag(&token) {
            let value = rest.next().map(|v| v.text);
            flags.push(Flag {
                name: token.text,
                value,
            });
        } else if expand && !token.quoted && wildcard::has_wildcards(&token.text) {
            let matches = wildcard::expand(&token.text, rules.cwd);
            if matches.is_empty() {
                parameters.push(token.text);
            } else {
                parameters.extend(matches);
            }
        } else {
            parameters.push(token.text);
        }
    }

    Some(ParsedCommand {
        name,
        flags,
        parameters,
        realtime,
    })
}

fn is_flag(token: &Token) -> bool {
    token.text.starts_with(FLAG_MARKER) && token.text.chars().count() > 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::split_into_tokens;
    use std::fs::File;
    use tempfile::TempDir;

    fn parse_in(line: &str, cwd: &Path, bypass: &[String]) -> ParsedCommand {
        let rules = ClassifyRules {
            glob_bypass: bypass,
            realtime_flag: "--realtime",
            cwd,
        };
        classify(split_into_tokens(line), &rules).unwrap()
    }

    fn c_files() -> TempDir {
        let dir = TempDir::new().unwrap();
        for name in ["a.c", "b.c", "notes.md"] {
            File::create(dir.path().join(name)).unwrap();
        }
        dir
    }

    #[test]
    fn blank_line_is_none() {
        let rules = ClassifyRules {
            glob_bypass: &[],
            realtime_flag: "--realtime",
            cwd: Path::new("."),
        };
        assert_eq!(classify(split_into_tokens("   "), &rules), None);
    }

    #[test]
    fn flags_precede_parameters_in_args() {
        let dir = c_files();
        let cmd = parse_in("tool one -x 1 two -y 2 three", dir.path(), &[]);
        assert_eq!(cmd.name, "tool");
        assert_eq!(cmd.flags, vec![Flag::new("-x", Some("1")), Flag::new("-y", Some("2"))]);
        assert_eq!(cmd.parameters, vec!["one", "two", "three"]);
        assert_eq!(
            cmd.args(),
            vec!["-x", "1", "-y", "2", "one", "two", "three"]
        );
    }

    // Flags always swallow the next word, even another flag. Commands depend on this.
    #[test]
    fn flag_consumes_next_word_unconditionally() {
        let dir = c_files();
        let cmd = parse_in("ls -l -a *.c", dir.path(), &[]);
        assert_eq!(cmd.flags, vec![Flag::new("-l", Some("-a"))]);
        assert_eq!(cmd.parameters, vec!["a.c", "b.c"]);

        let cmd = parse_in("ls -l *.c", dir.path(), &[]);
        assert_eq!(cmd.flags, vec![Flag::new("-l", Some("*.c"))]);
        assert!(cmd.parameters.is_empty());
    }

    // `"my file.txt"` becomes the value of `-l`; whether `-l` should be
    // valueless is an unresolved design question.
    #[test]
    fn quoted_word_after_flag_is_its_value() {
        let dir = c_files();
        let cmd = parse_in(r#"ls -l "my file.txt" *.c"#, dir.path(), &[]);
        assert_eq!(cmd.name, "ls");
        assert_eq!(cmd.flags, vec![Flag::new("-l", Some("my file.txt"))]);
        assert_eq!(cmd.parameters, vec!["a.c", "b.c"]);
    }

    #[test]
    fn trailing_flag_has_no_value() {
        let dir = c_files();
        let cmd = parse_in("grep pattern -v", dir.path(), &[]);
        assert_eq!(cmd.flags, vec![Flag::new("-v", None)]);
        assert_eq!(cmd.args(), vec!["-v", "pattern"]);
    }

    #[test]
    fn single_dash_is_a_parameter() {
        let dir = c_files();
        let cmd = parse_in("cat - x", dir.path(), &[]);
        assert!(cmd.flags.is_empty());
        assert_eq!(cmd.parameters, vec!["-", "x"]);
    }

    #[test]
    fn quoted_words_are_never_split_or_expanded() {
        let dir = c_files();
        let cmd = parse_in(r#"view "my file.txt" "*.c""#, dir.path(), &[]);
        assert_eq!(cmd.parameters, vec!["my file.txt", "*.c"]);
    }

    #[test]
    fn unmatched_wildcard_stays_literal() {
        let dir = c_files();
        let cmd = parse_in("view *.rs", dir.path(), &[]);
        assert_eq!(cmd.parameters, vec!["*.rs"]);
    }

    #[test]
    fn bypass_list_suppresses_expansion() {
        let dir = c_files();
        let bypass = vec!["find".to_string()];
        let cmd = parse_in("find *.c", dir.path(), &bypass);
        assert_eq!(cmd.parameters, vec!["*.c"]);
    }

    #[test]
    fn realtime_word_is_removed_anywhere() {
        let dir = c_files();
        let cmd = parse_in("monitor -n --realtime 5 host", dir.path(), &[]);
        assert!(cmd.realtime);
        assert_eq!(cmd.flags, vec![Flag::new("-n", Some("5"))]);
        assert_eq!(cmd.parameters, vec!["host"]);

        let quoted = parse_in(r#"echo "--realtime""#, dir.path(), &[]);
        assert!(!quoted.realtime);
        assert_eq!(quoted.parameters, vec!["--realtime"]);
    }

    #[test]
    fn arg_count_matches_words_after_expansion() {
        let dir = c_files();
        let cmd = parse_in("t -a 1 *.c -b x *.md", dir.path(), &[]);
        // 4 flag words, `*.c` -> 2 files, `*.md` -> 1 file
        assert_eq!(cmd.args().len(), 4 + 2 + 1);
        let first_param = cmd.args().iter().position(|a| a == "a.c").unwrap();
        assert!(cmd.args()[..first_param].iter().all(|a| !a.ends_with(".c")));
    }
}
