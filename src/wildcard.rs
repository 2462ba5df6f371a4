//! Filesystem wildcard expansion (`*`, `?`, `[...]`).
//!
//! Patterns are matched one path component at a time. Each component is
//! translated to an anchored regular expression; entries starting with `.`
//! only match components that themselves start with `.`.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

/// Whether `word` contains any wildcard metacharacter.
pub fn has_wildcards(word: &str) -> bool {
    word.contains(['*', '?', '['])
}

/// Expand `pattern` against the filesystem, relative paths resolved from `cwd`.
///
/// Returns the matches sorted, spelled the way the pattern spells its
/// prefix. An empty result means nothing matched; the caller decides what
/// to do with the literal.
pub fn expand(pattern: &str, cwd: &Path) -> Vec<String> {
    if pattern.is_empty() {
        return Vec::new();
    }

    let (mut candidates, rest) = match pattern.strip_prefix('/') {
        Some(rest) => (vec![(String::from("/"), PathBuf::from("/"))], rest),
        None => (vec![(String::new(), cwd.to_path_buf())], pattern),
    };

    let components: Vec<&str> = rest.split('/').collect();
    let last = components.len() - 1;

    for (i, component) in components.iter().enumerate() {
        let is_last = i == last;
        if component.is_empty() {
            if is_last {
                // Pattern ends in `/`: keep directories only.
                candidates.retain(|(_, path)| path.is_dir());
            }
            continue;
        }

        let mut next = Vec::new();
        if has_wildcards(component) {
            let Some(re) = component_regex(component) else {
                return Vec::new();
            };
            let show_hidden = component.starts_with('.');
            for (shown, path) in &candidates {
                for name in matching_entries(path, &re, show_hidden) {
                    next.push((format!("{shown}{name}"), path.join(&name)));
                }
            }
        } else {
            for (shown, path) in &candidates {
                next.push((format!("{shown}{component}"), path.join(component)));
            }
        }

        if !is_last {
            next.retain(|(_, path)| path.is_dir());
            for (shown, _) in &mut next {
                shown.push('/');
            }
        }
        candidates = next;
    }

    let mut matches: Vec<String> = candidates
        .into_iter()
        .filter(|(_, path)| fs::symlink_metadata(path).is_ok())
        .map(|(shown, _)| shown)
        .collect();
    matches.sort();
    matches
}

fn matching_entries(dir: &Path, re: &Regex, show_hidden: bool) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| show_hidden || !name.starts_with('.'))
        .filter(|name| re.is_match(name))
        .collect()
}

/// Translate one glob component into an anchored regex.
fn component_regex(component: &str) -> Option<Regex> {
    let mut out = String::from("^");
    let chars: Vec<char> = component.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    out.push_str(&translate_class(&chars[i + 1..end]));
                    i = end;
                }
                None => out.push_str(r"\["),
            },
            c => out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
        i += 1;
    }
    out.push('$');
    Regex::new(&out).ok()
}

/// Index of the `]` closing the class opened at `open`. A `]` right after the
/// opening (or after `!`/`^`) is a literal member.
fn class_end(chars: &[char], open: usize) -> Option<usize> {
    let mut i = open + 1;
    if matches!(chars.get(i), Some('!') | Some('^')) {
        i += 1;
    }
    if chars.get(i) == Some(&']') {
        i += 1;
    }
    (i..chars.len()).find(|&j| chars[j] == ']')
}

fn translate_class(members: &[char]) -> String {
    let mut out = String::from("[");
    let mut rest = members;
    if let Some((first, tail)) = rest.split_first() {
        if *first == '!' || *first == '^' {
            out.push('^');
            rest = tail;
        }
    }
    for (i, c) in rest.iter().enumerate() {
        let is_range = *c == '-' && i > 0 && i + 1 < rest.len();
        if is_range || c.is_alphanumeric() {
            out.push(*c);
        } else {
            out.push('\\');
            out.push(*c);
        }
    }
    out.push(']');
    out
}
