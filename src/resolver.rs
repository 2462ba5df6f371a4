use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Finds shell commands under fixed subdirectories of the install directory.
///
/// Subdirectories are probed in order, so a command in an earlier one
/// shadows a same-named command in a later one.
#[derive(Debug, Clone)]
pub struct CommandResolver {
    base: PathBuf,
    subdirs: Vec<String>,
}

impl CommandResolver {
    pub fn new(base: impl Into<PathBuf>, subdirs: &[String]) -> Self {
        Self {
            base: base.into(),
            subdirs: subdirs.to_vec(),
        }
    }

    /// Resolve a command name to the canonical path of an executable.
    ///
    /// Returns `None` when no subdirectory holds an executable of that name,
    /// and for names that are not a single plain path component.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        if !is_plain_name(name) {
            return None;
        }
        self.subdirs
            .iter()
            .map(|dir| self.base.join(dir).join(name))
            .find(|candidate| is_executable(candidate))
            .and_then(|found| fs::canonicalize(found).ok())
    }

    /// Names of all executables in the command subdirectories, sorted and deduplicated.
    pub fn command_names(&self) -> Vec<String> {
        let mut names = BTreeSet::new();
        for dir in &self.subdirs {
            let Ok(entries) = fs::read_dir(self.base.join(dir)) else {
                continue;
            };
            for entry in entries.filter_map(|e| e.ok()) {
                if is_executable(&entry.path()) {
                    if let Ok(name) = entry.file_name().into_string() {
                        names.insert(name);
                    }
                }
            }
        }
        names.into_iter().collect()
    }
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains('/')
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
