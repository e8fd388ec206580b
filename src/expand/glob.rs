//! Pathname Expansion
//!
//! Walks a pattern component by component against a `GlobFs`, so tests
//! run on an in-memory tree and the default implementation reads the
//! real filesystem. Dotfiles only match components that spell out the
//! leading dot. The caller decides the no-match policy (keep the literal
//! pattern, or drop the field in nullglob style).

use crate::errors::GlobError;
use crate::expand::pattern;

#[derive(Debug, Clone, PartialEq)]
pub struct GlobEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Directory access needed by pathname expansion.
pub trait GlobFs {
    fn list_dir(&self, path: &str) -> Result<Vec<GlobEntry>, GlobError>;
    fn exists(&self, path: &str) -> bool;
    fn is_dir(&self, path: &str) -> bool;
}

/// The real filesystem.
pub struct StdFs;

impl GlobFs for StdFs {
    fn list_dir(&self, path: &str) -> Result<Vec<GlobEntry>, GlobError> {
        let read = std::fs::read_dir(path).map_err(|e| GlobError::UnreadableDir {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        let mut entries = Vec::new();
        for entry in read.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            entries.push(GlobEntry { name, is_dir });
        }
        Ok(entries)
    }

    fn exists(&self, path: &str) -> bool {
        std::path::Path::new(path).exists()
    }

    fn is_dir(&self, path: &str) -> bool {
        std::path::Path::new(path).is_dir()
    }
}

/// An in-memory tree for tests: built from absolute-style path lists.
#[derive(Debug, Default)]
pub struct MemFs {
    paths: Vec<String>,
}

impl MemFs {
    pub fn new(paths: &[&str]) -> Self {
        Self {
            paths: paths.iter().map(|p| p.trim_matches('/').to_string()).collect(),
        }
    }
}

impl GlobFs for MemFs {
    fn list_dir(&self, path: &str) -> Result<Vec<GlobEntry>, GlobError> {
        let prefix = normalize(path);
        let mut out: Vec<GlobEntry> = Vec::new();
        for p in &self.paths {
            let rest = if prefix.is_empty() {
                p.as_str()
            } else if let Some(rest) = p.strip_prefix(&format!("{}/", prefix)) {
                rest
            } else {
                continue;
            };
            let (name, is_dir) = match rest.split_once('/') {
                Some((first, _)) => (first, true),
                None => (rest, false),
            };
            if name.is_empty() {
                continue;
            }
            if !out.iter().any(|e| e.name == name) {
                out.push(GlobEntry {
                    name: name.to_string(),
                    is_dir,
                });
            }
        }
        Ok(out)
    }

    fn exists(&self, path: &str) -> bool {
        let p = normalize(path);
        self.paths
            .iter()
            .any(|q| *q == p || q.starts_with(&format!("{}/", p)))
    }

    fn is_dir(&self, path: &str) -> bool {
        let p = normalize(path);
        self.paths.iter().any(|q| q.starts_with(&format!("{}/", p)))
    }
}

fn normalize(path: &str) -> String {
    path.trim_matches('/').trim_start_matches("./").to_string()
}

/// Expand one field against the filesystem. Returns `None` when the
/// field has no unquoted glob characters; otherwise the sorted matches
/// (possibly empty). `strict` turns unreadable directories into errors.
pub fn expand_glob(
    field: &str,
    fs: &dyn GlobFs,
    strict: bool,
) -> Result<Option<Vec<String>>, GlobError> {
    if !pattern::has_unquoted_glob(field) {
        return Ok(None);
    }
    let absolute = field.starts_with('/');
    let comps: Vec<&str> = field.split('/').filter(|c| !c.is_empty()).collect();
    let mut paths: Vec<String> = vec![if absolute { "/".into() } else { String::new() }];
    for (i, comp) in comps.iter().enumerate() {
        let last = i + 1 == comps.len();
        let mut next: Vec<String> = Vec::new();
        if pattern::has_unquoted_glob(comp) {
            for base in &paths {
                let dir = if base.is_empty() { "." } else { base.as_str() };
                let entries = match fs.list_dir(dir) {
                    Ok(entries) => entries,
                    Err(e) if strict => return Err(e),
                    Err(_) => continue,
                };
                let mut names: Vec<GlobEntry> = entries
                    .into_iter()
                    .filter(|e| {
                        (comp.starts_with('.') || !e.name.starts_with('.'))
                            && pattern::matches_full(comp, &e.name)
                    })
                    .collect();
                names.sort_by(|a, b| a.name.cmp(&b.name));
                for entry in names {
                    if last || entry.is_dir {
                        next.push(join(base, &entry.name));
                    }
                }
            }
        } else {
            let lit = pattern::unescape(comp);
            for base in &paths {
                let candidate = join(base, &lit);
                let keep = if last {
                    fs.exists(&candidate)
                } else {
                    fs.is_dir(&candidate)
                };
                if keep {
                    next.push(candidate);
                }
            }
        }
        paths = next;
        if paths.is_empty() {
            break;
        }
    }
    paths.sort();
    Ok(Some(paths))
}

fn join(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else if base == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", base, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fs() -> MemFs {
        MemFs::new(&[
            "src/main.rs",
            "src/lib.rs",
            "src/util/helpers.rs",
            "README.md",
            "notes.txt",
            ".hidden",
        ])
    }

    #[test]
    fn test_star_in_directory() {
        let matches = expand_glob("src/*.rs", &fs(), false).unwrap().unwrap();
        assert_eq!(matches, vec!["src/lib.rs", "src/main.rs"]);
    }

    #[test]
    fn test_question_mark() {
        let matches = expand_glob("notes.tx?", &fs(), false).unwrap().unwrap();
        assert_eq!(matches, vec!["notes.txt"]);
    }

    #[test]
    fn test_hidden_files_need_explicit_dot() {
        let matches = expand_glob("*", &fs(), false).unwrap().unwrap();
        assert!(!matches.contains(&".hidden".to_string()));
        let matches = expand_glob(".h*", &fs(), false).unwrap().unwrap();
        assert_eq!(matches, vec![".hidden"]);
    }

    #[test]
    fn test_no_glob_chars_passes_through() {
        assert_eq!(expand_glob("plain.txt", &fs(), false).unwrap(), None);
        // Escaped glob chars are not globs.
        assert_eq!(expand_glob("a\\*b", &fs(), false).unwrap(), None);
    }

    #[test]
    fn test_no_match_is_empty() {
        let matches = expand_glob("*.nope", &fs(), false).unwrap().unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_nested_star_components() {
        let matches = expand_glob("src/*/*.rs", &fs(), false).unwrap().unwrap();
        assert_eq!(matches, vec!["src/util/helpers.rs"]);
    }
}
