//! `#include` resolution.
//!
//! Includes are inlined textually before macro expansion so that included
//! fragments see the caller's defines when the engine runs.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum IncludeError {
    #[error("Badly formed #include directive in '{file}' at line {line}: {directive}")]
    BadDirective {
        file: String,
        line: usize,
        directive: String,
    },
    #[error("Included file '{path}' not found (from '{file}' line {line})")]
    NotFound {
        path: String,
        file: String,
        line: usize,
    },
    #[error("Include cycle: {}", chain.join(" -> "))]
    Cycle { chain: Vec<String> },
}

/// Source of shader text, looked up by name.
pub trait SourceProvider {
    /// Read `name`, trying the directory of `relative_to` before any search paths.
    /// Returns the canonical name of the file that was found together with its text.
    fn read(&self, name: &str, relative_to: &str) -> Option<(String, String)>;
}

/// Reads shader text from disk through an ordered list of search paths.
#[derive(Debug, Clone, Default)]
pub struct FileSystemSources {
    search_paths: Vec<PathBuf>,
}

impl FileSystemSources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search_paths<P: AsRef<Path>>(paths: impl IntoIterator<Item = P>) -> Self {
        Self {
            search_paths: paths.into_iter().map(|p| p.as_ref().to_path_buf()).collect(),
        }
    }

    pub fn add_search_path<P: AsRef<Path>>(&mut self, path: P) {
        self.search_paths.push(path.as_ref().to_path_buf());
    }

    fn candidates(&self, name: &str, relative_to: &str) -> Vec<PathBuf> {
        let mut candidates = Vec::with_capacity(self.search_paths.len() + 2);
        if let Some(parent) = Path::new(relative_to).parent() {
            candidates.push(parent.join(name));
        }
        candidates.push(PathBuf::from(name));
        candidates.extend(self.search_paths.iter().map(|base| base.join(name)));
        candidates
    }
}

impl SourceProvider for FileSystemSources {
    fn read(&self, name: &str, relative_to: &str) -> Option<(String, String)> {
        for candidate in self.candidates(name, relative_to) {
            match fs::read_to_string(&candidate) {
                Ok(text) => return Some((candidate.to_string_lossy().into_owned(), text)),
                Err(e) => trace!("{}: {}", candidate.display(), e),
            }
        }
        None
    }
}

/// In-memory sources keyed by name. Lookups ignore `relative_to`.
#[derive(Debug, Clone, Default)]
pub struct MemorySources {
    files: HashMap<String, String>,
}

impl MemorySources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, text: impl Into<String>) -> &mut Self {
        self.files.insert(name.into(), text.into());
        self
    }

    pub fn with(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(name, text);
        self
    }
}

impl SourceProvider for MemorySources {
    fn read(&self, name: &str, _relative_to: &str) -> Option<(String, String)> {
        self.files
            .get(name)
            .map(|text| (name.to_string(), text.clone()))
    }
}

/// Replace every `#include "file"` / `#include <file>` line of `source` with the
/// resolved contents of that file, recursively.
///
/// Each inlined file is bracketed by `#line` directives so that diagnostics
/// refer to the line numbers of the file they came from.
#[tracing::instrument(level = "debug", skip_all, fields(file = %filename))]
pub fn resolve_includes(
    source: &str,
    filename: &str,
    provider: &dyn SourceProvider,
) -> Result<String, IncludeError> {
    let mut stack = vec![filename.to_string()];
    resolve_recursive(source, filename, provider, &mut stack)
}

fn resolve_recursive(
    source: &str,
    filename: &str,
    provider: &dyn SourceProvider,
    stack: &mut Vec<String>,
) -> Result<String, IncludeError> {
    if !source.contains('#') {
        return Ok(source.to_string());
    }

    let mut output = String::with_capacity(source.len());
    let line_count = source.lines().count();

    for (idx, line) in source.lines().enumerate() {
        let line_number = idx + 1;
        let Some(target) = include_target(line, filename, line_number)? else {
            output.push_str(line);
            if line_number < line_count || source.ends_with('\n') {
                output.push('\n');
            }
            continue;
        };

        let (resolved_name, text) =
            provider
                .read(target, filename)
                .ok_or_else(|| IncludeError::NotFound {
                    path: target.to_string(),
                    file: filename.to_string(),
                    line: line_number,
                })?;

        if stack.contains(&resolved_name) {
            let mut chain = stack.clone();
            chain.push(resolved_name);
            return Err(IncludeError::Cycle { chain });
        }

        debug!("Including '{}' at {}:{}", resolved_name, filename, line_number);
        stack.push(resolved_name.clone());
        let inlined = resolve_recursive(&text, &resolved_name, provider, stack)?;
        stack.pop();

        output.push_str("#line 1\n");
        output.push_str(&inlined);
        if !inlined.ends_with('\n') {
            output.push('\n');
        }
        output.push_str(&format!("#line {}\n", line_number + 1));
    }

    Ok(output)
}

/// Returns the file named by an `#include` line, `None` for any other line.
fn include_target<'a>(
    line: &'a str,
    filename: &str,
    line_number: usize,
) -> Result<Option<&'a str>, IncludeError> {
    let Some(rest) = line.trim_start().strip_prefix('#') else {
        return Ok(None);
    };
    let Some(rest) = rest.trim_start().strip_prefix("include") else {
        return Ok(None);
    };

    let bad = || IncludeError::BadDirective {
        file: filename.to_string(),
        line: line_number,
        directive: line.trim().to_string(),
    };

    let rest = rest.trim();
    let close = match rest.chars().next() {
        Some('"') => '"',
        Some('<') => '>',
        _ => return Err(bad()),
    };
    let inner = &rest[1..];
    let end = inner.find(close).ok_or_else(bad)?;
    let target = inner[..end].trim();
    if target.is_empty() {
        return Err(bad());
    }
    Ok(Some(target))
}
