//! File discovery: deterministic sorted walk, allow-list by suffix,
//! deny-list by substring match against the relative path.

use std::path::{Path, PathBuf};

/// Strips glob wildcard characters from a deny pattern, leaving a plain
/// substring to match against the relative path. Deny patterns are
/// substring matches, not glob matches.
fn to_substring(pattern: &str) -> String {
    pattern.chars().filter(|c| !matches!(c, '*' | '?')).collect()
}

pub fn discover(root: &Path, allow_suffixes: &[String], deny_patterns: &[String]) -> Vec<PathBuf> {
    let deny_substrings: Vec<String> = deny_patterns.iter().map(|p| to_substring(p)).collect();

    let mut found: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|entry| entry.path().strip_prefix(root).ok().map(PathBuf::from))
        .filter(|rel| {
            let rel_str = rel.to_string_lossy().replace('\\', "/");
            let allowed = allow_suffixes.iter().any(|suffix| rel_str.ends_with(suffix.as_str()));
            let denied = deny_substrings.iter().any(|s| !s.is_empty() && rel_str.contains(s.as_str()));
            allowed && !denied
        })
        .collect();

    found.sort();
    found
}
