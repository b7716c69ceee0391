//! Shared utility functions

use std::path::{Path, PathBuf};

/// Calculate Levenshtein edit distance between two strings.
/// Uses O(min(m,n)) space with two-row optimization.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let m = a_chars.len();
    let n = b_chars.len();

    if m == 0 {
        return n;
    }
    if n == 0 {
        return m;
    }

    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr: Vec<usize> = vec![0; n + 1];

    for i in 1..=m {
        curr[0] = i;
        for j in 1..=n {
            let cost = if a_chars[i - 1] == b_chars[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}

/// Find the most similar name from a list of candidates.
/// Returns `Some(suggestion)` if a match is found within the threshold.
pub fn find_similar_name<'a>(
    name: &str,
    candidates: &[&'a str],
    threshold: usize,
) -> Option<&'a str> {
    let mut best_match: Option<&str> = None;
    let mut best_distance = usize::MAX;

    for &candidate in candidates {
        let distance = levenshtein_distance(name, candidate);
        if distance < best_distance && distance <= threshold {
            best_distance = distance;
            best_match = Some(candidate);
        }
    }

    best_match
}

/// Recursively collect every `.mp` file under `root`.
fn collect_scripts(root: &Path, out: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(_) => return,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_scripts(&path, out);
        } else if path.extension().map(|e| e == "mp").unwrap_or(false) {
            out.push(path);
        }
    }
}

/// Suggest up to 5 candidate paths for a missing import, searching the
/// workspace for scripts with a matching or similar file name.
pub fn suggest_import_candidates(workspace_root: &Path, rel_path: &Path) -> Vec<String> {
    let target_name = match rel_path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name.to_string(),
        None => return Vec::new(),
    };

    let mut scripts = Vec::new();
    collect_scripts(workspace_root, &mut scripts);

    let display = |p: &PathBuf| -> String {
        p.strip_prefix(workspace_root)
            .unwrap_or(p)
            .display()
            .to_string()
    };

    // First pass: exact file-name matches
    let exact: Vec<String> = scripts
        .iter()
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n == target_name)
                .unwrap_or(false)
        })
        .map(display)
        .collect();
    if !exact.is_empty() {
        return exact.into_iter().take(5).collect();
    }

    // Second pass: fuzzy matches on file names
    let mut scored: Vec<(usize, String)> = scripts
        .iter()
        .filter_map(|p| {
            let name = p.file_name()?.to_str()?;
            let distance = levenshtein_distance(&target_name, name);
            // scale the threshold with name length, floor of 2
            let threshold = (target_name.len() / 3).max(2);
            if distance <= threshold {
                Some((distance, display(p)))
            } else {
                None
            }
        })
        .collect();
    scored.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    scored.into_iter().take(5).map(|(_, p)| p).collect()
}
