//! Save path helpers

use std::path::{Path, PathBuf};

/// Longest file stem kept, in characters
const MAX_STEM_CHARS: usize = 200;

/// Make a video title safe to use as a file name
pub fn sanitize_title(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .take(MAX_STEM_CHARS)
        .collect();

    // Leading dots would hide the file, trailing dots/spaces break Windows
    let trimmed = cleaned
        .trim_start_matches(|c: char| c == '.' || c.is_whitespace())
        .trim_end_matches(|c: char| c == '.' || c.is_whitespace());

    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Directory a query's videos are saved to
pub fn query_dir(save_root: &Path, subdir: Option<&str>) -> PathBuf {
    match subdir.map(str::trim).filter(|s| !s.is_empty()) {
        Some(subdir) => save_root.join(subdir),
        None => save_root.to_path_buf(),
    }
}

/// Full save path for a title inside `dir`
pub fn video_path(dir: &Path, title: &str) -> PathBuf {
    dir.join(format!("{}.mp4", sanitize_title(title)))
}
