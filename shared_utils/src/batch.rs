//! Batch input collection
//!
//! Expands directory inputs into the video files they contain and holds the
//! advisory extension allow-list.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Usual video container extensions. Advisory only: other files are still
/// accepted, with a warning.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "webm", "flv"];

pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

pub fn is_video_file(path: &Path) -> bool {
    has_extension(path, VIDEO_EXTENSIONS)
}

/// Files under `dir` with one of `extensions`, sorted by path for a stable
/// submission order.
pub fn collect_files(dir: &Path, extensions: &[&str], recursive: bool) -> Vec<PathBuf> {
    let walker = if recursive {
        WalkDir::new(dir).follow_links(true)
    } else {
        WalkDir::new(dir).max_depth(1)
    };

    let mut files: Vec<PathBuf> = walker
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| has_extension(e.path(), extensions))
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();
    files
}

/// Expand the user's inputs in order: files pass through untouched, directories
/// are replaced by their video files.
pub fn expand_inputs(inputs: &[PathBuf], recursive: bool) -> Vec<PathBuf> {
    inputs
        .iter()
        .flat_map(|input| {
            if input.is_dir() {
                collect_files(input, VIDEO_EXTENSIONS, recursive)
            } else {
                vec![input.clone()]
            }
        })
        .collect()
}
