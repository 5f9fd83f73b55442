//! Collision-free output naming: `{stem}_{res}p_{fps}fps.mp4`, then `_1`, `_2`, …
//!
//! The directory is checked at call time; nothing is reserved, so a file
//! created by an outside writer between resolution and encode is not detected.

use crate::params::CONTAINER_EXT;
use crate::settings::{FrameRate, Resolution};
use std::path::{Path, PathBuf};

pub fn base_name(input: &Path, resolution: Resolution, fps: FrameRate) -> String {
    format!("{}.{}", stem_with_settings(input, resolution, fps), CONTAINER_EXT)
}

fn stem_with_settings(input: &Path, resolution: Resolution, fps: FrameRate) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    format!("{}_{}p_{}fps", stem, resolution, fps)
}

/// First candidate under `output_dir` that does not exist yet.
pub fn resolve(input: &Path, output_dir: &Path, resolution: Resolution, fps: FrameRate) -> PathBuf {
    let candidate = output_dir.join(base_name(input, resolution, fps));
    if !candidate.exists() {
        return candidate;
    }

    let stem = stem_with_settings(input, resolution, fps);
    let mut counter: u32 = 1;
    loop {
        let candidate = output_dir.join(format!("{}_{}.{}", stem, counter, CONTAINER_EXT));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_base_name() {
        assert_eq!(
            base_name(Path::new("/videos/clip.mov"), Resolution::P720, FrameRate::Fps24),
            "clip_720p_24fps.mp4"
        );
        assert_eq!(
            base_name(Path::new("my.holiday.avi"), Resolution::P360, FrameRate::Fps30),
            "my.holiday_360p_30fps.mp4"
        );
    }

    #[test]
    fn test_resolve_avoids_existing_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("clip_480p_30fps.mp4"), b"old").unwrap();

        let out = resolve(
            Path::new("/in/clip.mp4"),
            dir.path(),
            Resolution::P480,
            FrameRate::Fps30,
        );
        assert_eq!(out, dir.path().join("clip_480p_30fps_1.mp4"));
    }

    #[test]
    fn test_resolve_is_idempotent_without_writes() {
        let dir = TempDir::new().unwrap();
        let a = resolve(Path::new("a.mp4"), dir.path(), Resolution::P360, FrameRate::Fps30);
        let b = resolve(Path::new("a.mp4"), dir.path(), Resolution::P360, FrameRate::Fps30);
        assert_eq!(a, b);
        assert_eq!(a, dir.path().join("a_360p_30fps.mp4"));
    }

    #[test]
    fn test_resolve_sequence_when_each_result_is_written() {
        let dir = TempDir::new().unwrap();
        let mut produced = Vec::new();
        for _ in 0..4 {
            let p = resolve(Path::new("clip.mkv"), dir.path(), Resolution::P1080, FrameRate::Fps24);
            fs::write(&p, b"x").unwrap();
            produced.push(p.file_name().unwrap().to_string_lossy().to_string());
        }
        assert_eq!(
            produced,
            vec![
                "clip_1080p_24fps.mp4",
                "clip_1080p_24fps_1.mp4",
                "clip_1080p_24fps_2.mp4",
                "clip_1080p_24fps_3.mp4",
            ]
        );
    }

    #[test]
    fn test_resolve_fills_first_gap() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("v_360p_30fps.mp4"), b"x").unwrap();
        fs::write(dir.path().join("v_360p_30fps_1.mp4"), b"x").unwrap();
        fs::write(dir.path().join("v_360p_30fps_3.mp4"), b"x").unwrap();
        let out = resolve(Path::new("v.webm"), dir.path(), Resolution::P360, FrameRate::Fps30);
        assert_eq!(out, dir.path().join("v_360p_30fps_2.mp4"));
    }
}
