//! External tool discovery
//!
//! `VID_BATCH_FFMPEG` / `VID_BATCH_FFPROBE` win; otherwise the binary is looked
//! up on `PATH` with `which`; otherwise the bare program name is returned and
//! the launch failure surfaces where the tool is actually used.

use std::path::PathBuf;

pub const FFMPEG_ENV: &str = "VID_BATCH_FFMPEG";
pub const FFPROBE_ENV: &str = "VID_BATCH_FFPROBE";

fn resolve(env_var: &str, program: &str) -> PathBuf {
    if let Some(path) = std::env::var_os(env_var).filter(|v| !v.is_empty()) {
        return PathBuf::from(path);
    }
    which::which(program).unwrap_or_else(|_| PathBuf::from(program))
}

pub fn ffmpeg_path() -> PathBuf {
    resolve(FFMPEG_ENV, "ffmpeg")
}

pub fn ffprobe_path() -> PathBuf {
    resolve(FFPROBE_ENV, "ffprobe")
}

/// Whether an encoder binary can be found at all.
pub fn is_ffmpeg_available() -> bool {
    let path = ffmpeg_path();
    path.is_file() || which::which(&path).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_falls_back_to_program_name() {
        let p = resolve(
            "VID_BATCH_TEST_UNSET_VARIABLE_XYZ",
            "definitely_not_a_real_tool_xyz",
        );
        assert_eq!(p, PathBuf::from("definitely_not_a_real_tool_xyz"));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_finds_binaries_on_path() {
        let p = resolve("VID_BATCH_TEST_UNSET_VARIABLE_XYZ", "sh");
        assert!(p.is_absolute(), "expected an absolute path, got {:?}", p);
    }
}
