//! FFprobe wrapper module
//!
//! Reads container duration, the first video stream's geometry and native
//! frame rate, and whether an audio stream is present.

use std::path::Path;
use std::process::Command;
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FFprobeError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),
    #[error("FFprobe failed: {0}")]
    ExecutionFailed(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FFprobeResult {
    pub format_name: String,
    /// Seconds; 0.0 when the container does not report one
    pub duration: f64,
    pub size: u64,
    pub video_codec: String,
    pub width: u32,
    pub height: u32,
    /// Native frame rate, `None` when ffprobe reports `0/0`
    pub frame_rate: Option<f64>,
    pub has_audio: bool,
    pub audio_codec: Option<String>,
}

pub fn probe_video(ffprobe: &Path, path: &Path) -> Result<FFprobeResult, FFprobeError> {
    if !path.exists() {
        return Err(FFprobeError::ExecutionFailed(format!(
            "File not found: {}",
            path.display()
        )));
    }

    if !path.is_file() {
        return Err(FFprobeError::ExecutionFailed(format!(
            "Not a file (is it a directory?): {}",
            path.display()
        )));
    }

    let args = [
        "-v",
        "error",
        "-print_format",
        "json",
        "-show_format",
        "-show_streams",
    ];

    let started = Instant::now();
    let output = Command::new(ffprobe)
        .args(args)
        .arg("--")
        .arg(path)
        .output()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                FFprobeError::ToolNotFound(format!("{} (install ffmpeg)", ffprobe.display()))
            }
            _ => FFprobeError::IoError(e),
        })?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    let mut logged_args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    logged_args.push(path.display().to_string());
    crate::logging::log_external_tool(
        "ffprobe",
        &logged_args,
        &stderr,
        output.status.code(),
        started.elapsed(),
    );

    if !output.status.success() {
        let error_msg = if stderr.trim().is_empty() {
            format!(
                "ffprobe failed to analyze file: {} (exit code: {:?})",
                path.display(),
                output.status.code()
            )
        } else {
            format!("ffprobe error for '{}': {}", path.display(), stderr.trim())
        };
        return Err(FFprobeError::ExecutionFailed(error_msg));
    }

    parse_probe_json(&String::from_utf8_lossy(&output.stdout))
}

/// Parse the `-print_format json -show_format -show_streams` document.
pub fn parse_probe_json(json_str: &str) -> Result<FFprobeResult, FFprobeError> {
    let json: serde_json::Value =
        serde_json::from_str(json_str).map_err(|e| FFprobeError::ParseError(e.to_string()))?;

    let format = &json["format"];
    let format_name = format["format_name"]
        .as_str()
        .unwrap_or("unknown")
        .to_string();
    let duration = format["duration"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .unwrap_or(0.0);
    let size = format["size"]
        .as_str()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    let streams = json["streams"]
        .as_array()
        .ok_or_else(|| FFprobeError::ParseError("No streams found".to_string()))?;

    let video_stream = streams
        .iter()
        .find(|s| s["codec_type"].as_str() == Some("video"))
        .ok_or_else(|| FFprobeError::ParseError("No video stream found".to_string()))?;

    let video_codec = video_stream["codec_name"]
        .as_str()
        .unwrap_or("unknown")
        .to_string();
    let width = video_stream["width"].as_u64().unwrap_or(0) as u32;
    let height = video_stream["height"].as_u64().unwrap_or(0) as u32;

    let frame_rate = video_stream["avg_frame_rate"]
        .as_str()
        .and_then(parse_frame_rate)
        .or_else(|| video_stream["r_frame_rate"].as_str().and_then(parse_frame_rate));

    let audio_stream = streams
        .iter()
        .find(|s| s["codec_type"].as_str() == Some("audio"));
    let audio_codec = audio_stream
        .and_then(|s| s["codec_name"].as_str())
        .map(|s| s.to_string());

    Ok(FFprobeResult {
        format_name,
        duration,
        size,
        video_codec,
        width,
        height,
        frame_rate,
        has_audio: audio_stream.is_some(),
        audio_codec,
    })
}

/// Parse `30000/1001`, `25/1` or `29.97`. Zero, negative and malformed rates are `None`.
pub fn parse_frame_rate(s: &str) -> Option<f64> {
    let rate = match s.split_once('/') {
        Some((num, den)) => {
            let num = num.trim().parse::<f64>().ok()?;
            let den = den.trim().parse::<f64>().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => s.trim().parse::<f64>().ok()?,
    };

    (rate.is_finite() && rate > 0.0).then_some(rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "streams": [
            {"codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080,
             "avg_frame_rate": "30000/1001", "r_frame_rate": "30000/1001"},
            {"codec_type": "audio", "codec_name": "aac"}
        ],
        "format": {"format_name": "mov,mp4,m4a,3gp,3g2,mj2", "duration": "12.345000", "size": "1048576"}
    }"#;

    #[test]
    fn test_parse_probe_json() {
        let r = parse_probe_json(SAMPLE).unwrap();
        assert_eq!(r.video_codec, "h264");
        assert_eq!((r.width, r.height), (1920, 1080));
        assert!((r.duration - 12.345).abs() < 1e-9);
        assert_eq!(r.size, 1_048_576);
        assert!((r.frame_rate.unwrap() - 29.97).abs() < 0.01);
        assert!(r.has_audio);
        assert_eq!(r.audio_codec.as_deref(), Some("aac"));
    }

    #[test]
    fn test_parse_probe_json_without_audio_or_duration() {
        let json = r#"{"streams":[{"codec_type":"video","width":640,"height":480,
            "avg_frame_rate":"0/0","r_frame_rate":"25/1"}],"format":{}}"#;
        let r = parse_probe_json(json).unwrap();
        assert_eq!(r.duration, 0.0);
        assert!(!r.has_audio);
        assert_eq!(r.frame_rate, Some(25.0));
        assert_eq!(r.format_name, "unknown");
    }

    #[test]
    fn test_parse_probe_json_rejects_audio_only() {
        let json = r#"{"streams":[{"codec_type":"audio"}],"format":{"duration":"3.0"}}"#;
        assert!(matches!(
            parse_probe_json(json),
            Err(FFprobeError::ParseError(_))
        ));
        assert!(matches!(
            parse_probe_json("not json"),
            Err(FFprobeError::ParseError(_))
        ));
    }

    #[test]
    fn test_parse_frame_rate() {
        let cases: &[(&str, f64, f64)] = &[
            ("30/1", 30.0, 0.001),
            ("24/1", 24.0, 0.001),
            ("30000/1001", 30000.0 / 1001.0, 0.0001),
            ("24000/1001", 24000.0 / 1001.0, 0.0001),
            ("24", 24.0, 0.001),
            ("29.97", 29.97, 0.01),
            ("120/1", 120.0, 0.001),
        ];

        for (input, expected, tolerance) in cases {
            let result = parse_frame_rate(input).unwrap();
            assert!(
                (result - expected).abs() < *tolerance,
                "parse_frame_rate({:?}): expected {}, got {}",
                input,
                expected,
                result
            );
        }
    }

    #[test]
    fn test_parse_frame_rate_edge_cases() {
        assert_eq!(parse_frame_rate("30/0"), None);
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("invalid"), None);
        assert_eq!(parse_frame_rate(""), None);
        assert_eq!(parse_frame_rate("30/1/extra"), None);
        assert_eq!(parse_frame_rate("-5"), None);
    }

    #[test]
    fn test_probe_missing_file() {
        let r = probe_video(Path::new("ffprobe"), Path::new("/nonexistent/clip.mp4"));
        assert!(matches!(r, Err(FFprobeError::ExecutionFailed(_))));
    }
}
