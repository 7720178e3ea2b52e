//! ffmpeg/ffprobe helpers for fetched artifacts.

use crate::error::{RecapError, Result};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// One slice of a longer recording.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub path: PathBuf,
    /// Start of the slice within the source, in seconds.
    pub offset_seconds: f64,
}

/// Run an ffmpeg-family tool and return its output, whatever the exit code.
async fn run_tool<I, S>(tool: &str, args: I) -> Result<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    Command::new(tool)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => RecapError::ToolNotFound(tool.to_string()),
            _ => RecapError::Media(format!("{tool} could not be started: {e}")),
        })
}

fn stderr_tail(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let lines: Vec<&str> = stderr.lines().rev().take(3).collect();
    lines.into_iter().rev().collect::<Vec<_>>().join(" | ")
}

/// Re-encode `source` into the container implied by `dest`'s extension.
pub async fn transcode_audio(source: &Path, dest: &Path) -> Result<()> {
    debug!("Transcoding {:?} -> {:?}", source, dest);

    let out = run_tool(
        "ffmpeg",
        [
            OsStr::new("-loglevel"),
            OsStr::new("error"),
            OsStr::new("-y"),
            OsStr::new("-i"),
            source.as_os_str(),
            OsStr::new("-vn"),
            OsStr::new("-qscale:a"),
            OsStr::new("2"),
            dest.as_os_str(),
        ],
    )
    .await?;

    if out.status.success() {
        Ok(())
    } else {
        Err(RecapError::Media(format!("transcode failed: {}", stderr_tail(&out))))
    }
}

/// Start offset and length of every slice of a `total`-second recording.
fn plan_segments(total: f64, chunk: f64) -> Vec<(f64, f64)> {
    if chunk <= 0.0 || total <= chunk {
        return vec![(0.0, total)];
    }

    let count = (total / chunk).ceil() as usize;
    (0..count)
        .map(|i| {
            let start = i as f64 * chunk;
            (start, chunk.min(total - start))
        })
        .filter(|(_, len)| *len > 0.0)
        .collect()
}

/// Cut `source` into slices of at most `chunk_seconds` inside `output_dir`.
///
/// Audio that already fits returns the source itself as the only segment.
#[instrument(skip_all, fields(source = %source.display()))]
pub async fn split_audio(source: &Path, output_dir: &Path, chunk_seconds: u32) -> Result<Vec<Segment>> {
    let total = probe_duration(source).await?;
    let plan = plan_segments(total, chunk_seconds as f64);

    if plan.len() == 1 {
        return Ok(vec![Segment {
            path: source.to_path_buf(),
            offset_seconds: 0.0,
        }]);
    }

    tokio::fs::create_dir_all(output_dir).await?;
    let ext = source.extension().and_then(OsStr::to_str).unwrap_or("mp3");

    let mut segments = Vec::with_capacity(plan.len());
    for (idx, (start, len)) in plan.into_iter().enumerate() {
        let path = output_dir.join(format!("part-{idx:03}.{ext}"));
        cut_segment(source, &path, start, len).await?;
        segments.push(Segment {
            path,
            offset_seconds: start,
        });
    }

    info!(total_seconds = total, segments = segments.len(), "Split audio");
    Ok(segments)
}

/// Cut one slice, stream-copying when the container allows it.
async fn cut_segment(source: &Path, dest: &Path, start: f64, len: f64) -> Result<()> {
    let start = format!("{start:.3}");
    let len = format!("{len:.3}");
    let base = [
        OsStr::new("-loglevel"),
        OsStr::new("error"),
        OsStr::new("-y"),
        OsStr::new("-ss"),
        OsStr::new(&start),
        OsStr::new("-i"),
        source.as_os_str(),
        OsStr::new("-t"),
        OsStr::new(&len),
    ];

    let copy = run_tool(
        "ffmpeg",
        base.iter()
            .copied()
            .chain([OsStr::new("-c"), OsStr::new("copy"), dest.as_os_str()]),
    )
    .await?;
    if copy.status.success() && dest.exists() {
        return Ok(());
    }

    warn!("Stream copy of {:?} failed, re-encoding", dest.file_name());
    let encoded = run_tool(
        "ffmpeg",
        base.iter()
            .copied()
            .chain([OsStr::new("-qscale:a"), OsStr::new("2"), dest.as_os_str()]),
    )
    .await?;

    if encoded.status.success() {
        Ok(())
    } else {
        Err(RecapError::Media(format!(
            "cutting {:?} failed: {}",
            dest.file_name(),
            stderr_tail(&encoded)
        )))
    }
}

/// Duration of a media file in seconds, as reported by ffprobe.
pub async fn probe_duration(path: &Path) -> Result<f64> {
    let out = run_tool(
        "ffprobe",
        [
            OsStr::new("-v"),
            OsStr::new("quiet"),
            OsStr::new("-print_format"),
            OsStr::new("json"),
            OsStr::new("-show_format"),
            path.as_os_str(),
        ],
    )
    .await?;

    if !out.status.success() {
        return Err(RecapError::Media(format!(
            "ffprobe rejected {:?}",
            path.file_name()
        )));
    }

    parse_ffprobe_duration(&String::from_utf8_lossy(&out.stdout))
}

fn parse_ffprobe_duration(json_str: &str) -> Result<f64> {
    let parsed: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| RecapError::Media(format!("unreadable ffprobe output: {e}")))?;

    parsed
        .pointer("/format/duration")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| RecapError::Media("ffprobe reported no duration".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ffprobe_duration() {
        let json = r#"{"format": {"filename": "a.mp3", "duration": "1234.567000"}}"#;
        let duration = parse_ffprobe_duration(json).unwrap();
        assert!((duration - 1234.567).abs() < 0.001);
    }

    #[test]
    fn test_parse_ffprobe_duration_missing() {
        assert!(parse_ffprobe_duration(r#"{"format": {}}"#).is_err());
        assert!(parse_ffprobe_duration(r#"{"format": {"duration": "N/A"}}"#).is_err());
        assert!(parse_ffprobe_duration("not json").is_err());
    }

    #[test]
    fn test_plan_segments_short_audio_is_one_piece() {
        assert_eq!(plan_segments(300.0, 600.0), vec![(0.0, 300.0)]);
        assert_eq!(plan_segments(600.0, 600.0), vec![(0.0, 600.0)]);
    }

    #[test]
    fn test_plan_segments_last_piece_is_remainder() {
        let plan = plan_segments(1500.0, 600.0);
        assert_eq!(plan, vec![(0.0, 600.0), (600.0, 600.0), (1200.0, 300.0)]);
    }
}
