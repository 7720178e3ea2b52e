//! Metadata probing for item intake.

use crate::error::{RecapError, Result};
use serde_json::Value;

/// Metadata yt-dlp reports for a URL without downloading it.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbedMedia {
    pub title: String,
    pub duration_seconds: Option<u32>,
    pub channel: Option<String>,
}

/// Fetch metadata for `url` using `yt-dlp --dump-json`.
pub async fn probe_metadata(url: &str) -> Result<ProbedMedia> {
    let output = tokio::process::Command::new("yt-dlp")
        .args([
            "--dump-json",
            "--no-download",
            "--no-warnings",
            "--no-playlist",
            url,
        ])
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RecapError::ToolNotFound("yt-dlp".to_string())
            } else {
                RecapError::Probe(format!("Failed to run yt-dlp: {}", e))
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(RecapError::Probe(format!(
            "{} not found or unavailable: {}",
            url,
            stderr.trim()
        )));
    }

    let json: Value = serde_json::from_slice(&output.stdout)
        .map_err(|e| RecapError::Probe(format!("Failed to parse yt-dlp output: {}", e)))?;

    Ok(parse_probe(&json))
}

fn parse_probe(json: &Value) -> ProbedMedia {
    let title = json["title"]
        .as_str()
        .unwrap_or("Unknown Title")
        .to_string();

    let channel = json["channel"]
        .as_str()
        .or_else(|| json["uploader"].as_str())
        .map(|s| s.to_string());

    ProbedMedia {
        title,
        duration_seconds: json["duration"].as_f64().map(|d| d.round() as u32),
        channel,
    }
}
