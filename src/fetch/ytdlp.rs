//! yt-dlp backed fetcher.

use super::{ArtifactHandle, FetchError, Fetcher};
use crate::config::FetchSettings;
use crate::error::RecapError;
use crate::media;
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// File stem of the artifact inside a workspace.
const ARTIFACT_STEM: &str = "media";

/// Downloads audio with yt-dlp and normalizes it with ffmpeg.
pub struct YtDlpFetcher {
    audio_format: String,
    audio_quality: String,
    classifier: StderrClassifier,
}

impl YtDlpFetcher {
    pub fn new(settings: &FetchSettings) -> Self {
        Self {
            audio_format: settings.audio_format.clone(),
            audio_quality: settings.audio_quality.clone(),
            classifier: StderrClassifier::new(),
        }
    }

    fn target_path(&self, workspace: &Path) -> PathBuf {
        workspace.join(format!("{}.{}", ARTIFACT_STEM, self.audio_format))
    }
}

impl Default for YtDlpFetcher {
    fn default() -> Self {
        Self::new(&FetchSettings::default())
    }
}

#[async_trait]
impl Fetcher for YtDlpFetcher {
    #[instrument(skip(self, workspace), fields(url = %source_url))]
    async fn fetch(
        &self,
        source_url: &str,
        workspace: &Path,
    ) -> Result<ArtifactHandle, FetchError> {
        let url = validate_reference(source_url)?;

        std::fs::create_dir_all(workspace)
            .map_err(|e| FetchError::Network(format!("cannot create workspace: {e}")))?;

        let target = self.target_path(workspace);
        if let Ok(meta) = std::fs::metadata(&target) {
            if meta.len() > 0 {
                info!("Using previously fetched artifact");
                return Ok(ArtifactHandle {
                    path: target,
                    size_bytes: meta.len(),
                });
            }
        }

        info!("Downloading audio");

        let template = workspace.join(format!("{}.%(ext)s", ARTIFACT_STEM));

        let result = Command::new("yt-dlp")
            .arg("--extract-audio")
            .arg("--audio-format").arg(&self.audio_format)
            .arg("--audio-quality").arg(&self.audio_quality)
            .arg("--output").arg(&template)
            .arg("--no-playlist")
            .arg("--quiet")
            .arg("--no-warnings")
            .arg(url.as_str())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await;

        let output = match result {
            Ok(o) => o,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FetchError::Extraction(
                    RecapError::ToolNotFound("yt-dlp".into()).to_string(),
                ));
            }
            Err(e) => {
                return Err(FetchError::Extraction(format!("yt-dlp execution failed: {e}")));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.classifier.classify(&stderr));
        }

        let downloaded = find_artifact(workspace)?;

        if downloaded != target {
            media::transcode_audio(&downloaded, &target)
                .await
                .map_err(|e| FetchError::Extraction(e.to_string()))?;
            if let Err(e) = std::fs::remove_file(&downloaded) {
                warn!("Failed to remove intermediate download: {}", e);
            }
        }

        let handle = ArtifactHandle::from_path(target)
            .map_err(|e| FetchError::Network(format!("cannot stat artifact: {e}")))?;
        debug!("Fetched {} bytes to {:?}", handle.size_bytes, handle.path);

        Ok(handle)
    }
}

/// Accepts absolute http(s) URLs with a host.
fn validate_reference(source_url: &str) -> Result<Url, FetchError> {
    let url = Url::parse(source_url.trim())
        .map_err(|e| FetchError::InvalidReference(format!("{source_url}: {e}")))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(FetchError::InvalidReference(format!(
                "unsupported scheme '{other}'"
            )))
        }
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(FetchError::InvalidReference(format!("{source_url}: missing host")));
    }

    Ok(url)
}

/// Locates the file yt-dlp produced in the workspace.
fn find_artifact(workspace: &Path) -> Result<PathBuf, FetchError> {
    for ext in &["mp3", "opus", "m4a", "webm", "ogg", "wav"] {
        let candidate = workspace.join(format!("{}.{}", ARTIFACT_STEM, ext));
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    let entries = std::fs::read_dir(workspace)
        .map_err(|e| FetchError::Network(format!("cannot read workspace: {e}")))?;

    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(ARTIFACT_STEM) && !name.ends_with(".part") {
            return Ok(entry.path());
        }
    }

    Err(FetchError::Extraction("audio file not found after download".into()))
}

/// Maps yt-dlp error output onto fetch error kinds.
struct StderrClassifier {
    invalid: Regex,
    unavailable: Regex,
    network: Regex,
}

impl StderrClassifier {
    fn new() -> Self {
        Self {
            invalid: Regex::new(r"(?i)(unsupported url|is not a valid url|invalid url)")
                .expect("Invalid regex"),
            unavailable: Regex::new(
                r"(?ix)
                video\ unavailable
                | private\ video
                | has\ been\ removed
                | members[-\ ]only
                | account\ .*\ terminated
                | not\ available\ in\ your\ country
                | sign\ in\ to\ confirm\ your\ age
                | http\ error\ 40[34]
                | http\ error\ 410
                ",
            )
            .expect("Invalid regex"),
            network: Regex::new(
                r"(?ix)
                timed\ out
                | connection\ (reset|refused|aborted)
                | temporary\ failure\ in\ name\ resolution
                | name\ or\ service\ not\ known
                | network\ is\ unreachable
                | http\ error\ (429|5\d\d)
                | incompleteread
                | unable\ to\ download
                ",
            )
            .expect("Invalid regex"),
        }
    }

    fn classify(&self, stderr: &str) -> FetchError {
        let message = stderr.trim().to_string();

        if self.invalid.is_match(stderr) {
            FetchError::InvalidReference(message)
        } else if self.unavailable.is_match(stderr) {
            FetchError::Unavailable(message)
        } else if self.network.is_match(stderr) {
            FetchError::Network(message)
        } else {
            FetchError::Extraction(message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_reference() {
        assert!(validate_reference("https://www.youtube.com/watch?v=dQw4w9WgXcQ").is_ok());
        assert!(validate_reference("http://example.com/a.mp3").is_ok());

        assert!(matches!(
            validate_reference("not a url"),
            Err(FetchError::InvalidReference(_))
        ));
        assert!(matches!(
            validate_reference("file:///etc/passwd"),
            Err(FetchError::InvalidReference(_))
        ));
        assert!(matches!(
            validate_reference("ftp://example.com/a.mp3"),
            Err(FetchError::InvalidReference(_))
        ));
    }

    #[test]
    fn test_classify_stderr() {
        let classifier = StderrClassifier::new();

        assert!(matches!(
            classifier.classify("ERROR: Unsupported URL: https://example.com/"),
            FetchError::InvalidReference(_)
        ));
        assert!(matches!(
            classifier.classify("ERROR: [youtube] abc: Private video. Sign in if you've been granted access"),
            FetchError::Unavailable(_)
        ));
        assert!(matches!(
            classifier.classify("ERROR: [youtube] abc: Video unavailable. This video has been removed by the uploader"),
            FetchError::Unavailable(_)
        ));
        assert!(matches!(
            classifier.classify("ERROR: Unable to download webpage: <urlopen error [Errno -3] Temporary failure in name resolution>"),
            FetchError::Network(_)
        ));
        assert!(matches!(
            classifier.classify("ERROR: unable to download video data: HTTP Error 503: Service Unavailable"),
            FetchError::Network(_)
        ));
        assert!(matches!(
            classifier.classify("ERROR: something nobody has seen before"),
            FetchError::Extraction(_)
        ));
    }

    #[test]
    fn test_find_artifact_skips_partial_downloads() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("media.webm.part"), b"partial").unwrap();
        assert!(find_artifact(dir.path()).is_err());

        std::fs::write(dir.path().join("media.opus"), b"audio").unwrap();
        assert_eq!(find_artifact(dir.path()).unwrap(), dir.path().join("media.opus"));
    }

    #[tokio::test]
    async fn test_reuses_existing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("media.mp3"), b"ID3 audio").unwrap();

        let fetcher = YtDlpFetcher::default();
        let handle = fetcher
            .fetch("https://example.com/watch?v=1", dir.path())
            .await
            .unwrap();

        assert_eq!(handle.path, dir.path().join("media.mp3"));
        assert_eq!(handle.size_bytes, 9);
    }

    #[tokio::test]
    async fn test_invalid_reference_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = dir.path().join("item");

        let err = YtDlpFetcher::default()
            .fetch("mailto:someone@example.com", &workspace)
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::InvalidReference(_)));
        assert!(!workspace.exists());
    }
}
