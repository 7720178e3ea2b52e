//! OpenAI Whisper transcription implementation.

use super::{TranscribeError, Transcriber, TranscriptOutput};
use crate::config::TranscriptionSettings;
use crate::fetch::ArtifactHandle;
use crate::media::split_audio;
use crate::openai::create_client;
use async_openai::types::{AudioInput, AudioResponseFormat, CreateTranscriptionRequestArgs};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::path::Path;
use tracing::{debug, info, instrument};

/// One transcribed slice of the artifact.
#[derive(Debug, Clone)]
struct ChunkText {
    text: String,
    language: Option<String>,
    duration_seconds: f64,
}

/// OpenAI Whisper-based transcriber.
pub struct WhisperTranscriber {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    language: Option<String>,
    chunk_duration_seconds: u32,
    max_concurrent_chunks: usize,
}

impl WhisperTranscriber {
    /// Create a transcriber from configuration.
    pub fn new(settings: &TranscriptionSettings) -> crate::error::Result<Self> {
        Ok(Self {
            client: create_client()?,
            model: settings.model.clone(),
            language: settings.language.clone(),
            chunk_duration_seconds: settings.chunk_duration_seconds.max(1),
            max_concurrent_chunks: settings.max_concurrent_chunks.max(1),
        })
    }

    /// Transcribe a single audio file (no splitting).
    #[instrument(skip(self), fields(audio_path = %audio_path.display()))]
    async fn transcribe_single(&self, audio_path: &Path) -> Result<ChunkText, TranscribeError> {
        debug!("Transcribing audio file");

        let file_bytes = tokio::fs::read(audio_path).await.map_err(|e| {
            TranscribeError::ProcessingFailure(format!("cannot read {}: {e}", audio_path.display()))
        })?;

        let mut request_builder = CreateTranscriptionRequestArgs::default();
        request_builder
            .file(AudioInput::from_vec_u8(
                audio_path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("audio.mp3")
                    .to_string(),
                file_bytes,
            ))
            .model(&self.model)
            .response_format(AudioResponseFormat::VerboseJson);

        if let Some(lang) = &self.language {
            request_builder.language(lang);
        }

        let request = request_builder.build().map_err(|e| {
            TranscribeError::ProcessingFailure(format!("failed to build request: {e}"))
        })?;

        let response = self
            .client
            .audio()
            .transcribe_verbose_json(request)
            .await
            .map_err(|e| TranscribeError::ProcessingFailure(format!("Whisper API error: {e}")))?;

        let language = Some(response.language.trim().to_string()).filter(|l| !l.is_empty());

        Ok(ChunkText {
            text: response.text.trim().to_string(),
            language,
            duration_seconds: response.duration as f64,
        })
    }

    /// Transcribe an audio file, splitting if necessary.
    #[instrument(skip(self), fields(audio_path = %audio_path.display()))]
    async fn transcribe_with_splitting(
        &self,
        audio_path: &Path,
    ) -> Result<TranscriptOutput, TranscribeError> {
        let temp_dir = tempfile::tempdir().map_err(|e| {
            TranscribeError::ProcessingFailure(format!("cannot create temp dir: {e}"))
        })?;
        let chunks = split_audio(audio_path, temp_dir.path(), self.chunk_duration_seconds)
            .await
            .map_err(|e| TranscribeError::ProcessingFailure(e.to_string()))?;

        if chunks.len() == 1 {
            let chunk = self.transcribe_single(audio_path).await?;
            return Ok(stitch_chunks(vec![(0, chunk)]));
        }

        info!("Processing {} audio chunks with {}", chunks.len(), self.model);

        let mut results: Vec<(usize, ChunkText)> = Vec::with_capacity(chunks.len());

        // Fail fast: the first failing chunk aborts the whole artifact
        let mut stream = stream::iter(chunks.into_iter().enumerate())
            .map(|(idx, segment)| async move {
                let result = self.transcribe_single(&segment.path).await;
                (idx, segment.offset_seconds, result)
            })
            .buffer_unordered(self.max_concurrent_chunks);

        while let Some((idx, time_offset, result)) = stream.next().await {
            match result {
                Ok(chunk) => results.push((idx, chunk)),
                Err(e) => {
                    return Err(TranscribeError::ProcessingFailure(format!(
                        "chunk {} at {:.0}s failed: {}",
                        idx, time_offset, e
                    )));
                }
            }
        }

        Ok(stitch_chunks(results))
    }
}

/// Joins chunk texts in index order.
fn stitch_chunks(mut chunks: Vec<(usize, ChunkText)>) -> TranscriptOutput {
    chunks.sort_by_key(|(idx, _)| *idx);

    let language = chunks.iter().find_map(|(_, c)| c.language.clone());
    let duration_seconds = chunks.iter().map(|(_, c)| c.duration_seconds).sum();
    let text = chunks
        .into_iter()
        .map(|(_, c)| c.text)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    TranscriptOutput {
        text,
        language,
        duration_seconds,
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(
        &self,
        artifact: &ArtifactHandle,
    ) -> Result<TranscriptOutput, TranscribeError> {
        let output = self.transcribe_with_splitting(&artifact.path).await?;

        if output.text.trim().is_empty() {
            return Err(TranscribeError::ProcessingFailure(
                "transcription returned no text".into(),
            ));
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str, language: Option<&str>, duration: f64) -> ChunkText {
        ChunkText {
            text: text.to_string(),
            language: language.map(str::to_string),
            duration_seconds: duration,
        }
    }

    #[test]
    fn test_stitch_chunks_orders_by_index() {
        let output = stitch_chunks(vec![
            (2, chunk("three", Some("en"), 30.0)),
            (0, chunk("one", None, 600.0)),
            (1, chunk("two", Some("en"), 600.0)),
        ]);

        assert_eq!(output.text, "one two three");
        assert_eq!(output.language.as_deref(), Some("en"));
        assert!((output.duration_seconds - 1230.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_stitch_chunks_skips_silent_chunks() {
        let output = stitch_chunks(vec![
            (0, chunk("hello", None, 10.0)),
            (1, chunk("", None, 10.0)),
            (2, chunk("world", None, 10.0)),
        ]);

        assert_eq!(output.text, "hello world");
        assert_eq!(output.language, None);
    }
}
