//! OpenAI chat-completion summarizer.

use super::{SummarizeError, Summarizer, SummaryContext, SummaryOutput};
use crate::config::{Prompts, SummarizationSettings};
use crate::model::SummaryProvenance;
use crate::openai::create_client;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Summarizer backed by an OpenAI chat model.
pub struct OpenAiSummarizer {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    temperature: f32,
    max_transcript_chars: usize,
    prompts: Prompts,
    retry_hint: Regex,
}

impl OpenAiSummarizer {
    pub fn new(settings: &SummarizationSettings, prompts: Prompts) -> crate::error::Result<Self> {
        Ok(Self {
            client: create_client()?,
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_transcript_chars: settings.max_transcript_chars,
            prompts,
            // "Please try again in 20s" / "in 1.5s" / "in 250ms"
            retry_hint: Regex::new(r"(?i)try again in (\d+(?:\.\d+)?)\s*(ms|s)\b")
                .expect("Invalid regex"),
        })
    }

    fn build_messages(
        &self,
        text: &str,
        context: &SummaryContext,
    ) -> Result<Vec<ChatCompletionRequestMessage>, SummarizeError> {
        let transcript = truncate_chars(text, self.max_transcript_chars);
        if transcript.len() < text.len() {
            warn!(
                "Transcript truncated to {} characters for summarization",
                self.max_transcript_chars
            );
        }

        let mut vars = HashMap::new();
        vars.insert("title".to_string(), context.title.clone());
        vars.insert("source".to_string(), context.source_id.clone());
        vars.insert("url".to_string(), context.external_url.clone());
        vars.insert("transcript".to_string(), transcript.to_string());

        let user_prompt = self
            .prompts
            .render_with_custom(&self.prompts.summary.user, &vars);
        let system_prompt = self
            .prompts
            .render_with_custom(&self.prompts.summary.system, &vars);

        Ok(vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system_prompt)
                .build()
                .map_err(|e| SummarizeError::InvalidResponse(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_prompt)
                .build()
                .map_err(|e| SummarizeError::InvalidResponse(e.to_string()))?
                .into(),
        ])
    }

    fn classify(&self, err: OpenAIError) -> SummarizeError {
        match err {
            OpenAIError::Reqwest(e) => SummarizeError::Upstream {
                status_code: e.status().map(|s| s.as_u16()),
                retry_after: None,
                message: e.to_string(),
            },
            OpenAIError::ApiError(api) => {
                let status_code = infer_status(&api.message, api.r#type.as_deref());
                SummarizeError::Upstream {
                    status_code,
                    retry_after: parse_retry_after(&self.retry_hint, &api.message),
                    message: api.message,
                }
            }
            OpenAIError::JSONDeserialize(e) => SummarizeError::InvalidResponse(e.to_string()),
            other => SummarizeError::Upstream {
                status_code: None,
                retry_after: None,
                message: other.to_string(),
            },
        }
    }
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    #[instrument(skip(self, text), fields(title = %context.title, chars = text.len()))]
    async fn summarize(
        &self,
        text: &str,
        context: &SummaryContext,
    ) -> Result<SummaryOutput, SummarizeError> {
        info!("Summarizing with {}", self.model);

        let messages = self.build_messages(text, context)?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .build()
            .map_err(|e| SummarizeError::InvalidResponse(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| self.classify(e))?;

        let summary_text = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SummarizeError::InvalidResponse("empty response from model".into()))?
            .to_string();

        let provenance = SummaryProvenance {
            model: response.model.clone(),
            prompt_tokens: response.usage.as_ref().map_or(0, |u| u.prompt_tokens),
            completion_tokens: response.usage.as_ref().map_or(0, |u| u.completion_tokens),
        };

        debug!(
            "Summary generated ({} tokens)",
            provenance.total_tokens()
        );

        Ok(SummaryOutput {
            summary_text,
            provenance,
        })
    }
}

/// Best guess at the HTTP status behind an API error body.
fn infer_status(message: &str, error_type: Option<&str>) -> Option<u16> {
    let lower = message.to_lowercase();
    match error_type {
        Some("rate_limit_exceeded") | Some("insufficient_quota") | Some("tokens")
        | Some("requests") => Some(429),
        Some("server_error") => Some(500),
        Some("invalid_request_error") if lower.contains("api key") => Some(401),
        Some("invalid_request_error") => Some(400),
        _ if lower.contains("rate limit") => Some(429),
        _ if lower.contains("overloaded") => Some(503),
        _ => None,
    }
}

fn parse_retry_after(pattern: &Regex, message: &str) -> Option<Duration> {
    let caps = pattern.captures(message)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let millis = match caps.get(2)?.as_str().to_lowercase().as_str() {
        "ms" => value,
        _ => value * 1000.0,
    };
    Some(Duration::from_millis(millis.ceil() as u64))
}

/// Cuts `text` to at most `max_chars` characters on a char boundary.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
