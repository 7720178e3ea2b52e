//! Shared OpenAI client construction.

use crate::error::Result;
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Timeout for a single OpenAI request. Long transcriptions need the headroom.
const REQUEST_TIMEOUT_SECS: u64 = 300;

/// Create an OpenAI client reading `OPENAI_API_KEY` from the environment.
pub fn create_client() -> Result<Client<OpenAIConfig>> {
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()?;

    Ok(Client::with_config(OpenAIConfig::default()).with_http_client(http_client))
}
