//! Retry ceiling and backoff.

use crate::config::RetrySettings;
use crate::pipeline::{PipelineError, Stage};
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub transcribe_max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub jitter_ratio: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&RetrySettings::default())
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            transcribe_max_attempts: settings.transcribe_max_attempts.max(1),
            backoff_base_ms: settings.backoff_base_ms,
            backoff_max_ms: settings.backoff_max_ms,
            jitter_ratio: settings.jitter_ratio.clamp(0.0, 1.0) as f64,
        }
    }

    /// Attempts allowed for the kind of failure just seen.
    pub fn ceiling_for(&self, err: &PipelineError) -> u32 {
        match err.stage() {
            Some(Stage::Transcribe) => self.transcribe_max_attempts.min(self.max_attempts),
            _ => self.max_attempts,
        }
    }

    /// Whether another attempt should follow failed attempt number `attempt`.
    pub fn should_retry(&self, attempt: u32, err: &PipelineError) -> bool {
        err.retryable() && attempt < self.ceiling_for(err)
    }

    /// Exponential delay before the retry that follows attempt `attempt`.
    pub fn base_delay_ms(&self, attempt: u32) -> u64 {
        if attempt == 0 {
            return 0;
        }

        let exp = attempt.saturating_sub(1).min(62) as i32;
        let scaled = (self.backoff_base_ms as f64) * 2f64.powi(exp);
        let capped = scaled.min(self.backoff_max_ms as f64);
        capped.max(0.0) as u64
    }

    pub fn jittered_delay_ms(&self, attempt: u32, rng: &mut impl Rng) -> u64 {
        let base = self.base_delay_ms(attempt);
        if base == 0 {
            return 0;
        }

        let upper_cap = self.backoff_max_ms.max(1);
        let capped = base.min(upper_cap);
        let spread = (capped as f64 * self.jitter_ratio).max(1.0);
        let lower = (capped as f64 - spread).max(1.0);
        let upper = (capped as f64 + spread).min(upper_cap as f64).max(lower);

        rng.random_range(lower..=upper).round() as u64
    }

    /// Delay before the next attempt, never shorter than an upstream hint.
    pub fn delay_for(&self, attempt: u32, err: &PipelineError, rng: &mut impl Rng) -> Duration {
        let backoff = Duration::from_millis(self.jittered_delay_ms(attempt, rng));
        match err.retry_after() {
            Some(hint) => backoff.max(hint),
            None => backoff,
        }
    }
}
