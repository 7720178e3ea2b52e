//! Pre-flight admission policy.
//!
//! A gate looks at an item before any costly work and may reject it. The
//! gate itself never writes; the orchestrator persists the skip.

use crate::config::AdmissionSettings;
use crate::model::{Item, Metadata};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Outcome of an admission check.
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    Proceed,
    Reject(SkipReason),
}

/// Why an item was rejected, and the numbers behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkipReason {
    /// Machine-readable reason code, e.g. `duration_exceeded`.
    pub reason: String,
    pub threshold: serde_json::Value,
    pub observed_value: serde_json::Value,
}

impl SkipReason {
    pub const DURATION_EXCEEDED: &'static str = "duration_exceeded";

    /// Annotations written to `extra_metadata` alongside the skip.
    pub fn to_annotations(&self, skipped_at: DateTime<Utc>) -> Metadata {
        let mut annotations = Metadata::new();
        annotations.insert("skip_reason".into(), json!(self.reason));
        annotations.insert("threshold".into(), self.threshold.clone());
        annotations.insert("observed_value".into(), self.observed_value.clone());
        annotations.insert("skipped_at".into(), json!(skipped_at.to_rfc3339()));
        annotations
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (observed {}, threshold {})",
            self.reason, self.observed_value, self.threshold
        )
    }
}

/// Trait for admission policies.
pub trait AdmissionGate: Send + Sync {
    /// Decide whether the item may enter the pipeline. Must be pure.
    fn admit(&self, item: &Item) -> Admission;
}

/// Rejects items whose known duration exceeds a ceiling.
///
/// Items without a known duration are admitted.
#[derive(Debug, Clone)]
pub struct DurationGate {
    max_duration_seconds: u32,
}

impl DurationGate {
    pub fn new(max_duration_seconds: u32) -> Self {
        Self {
            max_duration_seconds,
        }
    }

    pub fn from_settings(settings: &AdmissionSettings) -> Self {
        Self::new(settings.max_duration_seconds)
    }
}

impl AdmissionGate for DurationGate {
    fn admit(&self, item: &Item) -> Admission {
        match item.duration_seconds {
            Some(duration) if duration > self.max_duration_seconds => {
                Admission::Reject(SkipReason {
                    reason: SkipReason::DURATION_EXCEEDED.to_string(),
                    threshold: json!(self.max_duration_seconds),
                    observed_value: json!(duration),
                })
            }
            _ => Admission::Proceed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(duration: Option<u32>) -> Item {
        Item::new("channel", "Episode", "https://example.com/v", duration)
    }

    #[test]
    fn test_duration_over_ceiling_rejected() {
        let gate = DurationGate::new(7200);

        match gate.admit(&item(Some(50_000))) {
            Admission::Reject(reason) => {
                assert_eq!(reason.reason, "duration_exceeded");
                assert_eq!(reason.threshold, json!(7200));
                assert_eq!(reason.observed_value, json!(50_000));
            }
            Admission::Proceed => panic!("expected rejection"),
        }
    }

    #[test]
    fn test_duration_at_ceiling_admitted() {
        let gate = DurationGate::new(7200);
        assert_eq!(gate.admit(&item(Some(7200))), Admission::Proceed);
        assert_eq!(gate.admit(&item(Some(60))), Admission::Proceed);
    }

    #[test]
    fn test_unknown_duration_admitted() {
        let gate = DurationGate::new(10);
        assert_eq!(gate.admit(&item(None)), Admission::Proceed);
    }

    #[test]
    fn test_skip_annotations() {
        let reason = SkipReason {
            reason: SkipReason::DURATION_EXCEEDED.to_string(),
            threshold: json!(7200),
            observed_value: json!(9000),
        };
        let annotations = reason.to_annotations(Utc::now());

        assert_eq!(annotations["skip_reason"], "duration_exceeded");
        assert_eq!(annotations["threshold"], 7200);
        assert_eq!(annotations["observed_value"], 9000);
        assert!(annotations["skipped_at"].is_string());
    }
}
