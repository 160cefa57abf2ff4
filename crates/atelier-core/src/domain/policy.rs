//! Policy block classification for failed jobs.
//!
//! A failed job is data, not an orchestration error. The UI still wants to
//! tell "the model refused this content" apart from "something broke", so the
//! job's error message is matched against a fixed set of moderation keywords.

use serde::{Deserialize, Serialize};

use super::job::{Job, JobStatus};

/// Moderation-related fragments, matched case-insensitively.
const POLICY_KEYWORDS: &[&str] = &[
    "content policy",
    "content_policy",
    "policy violation",
    "safety system",
    "safety filter",
    "moderation",
    "nsfw",
    "inappropriate",
    "not allowed",
    "blocked by policy",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Rejected by content moderation; retrying the same input won't help.
    PolicyBlock,
    /// Anything else.
    Generic,
}

/// Does this error message look like a moderation refusal?
pub fn is_policy_block(message: &str) -> bool {
    let lowered = message.to_lowercase();
    POLICY_KEYWORDS.iter().any(|kw| lowered.contains(kw))
}

/// Classify a failed job. `None` for jobs that did not fail.
pub fn classify_failure(job: &Job) -> Option<FailureClass> {
    if job.status != JobStatus::Failed {
        return None;
    }
    let message = job.error.as_deref().unwrap_or_default();
    Some(if is_policy_block(message) {
        FailureClass::PolicyBlock
    } else {
        FailureClass::Generic
    })
}
