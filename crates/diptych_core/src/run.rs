//! Generation runs and their state machine.

use crate::{JsonMap, RunStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata key listing claims a reviewer still has to check.
pub const CLAIMS_TO_VERIFY: &str = "claims_to_verify";

/// One generation attempt for a topic.
///
/// `finished_at` is set exactly when the status is terminal, and
/// `started_at` is set from the first time the run leaves `queued`. The
/// transition methods are the only code that moves a run, so they keep both
/// in step with `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    /// Run id
    pub id: Uuid,
    /// Topic the run generates from
    pub topic_id: Uuid,
    /// Current status
    pub status: RunStatus,
    /// Model override, if any
    pub model: Option<String>,
    /// Last failure
    pub error: Option<String>,
    /// Metadata returned by the model
    pub meta: JsonMap,
    /// First departure from `queued`
    pub started_at: Option<DateTime<Utc>>,
    /// Time the run reached a terminal status
    pub finished_at: Option<DateTime<Utc>>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl Run {
    /// A fresh queued run.
    pub fn queued(topic_id: Uuid, model: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic_id,
            status: RunStatus::Queued,
            model,
            error: None,
            meta: JsonMap::new(),
            started_at: None,
            finished_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Enter `running`.
    ///
    /// A retried run coming back from `failed` is no longer terminal, so its
    /// `finished_at` is cleared.
    pub fn begin(&mut self, now: DateTime<Utc>) {
        self.status = RunStatus::Running;
        self.started_at = Some(now);
        self.finished_at = None;
        self.error = None;
        self.updated_at = now;
    }

    /// Enter `succeeded` with the generated metadata.
    pub fn succeed(&mut self, meta: JsonMap, now: DateTime<Utc>) {
        self.status = RunStatus::Succeeded;
        self.meta = meta;
        self.error = None;
        self.started_at.get_or_insert(now);
        self.finished_at = Some(now);
        self.updated_at = now;
    }

    /// Enter `failed` with the cause.
    pub fn fail(&mut self, error: impl Into<String>, now: DateTime<Utc>) {
        self.status = RunStatus::Failed;
        self.error = Some(error.into());
        self.started_at.get_or_insert(now);
        self.finished_at = Some(now);
        self.updated_at = now;
    }

    /// Whether the timestamps agree with the status.
    pub fn is_consistent(&self) -> bool {
        let finished_ok = self.finished_at.is_some() == self.status.is_terminal();
        let started_ok = self.status == RunStatus::Queued || self.started_at.is_some();
        finished_ok && started_ok
    }

    /// Whether the metadata still lists claims to verify.
    ///
    /// Any non-empty value counts; `null`, `false`, `0`, `""`, `[]` and `{}`
    /// do not.
    pub fn has_pending_claims(&self) -> bool {
        self.meta.get(CLAIMS_TO_VERIFY).is_some_and(is_truthy)
    }
}

fn is_truthy(value: &serde_json::Value) -> bool {
    use serde_json::Value;
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run() -> Run {
        Run::queued(Uuid::new_v4(), None, Utc::now())
    }

    #[test]
    fn queued_run_is_consistent() {
        let run = run();
        assert_eq!(run.status, RunStatus::Queued);
        assert!(run.started_at.is_none());
        assert!(run.is_consistent());
    }

    #[test]
    fn retry_from_failed_clears_finish() {
        let mut run = run();
        run.begin(Utc::now());
        run.fail("boom", Utc::now());
        assert!(run.is_consistent());
        run.begin(Utc::now());
        assert!(run.finished_at.is_none());
        assert!(run.error.is_none());
        assert!(run.is_consistent());
    }

    #[test]
    fn succeed_without_begin_sets_started() {
        let mut run = run();
        run.succeed(JsonMap::new(), Utc::now());
        assert!(run.started_at.is_some());
        assert!(run.is_consistent());
    }

    #[test]
    fn pending_claims_follow_truthiness() {
        let mut run = run();
        assert!(!run.has_pending_claims());
        for empty in [json!(null), json!([]), json!({}), json!(""), json!(false)] {
            run.meta.insert(CLAIMS_TO_VERIFY.to_string(), empty);
            assert!(!run.has_pending_claims());
        }
        run.meta
            .insert(CLAIMS_TO_VERIFY.to_string(), json!(["population figure"]));
        assert!(run.has_pending_claims());
    }
}
