//! Export readiness checks.

use diptych_core::{Artifact, Lang, Run, RunStatus};
use serde::{Deserialize, Serialize};

/// Outcome of the export gate: every failing reason, in check order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateReport {
    /// Whether every check passed
    pub ready: bool,
    /// Failing checks, in order
    pub reasons: Vec<String>,
}

/// Evaluate the export gate for a run and its artifacts.
///
/// Checks, in order: the run succeeded; the `fr` and `en` artifacts exist;
/// each existing artifact is reviewed; the run metadata lists no claims to
/// verify. All checks run even when an earlier one fails.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use diptych_core::Run;
/// use diptych_pipeline::evaluate_gate;
/// use uuid::Uuid;
///
/// let run = Run::queued(Uuid::new_v4(), None, Utc::now());
/// let report = evaluate_gate(&run, &[]);
/// assert!(!report.ready);
/// assert_eq!(report.reasons, vec![
///     "run.status must be 'succeeded' (current: 'queued')".to_string(),
///     "missing artifact for lang='fr'".to_string(),
///     "missing artifact for lang='en'".to_string(),
/// ]);
/// ```
pub fn evaluate_gate(run: &Run, artifacts: &[Artifact]) -> GateReport {
    let mut reasons = Vec::new();

    if run.status != RunStatus::Succeeded {
        reasons.push(format!(
            "run.status must be 'succeeded' (current: '{}')",
            run.status
        ));
    }

    let find = |lang: Lang| artifacts.iter().find(|a| a.run_id == run.id && a.lang == lang);

    for lang in Lang::ALL {
        if find(lang).is_none() {
            reasons.push(format!("missing artifact for lang='{}'", lang));
        }
    }

    for lang in Lang::ALL {
        if find(lang).is_some_and(|artifact| !artifact.reviewed) {
            reasons.push(format!("artifact '{}' must have reviewed=true", lang));
        }
    }

    if run.has_pending_claims() {
        reasons.push("run.meta.claims_to_verify must be empty or missing".to_string());
    }

    GateReport {
        ready: reasons.is_empty(),
        reasons,
    }
}
