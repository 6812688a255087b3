use std::fmt::Write as _;

use serde::Serialize;

use crate::expect::ExpectationFailure;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Passed,
    Failed { failures: Vec<ExpectationFailure> },
    Errored { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioOutcome {
    pub name: String,
    pub messages_observed: usize,
    pub elapsed_ms: u64,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

impl ScenarioOutcome {
    pub fn passed(&self) -> bool {
        matches!(self.status, OutcomeStatus::Passed)
    }

    fn label(&self) -> &'static str {
        match self.status {
            OutcomeStatus::Passed => "ok",
            OutcomeStatus::Failed { .. } => "FAIL",
            OutcomeStatus::Errored { .. } => "ERROR",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SuiteReport {
    pub outcomes: Vec<ScenarioOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teardown_error: Option<String>,
}

impl SuiteReport {
    pub fn passed_count(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.passed()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome.status, OutcomeStatus::Failed { .. }))
            .count()
    }

    pub fn errored_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome.status, OutcomeStatus::Errored { .. }))
            .count()
    }

    pub fn is_success(&self) -> bool {
        self.teardown_error.is_none() && self.outcomes.iter().all(ScenarioOutcome::passed)
    }

    pub fn render_text(&self) -> String {
        let mut rendered = String::new();
        for outcome in &self.outcomes {
            let _ = writeln!(
                rendered,
                "{} ... {} ({} message(s), {}ms)",
                outcome.name,
                outcome.label(),
                outcome.messages_observed,
                outcome.elapsed_ms
            );
            match &outcome.status {
                OutcomeStatus::Passed => {}
                OutcomeStatus::Failed { failures } => {
                    for failure in failures {
                        let _ = writeln!(rendered, "    {failure}");
                    }
                }
                OutcomeStatus::Errored { message } => {
                    let _ = writeln!(rendered, "    {message}");
                }
            }
        }
        if let Some(error) = &self.teardown_error {
            let _ = writeln!(rendered, "suite teardown failed: {error}");
        }
        let _ = write!(
            rendered,
            "ran {} scenario(s): passed={} failed={} errored={}",
            self.outcomes.len(),
            self.passed_count(),
            self.failed_count(),
            self.errored_count()
        );
        rendered
    }

    pub fn render_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
