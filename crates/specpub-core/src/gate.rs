//! Publish gate: decides whether a run may upload.

use serde::{Deserialize, Serialize};

use crate::checker::ValidationOutcome;

/// Outcome of the gate. Computed once per run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PublishDecision {
    Proceed,
    HaltDryRun,
    HaltValidationFailed,
}

impl PublishDecision {
    pub fn is_proceed(&self) -> bool {
        matches!(self, PublishDecision::Proceed)
    }
}

impl std::fmt::Display for PublishDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublishDecision::Proceed => write!(f, "PROCEED"),
            PublishDecision::HaltDryRun => write!(f, "HALT_DRY_RUN"),
            PublishDecision::HaltValidationFailed => write!(f, "HALT_VALIDATION_FAILED"),
        }
    }
}

/// Gate rule:
/// - dry-run always halts, whatever the outcomes
/// - otherwise any outcome that did not pass halts
/// - otherwise proceed
pub fn evaluate(dry_run: bool, outcomes: &[ValidationOutcome]) -> PublishDecision {
    if dry_run {
        PublishDecision::HaltDryRun
    } else if outcomes.iter().any(|o| !o.passed()) {
        PublishDecision::HaltValidationFailed
    } else {
        PublishDecision::Proceed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::{CheckerKind, OutcomeStatus};

    fn outcome(checker: CheckerKind, status: OutcomeStatus) -> ValidationOutcome {
        ValidationOutcome {
            checker,
            status,
            exit_code: match status {
                OutcomeStatus::Passed => Some(0),
                OutcomeStatus::Failed => Some(1),
                OutcomeStatus::ToolUnavailable => None,
            },
            diagnostics: vec![],
            duration_ms: 5,
        }
    }

    fn all_combinations() -> Vec<Vec<ValidationOutcome>> {
        let statuses = [
            OutcomeStatus::Passed,
            OutcomeStatus::Failed,
            OutcomeStatus::ToolUnavailable,
        ];
        let mut sets = vec![vec![]];
        for a in statuses {
            sets.push(vec![outcome(CheckerKind::Swagger, a)]);
            for b in statuses {
                sets.push(vec![
                    outcome(CheckerKind::Swagger, a),
                    outcome(CheckerKind::Redocly, b),
                ]);
            }
        }
        sets
    }

    #[test]
    fn test_dry_run_always_halts() {
        for outcomes in all_combinations() {
            assert_eq!(evaluate(true, &outcomes), PublishDecision::HaltDryRun);
        }
    }

    #[test]
    fn test_any_failure_halts() {
        for outcomes in all_combinations() {
            let decision = evaluate(false, &outcomes);
            if outcomes.iter().all(|o| o.passed()) {
                assert_eq!(decision, PublishDecision::Proceed);
            } else {
                assert_eq!(decision, PublishDecision::HaltValidationFailed);
            }
        }
    }

    #[test]
    fn test_unavailable_tool_blocks_publication() {
        let outcomes = vec![
            outcome(CheckerKind::Swagger, OutcomeStatus::Passed),
            outcome(CheckerKind::Redocly, OutcomeStatus::ToolUnavailable),
        ];
        assert_eq!(evaluate(false, &outcomes), PublishDecision::HaltValidationFailed);
    }

    #[test]
    fn test_all_passed_proceeds() {
        let outcomes = vec![
            outcome(CheckerKind::Swagger, OutcomeStatus::Passed),
            outcome(CheckerKind::Redocly, OutcomeStatus::Passed),
        ];
        let decision = evaluate(false, &outcomes);
        assert!(decision.is_proceed());
        assert_eq!(decision.to_string(), "PROCEED");
    }

    #[test]
    fn test_decision_serializes_screaming_case() {
        let json = serde_json::to_string(&PublishDecision::HaltDryRun).unwrap();
        assert_eq!(json, "\"HALT_DRY_RUN\"");
    }
}
