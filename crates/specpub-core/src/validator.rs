//! Runs the selected schema checkers against a spec.

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::checker::{CheckerKind, OutcomeStatus, SchemaChecker, ValidationOutcome};
use crate::source::SpecFile;

/// Which checkers to run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorSelection {
    Swagger,
    Redocly,
    Both,
}

impl ValidatorSelection {
    /// Every selectable option, in menu order.
    pub const ALL: [ValidatorSelection; 3] = [
        ValidatorSelection::Swagger,
        ValidatorSelection::Redocly,
        ValidatorSelection::Both,
    ];

    /// Checkers to run, in execution order.
    pub fn kinds(&self) -> &'static [CheckerKind] {
        match self {
            ValidatorSelection::Swagger => &[CheckerKind::Swagger],
            ValidatorSelection::Redocly => &[CheckerKind::Redocly],
            ValidatorSelection::Both => &[CheckerKind::Swagger, CheckerKind::Redocly],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ValidatorSelection::Swagger => "swagger",
            ValidatorSelection::Redocly => "redocly",
            ValidatorSelection::Both => "both",
        }
    }

    /// Menu entry shown by the interactive prompt.
    pub fn menu_label(&self) -> &'static str {
        match self {
            ValidatorSelection::Swagger => CheckerKind::Swagger.label(),
            ValidatorSelection::Redocly => CheckerKind::Redocly.label(),
            ValidatorSelection::Both => "Both",
        }
    }
}

impl std::fmt::Display for ValidatorSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Unrecognised validator selection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown validator '{0}' (expected swagger, redocly or both)")]
pub struct UnknownSelection(pub String);

impl FromStr for ValidatorSelection {
    type Err = UnknownSelection;

    /// Accepts the option name or its menu number (1, 2, 3).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "swagger" => Ok(ValidatorSelection::Swagger),
            "2" | "redocly" => Ok(ValidatorSelection::Redocly),
            "3" | "both" => Ok(ValidatorSelection::Both),
            other => Err(UnknownSelection(other.to_string())),
        }
    }
}

/// Aggregates outcomes from the registered checkers.
#[derive(Default)]
pub struct Validator {
    checkers: HashMap<CheckerKind, Box<dyn SchemaChecker>>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a checker, replacing any previous one of the same kind.
    pub fn with_checker(mut self, checker: Box<dyn SchemaChecker>) -> Self {
        self.checkers.insert(checker.kind(), checker);
        self
    }

    /// Run every selected checker in order. A failing checker never stops
    /// the ones after it.
    pub async fn validate(
        &self,
        spec: &SpecFile,
        selection: ValidatorSelection,
    ) -> Vec<ValidationOutcome> {
        let mut outcomes = Vec::with_capacity(selection.kinds().len());

        for kind in selection.kinds() {
            info!(spec = %spec.name(), checker = %kind, "validating with {}", kind.label());

            let outcome = match self.checkers.get(kind) {
                Some(checker) => checker.check(spec).await,
                None => ValidationOutcome::tool_unavailable(
                    *kind,
                    format!("no {} checker is configured", kind.name()),
                ),
            };

            match outcome.status {
                OutcomeStatus::Passed => info!(checker = %kind, "validation passed"),
                OutcomeStatus::Failed => {
                    error!(
                        checker = %kind,
                        exit_code = ?outcome.exit_code,
                        diagnostics = outcome.diagnostics.len(),
                        "validation failed"
                    );
                }
                OutcomeStatus::ToolUnavailable => {
                    warn!(checker = %kind, "checker unavailable, continuing")
                }
            }
            for line in &outcome.diagnostics {
                if outcome.passed() {
                    info!(checker = %kind, "{}", line);
                } else {
                    warn!(checker = %kind, "{}", line);
                }
            }

            outcomes.push(outcome);
        }

        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::StaticChecker;
    use crate::source::SpecOrigin;

    fn spec() -> SpecFile {
        SpecFile::new("data_products", "/tmp/data_products.yaml", SpecOrigin::Local, "openapi: 3.0.0\n")
    }

    #[test]
    fn test_selection_parse() {
        assert_eq!("swagger".parse::<ValidatorSelection>().unwrap(), ValidatorSelection::Swagger);
        assert_eq!("2".parse::<ValidatorSelection>().unwrap(), ValidatorSelection::Redocly);
        assert_eq!(" Both ".parse::<ValidatorSelection>().unwrap(), ValidatorSelection::Both);
        assert!("4".parse::<ValidatorSelection>().is_err());
        assert!("".parse::<ValidatorSelection>().is_err());
    }

    #[test]
    fn test_selection_kinds_order() {
        assert_eq!(
            ValidatorSelection::Both.kinds(),
            &[CheckerKind::Swagger, CheckerKind::Redocly]
        );
        assert_eq!(ValidatorSelection::Redocly.kinds(), &[CheckerKind::Redocly]);
    }

    #[tokio::test]
    async fn test_both_runs_after_first_failure() {
        let validator = Validator::new()
            .with_checker(Box::new(StaticChecker::failing(CheckerKind::Swagger, &["bad ref"])))
            .with_checker(Box::new(StaticChecker::passing(CheckerKind::Redocly)));

        let outcomes = validator.validate(&spec(), ValidatorSelection::Both).await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].checker, CheckerKind::Swagger);
        assert_eq!(outcomes[0].status, OutcomeStatus::Failed);
        assert_eq!(outcomes[0].diagnostics, vec!["bad ref".to_string()]);
        assert_eq!(outcomes[1].checker, CheckerKind::Redocly);
        assert!(outcomes[1].passed());
    }

    #[tokio::test]
    async fn test_both_with_one_unavailable_returns_two_outcomes() {
        let validator = Validator::new()
            .with_checker(Box::new(StaticChecker::unavailable(CheckerKind::Swagger)))
            .with_checker(Box::new(StaticChecker::passing(CheckerKind::Redocly)));

        let outcomes = validator.validate(&spec(), ValidatorSelection::Both).await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].status, OutcomeStatus::ToolUnavailable);
        assert_eq!(outcomes[1].status, OutcomeStatus::Passed);
    }

    #[tokio::test]
    async fn test_unregistered_checker_is_unavailable() {
        let validator = Validator::new();
        let outcomes = validator.validate(&spec(), ValidatorSelection::Redocly).await;

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].checker, CheckerKind::Redocly);
        assert_eq!(outcomes[0].status, OutcomeStatus::ToolUnavailable);
    }

    #[tokio::test]
    async fn test_single_selection_runs_only_that_checker() {
        let swagger = StaticChecker::passing(CheckerKind::Swagger);
        let calls = swagger.calls();
        let validator = Validator::new()
            .with_checker(Box::new(swagger))
            .with_checker(Box::new(StaticChecker::passing(CheckerKind::Redocly)));

        let outcomes = validator.validate(&spec(), ValidatorSelection::Swagger).await;

        assert_eq!(outcomes.len(), 1);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
