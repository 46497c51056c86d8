use std::collections::BTreeSet;

use crate::dataset::{Dataset, DatasetRow};
use crate::model::RuleHit;

/// Explicit rule configuration; nothing here lives in module-level state so
/// tests can inject alternate rule sets.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleConfig {
    pub attempts_column: String,
    pub attempts_threshold: f64,
    pub action_column: String,
    pub forbidden_actions: BTreeSet<String>,
    pub label_column: String,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            attempts_column: "Login_Attempts".to_string(),
            attempts_threshold: 5.0,
            action_column: "Action".to_string(),
            forbidden_actions: ["Delete", "Upload", "Privilege_Escalation"]
                .iter()
                .map(|action| action.to_string())
                .collect(),
            label_column: "Label".to_string(),
        }
    }
}

/// One suspicious-activity predicate over dataset rows. New rules register
/// on the engine without touching any call site.
pub trait SuspicionRule: Send + Sync {
    fn id(&self) -> &str;
    fn description(&self) -> String;
    fn matches(&self, row: &DatasetRow) -> bool;
}

/// Flags rows where a numeric column exceeds a threshold. Missing or null
/// values never trigger.
pub struct ExcessAttemptsRule {
    column: String,
    threshold: f64,
}

impl ExcessAttemptsRule {
    pub fn new(column: impl Into<String>, threshold: f64) -> Self {
        Self {
            column: column.into(),
            threshold,
        }
    }
}

impl SuspicionRule for ExcessAttemptsRule {
    fn id(&self) -> &str {
        "excess_attempts"
    }

    fn description(&self) -> String {
        format!("{} > {}", self.column, self.threshold)
    }

    fn matches(&self, row: &DatasetRow) -> bool {
        row.get(&self.column)
            .and_then(|cell| cell.as_f64())
            .map(|value| value > self.threshold)
            .unwrap_or(false)
    }
}

/// Flags rows whose categorical column value belongs to a configured set of
/// dangerous actions.
pub struct ForbiddenActionRule {
    column: String,
    forbidden: BTreeSet<String>,
}

impl ForbiddenActionRule {
    pub fn new(column: impl Into<String>, forbidden: BTreeSet<String>) -> Self {
        Self {
            column: column.into(),
            forbidden,
        }
    }
}

impl SuspicionRule for ForbiddenActionRule {
    fn id(&self) -> &str {
        "forbidden_action"
    }

    fn description(&self) -> String {
        let actions = self.forbidden.iter().cloned().collect::<Vec<_>>();
        format!("{} in [{}]", self.column, actions.join(", "))
    }

    fn matches(&self, row: &DatasetRow) -> bool {
        row.get(&self.column)
            .and_then(|cell| cell.as_text())
            .map(|value| self.forbidden.contains(value))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RuleEvaluation {
    pub hits: Vec<RuleHit>,
    pub total_hits: u64,
}

pub struct RuleEngine {
    rules: Vec<Box<dyn SuspicionRule>>,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Engine loaded with the baseline ruleset described by `config`.
    pub fn with_defaults(config: &RuleConfig) -> Self {
        let mut engine = Self::new();
        engine.register(Box::new(ExcessAttemptsRule::new(
            config.attempts_column.clone(),
            config.attempts_threshold,
        )));
        engine.register(Box::new(ForbiddenActionRule::new(
            config.action_column.clone(),
            config.forbidden_actions.clone(),
        )));
        engine
    }

    pub fn register(&mut self, rule: Box<dyn SuspicionRule>) {
        self.rules.push(rule);
    }

    /// Evaluate every registered rule against all rows. A rule matching zero
    /// rows contributes no hit (silence-on-zero policy).
    pub fn evaluate(&self, dataset: &Dataset) -> RuleEvaluation {
        let mut hits = Vec::new();
        let mut total_hits = 0_u64;

        for rule in &self.rules {
            let matched = dataset
                .rows
                .iter()
                .filter(|row| rule.matches(row))
                .count() as u64;
            if matched == 0 {
                continue;
            }
            total_hits += matched;
            hits.push(RuleHit {
                rule_id: rule.id().to_string(),
                description: format!("{} : {} rows", rule.description(), matched),
                matched_row_count: matched,
            });
        }

        RuleEvaluation { hits, total_hits }
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::with_defaults(&RuleConfig::default())
    }
}
