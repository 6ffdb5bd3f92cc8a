//! Rule and ruleset compliance evaluation.
//!
//! Rules compile their query expression once, at construction; evaluation is
//! a pure read against a parsed report and never mutates the rule.

use auditlens_types::{
    ComplianceReport, ParsedReport, RuleConfig, RuleOutcome, RulesetConfig, RulesetOutcome,
};
use thiserror::Error;

use crate::policy::{compile_query, CompileError, CompiledQuery, EvalError};

#[derive(Debug, Error)]
#[error("rule '{rule}' in ruleset '{ruleset}' has an invalid query: {source}")]
pub struct RulesetCompileError {
    pub ruleset: String,
    pub rule: String,
    #[source]
    pub source: CompileError,
}

/// An evaluation fault is surfaced, never folded into "non-compliant".
#[derive(Debug, Error)]
#[error("rule '{rule}' in ruleset '{ruleset}' failed to evaluate: {source}")]
pub struct RulesetEvalError {
    pub ruleset: String,
    pub rule: String,
    #[source]
    pub source: EvalError,
}

/// A single compliance rule with its compiled query.
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,
    pub description: String,
    pub enabled: bool,
    pub alert: bool,
    query: CompiledQuery,
}

impl Rule {
    pub fn compile(config: &RuleConfig) -> Result<Self, CompileError> {
        Ok(Self {
            name: config.name.clone(),
            description: config.description.clone(),
            enabled: config.enabled,
            alert: config.alert,
            query: compile_query(&config.query)?,
        })
    }

    pub fn query(&self) -> &CompiledQuery {
        &self.query
    }

    pub fn matches(&self, report: &ParsedReport) -> Result<bool, EvalError> {
        self.query.evaluate(report)
    }
}

/// A named collection of rules. Compliant iff every enabled rule matches;
/// with no enabled rules it is vacuously compliant.
#[derive(Debug, Clone)]
pub struct Ruleset {
    pub name: String,
    pub description: String,
    pub rules: Vec<Rule>,
}

impl Ruleset {
    /// Compile every member rule, failing fast on the first bad query so
    /// broken rules are caught at save time rather than evaluation time.
    pub fn compile(config: &RulesetConfig) -> Result<Self, RulesetCompileError> {
        let mut rules = Vec::with_capacity(config.rules.len());
        for rule_config in &config.rules {
            let rule = Rule::compile(rule_config).map_err(|source| RulesetCompileError {
                ruleset: config.name.clone(),
                rule: rule_config.name.clone(),
                source,
            })?;
            rules.push(rule);
        }
        Ok(Self {
            name: config.name.clone(),
            description: config.description.clone(),
            rules,
        })
    }

    pub fn is_compliant(&self, report: &ParsedReport) -> Result<bool, RulesetEvalError> {
        Ok(self.evaluate(report)?.compliant)
    }

    /// The explain view: the same evaluation with per-rule results attached.
    /// Disabled rules are skipped entirely and reported with `compliant:
    /// null`.
    pub fn evaluate(&self, report: &ParsedReport) -> Result<RulesetOutcome, RulesetEvalError> {
        let mut compliant = true;
        let mut outcomes = Vec::with_capacity(self.rules.len());

        for rule in &self.rules {
            let rule_compliant = if rule.enabled {
                let matched = rule.matches(report).map_err(|source| RulesetEvalError {
                    ruleset: self.name.clone(),
                    rule: rule.name.clone(),
                    source,
                })?;
                if !matched {
                    compliant = false;
                }
                Some(matched)
            } else {
                None
            };

            outcomes.push(RuleOutcome {
                name: rule.name.clone(),
                description: rule.description.clone(),
                enabled: rule.enabled,
                alert: rule.alert,
                compliant: rule_compliant,
            });
        }

        Ok(RulesetOutcome {
            name: self.name.clone(),
            description: self.description.clone(),
            rules: outcomes,
            compliant,
        })
    }
}

/// Evaluate every ruleset against one report and build the full explain
/// tree. Overall compliance is the AND across rulesets.
pub fn check_compliance(
    rulesets: &[Ruleset],
    report: &ParsedReport,
) -> Result<ComplianceReport, RulesetEvalError> {
    let mut compliant = true;
    let mut outcomes = Vec::with_capacity(rulesets.len());

    for ruleset in rulesets {
        let outcome = ruleset.evaluate(report)?;
        if !outcome.compliant {
            compliant = false;
        }
        outcomes.push(outcome);
    }

    Ok(ComplianceReport {
        compliant,
        rulesets: outcomes,
    })
}
