//! Control rule registry.
//!
//! A [`RuleCatalog`] is a plain value handed to the orchestrator. The standard
//! catalog assembles the nine SYSCOHADA levels; tests and callers may inject any
//! other rule set.

mod chart;
mod conformity;
mod cross_account;
mod direction;
mod fiscal;
mod fundamental;
mod multi_year;
mod statements;
mod structural;
pub(crate) mod support;
pub mod tolerance;
mod year_over_year;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::domain::{Level, RuleOutcome, Severity};
use super::snapshot::BalanceSnapshot;

pub use tolerance::{Tolerance, ToleranceBand, ToleranceWeight};

/// Evaluation function shared by every rule.
pub type RuleFn = Arc<dyn Fn(&BalanceSnapshot, Option<&BalanceSnapshot>) -> RuleOutcome + Send + Sync>;

/// A single declarative control.
#[derive(Clone)]
pub struct ControlRule {
    reference: String,
    level: Level,
    name: String,
    nominal_severity: Severity,
    evaluate: RuleFn,
}

impl ControlRule {
    pub fn new<F>(
        reference: impl Into<String>,
        level: Level,
        name: impl Into<String>,
        nominal_severity: Severity,
        evaluate: F,
    ) -> Self
    where
        F: Fn(&BalanceSnapshot, Option<&BalanceSnapshot>) -> RuleOutcome + Send + Sync + 'static,
    {
        Self {
            reference: reference.into(),
            level,
            name: name.into(),
            nominal_severity,
            evaluate: Arc::new(evaluate),
        }
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nominal_severity(&self) -> Severity {
        self.nominal_severity
    }

    /// Runs the rule body directly. Use the evaluator to get fault isolation.
    pub fn apply(&self, current: &BalanceSnapshot, prior: Option<&BalanceSnapshot>) -> RuleOutcome {
        (self.evaluate)(current, prior)
    }

    pub fn descriptor(&self) -> RuleDescriptor {
        RuleDescriptor {
            reference: self.reference.clone(),
            level: self.level,
            name: self.name.clone(),
            nominal_severity: self.nominal_severity,
        }
    }
}

impl fmt::Debug for ControlRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlRule")
            .field("reference", &self.reference)
            .field("level", &self.level)
            .field("name", &self.name)
            .field("nominal_severity", &self.nominal_severity)
            .finish_non_exhaustive()
    }
}

/// Serializable view of a rule for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDescriptor {
    pub reference: String,
    pub level: Level,
    pub name: String,
    pub nominal_severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("rule reference {0} registered twice")]
    DuplicateReference(String),
}

/// Parameters of the fiscal controls (Côte d'Ivoire defaults).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiscalParameters {
    pub corporate_tax_rate: Decimal,
    pub minimum_tax_rate: Decimal,
    pub minimum_tax_floor: Decimal,
    pub vat_rate: Decimal,
    pub gifts_cap_rate: Decimal,
    pub shareholder_interest_cap_rate: Decimal,
}

impl Default for FiscalParameters {
    fn default() -> Self {
        Self {
            corporate_tax_rate: dec!(0.25),
            minimum_tax_rate: dec!(0.005),
            minimum_tax_floor: dec!(3000000),
            vat_rate: dec!(0.18),
            gifts_cap_rate: dec!(0.005),
            shareholder_interest_cap_rate: dec!(0.05),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogSettings {
    pub fiscal: FiscalParameters,
}

/// Ordered, immutable rule set.
#[derive(Debug, Clone, Default)]
pub struct RuleCatalog {
    rules: Vec<ControlRule>,
}

impl RuleCatalog {
    /// Sorts rules by level then reference and rejects duplicate references.
    pub fn new(rules: Vec<ControlRule>) -> Result<Self, CatalogError> {
        let mut seen = BTreeSet::new();
        for rule in &rules {
            if !seen.insert(rule.reference.clone()) {
                return Err(CatalogError::DuplicateReference(rule.reference.clone()));
            }
        }

        Ok(Self::sorted(rules))
    }

    fn sorted(mut rules: Vec<ControlRule>) -> Self {
        rules.sort_by(|a, b| {
            a.level
                .cmp(&b.level)
                .then_with(|| a.reference.cmp(&b.reference))
        });
        Self { rules }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// The SYSCOHADA catalog covering levels 0 to 8.
    pub fn standard(settings: &CatalogSettings) -> Self {
        let mut rules = Vec::new();
        rules.extend(structural::rules());
        rules.extend(fundamental::rules());
        rules.extend(conformity::rules());
        rules.extend(direction::rules());
        rules.extend(cross_account::rules());
        rules.extend(year_over_year::rules());
        rules.extend(statements::rules());
        rules.extend(fiscal::rules(&settings.fiscal));
        rules.extend(multi_year::rules());

        Self::sorted(rules)
    }

    /// Rules in reference order, optionally restricted to one level.
    pub fn list_rules(&self, level: Option<Level>) -> Vec<&ControlRule> {
        let mut rules: Vec<&ControlRule> = self
            .rules
            .iter()
            .filter(|rule| level.map_or(true, |level| rule.level == level))
            .collect();
        if level.is_none() {
            rules.sort_by(|a, b| a.reference.cmp(&b.reference));
        }
        rules
    }

    /// Rules of one level as a contiguous slice, already in reference order.
    pub fn level_rules(&self, level: Level) -> &[ControlRule] {
        let start = self.rules.partition_point(|rule| rule.level < level);
        let end = self.rules.partition_point(|rule| rule.level <= level);
        &self.rules[start..end]
    }

    pub fn get(&self, reference: &str) -> Option<&ControlRule> {
        self.rules.iter().find(|rule| rule.reference == reference)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn descriptors(&self, level: Option<Level>) -> Vec<RuleDescriptor> {
        self.list_rules(level)
            .into_iter()
            .map(ControlRule::descriptor)
            .collect()
    }
}
