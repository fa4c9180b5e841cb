use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::super::domain::{RuleOutcome, Severity};
use super::support::amount;

/// Which pair of severities a tolerance breach escalates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToleranceWeight {
    /// ECART is MINEUR, ERREUR is MAJEUR.
    Standard,
    /// ECART is MAJEUR, ERREUR is BLOQUANT.
    Critical,
}

impl ToleranceWeight {
    pub const fn tiers(self) -> (Severity, Severity) {
        match self {
            ToleranceWeight::Standard => (Severity::Mineur, Severity::Majeur),
            ToleranceWeight::Critical => (Severity::Majeur, Severity::Bloquant),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToleranceBand {
    Conforme,
    Ecart(Severity),
    Erreur(Severity),
}

impl ToleranceBand {
    pub const fn severity(self) -> Severity {
        match self {
            ToleranceBand::Conforme => Severity::Ok,
            ToleranceBand::Ecart(severity) | ToleranceBand::Erreur(severity) => severity,
        }
    }

    pub const fn code(self) -> &'static str {
        match self {
            ToleranceBand::Conforme => "CONFORME",
            ToleranceBand::Ecart(_) => "ECART",
            ToleranceBand::Erreur(_) => "ERREUR",
        }
    }
}

/// Per-rule threshold applied to the absolute gap between two amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tolerance {
    pub threshold: Decimal,
    pub weight: ToleranceWeight,
}

impl Tolerance {
    pub fn standard(threshold: Decimal) -> Self {
        Self {
            threshold,
            weight: ToleranceWeight::Standard,
        }
    }

    pub fn critical(threshold: Decimal) -> Self {
        Self {
            threshold,
            weight: ToleranceWeight::Critical,
        }
    }

    pub fn classify(&self, a: Decimal, b: Decimal) -> ToleranceBand {
        let gap = (a - b).abs();
        let (minor, major) = self.weight.tiers();
        if gap.is_zero() {
            ToleranceBand::Conforme
        } else if gap <= self.threshold {
            ToleranceBand::Ecart(minor)
        } else {
            ToleranceBand::Erreur(major)
        }
    }

    /// Compares `a` against `b` and records both amounts with their gap.
    ///
    /// `subject` names what is being compared, e.g. "Total debit / total credit".
    pub fn compare(&self, subject: &str, a: Decimal, b: Decimal) -> RuleOutcome {
        let gap = (a - b).abs();
        let band = self.classify(a, b);
        let outcome = match band {
            ToleranceBand::Conforme => {
                RuleOutcome::ok(format!("{subject}: conforme ({})", amount(a)))
            }
            ToleranceBand::Ecart(severity) => RuleOutcome::anomaly(
                severity,
                format!(
                    "{subject}: ecart de {} dans la tolerance de {}",
                    amount(gap),
                    amount(self.threshold)
                ),
            ),
            ToleranceBand::Erreur(severity) => RuleOutcome::anomaly(
                severity,
                format!(
                    "{subject}: erreur de {} au-dela de la tolerance de {}",
                    amount(gap),
                    amount(self.threshold)
                ),
            ),
        };
        outcome
            .with_amount("a", a)
            .with_amount("b", b)
            .with_amount("ecart", gap)
    }
}
