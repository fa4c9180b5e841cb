//! Corrective journal entries proposed alongside anomalies.
//!
//! Every proposal goes through [`EntryDraft::finish`], which refuses anything
//! that does not balance. Rules fall back to a plain `suggestion` text when no
//! entry can be produced.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use super::domain::{EntryLine, EntrySide, JournalEntrySuggestion, RuleOutcome};
use super::snapshot::BalanceSnapshot;

/// Builder for a two-sided entry.
#[derive(Debug, Clone, Default)]
pub struct EntryDraft {
    lines: Vec<EntryLine>,
    comment: Option<String>,
}

impl EntryDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn debit(self, account_code: impl Into<String>, label: impl Into<String>, amount: Decimal) -> Self {
        self.line(EntrySide::Debit, account_code.into(), label.into(), amount)
    }

    pub fn credit(self, account_code: impl Into<String>, label: impl Into<String>, amount: Decimal) -> Self {
        self.line(EntrySide::Credit, account_code.into(), label.into(), amount)
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    fn line(mut self, side: EntrySide, account_code: String, label: String, amount: Decimal) -> Self {
        self.lines.push(EntryLine {
            side,
            account_code,
            label,
            amount: amount.round_dp(2),
        });
        self
    }

    /// `None` unless the draft has two or more strictly positive lines and
    /// debits equal credits.
    pub fn finish(self) -> Option<JournalEntrySuggestion> {
        let entry = JournalEntrySuggestion {
            lines: self.lines,
            comment: self.comment,
        };
        entry.is_balanced().then_some(entry)
    }
}

struct Reclassification {
    prefix: &'static str,
    wrong_side: EntrySide,
    target: &'static str,
    target_label: &'static str,
}

const RECLASSIFICATIONS: [Reclassification; 3] = [
    Reclassification {
        prefix: "411",
        wrong_side: EntrySide::Credit,
        target: "4191",
        target_label: "Clients, avances et acomptes recus",
    },
    Reclassification {
        prefix: "401",
        wrong_side: EntrySide::Debit,
        target: "4091",
        target_label: "Fournisseurs, avances et acomptes verses",
    },
    Reclassification {
        prefix: "52",
        wrong_side: EntrySide::Credit,
        target: "561",
        target_label: "Banques, credits de tresorerie",
    },
];

/// Reclassification entry for the wrong-side accounts named by `outcome`.
///
/// Each account found in `current` whose balance sits on the wrong side for its
/// family is cleared against the family's reclassification account.
pub fn suggest(outcome: &RuleOutcome, current: &BalanceSnapshot) -> Option<JournalEntrySuggestion> {
    let mut draft = EntryDraft::new();
    let mut targets: BTreeMap<&'static str, (EntrySide, &'static str, Decimal)> = BTreeMap::new();

    for code in outcome.accounts() {
        let Some(entry) = current.entry(code) else {
            continue;
        };
        let Some(rule) = RECLASSIFICATIONS
            .iter()
            .find(|rule| entry.has_prefix(rule.prefix))
        else {
            continue;
        };
        let net = entry.net();
        let misplaced = match rule.wrong_side {
            EntrySide::Credit if net < Decimal::ZERO => -net,
            EntrySide::Debit if net > Decimal::ZERO => net,
            _ => continue,
        };

        let label = format!("Reclassement {}", entry.label.trim());
        draft = match rule.wrong_side {
            EntrySide::Credit => draft.debit(&entry.account_code, label, misplaced),
            EntrySide::Debit => draft.credit(&entry.account_code, label, misplaced),
        };
        let target = targets
            .entry(rule.target)
            .or_insert((rule.wrong_side, rule.target_label, Decimal::ZERO));
        target.2 += misplaced;
    }

    if targets.is_empty() {
        return None;
    }
    for (account, (side, label, amount)) in targets {
        draft = match side {
            EntrySide::Credit => draft.credit(account, label, amount),
            EntrySide::Debit => draft.debit(account, label, amount),
        };
    }
    draft
        .comment("Reclassement des soldes de sens inverse")
        .finish()
}

/// Allocation of a prior result left on 13x: profit to 121, loss to 129.
pub fn allocate_result(result: Decimal) -> Option<JournalEntrySuggestion> {
    if result > Decimal::ZERO {
        EntryDraft::new()
            .debit("131", "Resultat net: benefice", result)
            .credit("121", "Report a nouveau crediteur", result)
            .comment("Affectation du resultat beneficiaire N-1")
            .finish()
    } else if result < Decimal::ZERO {
        let loss = -result;
        EntryDraft::new()
            .debit("129", "Report a nouveau debiteur", loss)
            .credit("139", "Resultat net: perte", loss)
            .comment("Affectation du resultat deficitaire N-1")
            .finish()
    } else {
        None
    }
}
